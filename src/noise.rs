use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Result, Td3Error};

fn normal(sigma: f32) -> Result<Normal<f32>> {
    Normal::new(0.0, sigma).map_err(|e| Td3Error::InvalidConfig(format!("noise std {sigma}: {e}")))
}

/// `len` Gaussian samples with std `sigma`, each clipped to `[-clip, clip]`.
pub fn smoothing_noise<R: Rng + ?Sized>(
    rng: &mut R,
    len: usize,
    sigma: f32,
    clip: f32,
) -> Result<Vec<f32>> {
    if !(clip >= 0.0) {
        return Err(Td3Error::InvalidConfig(format!("noise clip {clip} is negative")));
    }
    let dist = normal(sigma)?;
    Ok((0..len)
        .map(|_| dist.sample(rng).clamp(-clip, clip))
        .collect())
}

/// Exploration noise applied by the driver on top of the deterministic policy.
#[derive(Debug, Clone, Copy)]
pub struct GaussianExploration {
    dist: Normal<f32>,
    bound: f32,
}

impl GaussianExploration {
    /// Std is `scale * bound`, so `scale` is relative to the action range.
    pub fn new(scale: f32, bound: f32) -> Result<Self> {
        Ok(Self {
            dist: normal(scale * bound)?,
            bound,
        })
    }

    /// Perturbs `action` in place and clips it back into `[-bound, bound]`.
    pub fn perturb<R: Rng + ?Sized>(&self, rng: &mut R, action: &mut [f32]) {
        for a in action.iter_mut() {
            *a = (*a + self.dist.sample(rng)).clamp(-self.bound, self.bound);
        }
    }
}
