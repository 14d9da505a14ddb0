//! Capabilities shared by the policy and value networks.
//!
//! A [`Network`] only knows how to evaluate itself. Gradient updates are a
//! separate capability granted by wrapping it in [`Online`]; shadow copies
//! live in [`Target`], which has no gradient path and changes only through
//! [`Target::soft_update`].

use candle_core::Tensor;
use candle_nn::{Optimizer, VarMap};
use candle_optimisers::adam::{Adam, ParamsAdam};
use rand::Rng;

use crate::{
    error::{Result, Td3Error},
    soft_update::soft_update,
};

pub trait Network: Sized {
    type Input;
    type Output;

    /// Evaluates the network on `input` with its current parameters.
    fn forward(&self, input: &Self::Input) -> Result<Self::Output>;

    fn var_map(&self) -> &VarMap;

    /// Structurally identical network whose parameters equal this one's,
    /// held in a store of its own.
    fn duplicate(&self) -> Result<Self>;
}

/// Gradient-based update of a network's own parameters.
pub trait Trainable {
    /// Backpropagates `loss` and applies one optimizer step.
    fn update(&mut self, loss: &Tensor) -> Result<()>;
}

/// An online network together with its Adam optimizer state.
pub struct Online<N: Network> {
    network: N,
    optimiser: Adam,
}

impl<N: Network> Online<N> {
    pub fn new(network: N, lr: f64) -> Result<Self> {
        let params = ParamsAdam {
            lr,
            ..Default::default()
        };
        let optimiser = Adam::new(network.var_map().all_vars(), params)?;
        Ok(Self { network, optimiser })
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn forward(&self, input: &N::Input) -> Result<N::Output> {
        self.network.forward(input)
    }
}

impl<N: Network> Trainable for Online<N> {
    fn update(&mut self, loss: &Tensor) -> Result<()> {
        // gradients reaching other stores through `loss` are computed but
        // only this network's variables are stepped
        self.optimiser.backward_step(loss)?;
        Ok(())
    }
}

/// Frozen-gradient shadow copy of an online network.
pub struct Target<N: Network> {
    network: N,
}

impl<N: Network> Target<N> {
    pub fn from_online(online: &N) -> Result<Self> {
        Ok(Self {
            network: online.duplicate()?,
        })
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Outputs still reference the target's variables; detach them before
    /// using them as regression targets.
    pub fn forward(&self, input: &N::Input) -> Result<N::Output> {
        self.network.forward(input)
    }

    pub fn soft_update(&mut self, online: &N, tau: f64) -> Result<()> {
        soft_update(online.var_map(), self.network.var_map(), tau)
    }
}

/// Re-draws every linear layer's parameters from `rng`, uniformly in
/// `±1/sqrt(fan_in)`.
///
/// Parameters are visited in sorted name order so the same seed always yields
/// the same network. Names follow the `{layer}.weight` / `{layer}.bias`
/// convention of `candle_nn::linear`.
pub fn init_parameters<R: Rng + ?Sized>(var_map: &VarMap, rng: &mut R) -> Result<()> {
    let data = var_map.data().lock().map_err(|_| Td3Error::LockPoisoned)?;
    let mut names: Vec<&String> = data.keys().collect();
    names.sort();

    for name in names {
        let var = &data[name];
        let fan_in = if let Some(layer) = name.strip_suffix(".bias") {
            let weight = data
                .get(&format!("{layer}.weight"))
                .ok_or_else(|| Td3Error::MissingParameter(format!("{layer}.weight")))?;
            weight.dims()[1]
        } else {
            *var.dims().last().unwrap_or(&1)
        };
        let bound = 1.0 / (fan_in.max(1) as f32).sqrt();
        let values: Vec<f32> = (0..var.elem_count())
            .map(|_| rng.random_range(-bound..bound))
            .collect();
        let fresh = Tensor::from_vec(values, var.dims(), var.device())?;
        var.set(&fresh)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::MultiLayerPerceptron;
    use candle_core::{DType, Device};
    use candle_nn::VarBuilder;
    use rand::{SeedableRng, rngs::StdRng};

    fn flat(vm: &VarMap) -> Vec<f32> {
        let data = vm.data().lock().unwrap();
        let mut names: Vec<&String> = data.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|n| data[n].as_tensor().flatten_all().unwrap().to_vec1::<f32>().unwrap())
            .collect()
    }

    fn build(vm: &VarMap) {
        let vb = VarBuilder::from_varmap(vm, DType::F32, &Device::Cpu);
        MultiLayerPerceptron::new(&[4, 8, 1], vb.pp("net")).unwrap();
    }

    #[test]
    fn same_seed_same_parameters() {
        let (a, b) = (VarMap::new(), VarMap::new());
        build(&a);
        build(&b);
        init_parameters(&a, &mut StdRng::seed_from_u64(3)).unwrap();
        init_parameters(&b, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(flat(&a), flat(&b));
    }

    #[test]
    fn parameters_respect_fan_in_bound() {
        let vm = VarMap::new();
        build(&vm);
        init_parameters(&vm, &mut StdRng::seed_from_u64(11)).unwrap();

        let data = vm.data().lock().unwrap();
        let first = data["net.0.bias"].as_tensor().to_vec1::<f32>().unwrap();
        assert!(first.iter().all(|v| v.abs() <= 0.5), "fan_in 4 bounds at 0.5");
        let second = data["net.1.weight"].as_tensor().to_vec2::<f32>().unwrap();
        let bound = 1.0 / 8f32.sqrt();
        assert!(second.iter().flatten().all(|v| v.abs() <= bound));
    }
}
