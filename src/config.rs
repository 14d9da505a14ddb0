use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Result, Td3Error};

/// Hyperparameters fixed at agent construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Td3Config {
    pub state_size: usize,
    pub action_size: usize,
    /// Symmetric action bound: legal actions lie in `[-action_bound, action_bound]`
    pub action_bound: f32,
    /// Width of both hidden layers in every network
    pub hidden_size: usize,
    pub actor_lr: f64,
    pub critic_lr: f64,
    /// Discount factor γ
    pub gamma: f32,
    /// Soft update coefficient τ
    pub tau: f64,
    /// Std of the smoothing noise added to target actions
    pub target_noise: f32,
    /// Smoothing noise is clipped to `[-noise_clip, noise_clip]`
    pub noise_clip: f32,
    /// Actor and targets are updated every `policy_delay` inner iterations
    pub policy_delay: usize,
    pub batch_size: usize,
    /// Environment steps between update bursts, and updates per burst
    pub update_every: usize,
    pub buffer_capacity: usize,
}

impl Default for Td3Config {
    fn default() -> Self {
        Self {
            state_size: 3,
            action_size: 1,
            action_bound: 2.0,
            hidden_size: 256,
            actor_lr: 1e-3,
            critic_lr: 1e-3,
            gamma: 0.99,
            tau: 0.02,
            target_noise: 0.2,
            noise_clip: 0.5,
            policy_delay: 2,
            batch_size: 100,
            update_every: 50,
            buffer_capacity: 1_000_000,
        }
    }
}

impl Td3Config {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Td3Error::InvalidConfig(msg.to_string()));

        if self.state_size == 0 || self.action_size == 0 || self.hidden_size == 0 {
            return invalid("state_size, action_size and hidden_size must be positive");
        }
        if !(self.action_bound > 0.0) || !self.action_bound.is_finite() {
            return invalid("action_bound must be a positive finite number");
        }
        if self.policy_delay == 0 {
            return invalid("policy_delay must be at least 1");
        }
        if self.update_every == 0 {
            return invalid("update_every must be at least 1");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1");
        }
        if self.buffer_capacity < self.batch_size {
            return invalid("buffer_capacity must be at least batch_size");
        }
        if !(self.tau > 0.0 && self.tau <= 1.0) {
            return invalid("tau must lie in (0, 1]");
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return invalid("gamma must lie in [0, 1]");
        }
        if !(self.target_noise >= 0.0) || !(self.noise_clip >= 0.0) {
            return invalid("target_noise and noise_clip must be non-negative");
        }
        if !(self.actor_lr > 0.0) || !(self.critic_lr > 0.0) {
            return invalid("learning rates must be positive");
        }
        Ok(())
    }
}
