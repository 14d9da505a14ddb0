use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use tracing::info;

use crate::{
    config::Td3Config,
    error::{Result, Td3Error},
    experience::check_len,
    mlp::MultiLayerPerceptron,
    network::Network,
    soft_update::hard_update,
};

/// Deterministic policy: `tanh(f(state)) * action_bound`.
pub struct Actor {
    var_map: VarMap,
    mlp: MultiLayerPerceptron,
    action_bound: f32,
    state_size: usize,
    action_size: usize,
    hidden_size: usize,
    device: Device,
}

impl Actor {
    pub fn new(
        state_size: usize,
        action_size: usize,
        hidden_size: usize,
        action_bound: f32,
        device: &Device,
    ) -> Result<Self> {
        let var_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&var_map, DType::F32, device);
        let mlp = MultiLayerPerceptron::new(
            &[state_size, hidden_size, hidden_size, action_size],
            vb.pp("actor"),
        )?;
        Ok(Self {
            var_map,
            mlp,
            action_bound,
            state_size,
            action_size,
            hidden_size,
            device: device.clone(),
        })
    }

    pub fn from_config(config: &Td3Config, device: &Device) -> Result<Self> {
        Self::new(
            config.state_size,
            config.action_size,
            config.hidden_size,
            config.action_bound,
            device,
        )
    }

    pub fn action_bound(&self) -> f32 {
        self.action_bound
    }

    /// Action for a single state, with no gradient tracking.
    pub fn act_vec(&self, state: &[f32]) -> Result<Vec<f32>> {
        check_len("state", state, self.state_size)?;
        let input = Tensor::from_slice(state, (1, self.state_size), &self.device)?;
        let action = self.forward(&input)?.detach();
        Ok(action.squeeze(0)?.to_vec1::<f32>()?)
    }

    /// Writes the parameters as a safetensors key→tensor artifact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.var_map.save(path.as_ref())?;
        info!(path = %path.as_ref().display(), "actor saved");
        Ok(())
    }

    /// Rebuilds an actor shaped by `config` and fills it from a saved artifact.
    pub fn load<P: AsRef<Path>>(path: P, config: &Td3Config, device: &Device) -> Result<Self> {
        let mut actor = Self::from_config(config, device)?;
        actor.var_map.load(path.as_ref())?;
        info!(path = %path.as_ref().display(), "actor loaded");
        Ok(actor)
    }
}

impl Network for Actor {
    /// `(k, S)` batch of states
    type Input = Tensor;
    /// `(k, A)` batch of actions
    type Output = Tensor;

    fn forward(&self, states: &Tensor) -> Result<Tensor> {
        let (_, width) = states.dims2()?;
        if width != self.state_size {
            return Err(Td3Error::ShapeMismatch {
                what: "state",
                expected: self.state_size,
                actual: width,
            });
        }
        let raw = self.mlp.output(states)?;
        Ok((raw.tanh()? * f64::from(self.action_bound))?)
    }

    fn var_map(&self) -> &VarMap {
        &self.var_map
    }

    fn duplicate(&self) -> Result<Self> {
        let copy = Self::new(
            self.state_size,
            self.action_size,
            self.hidden_size,
            self.action_bound,
            &self.device,
        )?;
        hard_update(&self.var_map, &copy.var_map)?;
        Ok(copy)
    }
}
