use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};

use crate::{
    config::Td3Config,
    error::{Result, Td3Error},
    mlp::MultiLayerPerceptron,
    network::Network,
    soft_update::hard_update,
};

/// Twin value estimators over `(state, action)`.
///
/// Both heads share one parameter store but no parameters, so a single
/// optimizer steps them together on the summed loss.
pub struct Critic {
    var_map: VarMap,
    q1: MultiLayerPerceptron,
    q2: MultiLayerPerceptron,
    state_size: usize,
    action_size: usize,
    hidden_size: usize,
    device: Device,
}

impl Critic {
    pub fn new(
        state_size: usize,
        action_size: usize,
        hidden_size: usize,
        device: &Device,
    ) -> Result<Self> {
        let var_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&var_map, DType::F32, device);
        let topology = [state_size + action_size, hidden_size, hidden_size, 1];
        let q1 = MultiLayerPerceptron::new(&topology, vb.pp("q1"))?;
        let q2 = MultiLayerPerceptron::new(&topology, vb.pp("q2"))?;
        Ok(Self {
            var_map,
            q1,
            q2,
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
            device,
        )
    }

    /// First head only; this is the estimate the policy ascends.
    pub fn q1(&self, states: &Tensor, actions: &Tensor) -> Result<Tensor> {
        let input = self.concat(states, actions)?;
        self.q1.output(&input)
    }

    fn concat(&self, states: &Tensor, actions: &Tensor) -> Result<Tensor> {
        let (rows, state_width) = states.dims2()?;
        let (action_rows, action_width) = actions.dims2()?;
        if state_width != self.state_size {
            return Err(Td3Error::ShapeMismatch {
                what: "state",
                expected: self.state_size,
                actual: state_width,
            });
        }
        if action_width != self.action_size {
            return Err(Td3Error::ShapeMismatch {
                what: "action",
                expected: self.action_size,
                actual: action_width,
            });
        }
        if action_rows != rows {
            return Err(Td3Error::ShapeMismatch {
                what: "batch",
                expected: rows,
                actual: action_rows,
            });
        }
        Ok(Tensor::cat(&[states, actions], 1)?)
    }
}

impl Network for Critic {
    /// `(k, S)` states and `(k, A)` actions
    type Input = (Tensor, Tensor);
    /// `(k, 1)` estimates from each head
    type Output = (Tensor, Tensor);

    fn forward(&self, (states, actions): &(Tensor, Tensor)) -> Result<(Tensor, Tensor)> {
        let input = self.concat(states, actions)?;
        Ok((self.q1.output(&input)?, self.q2.output(&input)?))
    }

    fn var_map(&self) -> &VarMap {
        &self.var_map
    }

    fn duplicate(&self) -> Result<Self> {
        let copy = Self::new(
            self.state_size,
            self.action_size,
            self.hidden_size,
            &self.device,
        )?;
        hard_update(&self.var_map, &copy.var_map)?;
        Ok(copy)
    }
}
