use candle_core::Tensor;
use candle_nn::{Linear, Module, VarBuilder, linear};

use crate::error::Result;

/// Feed-forward stack with ReLU between layers and a linear output.
#[derive(Debug, Clone)]
pub struct MultiLayerPerceptron {
    layers: Vec<Linear>,
    topology: Vec<usize>,
}

impl MultiLayerPerceptron {
    /// Layer `i` registers its parameters as `{prefix}.{i}.weight` and
    /// `{prefix}.{i}.bias` in the builder's store.
    pub fn new(topology: &[usize], vb: VarBuilder) -> Result<Self> {
        let mut layers: Vec<Linear> = Vec::with_capacity(topology.len().saturating_sub(1));
        for i in 0..topology.len().saturating_sub(1) {
            layers.push(linear(topology[i], topology[i + 1], vb.pp(i))?);
        }
        Ok(Self {
            layers,
            topology: topology.to_vec(),
        })
    }

    pub fn topology(&self) -> &[usize] {
        &self.topology
    }

    pub fn output(&self, inputs: &Tensor) -> Result<Tensor> {
        let mut x = inputs.clone();
        for layer in self.layers.iter().take(self.layers.len().saturating_sub(1)) {
            x = layer.forward(&x)?.relu()?;
        }
        if let Some(last_layer) = self.layers.last() {
            x = last_layer.forward(&x)?;
        }
        Ok(x)
    }
}
