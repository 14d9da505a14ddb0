use std::collections::VecDeque;

use candle_core::{Device, Tensor};
use rand::{Rng, seq::index};

use crate::{
    error::{Result, Td3Error},
    experience::Transition,
};

/// Fixed-capacity FIFO store of transitions.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            // capped so a huge capacity does not allocate up front
            buffer: VecDeque::with_capacity(capacity.min(1 << 16)),
            capacity,
        }
    }

    /// Appends a transition, evicting the oldest one when full.
    pub fn add(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draws `batch_size` distinct transitions uniformly without replacement.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Vec<&Transition>> {
        let len = self.buffer.len();
        if len < batch_size {
            return Err(Td3Error::InsufficientData {
                requested: batch_size,
                available: len,
            });
        }
        Ok(index::sample(rng, len, batch_size)
            .into_iter()
            .map(|i| &self.buffer[i])
            .collect())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}

/// A sampled mini-batch stacked into tensors.
pub struct Batch {
    /// `(k, S)`
    pub states: Tensor,
    /// `(k, A)`
    pub actions: Tensor,
    /// `(k, 1)`
    pub rewards: Tensor,
    /// `(k, S)`
    pub next_states: Tensor,
    /// `(k, 1)`, `0.0` where the transition ended the episode
    pub not_dones: Tensor,
}

impl Batch {
    pub fn from_transitions(transitions: &[&Transition], device: &Device) -> Result<Self> {
        let Some(first) = transitions.first() else {
            return Err(Td3Error::InsufficientData {
                requested: 1,
                available: 0,
            });
        };
        let k = transitions.len();
        let state_size = first.state.len();
        let action_size = first.action.len();

        let mut states = Vec::with_capacity(k * state_size);
        let mut actions = Vec::with_capacity(k * action_size);
        let mut rewards = Vec::with_capacity(k);
        let mut next_states = Vec::with_capacity(k * state_size);
        let mut not_dones = Vec::with_capacity(k);
        for t in transitions {
            t.check_dims(state_size, action_size)?;
            states.extend_from_slice(&t.state);
            actions.extend_from_slice(&t.action);
            rewards.push(t.reward);
            next_states.extend_from_slice(&t.next_state);
            not_dones.push(if t.done { 0.0f32 } else { 1.0f32 });
        }

        Ok(Self {
            states: Tensor::from_vec(states, (k, state_size), device)?,
            actions: Tensor::from_vec(actions, (k, action_size), device)?,
            rewards: Tensor::from_vec(rewards, (k, 1), device)?,
            next_states: Tensor::from_vec(next_states, (k, state_size), device)?,
            not_dones: Tensor::from_vec(not_dones, (k, 1), device)?,
        })
    }
}
