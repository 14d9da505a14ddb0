use crate::error::{Result, Td3Error};

/// One recorded interaction with the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Vec<f32>,
    pub action: Vec<f32>,
    pub reward: f32,
    pub next_state: Vec<f32>,
    pub done: bool,
}

impl Transition {
    pub fn new(
        state: Vec<f32>,
        action: Vec<f32>,
        reward: f32,
        next_state: Vec<f32>,
        done: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }

    pub fn check_dims(&self, state_size: usize, action_size: usize) -> Result<()> {
        check_len("state", &self.state, state_size)?;
        check_len("action", &self.action, action_size)?;
        check_len("next_state", &self.next_state, state_size)
    }
}

pub(crate) fn check_len(what: &'static str, values: &[f32], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(Td3Error::ShapeMismatch {
            what,
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}
