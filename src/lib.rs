//! Twin Delayed Deep Deterministic Policy Gradient (TD3) on candle.
//!
//! Reference: "Addressing Function Approximation Error in Actor-Critic
//! Methods" (Fujimoto et al., 2018).

pub mod actor;
pub mod agent;
pub mod config;
pub mod critic;
pub mod device;
pub mod environment;
pub mod error;
pub mod experience;
pub mod mlp;
pub mod network;
pub mod noise;
pub mod replay_buffer;
pub mod soft_update;

pub use agent::{Td3Agent, TrainReport};
pub use config::Td3Config;
pub use error::{Result, Td3Error};
pub use experience::Transition;
