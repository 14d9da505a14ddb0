//! Twin Delayed Deep Deterministic Policy Gradient agent.
//!
//! The agent owns an online actor and twin critic, their target copies, the
//! Adam state of both online networks and the replay buffer. The driver calls
//! [`Td3Agent::act`] and then [`Td3Agent::train`] once per environment step.
//!
//! Every `update_every` steps (once the buffer holds a batch) `train` runs a
//! burst of `update_every` inner iterations. Each iteration regresses both
//! critics onto
//!
//! ```text
//! y = r + γ · (1 - done) · min(Q1'(s', ã), Q2'(s', ã))
//! ã = clip(π'(s') + clip(ε, -c, c), -bound, bound),  ε ~ N(0, σ)
//! ```
//!
//! and every `policy_delay`th iteration (counting from 0 within the burst)
//! also ascends `Q1(s, π(s))` with the actor and soft-updates all targets.

use std::path::Path;

use candle_core::{Device, Tensor};
use candle_nn::loss;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, info};

use crate::{
    actor::Actor,
    config::Td3Config,
    critic::Critic,
    error::Result,
    experience::Transition,
    network::{Network, Online, Target, Trainable, init_parameters},
    noise::smoothing_noise,
    replay_buffer::{Batch, ReplayBuffer},
};

/// What a single [`Td3Agent::train`] call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    pub critic_updates: usize,
    pub actor_updates: usize,
    /// Inner iterations on which the actor stepped
    pub actor_iterations: Vec<usize>,
    /// Inner iterations on which the targets were soft-updated
    pub target_sync_iterations: Vec<usize>,
    /// Summed twin-critic loss of the last inner iteration
    pub critic_loss: Option<f32>,
    /// Actor loss of the last actor update
    pub actor_loss: Option<f32>,
}

impl TrainReport {
    pub fn updated(&self) -> bool {
        self.critic_updates > 0
    }
}

/// `rewards + gamma * not_dones * min_q`, all `(k, 1)`.
///
/// Terminal rows (`not_done == 0`) reduce to the reward exactly.
pub fn bootstrap_targets(
    rewards: &Tensor,
    not_dones: &Tensor,
    min_q: &Tensor,
    gamma: f32,
) -> Result<Tensor> {
    let discounted = not_dones.mul(min_q)?.affine(f64::from(gamma), 0.0)?;
    Ok(rewards.add(&discounted)?)
}

pub struct Td3Agent<R: Rng = StdRng> {
    config: Td3Config,
    device: Device,

    actor: Online<Actor>,
    critic: Online<Critic>,
    target_actor: Target<Actor>,
    target_critic: Target<Critic>,

    buffer: ReplayBuffer,
    rng: R,

    critic_updates: u64,
    actor_updates: u64,
}

impl Td3Agent<StdRng> {
    pub fn from_seed(config: Td3Config, device: &Device, seed: u64) -> Result<Self> {
        Self::new(config, device, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Td3Agent<R> {
    /// Builds the networks with parameters drawn from `rng`; targets start
    /// as exact copies of the online networks.
    pub fn new(config: Td3Config, device: &Device, mut rng: R) -> Result<Self> {
        config.validate()?;

        let actor = Actor::from_config(&config, device)?;
        init_parameters(actor.var_map(), &mut rng)?;
        let critic = Critic::from_config(&config, device)?;
        init_parameters(critic.var_map(), &mut rng)?;

        let target_actor = Target::from_online(&actor)?;
        let target_critic = Target::from_online(&critic)?;

        info!(
            state_size = config.state_size,
            action_size = config.action_size,
            hidden_size = config.hidden_size,
            batch_size = config.batch_size,
            update_every = config.update_every,
            policy_delay = config.policy_delay,
            "td3 agent initialised"
        );

        Ok(Self {
            actor: Online::new(actor, config.actor_lr)?,
            critic: Online::new(critic, config.critic_lr)?,
            target_actor,
            target_critic,
            buffer: ReplayBuffer::new(config.buffer_capacity),
            device: device.clone(),
            config,
            rng,
            critic_updates: 0,
            actor_updates: 0,
        })
    }

    /// Deterministic action for `state`; exploration noise is the caller's job.
    pub fn act(&self, state: &[f32]) -> Result<Vec<f32>> {
        self.actor.network().act_vec(state)
    }

    /// Stores `transition` and, on the update cadence, runs a burst of
    /// `update_every` critic updates with delayed actor and target updates.
    #[tracing::instrument(level = "trace", skip(self, transition))]
    pub fn train(
        &mut self,
        global_step: u64,
        episode_step: u64,
        transition: Transition,
    ) -> Result<TrainReport> {
        transition.check_dims(self.config.state_size, self.config.action_size)?;
        self.buffer.add(transition);

        let mut report = TrainReport::default();
        if self.buffer.len() < self.config.batch_size {
            return Ok(report);
        }
        if global_step % self.config.update_every as u64 != 0 {
            return Ok(report);
        }

        for it in 0..self.config.update_every {
            let batch = {
                let sample = self.buffer.sample(self.config.batch_size, &mut self.rng)?;
                Batch::from_transitions(&sample, &self.device)?
            };

            let targets = self.critic_targets(&batch)?;
            let critic_loss = self.update_critic(&batch, &targets)?;
            report.critic_updates += 1;
            report.critic_loss = Some(critic_loss);

            let actor_loss = if it % self.config.policy_delay == 0 {
                let actor_loss = self.update_actor(&batch)?;
                report.actor_updates += 1;
                report.actor_iterations.push(it);
                report.actor_loss = Some(actor_loss);

                self.update_targets()?;
                report.target_sync_iterations.push(it);
                Some(actor_loss)
            } else {
                None
            };

            debug!(global_step, it, critic_loss, ?actor_loss, "inner update");
        }

        self.critic_updates += report.critic_updates as u64;
        self.actor_updates += report.actor_updates as u64;
        Ok(report)
    }

    /// Smoothed clipped double-Q regression targets, detached from every graph.
    fn critic_targets(&mut self, batch: &Batch) -> Result<Tensor> {
        let next_actions = self.target_actor.forward(&batch.next_states)?.detach();
        let (rows, width) = next_actions.dims2()?;
        let noise = smoothing_noise(
            &mut self.rng,
            rows * width,
            self.config.target_noise,
            self.config.noise_clip,
        )?;
        let noise = Tensor::from_vec(noise, (rows, width), &self.device)?;

        let bound = self.config.action_bound;
        let smoothed = next_actions.add(&noise)?.clamp(-bound, bound)?;

        let (target_q1, target_q2) = self
            .target_critic
            .forward(&(batch.next_states.clone(), smoothed))?;
        let min_q = target_q1.minimum(&target_q2)?.detach();

        Ok(bootstrap_targets(&batch.rewards, &batch.not_dones, &min_q, self.config.gamma)?.detach())
    }

    fn update_critic(&mut self, batch: &Batch, targets: &Tensor) -> Result<f32> {
        let (q1, q2) = self
            .critic
            .forward(&(batch.states.clone(), batch.actions.clone()))?;
        let loss = loss::mse(&q1, targets)?.add(&loss::mse(&q2, targets)?)?;
        self.critic.update(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn update_actor(&mut self, batch: &Batch) -> Result<f32> {
        let actions = self.actor.forward(&batch.states)?;
        let q = self.critic.network().q1(&batch.states, &actions)?;
        // gradient descent on -Q ascends the critic's estimate
        let loss = q.mean_all()?.neg()?;
        self.actor.update(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn update_targets(&mut self) -> Result<()> {
        let tau = self.config.tau;
        self.target_critic.soft_update(self.critic.network(), tau)?;
        self.target_actor.soft_update(self.actor.network(), tau)
    }

    pub fn save_actor<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.actor.network().save(path)
    }

    pub fn config(&self) -> &Td3Config {
        &self.config
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn actor(&self) -> &Actor {
        self.actor.network()
    }

    pub fn critic(&self) -> &Critic {
        self.critic.network()
    }

    pub fn target_actor(&self) -> &Actor {
        self.target_actor.network()
    }

    pub fn target_critic(&self) -> &Critic {
        self.target_critic.network()
    }

    /// Critic updates over the agent's lifetime.
    pub fn critic_updates(&self) -> u64 {
        self.critic_updates
    }

    /// Actor (and target) updates over the agent's lifetime.
    pub fn actor_updates(&self) -> u64 {
        self.actor_updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Td3Error;

    fn small_config() -> Td3Config {
        Td3Config {
            state_size: 3,
            action_size: 1,
            action_bound: 2.0,
            hidden_size: 16,
            batch_size: 4,
            update_every: 4,
            policy_delay: 2,
            buffer_capacity: 32,
            ..Default::default()
        }
    }

    fn transition(i: usize, done: bool) -> Transition {
        let x = i as f32 * 0.1;
        Transition::new(
            vec![x, -x, 0.5],
            vec![(x - 0.5).clamp(-2.0, 2.0)],
            1.0 - x,
            vec![x + 0.1, -x - 0.1, 0.5],
            done,
        )
    }

    fn col(values: &[f32]) -> Tensor {
        Tensor::from_slice(values, (values.len(), 1), &Device::Cpu).unwrap()
    }

    #[test]
    fn terminal_targets_equal_reward() {
        let rewards = col(&[1.5, -0.25, 3.0]);
        let not_dones = col(&[0.0, 1.0, 0.0]);
        let min_q = col(&[1e6, 2.0, -7.0]);

        let y = bootstrap_targets(&rewards, &not_dones, &min_q, 0.99)
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        assert_eq!(y[0][0], 1.5);
        assert_eq!(y[2][0], 3.0);
        approx::assert_relative_eq!(y[1][0], -0.25 + 0.99 * 2.0, max_relative = 1e-6);
    }

    #[test]
    fn act_is_bounded_and_pure() {
        let agent = Td3Agent::from_seed(small_config(), &Device::Cpu, 0).unwrap();
        let first = agent.act(&[10.0, -10.0, 3.0]).unwrap();
        let second = agent.act(&[10.0, -10.0, 3.0]).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|a| a.abs() <= 2.0));
    }

    #[test]
    fn act_rejects_wrong_dimensionality() {
        let agent = Td3Agent::from_seed(small_config(), &Device::Cpu, 0).unwrap();
        assert!(matches!(
            agent.act(&[0.0; 4]),
            Err(Td3Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn train_rejects_misshapen_transition_without_storing_it() {
        let mut agent = Td3Agent::from_seed(small_config(), &Device::Cpu, 0).unwrap();
        let bad = Transition::new(vec![0.0; 3], vec![0.0; 2], 0.0, vec![0.0; 3], false);
        assert!(agent.train(1, 1, bad).is_err());
        assert_eq!(agent.buffer_len(), 0);
    }

    #[test]
    fn no_updates_before_a_full_batch() {
        let mut agent = Td3Agent::from_seed(small_config(), &Device::Cpu, 0).unwrap();
        for step in 0..3u64 {
            // step 0 sits on the cadence but the buffer is still short
            let report = agent.train(step * 4, step, transition(step as usize, false)).unwrap();
            assert!(!report.updated());
        }
        assert_eq!(agent.critic_updates(), 0);
    }

    #[test]
    fn off_cadence_steps_only_store() {
        let mut agent = Td3Agent::from_seed(small_config(), &Device::Cpu, 0).unwrap();
        for step in 1..=7u64 {
            let report = agent.train(step, step, transition(step as usize, false)).unwrap();
            if step == 4 {
                assert!(report.updated());
            } else {
                assert!(!report.updated(), "step {step} should not update");
            }
        }
        assert_eq!(agent.buffer_len(), 7);
    }

    #[test]
    fn burst_counts_follow_update_every_and_policy_delay() {
        let config = Td3Config {
            update_every: 6,
            policy_delay: 3,
            ..small_config()
        };
        let mut agent = Td3Agent::from_seed(config, &Device::Cpu, 5).unwrap();
        let mut reports = Vec::new();
        for step in 1..=12u64 {
            reports.push(agent.train(step, step, transition(step as usize, step % 5 == 0)).unwrap());
        }

        let bursts: Vec<&TrainReport> = reports.iter().filter(|r| r.updated()).collect();
        assert_eq!(bursts.len(), 2);
        for report in bursts {
            assert_eq!(report.critic_updates, 6);
            assert_eq!(report.actor_updates, 2);
            assert_eq!(report.actor_iterations, vec![0, 3]);
            assert_eq!(report.target_sync_iterations, report.actor_iterations);
            assert!(report.critic_loss.is_some_and(f32::is_finite));
        }
        assert_eq!(agent.critic_updates(), 12);
        assert_eq!(agent.actor_updates(), 4);
    }

    #[test]
    fn uneven_delay_counts_iteration_zero() {
        let config = Td3Config {
            update_every: 5,
            policy_delay: 2,
            ..small_config()
        };
        let mut agent = Td3Agent::from_seed(config, &Device::Cpu, 9).unwrap();
        let mut last = TrainReport::default();
        for step in 1..=5u64 {
            last = agent.train(step, step, transition(step as usize, false)).unwrap();
        }
        assert_eq!(last.critic_updates, 5);
        assert_eq!(last.actor_iterations, vec![0, 2, 4]);
    }

    #[test]
    fn same_seed_same_training() {
        let run = || {
            let mut agent = Td3Agent::from_seed(small_config(), &Device::Cpu, 42).unwrap();
            for step in 1..=8u64 {
                agent.train(step, step, transition(step as usize, step == 6)).unwrap();
            }
            agent.act(&[0.2, -0.1, 0.4]).unwrap()
        };
        assert_eq!(run(), run());
    }
}
