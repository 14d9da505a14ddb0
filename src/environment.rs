use std::f32::consts::PI;

use rand::Rng;

/// Outcome of applying one action.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub next_state: Vec<f32>,
    pub reward: f32,
    pub done: bool,
}

/// Continuous-control task with a fixed state/action dimensionality and a
/// symmetric action bound.
pub trait Environment {
    fn state_size(&self) -> usize;
    fn action_size(&self) -> usize;
    fn action_bound(&self) -> f32;

    fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<f32>;
    fn step(&mut self, action: &[f32]) -> Step;
}

const MAX_SPEED: f32 = 8.0;
const MAX_TORQUE: f32 = 2.0;
const DT: f32 = 0.05;
const G: f32 = 10.0;
const M: f32 = 1.0;
const L: f32 = 1.0;

/// Classic inverted pendulum swing-up.
///
/// State is `[cos θ, sin θ, θ̇]` with θ = 0 upright; the single action is a
/// torque in `[-2, 2]`. Reward is `-(θ² + 0.1·θ̇² + 0.001·u²)`. The task never
/// terminates on its own, episodes are cut by the driver's step limit.
#[derive(Debug, Clone, Default)]
pub struct Pendulum {
    theta: f32,
    theta_dot: f32,
}

impl Pendulum {
    pub fn new() -> Self {
        Self::default()
    }

    fn observation(&self) -> Vec<f32> {
        vec![self.theta.cos(), self.theta.sin(), self.theta_dot]
    }

    fn angle_normalize(x: f32) -> f32 {
        (x + PI).rem_euclid(2.0 * PI) - PI
    }
}

impl Environment for Pendulum {
    fn state_size(&self) -> usize {
        3
    }

    fn action_size(&self) -> usize {
        1
    }

    fn action_bound(&self) -> f32 {
        MAX_TORQUE
    }

    fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<f32> {
        self.theta = rng.random_range(-PI..PI);
        self.theta_dot = rng.random_range(-1.0..1.0);
        self.observation()
    }

    fn step(&mut self, action: &[f32]) -> Step {
        let torque = action.first().copied().unwrap_or(0.0).clamp(-MAX_TORQUE, MAX_TORQUE);
        let theta = Self::angle_normalize(self.theta);
        let reward = -(theta.powi(2) + 0.1 * self.theta_dot.powi(2) + 0.001 * torque.powi(2));

        // θ̈ = 3g/(2l)·sin θ + 3/(ml²)·u
        let theta_acc = (3.0 * G / (2.0 * L)) * self.theta.sin() + (3.0 / (M * L * L)) * torque;
        self.theta_dot = (self.theta_dot + theta_acc * DT).clamp(-MAX_SPEED, MAX_SPEED);
        self.theta = Self::angle_normalize(self.theta + self.theta_dot * DT);

        Step {
            next_state: self.observation(),
            reward,
            done: false,
        }
    }
}
