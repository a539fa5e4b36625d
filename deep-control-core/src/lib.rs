#![warn(missing_docs)]
//! Core components of continuous-control reinforcement learning.
//!
//! This crate holds everything that does not depend on a tensor backend:
//!
//! * interfaces of environments, policies, agents and replay buffers,
//! * uniform and prioritized replay buffers,
//! * Ornstein-Uhlenbeck exploration noise,
//! * the [`Sampler`], which collects transitions from the training environment,
//! * the [`Trainer`], which runs warmup, optimization, evaluation and saving,
//! * records and recorders of training metrics.
//!
//! Learners, like DDPG and TD3, implement [`Agent`] in a backend crate.
pub mod error;
pub mod noise;
pub mod record;
pub mod replay_buffer;
pub mod toy_env;

mod base;
pub use base::{
    Agent, BoxSpace, Configurable, Env, ExperienceBufferBase, Info, Policy, ReplayBufferBase,
    Step,
};

mod evaluator;
pub use evaluator::{DefaultEvaluator, Evaluator};

mod trainer;
pub use trainer::{LearningCurve, Sampler, Trainer, TrainerConfig};
