//! Soft actor-critic (SAC) agent.
//!
//! The policy is a Gaussian squashed by `tanh`. Two critics and their
//! targets give the clipped double-Q target, and the entropy coefficient is
//! either fixed or tuned towards a target entropy.
//!
//! Reference: <https://arxiv.org/abs/1812.05905>
mod actor;
mod base;
mod config;
mod ent_coef;
pub use actor::GaussianActor;
pub use base::Sac;
pub use config::SacConfig;
pub use ent_coef::{EntCoef, EntCoefMode};
