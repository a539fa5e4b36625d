//! Deep deterministic policy gradient (DDPG) agent.
//!
//! Reference: <https://arxiv.org/abs/1509.02971>
mod base;
mod config;
pub(crate) use base::{act, priorities_from_td_errors, weighted_critic_loss};
pub use base::Ddpg;
pub(crate) use config::validate_common;
pub use config::DdpgConfig;
