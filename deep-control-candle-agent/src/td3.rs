//! Twin delayed DDPG (TD3) agent.
//!
//! TD3 adds three changes to DDPG: a pair of critics whose minimum forms the
//! bootstrap target, clipped Gaussian noise on the target action, and actor
//! updates delayed to every `policy_delay` critic updates.
//!
//! Reference: <https://arxiv.org/abs/1802.09477>
mod base;
mod config;
pub use base::Td3;
pub use config::Td3Config;
