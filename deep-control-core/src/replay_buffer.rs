//! Replay buffers for off-policy learning.
//!
//! * [`ReplayBuffer`] - a fixed-capacity ring of transitions sampled uniformly
//! * [`PrioritizedReplayBuffer`] - the same storage sampled proportionally to
//!   `priority^alpha`, returning importance weights with each batch
//!
//! ```rust
//! use deep_control_core::{
//!     replay_buffer::{ReplayBuffer, ReplayBufferConfig, Transition},
//!     ExperienceBufferBase, ReplayBufferBase,
//! };
//!
//! let config = ReplayBufferConfig::default().capacity(100).obs_dim(2).act_dim(1);
//! let mut buffer = ReplayBuffer::build(&config).unwrap();
//! for i in 0..10 {
//!     let s = i as f32;
//!     buffer.push(Transition::new(vec![s, s], vec![0.5], -s, vec![s + 1.0, s], false)).unwrap();
//! }
//! let batch = buffer.batch(4).unwrap();
//! assert_eq!(batch.len(), 4);
//! ```
mod base;
mod batch;
mod config;
mod iw_scheduler;
mod prioritized;
mod sum_tree;
pub use base::ReplayBuffer;
pub use batch::{Transition, TransitionBatch};
pub use config::{PerConfig, PrioritizedReplayBufferConfig, ReplayBufferConfig};
pub use iw_scheduler::IwScheduler;
pub use prioritized::PrioritizedReplayBuffer;
