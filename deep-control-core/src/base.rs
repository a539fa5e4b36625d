//! Core functionalities.
mod agent;
mod env;
mod policy;
mod replay_buffer;
mod space;
mod step;
pub use agent::Agent;
pub use env::Env;
pub use policy::{Configurable, Policy};
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
pub use space::BoxSpace;
pub use step::{Info, Step};
