//! Environment.
use super::{BoxSpace, Info, Step};
use crate::record::Record;
use anyhow::Result;

/// Represents an environment with continuous observations and actions.
///
/// Calling [`Env::step`] after an episode has ended without an intervening
/// reset is undefined; callers reset first.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Information in the [`Step`] object.
    type Info: Info;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Dimension of the observation vector.
    fn obs_dim(&self) -> usize;

    /// The space valid actions live in.
    fn action_space(&self) -> &BoxSpace;

    /// Performes an environment step.
    fn step(&mut self, a: &[f32]) -> Result<(Step<Self>, Record)>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Resets the environment with a given index.
    ///
    /// The index is used in an arbitrary way, for example as a random seed.
    /// [`DefaultEvaluator`](crate::DefaultEvaluator) calls this method with
    /// the episode number.
    fn reset_with_index(&mut self, ix: usize) -> Result<Vec<f32>>;
}
