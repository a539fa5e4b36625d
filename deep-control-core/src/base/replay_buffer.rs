//! Replay buffer interfaces.
//!
//! The plain and the prioritized replay buffers are two implementations of
//! the same pair of traits; which one is used is decided by type when the
//! trainer is built.
use anyhow::Result;

/// Interface for buffers that store experiences from environments.
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes a new experience into the buffer.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the current number of experiences in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer holds no experience.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for replay buffers that generate batches for training.
pub trait ReplayBufferBase {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Builds a new replay buffer from the given configuration.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Samples a batch of `size` transitions.
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;

    /// Updates the priorities of the transitions at `ixs`.
    ///
    /// Learners call this after every pass that used a batch of this buffer.
    /// Buffers without priorities ignore the call.
    fn update_priority(&mut self, ixs: &Option<Vec<usize>>, priorities: &Option<Vec<f32>>)
        -> Result<()>;
}
