//! Environment step.
use super::Env;

/// Additional information returned with a [`Step`].
pub trait Info {}

impl Info for () {}

/// The outcome `(a_t, o_t+1, r_t)` of an environment step.
pub struct Step<E: Env> {
    /// Action.
    pub act: Vec<f32>,

    /// Observation after the step.
    pub obs: Vec<f32>,

    /// Reward.
    pub reward: f32,

    /// The task reached a terminal state.
    pub is_terminated: bool,

    /// The environment cut the episode short, e.g. by its own time limit.
    pub is_truncated: bool,

    /// Information defined by user.
    pub info: E::Info,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(
        obs: Vec<f32>,
        act: Vec<f32>,
        reward: f32,
        is_terminated: bool,
        is_truncated: bool,
        info: E::Info,
    ) -> Self {
        Step {
            act,
            obs,
            reward,
            is_terminated,
            is_truncated,
            info,
        }
    }

    #[inline]
    /// Terminated or truncated.
    pub fn is_done(&self) -> bool {
        self.is_terminated || self.is_truncated
    }
}
