//! Transitions and batches of transitions.

/// A transition `(o_t, a_t, r_t, o_t+1, done_t)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Observation.
    pub obs: Vec<f32>,

    /// Action.
    pub act: Vec<f32>,

    /// Reward.
    pub reward: f32,

    /// Observation after the action.
    pub next_obs: Vec<f32>,

    /// Whether `next_obs` is terminal. It masks the bootstrapped value.
    pub is_done: bool,
}

impl Transition {
    /// Constructs a transition.
    pub fn new(obs: Vec<f32>, act: Vec<f32>, reward: f32, next_obs: Vec<f32>, is_done: bool) -> Self {
        Self {
            obs,
            act,
            reward,
            next_obs,
            is_done,
        }
    }
}

/// A batch of transitions.
///
/// Observations and actions are stored row-major: row `i` of `obs` is
/// `obs[i * obs_dim..(i + 1) * obs_dim]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionBatch {
    /// Observations, `[batch_size, obs_dim]`.
    pub obs: Vec<f32>,

    /// Actions, `[batch_size, act_dim]`.
    pub act: Vec<f32>,

    /// Next observations, `[batch_size, obs_dim]`.
    pub next_obs: Vec<f32>,

    /// Rewards, `[batch_size]`.
    pub reward: Vec<f32>,

    /// Done flags, `[batch_size]`.
    pub is_done: Vec<i8>,

    /// Dimension of observations.
    pub obs_dim: usize,

    /// Dimension of actions.
    pub act_dim: usize,

    /// Indices of the sampled transitions in the buffer.
    pub ix_sample: Option<Vec<usize>>,

    /// Importance weights. `None` for uniform sampling.
    pub weight: Option<Vec<f32>>,
}

impl TransitionBatch {
    /// Returns the number of transitions.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Returns `o_t` of the `i`-th transition.
    pub fn obs_row(&self, i: usize) -> &[f32] {
        &self.obs[i * self.obs_dim..(i + 1) * self.obs_dim]
    }

    /// Returns `a_t` of the `i`-th transition.
    pub fn act_row(&self, i: usize) -> &[f32] {
        &self.act[i * self.act_dim..(i + 1) * self.act_dim]
    }

    /// Returns `o_t+1` of the `i`-th transition.
    pub fn next_obs_row(&self, i: usize) -> &[f32] {
        &self.next_obs[i * self.obs_dim..(i + 1) * self.obs_dim]
    }
}
