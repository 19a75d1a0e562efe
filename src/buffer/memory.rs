//! Transition storage for the policy and auxiliary phases
//!
//! Both buffers are append-only between clears. Insertion order is the
//! temporal order of one environment (or the concatenation of several
//! environments flushed one after another), and minibatches are taken
//! from it unchanged.

use std::ops::Range;

/// One recorded environment transition `(s_t, a_t, r_t, done_t, s_{t+1})`
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State the action was taken in
    pub state: Vec<f32>,

    /// Action taken (a discrete index is stored as a one-element vector)
    pub action: Vec<f32>,

    /// Reward received
    pub reward: f32,

    /// Whether the episode ended on this step
    pub done: bool,

    /// State observed after the step (the reset observation when `done`)
    pub next_state: Vec<f32>,
}

/// Transitions waiting for the policy phase
///
/// Stored column-wise; every push and every clear touches all five columns,
/// so they always have the same length.
#[derive(Debug, Clone, Default)]
pub struct PolicyMemory {
    states: Vec<Vec<f32>>,
    actions: Vec<Vec<f32>>,
    rewards: Vec<f32>,
    dones: Vec<bool>,
    next_states: Vec<Vec<f32>>,
}

/// Borrowed, order-preserving view over a contiguous range of a
/// [`PolicyMemory`]
#[derive(Debug, Clone, Copy)]
pub struct PolicyBatch<'a> {
    /// States `[len][obs_dim]`
    pub states: &'a [Vec<f32>],

    /// Actions `[len][action_width]`
    pub actions: &'a [Vec<f32>],

    /// Rewards `[len]`
    pub rewards: &'a [f32],

    /// Episode-end flags `[len]`
    pub dones: &'a [bool],

    /// Next states `[len][obs_dim]`
    pub next_states: &'a [Vec<f32>],
}

impl PolicyBatch<'_> {
    /// Number of transitions in the view
    pub fn len(&self) -> usize {
        self.dones.len()
    }

    /// Whether the view holds no transitions
    pub fn is_empty(&self) -> bool {
        self.dones.is_empty()
    }
}

impl PolicyMemory {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored transitions
    pub fn len(&self) -> usize {
        self.dones.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.dones.is_empty()
    }

    /// Append one transition
    pub fn save_eps(&mut self, transition: Transition) {
        let Transition { state, action, reward, done, next_state } = transition;
        self.states.push(state);
        self.actions.push(action);
        self.rewards.push(reward);
        self.dones.push(done);
        self.next_states.push(next_state);
    }

    /// Move every transition of `other` to the end of this buffer
    ///
    /// `other` is left empty. Its internal order is preserved.
    pub fn save_all(&mut self, other: &mut PolicyMemory) {
        self.states.append(&mut other.states);
        self.actions.append(&mut other.actions);
        self.rewards.append(&mut other.rewards);
        self.dones.append(&mut other.dones);
        self.next_states.append(&mut other.next_states);
    }

    /// View over the whole buffer
    pub fn get_all(&self) -> PolicyBatch<'_> {
        self.batch(0..self.len())
    }

    /// View over `range`
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds.
    pub fn batch(&self, range: Range<usize>) -> PolicyBatch<'_> {
        PolicyBatch {
            states: &self.states[range.clone()],
            actions: &self.actions[range.clone()],
            rewards: &self.rewards[range.clone()],
            dones: &self.dones[range.clone()],
            next_states: &self.next_states[range],
        }
    }

    /// Stored states in insertion order
    pub fn states(&self) -> &[Vec<f32>] {
        &self.states
    }

    /// Clone out the transition at `index`
    pub fn get(&self, index: usize) -> Option<Transition> {
        (index < self.len()).then(|| Transition {
            state: self.states[index].clone(),
            action: self.actions[index].clone(),
            reward: self.rewards[index],
            done: self.dones[index],
            next_state: self.next_states[index].clone(),
        })
    }

    /// Drop every stored transition
    pub fn clear(&mut self) {
        self.states.clear();
        self.actions.clear();
        self.rewards.clear();
        self.dones.clear();
        self.next_states.clear();
    }
}

/// States kept for the auxiliary (distillation) phase
#[derive(Debug, Clone, Default)]
pub struct AuxMemory {
    states: Vec<Vec<f32>>,
}

impl AuxMemory {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored states
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Append a sequence of states
    pub fn save_all(&mut self, states: &[Vec<f32>]) {
        self.states.extend_from_slice(states);
    }

    /// All stored states in insertion order
    pub fn get_all(&self) -> &[Vec<f32>] {
        &self.states
    }

    /// States in `range`
    pub fn batch(&self, range: Range<usize>) -> &[Vec<f32>] {
        &self.states[range]
    }

    /// Drop every stored state
    pub fn clear(&mut self) {
        self.states.clear();
    }
}
