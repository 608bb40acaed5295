use std::{fmt, hash::Hash};

use rand::Rng;

/// Something an agent can act in.
///
/// The environment holds the current state of an episode. A clone must be
/// independent so rollouts can step it freely.
pub trait Environment: Clone {
    type State: Clone + Eq + Hash + fmt::Debug;
    type Action: Copy + Eq + Hash + fmt::Debug;

    fn current_state(&self) -> &Self::State;
    fn is_terminal_state(&self, state: &Self::State) -> bool;
    fn populate_actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>);

    /// Perform `action` from `state` and move the current state to where it
    /// leads. Returns the next state and the reward for entering it.
    fn do_action(&mut self, state: &Self::State, action: Self::Action) -> (Self::State, f32);

    /// Start over from a freshly sampled start state.
    fn reset(&mut self, rng: &mut impl Rng);
}
