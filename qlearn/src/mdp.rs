use std::{fmt, hash::Hash};

use rand::Rng;

/// A Markov decision process: which states exist, where episodes start,
/// which actions are legal, and what entering a state is worth.
pub trait Mdp {
    type State: Clone + Eq + Hash + fmt::Debug;
    type Action: Copy + Eq + Hash + fmt::Debug;

    /// Sample a non-terminal state to start an episode from.
    fn start_state(&self, rng: &mut impl Rng) -> Self::State;
    fn is_terminal_state(&self, state: &Self::State) -> bool;
    /// Push every action legal in `state`. Terminal states push nothing.
    fn populate_actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>);
    fn reward(&self, state: &Self::State) -> f32;

    /// Every state of the process. Only meant for inspection.
    fn states(&self) -> impl Iterator<Item = Self::State> + '_;
}
