use std::{collections::HashMap, hash::Hash};

use ordered_float::OrderedFloat;

use crate::util::arg_max;

/// Action value estimates, one row of actions per state.
///
/// Pairs that were never written are worth zero. Entries are only ever
/// inserted or overwritten.
#[derive(Clone, Debug)]
pub struct QTable<S, A> {
    rows: HashMap<S, HashMap<A, f32>>,
}

impl<S, A> Default for QTable<S, A> {
    fn default() -> Self {
        Self {
            rows: HashMap::default(),
        }
    }
}

impl<S: Eq + Hash, A: Copy + Eq + Hash> QTable<S, A> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, state: &S, action: A) -> f32 {
        self.rows
            .get(state)
            .and_then(|row| row.get(&action))
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&mut self, state: S, action: A, value: f32) {
        self.rows.entry(state).or_default().insert(action, value);
    }

    /// Highest value among `actions`, zero if there are none.
    #[must_use]
    pub fn max_value(&self, state: &S, actions: &[A]) -> f32 {
        actions
            .iter()
            .map(|a| OrderedFloat(self.get(state, *a)))
            .max()
            .map_or(0.0, |OrderedFloat(v)| v)
    }

    /// First of `actions` with the highest value.
    #[must_use]
    pub fn best_action(&self, state: &S, actions: &[A]) -> Option<A> {
        arg_max(actions.iter().map(|a| self.get(state, *a))).map(|i| actions[i])
    }

    /// Number of (state, action) pairs with a stored value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.values().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, A, f32)> {
        self.rows
            .iter()
            .flat_map(|(s, row)| row.iter().map(move |(a, v)| (s, *a, *v)))
    }
}
