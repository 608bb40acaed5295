use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use rand::{seq::SliceRandom, Rng};

/// Uniformly sample an integer in `min..=max`.
///
/// # Panics
///
/// Panics if `min > max`.
pub fn rand_num_between(rng: &mut impl Rng, min: usize, max: usize) -> usize {
    rng.gen_range(min..=max)
}

/// Uniformly pick one element, or `None` for an empty slice.
pub fn rand_choice<'a, T>(rng: &mut impl Rng, items: &'a [T]) -> Option<&'a T> {
    items.choose(rng)
}

/// Index of the largest value. Ties go to the first one.
#[must_use]
pub fn arg_max(values: impl IntoIterator<Item = f32>) -> Option<usize> {
    values
        .into_iter()
        .enumerate()
        // `min_by_key` keeps the first of equal keys, `max_by_key` the last.
        .min_by_key(|(_, value)| Reverse(OrderedFloat(*value)))
        .map(|(i, _)| i)
}
