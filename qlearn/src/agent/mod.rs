use thiserror::Error;

use crate::env::Environment;

pub mod q_learning;
pub mod q_table;

// Step size, also known as alpha.
pub const LEARNING_RATE: f32 = 0.9;
// Discount, also known as gamma.
pub const DISCOUNT_FACTOR: f32 = 0.9;
// Chance of a random action, also known as epsilon.
pub const EXPLORATION_RATE: f32 = 0.9;
pub const TRAINING_EPISODES: usize = 5_000;

/// A value-based agent that learns action values by acting in `E`.
pub trait QAgent<E: Environment> {
    /// Estimated value of taking `action` in `state`. Unseen pairs are worth zero.
    fn value(&self, state: &E::State, action: E::Action) -> f32;
    /// Best estimate over the legal actions, or zero if there are none.
    fn max_value(&self, state: &E::State) -> f32;
    /// Legal action with the highest estimate. Ties go to the earliest action.
    fn best_action(&self, state: &E::State) -> Option<E::Action>;
    /// Action to take while learning. `None` means the episode is over.
    fn select_action(&mut self, state: &E::State) -> Option<E::Action>;
    fn update(&mut self, state: &E::State, action: E::Action, next_state: &E::State, reward: f32);

    /// Run the configured number of episodes.
    ///
    /// # Errors
    ///
    /// Stops at the first episode that breaks the action contract.
    fn train(&mut self) -> Result<Vec<EpisodeStats>, EpisodeError>;

    /// Actions a purely greedy agent takes from `start`.
    fn policy(&self, start: &E::State) -> Vec<E::Action>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeStats {
    pub steps: usize,
    pub total_reward: f32,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EpisodeError {
    #[error("agent selected no action in {state} even though actions were available")]
    NoActionSelected { state: String },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hyperparameters {
    pub alpha: f32,
    pub gamma: f32,
    pub epsilon: f32,
    pub episodes: usize,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            alpha: LEARNING_RATE,
            gamma: DISCOUNT_FACTOR,
            epsilon: EXPLORATION_RATE,
            episodes: TRAINING_EPISODES,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum HyperparameterError {
    #[error("learning rate must be in (0, 1], got {0}")]
    LearningRate(f32),
    #[error("discount factor must be in [0, 1], got {0}")]
    DiscountFactor(f32),
    #[error("exploration rate must be in [0, 1], got {0}")]
    ExplorationRate(f32),
}

impl Hyperparameters {
    /// Check that every rate is in range. NaN is never in range.
    ///
    /// # Errors
    ///
    /// Returns the first out of range value.
    pub fn validate(&self) -> Result<(), HyperparameterError> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(HyperparameterError::LearningRate(self.alpha));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(HyperparameterError::DiscountFactor(self.gamma));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(HyperparameterError::ExplorationRate(self.epsilon));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{HyperparameterError, Hyperparameters};

    #[test]
    fn default_hyperparameters_are_valid() {
        let hp = Hyperparameters::default();
        assert_eq!(hp.episodes, 5_000);
        assert!(hp.validate().is_ok());
    }

    #[test]
    fn out_of_range_hyperparameters() {
        let hp = Hyperparameters {
            alpha: 0.0,
            ..Default::default()
        };
        assert_eq!(hp.validate(), Err(HyperparameterError::LearningRate(0.0)));

        let hp = Hyperparameters {
            gamma: 1.5,
            ..Default::default()
        };
        assert_eq!(hp.validate(), Err(HyperparameterError::DiscountFactor(1.5)));

        let hp = Hyperparameters {
            epsilon: -0.1,
            ..Default::default()
        };
        assert_eq!(hp.validate(), Err(HyperparameterError::ExplorationRate(-0.1)));

        let hp = Hyperparameters {
            alpha: f32::NAN,
            ..Default::default()
        };
        assert!(hp.validate().is_err());
    }
}
