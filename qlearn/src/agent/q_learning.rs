use std::{collections::HashSet, mem};

use rand::Rng;

use super::{
    q_table::QTable,
    EpisodeError,
    EpisodeStats,
    HyperparameterError,
    Hyperparameters,
    QAgent,
};
use crate::{env::Environment, util::rand_choice};

/// Tabular Q-learning with epsilon-greedy exploration.
#[derive(Debug)]
pub struct QLearningAgent<E: Environment, R: Rng> {
    env: E,
    q_table: QTable<E::State, E::Action>,
    hyperparameters: Hyperparameters,
    rng: R,
    actions: Vec<E::Action>,
}

/// Why a greedy rollout stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Reached a terminal state.
    Terminal,
    /// Reached a non-terminal state without legal actions.
    NoActions,
    /// Came back to a state it already visited. Greedy play would loop forever.
    Cycle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rollout<S, A> {
    /// Start state followed by the state each action led to.
    pub states: Vec<S>,
    pub actions: Vec<A>,
    pub rewards: Vec<f32>,
    pub outcome: Outcome,
}

impl<S, A> Rollout<S, A> {
    #[allow(clippy::missing_panics_doc)]
    #[must_use]
    pub fn final_state(&self) -> &S {
        self.states.last().expect("rollout should contain the start state")
    }

    #[must_use]
    pub fn total_reward(&self) -> f32 {
        // An empty `sum` of floats is -0.0.
        self.rewards.iter().fold(0.0, |total, reward| total + reward)
    }
}

impl<E: Environment, R: Rng> QLearningAgent<E, R> {
    /// # Errors
    ///
    /// Fails if any hyperparameter is out of range.
    pub fn new(
        env: E,
        hyperparameters: Hyperparameters,
        rng: R,
    ) -> Result<Self, HyperparameterError> {
        hyperparameters.validate()?;
        Ok(Self {
            env,
            q_table: QTable::new(),
            hyperparameters,
            rng,
            actions: Vec::new(),
        })
    }

    #[must_use]
    pub const fn q_table(&self) -> &QTable<E::State, E::Action> {
        &self.q_table
    }

    #[must_use]
    pub const fn environment(&self) -> &E {
        &self.env
    }

    #[must_use]
    pub const fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    fn legal_actions(&self, state: &E::State) -> Vec<E::Action> {
        let mut actions = Vec::new();
        self.env.populate_actions(state, &mut actions);
        actions
    }

    /// Play one episode from a fresh start state, learning after every step.
    ///
    /// # Errors
    ///
    /// Fails if the agent picks no action although the environment
    /// reported legal actions.
    pub fn run_episode(&mut self) -> Result<EpisodeStats, EpisodeError> {
        self.env.reset(&mut self.rng);
        let mut stats = EpisodeStats {
            steps: 0,
            total_reward: 0.0,
        };

        loop {
            let state = self.env.current_state().clone();
            self.actions.clear();
            self.env.populate_actions(&state, &mut self.actions);
            if self.actions.is_empty() {
                return Ok(stats);
            }

            let Some(action) = self.select_action(&state) else {
                return Err(EpisodeError::NoActionSelected {
                    state: format!("{state:?}"),
                });
            };
            let (next_state, reward) = self.env.do_action(&state, action);
            self.update(&state, action, &next_state, reward);

            stats.steps += 1;
            stats.total_reward += reward;
        }
    }

    /// Follow the greedy policy from `start` on a copy of the environment.
    ///
    /// Stops at a terminal state, at a state without actions, or as soon as a
    /// state repeats.
    pub fn rollout(&self, start: &E::State) -> Rollout<E::State, E::Action> {
        let mut env = self.env.clone();
        let mut visited = HashSet::from([start.clone()]);
        let mut rollout = Rollout {
            states: vec![start.clone()],
            actions: Vec::new(),
            rewards: Vec::new(),
            outcome: Outcome::Terminal,
        };

        let mut state = start.clone();
        loop {
            if env.is_terminal_state(&state) {
                rollout.outcome = Outcome::Terminal;
                break;
            }
            let Some(action) = self.best_action(&state) else {
                rollout.outcome = Outcome::NoActions;
                break;
            };
            let (next_state, reward) = env.do_action(&state, action);
            rollout.actions.push(action);
            rollout.rewards.push(reward);
            rollout.states.push(next_state.clone());

            if !visited.insert(next_state.clone()) {
                log::warn!("greedy policy from {start:?} loops at {next_state:?}");
                rollout.outcome = Outcome::Cycle;
                break;
            }
            state = next_state;
        }
        rollout
    }
}

impl<E: Environment, R: Rng> QAgent<E> for QLearningAgent<E, R> {
    fn value(&self, state: &E::State, action: E::Action) -> f32 {
        self.q_table.get(state, action)
    }

    fn max_value(&self, state: &E::State) -> f32 {
        self.q_table.max_value(state, &self.legal_actions(state))
    }

    fn best_action(&self, state: &E::State) -> Option<E::Action> {
        self.q_table.best_action(state, &self.legal_actions(state))
    }

    fn select_action(&mut self, state: &E::State) -> Option<E::Action> {
        let mut actions = mem::take(&mut self.actions);
        actions.clear();
        self.env.populate_actions(state, &mut actions);

        let action = if actions.is_empty() {
            None
        } else if self.rng.gen::<f32>() < self.hyperparameters.epsilon {
            rand_choice(&mut self.rng, &actions).copied()
        } else {
            self.q_table.best_action(state, &actions)
        };

        self.actions = actions;
        action
    }

    fn update(&mut self, state: &E::State, action: E::Action, next_state: &E::State, reward: f32) {
        let Hyperparameters { alpha, gamma, .. } = self.hyperparameters;
        let q = self.value(state, action);

        let mut actions = mem::take(&mut self.actions);
        actions.clear();
        self.env.populate_actions(next_state, &mut actions);
        let next_value = self.q_table.max_value(next_state, &actions);
        self.actions = actions;

        let target = gamma.mul_add(next_value, reward);
        self.q_table
            .set(state.clone(), action, alpha.mul_add(target - q, q));
    }

    fn train(&mut self) -> Result<Vec<EpisodeStats>, EpisodeError> {
        let episodes = self.hyperparameters.episodes;
        let checkpoint = (episodes / 10).max(1);
        let mut history = Vec::with_capacity(episodes);

        for episode in 1..=episodes {
            history.push(self.run_episode()?);
            if episode % checkpoint == 0 {
                log::debug!(
                    "episode {episode: >6} / {episodes}, table size {}",
                    self.q_table.len()
                );
            }
        }

        log::info!(
            "Trained for {episodes} episodes, {} values learned.",
            self.q_table.len()
        );
        Ok(history)
    }

    fn policy(&self, start: &E::State) -> Vec<E::Action> {
        self.rollout(start).actions
    }
}
