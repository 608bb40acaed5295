use std::collections::HashMap;

use clap::Parser;
use qlearn::{
    agent::{
        q_learning::{Outcome, QLearningAgent},
        EpisodeError,
        HyperparameterError,
        Hyperparameters,
        QAgent,
        DISCOUNT_FACTOR,
        EXPLORATION_RATE,
        LEARNING_RATE,
        TRAINING_EPISODES,
    },
    gridworld::{
        greedy_map,
        GridError,
        GridWorld,
        GridWorldEnvironment,
        GridWorldMdp,
        GridWorldState,
        WAREHOUSE,
    },
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use thiserror::Error;

const DEFAULT_STARTS: [GridWorldState; 5] = [
    GridWorldState::new(3, 9),
    GridWorldState::new(5, 0),
    GridWorldState::new(9, 5),
    GridWorldState::new(7, 7),
    GridWorldState::new(6, 9),
];

#[derive(Parser, Debug)]
struct Args {
    /// Number of training episodes
    #[arg(long, default_value_t = TRAINING_EPISODES)]
    episodes: usize,
    /// Learning rate
    #[arg(long, default_value_t = LEARNING_RATE)]
    alpha: f32,
    /// Discount factor
    #[arg(long, default_value_t = DISCOUNT_FACTOR)]
    gamma: f32,
    /// Probability of exploring with a random action
    #[arg(long, default_value_t = EXPLORATION_RATE)]
    epsilon: f32,
    /// Seed for the random number generator.
    /// A random seed is used if none is given.
    #[arg(long)]
    seed: Option<u64>,
    /// Where to extract the policy from, as `ROW,COL`.
    /// Can be repeated. Defaults to a few spots around the warehouse.
    #[arg(long = "start", value_parser = parse_state)]
    starts: Vec<GridWorldState>,
    /// Also print the greedy action of every open cell
    #[arg(long)]
    show_map: bool,
}

#[derive(Error, Debug)]
enum DriverError {
    #[error("{0}")]
    Grid(#[from] GridError),
    #[error("{0}")]
    Hyperparameter(#[from] HyperparameterError),
    #[error("{0}")]
    Episode(#[from] EpisodeError),
    #[error("start {0} is outside the grid")]
    StartOutside(GridWorldState),
}

fn main() {
    env_logger::init();
    log::info!("Begin.");
    if let Err(error) = real_main() {
        log::error!("{error}");
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), DriverError> {
    let args = Args::parse();

    let seed: u64 = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    log::info!("seed: {seed}");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let grid = GridWorld::new(&WAREHOUSE)?;
    let starts = if args.starts.is_empty() {
        DEFAULT_STARTS.to_vec()
    } else {
        args.starts
    };
    if let Some(start) = starts.iter().find(|s| !grid.contains(**s)) {
        return Err(DriverError::StartOutside(*start));
    }

    let mdp = GridWorldMdp::new(grid);
    let env = GridWorldEnvironment::new(mdp, &mut rng);
    let hyperparameters = Hyperparameters {
        alpha: args.alpha,
        gamma: args.gamma,
        epsilon: args.epsilon,
        episodes: args.episodes,
    };
    let mut agent = QLearningAgent::new(env, hyperparameters, rng)?;

    let history = agent.train()?;
    let mean_steps = history.iter().map(|stats| stats.steps).sum::<usize>() as f32
        / history.len().max(1) as f32;
    log::info!("mean episode length: {mean_steps:.2}");

    for start in &starts {
        let rollout = agent.rollout(start);
        let actions = rollout
            .actions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let outcome = match rollout.outcome {
            Outcome::Terminal => "terminal",
            Outcome::NoActions => "stuck",
            Outcome::Cycle => "cycle",
        };
        println!(
            "{start}: [{actions}] -> {} ({outcome}, return {})",
            rollout.final_state(),
            rollout.total_reward()
        );
    }

    if args.show_map {
        let grid = agent.environment().mdp().grid();
        let states: Vec<_> = grid.states().collect();
        let best: HashMap<_, _> = states
            .into_par_iter()
            .map(|state| (state, agent.best_action(&state)))
            .collect();
        print!("{}", greedy_map(grid, |state| best.get(&state).copied().flatten()));
    }

    Ok(())
}

fn parse_state(s: &str) -> Result<GridWorldState, String> {
    let (row, col) = s
        .split_once(',')
        .ok_or_else(|| format!("expected ROW,COL but got {s:?}"))?;
    let parse = |x: &str| {
        x.trim()
            .parse::<usize>()
            .map_err(|error| format!("{x:?} is not a coordinate: {error}"))
    };
    Ok(GridWorldState::new(parse(row)?, parse(col)?))
}
