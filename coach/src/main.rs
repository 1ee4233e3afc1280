//! Coach - self-play, training and evaluation loop for zeroloop
//!
//! A batch process that:
//! 1. Loads `./data/models/best.json` and the replay history if present
//! 2. Runs self-play, training and evaluation iterations on a worker pool
//! 3. Writes checkpoints, `replay.db` and `coach_stats.json` under the data dir
//!
//! With `--play-human` it instead plays the current best oracle on
//! stdin/stdout.

use std::io;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{error, info};

use coach::{Coach, Config, TabularOracle};

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let config = Config::parse();

    // Register games before validation so env_id can be checked
    games_tictactoe::register_tictactoe();

    config.validate()?;
    init_tracing(&config.log_level)?;
    info!(log_level = %config.log_level, "Tracing initialized");

    let game = engine_core::create_game(&config.env_id)
        .ok_or_else(|| anyhow!("game '{}' is not registered", config.env_id))?;
    let oracle = TabularOracle::new(game.action_count(), config.learning_rate as f32);

    info!(
        env_id = %config.env_id,
        iterations = config.iterations,
        episodes = config.episodes_per_iteration,
        concurrency = config.concurrency,
        "Starting coach"
    );

    let play_human = config.play_human;
    let human_first = config.human_first;
    let mut coach = Coach::new(config, game, oracle)?;

    if play_human {
        let stdin = io::stdin();
        coach.play_human(stdin.lock(), io::stdout(), human_first)?;
        return Ok(());
    }

    match coach.run() {
        Ok(reports) => {
            let accepted = reports.iter().filter(|r| r.accepted).count();
            info!(
                completed = reports.len(),
                accepted,
                buffer = coach.buffer_len(),
                "Coach completed successfully"
            );
            Ok(())
        }
        Err(e) => {
            error!("Coach failed: {:#}", e);
            Err(e)
        }
    }
}
