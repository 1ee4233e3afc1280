//! Configuration for the coach binary
//!
//! Defaults come from the central config.toml (with ZEROLOOP_* environment
//! overrides applied by `engine_config`). CLI arguments take highest
//! priority.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use engine_config::{load_config, CentralConfig};
use mcts::MctsConfig;
use once_cell::sync::Lazy;
use tracing::level_filters::LevelFilter;

use crate::episode::EpisodeSettings;
use crate::evaluation::{EvalSettings, SeatPolicy};

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

fn default_env_id() -> String {
    CENTRAL_CONFIG.common.env_id.clone()
}

fn default_data_dir() -> String {
    CENTRAL_CONFIG.common.data_dir.clone()
}

fn default_log_level() -> String {
    CENTRAL_CONFIG.common.log_level.clone()
}

fn default_num_simulations() -> u32 {
    CENTRAL_CONFIG.mcts.num_simulations
}

fn default_c_puct() -> f64 {
    CENTRAL_CONFIG.mcts.c_puct
}

fn default_dirichlet_alpha() -> f64 {
    CENTRAL_CONFIG.mcts.dirichlet_alpha
}

fn default_dirichlet_weight() -> f64 {
    CENTRAL_CONFIG.mcts.dirichlet_weight
}

fn default_temperature() -> f64 {
    CENTRAL_CONFIG.mcts.temperature
}

fn default_late_temperature() -> f64 {
    CENTRAL_CONFIG.mcts.late_temperature
}

fn default_temp_threshold() -> u32 {
    CENTRAL_CONFIG.mcts.temp_threshold
}

fn default_iterations() -> u32 {
    CENTRAL_CONFIG.training.iterations
}

fn default_episodes() -> u32 {
    CENTRAL_CONFIG.training.episodes_per_iteration
}

fn default_max_examples() -> usize {
    CENTRAL_CONFIG.training.max_training_examples
}

fn default_max_moves() -> u32 {
    CENTRAL_CONFIG.training.max_moves
}

fn default_learning_rate() -> f64 {
    CENTRAL_CONFIG.training.learning_rate
}

fn default_eval_rounds() -> u32 {
    CENTRAL_CONFIG.evaluation.rounds
}

fn default_seat_policy() -> String {
    CENTRAL_CONFIG.evaluation.seat_policy.clone()
}

fn default_eval_simulations() -> u32 {
    CENTRAL_CONFIG.evaluation.num_simulations
}

fn default_concurrency() -> usize {
    CENTRAL_CONFIG.workers.concurrency
}

#[derive(Parser, Debug, Clone)]
#[command(name = "coach")]
#[command(about = "zeroloop coach - self-play, training and evaluation loop")]
#[command(
    long_about = "Coach that alternates self-play, training and head-to-head evaluation,
keeping a new oracle only when it beats its pre-training snapshot.

Configuration is loaded from config.toml with environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Config {
    /// Environment ID to run (e.g., tictactoe)
    #[arg(long, default_value_t = default_env_id())]
    pub env_id: String,

    /// Data directory for checkpoints, replay database and stats
    #[arg(long, default_value_t = default_data_dir())]
    pub data_dir: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,

    /// MCTS simulations per self-play move
    #[arg(long, default_value_t = default_num_simulations())]
    pub num_simulations: u32,

    /// Exploration constant
    #[arg(long, default_value_t = default_c_puct())]
    pub c_puct: f64,

    /// Dirichlet noise shape at the self-play root
    #[arg(long, default_value_t = default_dirichlet_alpha())]
    pub dirichlet_alpha: f64,

    /// Fraction of the root prior replaced by noise
    #[arg(long, default_value_t = default_dirichlet_weight())]
    pub dirichlet_weight: f64,

    /// Self-play temperature before the threshold
    #[arg(long, default_value_t = default_temperature())]
    pub temperature: f64,

    /// Self-play temperature from the threshold onwards
    #[arg(long, default_value_t = default_late_temperature())]
    pub late_temperature: f64,

    /// Move number after which the late temperature applies (0 to disable)
    #[arg(long, default_value_t = default_temp_threshold())]
    pub temp_threshold: u32,

    /// Self-play / train / evaluate cycles to run
    #[arg(long, default_value_t = default_iterations())]
    pub iterations: u32,

    /// Self-play episodes per iteration
    #[arg(long, default_value_t = default_episodes())]
    pub episodes_per_iteration: u32,

    /// Training buffer cap; oldest samples are dropped first
    #[arg(long, default_value_t = default_max_examples())]
    pub max_training_examples: usize,

    /// Per-game move cap, reached games are draws
    #[arg(long, default_value_t = default_max_moves())]
    pub max_moves: u32,

    /// Blend factor for the tabular oracle
    #[arg(long, default_value_t = default_learning_rate())]
    pub learning_rate: f64,

    /// Evaluation rounds per iteration
    #[arg(long, default_value_t = default_eval_rounds())]
    pub eval_rounds: u32,

    /// Who moves first in evaluation (new_first, new_second, alternate)
    #[arg(long, default_value_t = default_seat_policy())]
    pub seat_policy: String,

    /// MCTS simulations per evaluation move
    #[arg(long, default_value_t = default_eval_simulations())]
    pub eval_num_simulations: u32,

    /// Worker threads for self-play and evaluation
    #[arg(long, default_value_t = default_concurrency())]
    pub concurrency: usize,

    /// Master seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Play the current best oracle on stdin/stdout instead of training
    #[arg(long)]
    pub play_human: bool,

    /// Take the first move when playing against the oracle
    #[arg(long)]
    pub human_first: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.env_id.is_empty() {
            return Err(anyhow!("env_id cannot be empty"));
        }

        if !engine_core::is_registered(&self.env_id) {
            return Err(anyhow!(
                "unknown env_id '{}', registered games: {:?}",
                self.env_id,
                engine_core::list_registered_games()
            ));
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        if self.num_simulations == 0 || self.eval_num_simulations == 0 {
            return Err(anyhow!("simulation counts must be greater than 0"));
        }

        if !(self.c_puct > 0.0) {
            return Err(anyhow!("c_puct must be greater than 0"));
        }

        if !(self.dirichlet_alpha > 0.0) {
            return Err(anyhow!("dirichlet_alpha must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.dirichlet_weight) {
            return Err(anyhow!("dirichlet_weight must be between 0 and 1"));
        }

        if !(self.temperature >= 0.0 && self.late_temperature >= 0.0) {
            return Err(anyhow!("temperatures cannot be negative"));
        }

        if !(0.0..=1.0).contains(&self.learning_rate) {
            return Err(anyhow!("learning_rate must be between 0 and 1"));
        }

        if self.max_training_examples == 0 {
            return Err(anyhow!("max_training_examples must be at least 1"));
        }

        if self.max_moves == 0 {
            return Err(anyhow!("max_moves must be at least 1"));
        }

        if self.eval_rounds == 0 {
            return Err(anyhow!("eval_rounds must be at least 1"));
        }

        if self.concurrency == 0 {
            return Err(anyhow!("concurrency must be at least 1"));
        }

        self.seat_policy()?;
        Ok(())
    }

    pub fn seat_policy(&self) -> Result<SeatPolicy> {
        self.seat_policy.parse()
    }

    /// Master seed from the CLI, falling back to `workers.seed`.
    pub fn master_seed(&self) -> Option<u64> {
        self.seed.or(CENTRAL_CONFIG.workers.seed)
    }

    pub fn episode_settings(&self) -> EpisodeSettings {
        EpisodeSettings {
            mcts: MctsConfig::for_training()
                .with_simulations(self.num_simulations)
                .with_c_puct(self.c_puct as f32)
                .with_noise(self.dirichlet_alpha as f32, self.dirichlet_weight as f32),
            temperature: self.temperature as f32,
            late_temperature: self.late_temperature as f32,
            temp_threshold: self.temp_threshold,
            max_moves: self.max_moves,
        }
    }

    pub fn eval_settings(&self) -> Result<EvalSettings> {
        Ok(EvalSettings {
            rounds: self.eval_rounds,
            seat_policy: self.seat_policy()?,
            mcts: MctsConfig::for_evaluation()
                .with_simulations(self.eval_num_simulations)
                .with_c_puct(self.c_puct as f32),
            max_moves: self.max_moves,
        })
    }

    pub fn models_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("models")
    }

    pub fn replay_db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("replay.db")
    }
}

/// Small, fast configuration rooted at `data_dir`.
#[cfg(test)]
pub(crate) fn test_config(data_dir: &std::path::Path) -> Config {
    Config {
        env_id: "tictactoe".into(),
        data_dir: data_dir.to_string_lossy().into_owned(),
        log_level: "info".into(),
        num_simulations: 10,
        c_puct: 1.0,
        dirichlet_alpha: 0.3,
        dirichlet_weight: 0.25,
        temperature: 1.0,
        late_temperature: 0.1,
        temp_threshold: 4,
        iterations: 1,
        episodes_per_iteration: 4,
        max_training_examples: 1000,
        max_moves: 50,
        learning_rate: 0.5,
        eval_rounds: 4,
        seat_policy: "alternate".into(),
        eval_num_simulations: 10,
        concurrency: 2,
        seed: Some(7),
        play_human: false,
        human_first: false,
    }
}
