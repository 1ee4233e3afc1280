//! Default configuration values loaded from config.defaults.toml.
//!
//! The shared TOML file is embedded at compile time so every component and
//! the checked-in sample config agree on the same values.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    mcts: MctsDefaults,
    training: TrainingDefaults,
    evaluation: EvaluationDefaults,
    workers: WorkersDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    data_dir: String,
    env_id: String,
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct MctsDefaults {
    num_simulations: u32,
    c_puct: f64,
    dirichlet_alpha: f64,
    dirichlet_weight: f64,
    temperature: f64,
    late_temperature: f64,
    temp_threshold: u32,
}

#[derive(Debug, Deserialize)]
struct TrainingDefaults {
    iterations: u32,
    episodes_per_iteration: u32,
    max_training_examples: usize,
    max_moves: u32,
    learning_rate: f64,
}

#[derive(Debug, Deserialize)]
struct EvaluationDefaults {
    rounds: u32,
    seat_policy: String,
    num_simulations: u32,
}

#[derive(Debug, Deserialize)]
struct WorkersDefaults {
    concurrency: usize,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn data_dir() -> &'static str {
    &DEFAULTS.common.data_dir
}
pub fn env_id() -> &'static str {
    &DEFAULTS.common.env_id
}
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}

// MCTS
pub fn num_simulations() -> u32 {
    DEFAULTS.mcts.num_simulations
}
pub fn c_puct() -> f64 {
    DEFAULTS.mcts.c_puct
}
pub fn dirichlet_alpha() -> f64 {
    DEFAULTS.mcts.dirichlet_alpha
}
pub fn dirichlet_weight() -> f64 {
    DEFAULTS.mcts.dirichlet_weight
}
pub fn temperature() -> f64 {
    DEFAULTS.mcts.temperature
}
pub fn late_temperature() -> f64 {
    DEFAULTS.mcts.late_temperature
}
pub fn temp_threshold() -> u32 {
    DEFAULTS.mcts.temp_threshold
}

// Training
pub fn iterations() -> u32 {
    DEFAULTS.training.iterations
}
pub fn episodes_per_iteration() -> u32 {
    DEFAULTS.training.episodes_per_iteration
}
pub fn max_training_examples() -> usize {
    DEFAULTS.training.max_training_examples
}
pub fn max_moves() -> u32 {
    DEFAULTS.training.max_moves
}
pub fn learning_rate() -> f64 {
    DEFAULTS.training.learning_rate
}

// Evaluation
pub fn eval_rounds() -> u32 {
    DEFAULTS.evaluation.rounds
}
pub fn seat_policy() -> &'static str {
    &DEFAULTS.evaluation.seat_policy
}
pub fn eval_num_simulations() -> u32 {
    DEFAULTS.evaluation.num_simulations
}

// Workers
pub fn concurrency() -> usize {
    DEFAULTS.workers.concurrency
}
