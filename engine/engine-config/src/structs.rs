//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use serde::Deserialize;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// ============================================================================

fn d_data_dir() -> String {
    defaults::data_dir().into()
}
fn d_env_id() -> String {
    defaults::env_id().into()
}
fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_num_sims() -> u32 {
    defaults::num_simulations()
}
fn d_c_puct() -> f64 {
    defaults::c_puct()
}
fn d_dirichlet_alpha() -> f64 {
    defaults::dirichlet_alpha()
}
fn d_dirichlet_weight() -> f64 {
    defaults::dirichlet_weight()
}
fn d_temperature() -> f64 {
    defaults::temperature()
}
fn d_late_temperature() -> f64 {
    defaults::late_temperature()
}
fn d_temp_threshold() -> u32 {
    defaults::temp_threshold()
}
fn d_iterations() -> u32 {
    defaults::iterations()
}
fn d_episodes() -> u32 {
    defaults::episodes_per_iteration()
}
fn d_max_examples() -> usize {
    defaults::max_training_examples()
}
fn d_max_moves() -> u32 {
    defaults::max_moves()
}
fn d_lr() -> f64 {
    defaults::learning_rate()
}
fn d_eval_rounds() -> u32 {
    defaults::eval_rounds()
}
fn d_seat_policy() -> String {
    defaults::seat_policy().into()
}
fn d_eval_sims() -> u32 {
    defaults::eval_num_simulations()
}
fn d_concurrency() -> usize {
    defaults::concurrency()
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub mcts: MctsConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_data_dir")]
    pub data_dir: String,
    #[serde(default = "d_env_id")]
    pub env_id: String,
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir().into(),
            env_id: defaults::env_id().into(),
            log_level: defaults::log_level().into(),
        }
    }
}

/// Search and self-play move selection settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MctsConfig {
    #[serde(default = "d_num_sims")]
    pub num_simulations: u32,
    #[serde(default = "d_c_puct")]
    pub c_puct: f64,
    #[serde(default = "d_dirichlet_alpha")]
    pub dirichlet_alpha: f64,
    /// Mixing weight epsilon for root noise
    #[serde(default = "d_dirichlet_weight")]
    pub dirichlet_weight: f64,
    #[serde(default = "d_temperature")]
    pub temperature: f64,
    /// Temperature used once `temp_threshold` moves have been played
    #[serde(default = "d_late_temperature")]
    pub late_temperature: f64,
    /// 0 keeps `temperature` for the whole game
    #[serde(default = "d_temp_threshold")]
    pub temp_threshold: u32,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: defaults::num_simulations(),
            c_puct: defaults::c_puct(),
            dirichlet_alpha: defaults::dirichlet_alpha(),
            dirichlet_weight: defaults::dirichlet_weight(),
            temperature: defaults::temperature(),
            late_temperature: defaults::late_temperature(),
            temp_threshold: defaults::temp_threshold(),
        }
    }
}

/// Iteration loop and training buffer settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrainingConfig {
    #[serde(default = "d_iterations")]
    pub iterations: u32,
    #[serde(default = "d_episodes")]
    pub episodes_per_iteration: u32,
    #[serde(default = "d_max_examples")]
    pub max_training_examples: usize,
    #[serde(default = "d_max_moves")]
    pub max_moves: u32,
    #[serde(default = "d_lr")]
    pub learning_rate: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            iterations: defaults::iterations(),
            episodes_per_iteration: defaults::episodes_per_iteration(),
            max_training_examples: defaults::max_training_examples(),
            max_moves: defaults::max_moves(),
            learning_rate: defaults::learning_rate(),
        }
    }
}

/// Head-to-head evaluation settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EvaluationConfig {
    #[serde(default = "d_eval_rounds")]
    pub rounds: u32,
    /// One of `new_first`, `new_second`, `alternate`
    #[serde(default = "d_seat_policy")]
    pub seat_policy: String,
    #[serde(default = "d_eval_sims")]
    pub num_simulations: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            rounds: defaults::eval_rounds(),
            seat_policy: defaults::seat_policy().into(),
            num_simulations: defaults::eval_num_simulations(),
        }
    }
}

/// Worker pool settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkersConfig {
    #[serde(default = "d_concurrency")]
    pub concurrency: usize,
    /// Master seed; unset means seed from entropy
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::concurrency(),
            seed: None,
        }
    }
}
