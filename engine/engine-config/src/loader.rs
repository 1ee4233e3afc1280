//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",    // Current directory
    "../config.toml", // Parent directory (when running from a crate directory)
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by the ZEROLOOP_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
///
/// After loading, environment variable overrides are applied. Missing or
/// malformed files never fail: the built-in defaults are used instead.
pub fn load_config() -> CentralConfig {
    if let Ok(path) = std::env::var("ZEROLOOP_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from ZEROLOOP_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "ZEROLOOP_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    for path_str in CONFIG_SEARCH_PATHS {
        let path = Path::new(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(path);
        }
    }

    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path.
pub fn load_from_path(path: &Path) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (u32, usize, f64, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        match std::env::var($key).map(|s| s.parse()) {
            Ok(Ok(v)) => $config.$section.$field = v,
            Ok(Err(_)) => warn!(key = $key, "Ignoring unparseable environment override"),
            Err(_) => {}
        }
    };
    // Optional parseable field (Option<u64>, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, optional_parse) => {
        match std::env::var($key).map(|s| s.parse()) {
            Ok(Ok(v)) => $config.$section.$field = Some(v),
            Ok(Err(_)) => warn!(key = $key, "Ignoring unparseable environment override"),
            Err(_) => {}
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: ZEROLOOP_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.env_id, "ZEROLOOP_COMMON_ENV_ID");
    env_override!(config, common.data_dir, "ZEROLOOP_COMMON_DATA_DIR");
    env_override!(config, common.log_level, "ZEROLOOP_COMMON_LOG_LEVEL");

    // MCTS
    env_override!(
        config,
        mcts.num_simulations,
        "ZEROLOOP_MCTS_NUM_SIMULATIONS",
        parse
    );
    env_override!(config, mcts.c_puct, "ZEROLOOP_MCTS_C_PUCT", parse);
    env_override!(
        config,
        mcts.dirichlet_alpha,
        "ZEROLOOP_MCTS_DIRICHLET_ALPHA",
        parse
    );
    env_override!(
        config,
        mcts.dirichlet_weight,
        "ZEROLOOP_MCTS_DIRICHLET_WEIGHT",
        parse
    );
    env_override!(config, mcts.temperature, "ZEROLOOP_MCTS_TEMPERATURE", parse);
    env_override!(
        config,
        mcts.late_temperature,
        "ZEROLOOP_MCTS_LATE_TEMPERATURE",
        parse
    );
    env_override!(
        config,
        mcts.temp_threshold,
        "ZEROLOOP_MCTS_TEMP_THRESHOLD",
        parse
    );

    // Training
    env_override!(
        config,
        training.iterations,
        "ZEROLOOP_TRAINING_ITERATIONS",
        parse
    );
    env_override!(
        config,
        training.episodes_per_iteration,
        "ZEROLOOP_TRAINING_EPISODES_PER_ITERATION",
        parse
    );
    env_override!(
        config,
        training.max_training_examples,
        "ZEROLOOP_TRAINING_MAX_TRAINING_EXAMPLES",
        parse
    );
    env_override!(
        config,
        training.max_moves,
        "ZEROLOOP_TRAINING_MAX_MOVES",
        parse
    );
    env_override!(
        config,
        training.learning_rate,
        "ZEROLOOP_TRAINING_LEARNING_RATE",
        parse
    );

    // Evaluation
    env_override!(
        config,
        evaluation.rounds,
        "ZEROLOOP_EVALUATION_ROUNDS",
        parse
    );
    env_override!(
        config,
        evaluation.seat_policy,
        "ZEROLOOP_EVALUATION_SEAT_POLICY"
    );
    env_override!(
        config,
        evaluation.num_simulations,
        "ZEROLOOP_EVALUATION_NUM_SIMULATIONS",
        parse
    );

    // Workers
    env_override!(
        config,
        workers.concurrency,
        "ZEROLOOP_WORKERS_CONCURRENCY",
        parse
    );
    env_override!(config, workers.seed, "ZEROLOOP_WORKERS_SEED", optional_parse);

    config
}
