//! Centralized configuration loading from config.toml.
//!
//! This crate provides configuration structs and loading logic shared
//! by the engine crates and the coach binary.
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`ZEROLOOP_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults (config.defaults.toml, embedded at compile time)
//!
//! Command line flags of the coach binary sit on top of all three.
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! ZEROLOOP_<SECTION>_<KEY>=value
//!
//! Examples:
//!     ZEROLOOP_COMMON_ENV_ID=tictactoe
//!     ZEROLOOP_COMMON_DATA_DIR=/data
//!     ZEROLOOP_MCTS_NUM_SIMULATIONS=400
//!     ZEROLOOP_EVALUATION_SEAT_POLICY=new_first
//!     ZEROLOOP_WORKERS_SEED=42
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{apply_env_overrides, load_config, load_from_path, CONFIG_SEARCH_PATHS};
pub use structs::*;
