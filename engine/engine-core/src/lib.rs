//! Core traits and types for the zeroloop game engine
//!
//! This crate provides the abstractions every other component is written
//! against:
//! - `GameRules`: byte-buffer rules module (legal moves, transitions, terminal detection)
//! - `GameOutcome`: terminal status of a state
//! - `Registry`: static registration system for games, looked up by env_id

pub mod registry;
pub mod rules;

// Re-export main types for convenience
pub use registry::{
    clear_registry, create_game, is_registered, list_registered_games, register_game, GameFactory,
};
pub use rules::{check_legal, legal_actions, GameOutcome, GameRules, RulesError};
