//! Monte Carlo Tree Search (MCTS) for AlphaZero-style self-play.
//!
//! The search works on opaque state buffers supplied by any
//! [`engine_core::GameRules`] implementation and is guided by a pluggable
//! [`Oracle`] that suggests action priors and a value for a state.
//!
//! # Overview
//!
//! States are stored in a transposition [`Arena`]: one [`StateNode`] per
//! unique state, found by its exact bytes, with one [`ActionStat`] per action.
//! Each descent of [`SearchEngine::search`]:
//!
//! 1. **Selection**: picks the action with the best upper-confidence score,
//!    with Dirichlet noise mixed into the root priors in exploration mode
//! 2. **Expansion**: asks the oracle about a newly reached state and stores
//!    its legal-masked priors
//! 3. **Backpropagation**: folds the leaf value into every (node, action) on
//!    the path, flipping its sign at each ply
//!
//! After searching, [`SearchEngine::action_probs`] turns root visit counts
//! into a move distribution under a temperature.
//!
//! # Usage
//!
//! ```rust
//! use engine_core::GameRules;
//! use games_tictactoe::TicTacToe;
//! use mcts::{MctsConfig, SearchEngine, UniformOracle};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//!
//! let game = TicTacToe::new();
//! let oracle = UniformOracle::new(game.action_count());
//! let mut engine = SearchEngine::new(&game, &oracle, MctsConfig::for_testing());
//!
//! let root = game.new_state();
//! let mut rng = ChaCha20Rng::seed_from_u64(42);
//! engine.search(&root, 0, &mut rng).unwrap();
//!
//! let probs = engine.action_probs(&root, 1.0).unwrap();
//! assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
//! ```
//!
//! # Concurrency
//!
//! A [`SearchEngine`] and its arena belong to one thread. Parallelism comes
//! from running many engines (one per episode or evaluation round) against a
//! shared, `Sync` oracle.

pub mod arena;
pub mod config;
pub mod node;
pub mod oracle;
pub mod policy;
pub mod search;
pub mod training;

// Re-export main types
pub use arena::{Arena, Fingerprint};
pub use config::MctsConfig;
pub use node::{ActionStat, NodeId, StateNode, TINY_EPSILON};
pub use oracle::{Oracle, OracleError, Suggestion, TrainProgress, UniformOracle};
pub use search::{SearchEngine, SearchError, SearchStats};
pub use training::{DecodeError, TrainingData};
