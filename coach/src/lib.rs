//! Coach - self-play, training and evaluation loop for zeroloop
//!
//! Each iteration:
//! 1. Plays a batch of self-play episodes on the worker pool
//! 2. Appends their samples to a bounded FIFO training buffer
//! 3. Trains the oracle on the whole buffer
//! 4. Pits the trained oracle against its pre-training snapshot
//! 5. Keeps the new oracle if it won more rounds, otherwise rolls back
//!
//! Search-backed work shares the oracle through a [`SharedOracle`]: workers
//! hold read locks while they search, training takes the write lock between
//! batches.

use std::sync::{Arc, RwLock, RwLockReadGuard};

use anyhow::{anyhow, Result};

pub mod agent;
pub mod config;
pub mod dispatcher;
pub mod episode;
pub mod evaluation;
pub mod matchup;
pub mod orchestrator;
pub mod replay;
pub mod stats;
pub mod tabular;

pub use agent::{Agent, HumanAgent, MctsAgent, RandomAgent, ScriptedAgent};
pub use config::Config;
pub use dispatcher::WorkerPool;
pub use episode::{run_episode, Episode, EpisodeSettings};
pub use evaluation::{evaluate, EvalSettings, EvalStats, Evaluation, RoundReport, SeatPolicy};
pub use matchup::{play_match, MatchRecord, MatchResult};
pub use orchestrator::{Coach, IterationReport};
pub use replay::ReplayBuffer;
pub use stats::{CoachStats, CoachStatsSnapshot};
pub use tabular::TabularOracle;

/// Oracle shared between the orchestrator and its workers.
pub type SharedOracle<O> = Arc<RwLock<O>>;

pub fn read_oracle<O>(oracle: &RwLock<O>) -> Result<RwLockReadGuard<'_, O>> {
    oracle.read().map_err(|_| anyhow!("oracle lock poisoned"))
}
