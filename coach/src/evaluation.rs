//! Head-to-head evaluation of a freshly trained oracle against its
//! pre-training snapshot.
//!
//! Rounds run on the worker pool and share one tally. Once the gap between
//! the two sides exceeds the number of rounds still unplayed, the result
//! can no longer change: the stop flag is raised and later rounds become
//! no-ops. Stopping is cooperative. The flag is checked before a round
//! starts, after its agents are built and after it finishes; a round past
//! its last check plays out, and its result is discarded.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use engine_core::GameRules;
use mcts::{MctsConfig, Oracle};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::MctsAgent;
use crate::dispatcher::WorkerPool;
use crate::matchup::{play_match, MatchResult};
use crate::{read_oracle, SharedOracle};

/// Which side moves first in each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatPolicy {
    NewFirst,
    NewSecond,
    /// New oracle moves first in even-numbered rounds
    Alternate,
}

impl SeatPolicy {
    pub fn new_moves_first(self, round: u32) -> bool {
        match self {
            SeatPolicy::NewFirst => true,
            SeatPolicy::NewSecond => false,
            SeatPolicy::Alternate => round % 2 == 0,
        }
    }
}

impl FromStr for SeatPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "new_first" => Ok(SeatPolicy::NewFirst),
            "new_second" => Ok(SeatPolicy::NewSecond),
            "alternate" => Ok(SeatPolicy::Alternate),
            other => Err(anyhow!(
                "invalid seat policy '{}', expected one of new_first, new_second, alternate",
                other
            )),
        }
    }
}

impl fmt::Display for SeatPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SeatPolicy::NewFirst => "new_first",
            SeatPolicy::NewSecond => "new_second",
            SeatPolicy::Alternate => "alternate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct EvalSettings {
    pub rounds: u32,
    pub seat_policy: SeatPolicy,
    /// Search settings for both sides; root noise is normally off
    pub mcts: MctsConfig,
    pub max_moves: u32,
}

/// Running tally shared by every round of one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalStats {
    pub new_wins: u32,
    pub old_wins: u32,
    pub draws: u32,
    pub rounds_played: u32,
    pub early_stopped: bool,
}

impl EvalStats {
    /// True once the remaining rounds cannot change which side is ahead.
    pub fn is_decided(&self, total_rounds: u32) -> bool {
        let remaining = total_rounds.saturating_sub(self.rounds_played);
        self.new_wins.abs_diff(self.old_wins) > remaining
    }

    /// Draws count for neither side.
    pub fn new_is_better(&self) -> bool {
        self.new_wins > self.old_wins
    }

    fn record(&mut self, outcome: RoundOutcome) {
        match outcome {
            RoundOutcome::NewWon => self.new_wins += 1,
            RoundOutcome::OldWon => self.old_wins += 1,
            RoundOutcome::Draw => self.draws += 1,
        }
        self.rounds_played += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    NewWon,
    OldWon,
    Draw,
}

/// What happened to one submitted round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundReport {
    Played {
        round: u32,
        new_first: bool,
        result: MatchResult,
        moves: u32,
    },
    /// Stop flag seen before the game started
    Skipped { round: u32 },
    /// Game finished after the stop flag was raised; not counted
    Discarded { round: u32 },
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub stats: EvalStats,
    pub reports: Vec<RoundReport>,
}

/// Play `settings.rounds` rounds between `new` and `old` on `pool`.
///
/// Each round derives its own seed from `seed`.
pub fn evaluate<G, O>(
    pool: &WorkerPool,
    game: Arc<G>,
    new: SharedOracle<O>,
    old: SharedOracle<O>,
    settings: &EvalSettings,
    seed: u64,
) -> Result<Evaluation>
where
    G: GameRules + ?Sized + 'static,
    O: Oracle + 'static,
{
    let total = settings.rounds;
    let tally = Arc::new(Mutex::new(EvalStats::default()));

    let mut master = ChaCha20Rng::seed_from_u64(seed);
    let items: Vec<(u32, u64)> = (0..total).map(|round| (round, master.gen())).collect();

    let round_tally = Arc::clone(&tally);
    let round_settings = settings.clone();
    let reports = pool.run(items, move |(round, round_seed)| {
        play_round(
            &*game,
            &new,
            &old,
            &round_settings,
            &round_tally,
            round,
            round_seed,
        )
    })?;

    let stats = *lock(&tally)?;
    info!(
        new_wins = stats.new_wins,
        old_wins = stats.old_wins,
        draws = stats.draws,
        rounds_played = stats.rounds_played,
        early_stopped = stats.early_stopped,
        "Evaluation finished"
    );
    Ok(Evaluation { stats, reports })
}

fn play_round<G, O>(
    game: &G,
    new: &SharedOracle<O>,
    old: &SharedOracle<O>,
    settings: &EvalSettings,
    tally: &Mutex<EvalStats>,
    round: u32,
    seed: u64,
) -> Result<RoundReport>
where
    G: GameRules + ?Sized,
    O: Oracle,
{
    if should_stop(tally, settings.rounds)? {
        return Ok(RoundReport::Skipped { round });
    }

    let new_oracle = read_oracle(new)?;
    let old_oracle = read_oracle(old)?;
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let new_rng = ChaCha20Rng::seed_from_u64(rng.gen());
    let old_rng = ChaCha20Rng::seed_from_u64(rng.gen());

    let mut new_agent = MctsAgent::new(
        "new",
        game,
        &*new_oracle,
        settings.mcts.clone(),
        0.0,
        new_rng,
    );
    let mut old_agent = MctsAgent::new(
        "old",
        game,
        &*old_oracle,
        settings.mcts.clone(),
        0.0,
        old_rng,
    );

    if lock(tally)?.early_stopped {
        return Ok(RoundReport::Skipped { round });
    }

    let new_first = settings.seat_policy.new_moves_first(round);
    let record = if new_first {
        play_match(game, &mut new_agent, &mut old_agent, settings.max_moves)?
    } else {
        play_match(game, &mut old_agent, &mut new_agent, settings.max_moves)?
    };
    let outcome = match (record.result, new_first) {
        (MatchResult::Draw, _) => RoundOutcome::Draw,
        (MatchResult::FirstWon, true) | (MatchResult::SecondWon, false) => RoundOutcome::NewWon,
        (MatchResult::FirstWon, false) | (MatchResult::SecondWon, true) => RoundOutcome::OldWon,
    };

    let mut stats = lock(tally)?;
    if stats.early_stopped {
        debug!(round, "Round finished after early stop, discarding");
        return Ok(RoundReport::Discarded { round });
    }
    stats.record(outcome);
    debug!(round, new_first, ?outcome, moves = record.moves, "Round complete");
    if stats.is_decided(settings.rounds) {
        stats.early_stopped = true;
        info!(
            new_wins = stats.new_wins,
            old_wins = stats.old_wins,
            rounds_played = stats.rounds_played,
            "Evaluation decided early"
        );
    }

    Ok(RoundReport::Played {
        round,
        new_first,
        result: record.result,
        moves: record.moves,
    })
}

/// Check the stop flag, raising it if the tally is already decided.
fn should_stop(tally: &Mutex<EvalStats>, total_rounds: u32) -> Result<bool> {
    let mut stats = lock(tally)?;
    if !stats.early_stopped && stats.is_decided(total_rounds) {
        stats.early_stopped = true;
    }
    Ok(stats.early_stopped)
}

fn lock(tally: &Mutex<EvalStats>) -> Result<MutexGuard<'_, EvalStats>> {
    tally
        .lock()
        .map_err(|_| anyhow!("evaluation tally lock poisoned"))
}
