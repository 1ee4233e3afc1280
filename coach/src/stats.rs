//! Run statistics and persistence.
//!
//! The orchestrator records into these counters once a batch has finished.
//! They are atomics behind an `Arc`, so a snapshot can be read through a
//! shared reference. A snapshot is written to `<data_dir>/coach_stats.json`
//! after every iteration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

use crate::matchup::MatchResult;

#[derive(Debug)]
pub struct CoachStats {
    episodes_completed: AtomicU32,
    samples_produced: AtomicU64,
    /// Plies over all self-play episodes
    total_moves: AtomicU64,
    rounds_completed: AtomicU32,
    /// Evaluation rounds won by whichever side moved first
    seat1_wins: AtomicU32,
    seat2_wins: AtomicU32,
    draws: AtomicU32,
    iterations_accepted: AtomicU32,
    iterations_rejected: AtomicU32,
    iterations_failed: AtomicU32,
    start_time: Instant,
    stats_path: PathBuf,
    env_id: String,
}

/// Serializable stats for JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachStatsSnapshot {
    pub env_id: String,
    pub episodes_completed: u32,
    pub samples_produced: u64,
    pub avg_episode_length: f64,
    pub rounds_completed: u32,
    pub seat1_wins: u32,
    pub seat2_wins: u32,
    pub draws: u32,
    pub iterations_accepted: u32,
    pub iterations_rejected: u32,
    pub iterations_failed: u32,
    pub runtime_seconds: f64,
    pub timestamp: u64,
}

impl CoachStats {
    pub fn new(data_dir: &Path, env_id: &str) -> Self {
        if let Err(e) = fs::create_dir_all(data_dir) {
            warn!("Failed to create data directory: {}", e);
        }

        Self {
            episodes_completed: AtomicU32::new(0),
            samples_produced: AtomicU64::new(0),
            total_moves: AtomicU64::new(0),
            rounds_completed: AtomicU32::new(0),
            seat1_wins: AtomicU32::new(0),
            seat2_wins: AtomicU32::new(0),
            draws: AtomicU32::new(0),
            iterations_accepted: AtomicU32::new(0),
            iterations_rejected: AtomicU32::new(0),
            iterations_failed: AtomicU32::new(0),
            start_time: Instant::now(),
            stats_path: data_dir.join("coach_stats.json"),
            env_id: env_id.to_string(),
        }
    }

    pub fn record_episode(&self, moves: u32, samples: usize) {
        self.episodes_completed.fetch_add(1, Ordering::Relaxed);
        self.total_moves.fetch_add(moves as u64, Ordering::Relaxed);
        self.samples_produced
            .fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn record_round(&self, result: MatchResult) {
        self.rounds_completed.fetch_add(1, Ordering::Relaxed);
        let counter = match result {
            MatchResult::FirstWon => &self.seat1_wins,
            MatchResult::SecondWon => &self.seat2_wins,
            MatchResult::Draw => &self.draws,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verdict(&self, accepted: bool) {
        if accepted {
            self.iterations_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.iterations_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self) {
        self.iterations_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CoachStatsSnapshot {
        let episodes = self.episodes_completed.load(Ordering::Relaxed);
        let total_moves = self.total_moves.load(Ordering::Relaxed);

        let avg_episode_length = if episodes > 0 {
            total_moves as f64 / episodes as f64
        } else {
            0.0
        };

        CoachStatsSnapshot {
            env_id: self.env_id.clone(),
            episodes_completed: episodes,
            samples_produced: self.samples_produced.load(Ordering::Relaxed),
            avg_episode_length,
            rounds_completed: self.rounds_completed.load(Ordering::Relaxed),
            seat1_wins: self.seat1_wins.load(Ordering::Relaxed),
            seat2_wins: self.seat2_wins.load(Ordering::Relaxed),
            draws: self.draws.load(Ordering::Relaxed),
            iterations_accepted: self.iterations_accepted.load(Ordering::Relaxed),
            iterations_rejected: self.iterations_rejected.load(Ordering::Relaxed),
            iterations_failed: self.iterations_failed.load(Ordering::Relaxed),
            runtime_seconds: self.start_time.elapsed().as_secs_f64(),
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Write stats to JSON file (atomic write-then-rename).
    pub fn write_stats(&self) {
        let snapshot = self.snapshot();

        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(j) => j,
            Err(e) => {
                warn!("Failed to serialize coach stats: {}", e);
                return;
            }
        };

        let temp_path = self.stats_path.with_extension("json.tmp");
        match fs::File::create(&temp_path) {
            Ok(mut file) => {
                if let Err(e) = file.write_all(json.as_bytes()) {
                    warn!("Failed to write coach stats: {}", e);
                    return;
                }
            }
            Err(e) => {
                warn!("Failed to create temp stats file: {}", e);
                return;
            }
        }

        if let Err(e) = fs::rename(&temp_path, &self.stats_path) {
            warn!("Failed to rename stats file: {}", e);
            let _ = fs::remove_file(&temp_path);
            return;
        }

        debug!("Wrote coach stats to {}", self.stats_path.display());
    }

    pub fn stats_path(&self) -> &Path {
        &self.stats_path
    }
}
