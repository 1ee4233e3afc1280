//! Iteration orchestrator.
//!
//! Phases run strictly in sequence, so the oracle is never trained while a
//! worker is searching with it:
//!
//! ```text
//! self-play (pool) -> buffer + replay db -> snapshot -> train -> evaluate (pool)
//!     -> accept: save iteration_<n>.json, best.json
//!     -> reject: reload previous.json
//! ```
//!
//! A failure anywhere in an iteration aborts that iteration only. Samples
//! from a failed self-play batch are never merged into the buffer.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use anyhow::{anyhow, bail, Context, Result};
use engine_core::{GameOutcome, GameRules};
use indicatif::{ProgressBar, ProgressStyle};
use mcts::{Oracle, TrainingData};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::{debug, error, info, warn};

use crate::agent::{HumanAgent, MctsAgent};
use crate::config::Config;
use crate::dispatcher::WorkerPool;
use crate::episode::{run_episode, Episode};
use crate::evaluation::{evaluate, EvalStats, RoundReport};
use crate::matchup::{play_match, MatchRecord, MatchResult};
use crate::replay::ReplayBuffer;
use crate::stats::CoachStats;
use crate::{read_oracle, SharedOracle};

/// Summary of one completed iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub iteration: u32,
    pub episodes: usize,
    pub new_samples: usize,
    /// Oldest samples dropped to respect the buffer cap
    pub evicted: usize,
    pub buffer_len: usize,
    pub eval: EvalStats,
    pub accepted: bool,
}

pub struct Coach<O: Oracle + Clone + 'static> {
    config: Config,
    game: Arc<dyn GameRules>,
    oracle: SharedOracle<O>,
    buffer: VecDeque<TrainingData>,
    pool: WorkerPool,
    replay: Option<ReplayBuffer>,
    stats: Arc<CoachStats>,
    rng: ChaCha20Rng,
}

impl<O: Oracle + Clone + 'static> Coach<O> {
    /// Build a coach, restoring the best checkpoint and the training
    /// history when they exist. Missing or unreadable state is logged and
    /// the coach starts fresh.
    pub fn new(config: Config, game: Arc<dyn GameRules>, mut oracle: O) -> Result<Self> {
        let pool = WorkerPool::new(config.concurrency)?;

        let best = config.models_dir().join("best.json");
        if best.exists() {
            match oracle.load_model(&best) {
                Ok(()) => info!(path = %best.display(), "Loaded best checkpoint"),
                Err(e) => warn!(
                    path = %best.display(),
                    error = %e,
                    "Failed to load best checkpoint, starting fresh"
                ),
            }
        } else {
            info!("No checkpoint found, starting with an untrained oracle");
        }

        let replay = match ReplayBuffer::new(&config.replay_db_path()) {
            Ok(replay) => Some(replay),
            Err(e) => {
                warn!(error = %e, "Replay database unavailable, history will not persist");
                None
            }
        };

        let mut buffer = VecDeque::new();
        if let Some(replay) = &replay {
            match replay.load_all(&config.env_id) {
                Ok(samples) => buffer.extend(samples),
                Err(e) => warn!(error = %e, "Failed to load training history, starting empty"),
            }
        }

        let rng = match config.master_seed() {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        let stats = Arc::new(CoachStats::new(Path::new(&config.data_dir), &config.env_id));

        let mut coach = Self {
            config,
            game,
            oracle: Arc::new(RwLock::new(oracle)),
            buffer,
            pool,
            replay,
            stats,
            rng,
        };
        let evicted = coach.evict_oldest();
        info!(
            env_id = %coach.config.env_id,
            buffer = coach.buffer.len(),
            evicted,
            concurrency = coach.pool.concurrency(),
            "Coach ready"
        );
        Ok(coach)
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn oracle(&self) -> &SharedOracle<O> {
        &self.oracle
    }

    pub fn stats(&self) -> &CoachStats {
        &self.stats
    }

    /// Run every configured iteration.
    ///
    /// A failed iteration is logged and counted; the run only fails when no
    /// iteration succeeded.
    pub fn run(&mut self) -> Result<Vec<IterationReport>> {
        let mut reports = Vec::new();
        for iteration in 1..=self.config.iterations {
            match self.run_iteration(iteration) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(iteration, "Iteration failed: {:#}", e);
                    self.stats.record_failure();
                }
            }
            self.stats.write_stats();
        }

        if reports.is_empty() && self.config.iterations > 0 {
            bail!("all {} iterations failed", self.config.iterations);
        }
        Ok(reports)
    }

    pub fn run_iteration(&mut self, iteration: u32) -> Result<IterationReport> {
        info!(iteration, "Starting iteration");

        let episodes = self
            .self_play()
            .with_context(|| format!("self-play failed in iteration {}", iteration))?;
        let episode_count = episodes.len();
        let mut samples = Vec::new();
        for episode in episodes {
            self.stats
                .record_episode(episode.moves, episode.samples.len());
            samples.extend(episode.samples);
        }
        let new_samples = samples.len();
        self.persist_samples(iteration, &samples);
        self.buffer.extend(samples);
        let evicted = self.evict_oldest();

        let previous = read_oracle(&self.oracle)?.clone();
        let previous_path = self.checkpoint_path("previous.json");
        // Only a snapshot written in this iteration may be reloaded
        let saved_snapshot = match previous.save_model(&previous_path) {
            Ok(()) => Some(previous_path),
            Err(e) => {
                warn!(error = %e, "Failed to save pre-training snapshot");
                None
            }
        };

        if let Err(e) = self.train() {
            *self.write_oracle()? = previous;
            return Err(e.context(format!("training failed in iteration {}", iteration)));
        }

        let old = Arc::new(RwLock::new(previous));
        let eval_settings = self.config.eval_settings()?;
        let eval_seed = self.rng.gen();
        let evaluation = match evaluate(
            &self.pool,
            Arc::clone(&self.game),
            Arc::clone(&self.oracle),
            Arc::clone(&old),
            &eval_settings,
            eval_seed,
        ) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                self.rollback(saved_snapshot.as_deref(), &old)?;
                return Err(e.context(format!("evaluation failed in iteration {}", iteration)));
            }
        };
        for report in &evaluation.reports {
            if let RoundReport::Played { result, .. } = report {
                self.stats.record_round(*result);
            }
        }

        let accepted = evaluation.stats.new_is_better();
        if accepted {
            self.save_accepted(iteration);
        } else {
            self.rollback(saved_snapshot.as_deref(), &old)?;
        }
        self.stats.record_verdict(accepted);

        info!(
            iteration,
            new_samples,
            buffer = self.buffer.len(),
            new_wins = evaluation.stats.new_wins,
            old_wins = evaluation.stats.old_wins,
            draws = evaluation.stats.draws,
            accepted,
            "Iteration complete"
        );

        Ok(IterationReport {
            iteration,
            episodes: episode_count,
            new_samples,
            evicted,
            buffer_len: self.buffer.len(),
            eval: evaluation.stats,
            accepted,
        })
    }

    fn self_play(&mut self) -> Result<Vec<Episode>> {
        let count = self.config.episodes_per_iteration;
        let seeds: Vec<u64> = (0..count).map(|_| self.rng.gen()).collect();

        // Progress bar only when stderr is a TTY
        let progress = if count > 0 && std::io::IsTerminal::is_terminal(&std::io::stderr()) {
            let pb = ProgressBar::new(count as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} episodes ({eta})")
                    .map_err(|e| anyhow!("invalid progress template: {}", e))?
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let game = Arc::clone(&self.game);
        let oracle = Arc::clone(&self.oracle);
        let settings = self.config.episode_settings();
        let worker_progress = progress.clone();
        let result = self.pool.run(seeds, move |seed| {
            let oracle = read_oracle(&oracle)?;
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let episode = run_episode(&*game, &*oracle, &settings, &mut rng)?;
            if let Some(pb) = &worker_progress {
                pb.inc(1);
            }
            Ok(episode)
        });

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        let episodes = result?;

        let (mut wins, mut draws) = (0, 0);
        for episode in &episodes {
            match episode.outcome {
                GameOutcome::Player1Won | GameOutcome::Player2Won => wins += 1,
                _ => draws += 1,
            }
        }
        debug!(episodes = episodes.len(), wins, draws, "Self-play batch complete");
        Ok(episodes)
    }

    fn train(&mut self) -> Result<()> {
        let samples = self.buffer.make_contiguous();
        let mut oracle = self
            .oracle
            .write()
            .map_err(|_| anyhow!("oracle lock poisoned"))?;
        oracle.train(samples, &mut |progress| {
            debug!(
                processed = progress.processed,
                total = progress.total,
                loss = progress.loss,
                "Training progress"
            );
        })?;
        info!(samples = samples.len(), "Training complete");
        Ok(())
    }

    /// Drop the oldest samples beyond the cap; returns how many went.
    fn evict_oldest(&mut self) -> usize {
        let max = self.config.max_training_examples;
        let excess = self.buffer.len().saturating_sub(max);
        self.buffer.drain(..excess);
        excess
    }

    fn persist_samples(&self, iteration: u32, samples: &[TrainingData]) {
        let Some(replay) = &self.replay else {
            return;
        };
        let env_id = &self.config.env_id;
        let result = replay
            .store_batch(env_id, iteration, samples)
            .and_then(|()| replay.truncate_to(env_id, self.config.max_training_examples));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist training samples");
        }
    }

    fn save_accepted(&self, iteration: u32) {
        let oracle = match read_oracle(&self.oracle) {
            Ok(oracle) => oracle,
            Err(e) => {
                warn!(error = %e, "Cannot checkpoint accepted oracle");
                return;
            }
        };
        for name in [format!("iteration_{}.json", iteration), "best.json".to_string()] {
            let path = self.checkpoint_path(&name);
            match oracle.save_model(&path) {
                Ok(()) => debug!(path = %path.display(), "Saved checkpoint"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to save checkpoint"),
            }
        }
    }

    /// Restore the pre-training oracle, from the checkpoint saved this
    /// iteration when there is one and from the in-memory snapshot otherwise.
    fn rollback(&self, saved_snapshot: Option<&Path>, snapshot: &RwLock<O>) -> Result<()> {
        let mut oracle = self.write_oracle()?;
        let reloaded = match saved_snapshot {
            Some(path) => match oracle.load_model(path) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Failed to reload pre-training checkpoint, using in-memory copy");
                    false
                }
            },
            None => false,
        };
        if !reloaded {
            *oracle = read_oracle(snapshot)?.clone();
        }
        info!("Rejected new oracle, rolled back");
        Ok(())
    }

    fn write_oracle(&self) -> Result<RwLockWriteGuard<'_, O>> {
        self.oracle
            .write()
            .map_err(|_| anyhow!("oracle lock poisoned"))
    }

    fn checkpoint_path(&self, name: &str) -> PathBuf {
        self.config.models_dir().join(name)
    }

    /// Exhibition game between the current oracle and a human reading from
    /// `input`.
    pub fn play_human<R: BufRead, W: Write>(
        &mut self,
        input: R,
        mut output: W,
        human_first: bool,
    ) -> Result<MatchRecord> {
        let oracle = read_oracle(&self.oracle)?;
        let game = &*self.game;
        let settings = self.config.eval_settings()?;

        let mut coach = MctsAgent::new(
            "coach",
            game,
            &*oracle,
            settings.mcts,
            0.0,
            ChaCha20Rng::seed_from_u64(self.rng.gen()),
        );
        let mut human = HumanAgent::new(game, input, &mut output);

        let record = if human_first {
            play_match(game, &mut human, &mut coach, self.config.max_moves)?
        } else {
            play_match(game, &mut coach, &mut human, self.config.max_moves)?
        };

        let human_won = match record.result {
            MatchResult::Draw => None,
            MatchResult::FirstWon => Some(human_first),
            MatchResult::SecondWon => Some(!human_first),
        };
        let message = match human_won {
            Some(true) => "You win!",
            Some(false) => "The coach wins.",
            None => "Draw.",
        };
        writeln!(output, "\n{} ({} moves)", message, record.moves)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::tabular::TabularOracle;
    use crate::test_games::FirstMoveWins;
    use games_tictactoe::TicTacToe;
    use mcts::{OracleError, Suggestion, TrainProgress};
    use std::io::Cursor;
    use tempfile::tempdir;

    /// Uniform oracle that counts how often it was trained.
    #[derive(Debug, Clone, Default)]
    struct GenerationOracle {
        generation: u32,
        read_only: bool,
    }

    impl Oracle for GenerationOracle {
        fn suggest(&self, _state: &[u8]) -> Result<Suggestion, OracleError> {
            Ok(Suggestion {
                policy: vec![1.0],
                value: 0.0,
            })
        }

        fn train(
            &mut self,
            _samples: &[TrainingData],
            _progress: &mut dyn FnMut(TrainProgress),
        ) -> Result<(), OracleError> {
            self.generation += 1;
            Ok(())
        }

        fn load_model(&mut self, path: &Path) -> Result<(), OracleError> {
            let text = std::fs::read_to_string(path)?;
            self.generation = text
                .trim()
                .parse()
                .map_err(|_| OracleError::ModelFormat(text.clone()))?;
            Ok(())
        }

        fn save_model(&self, path: &Path) -> Result<(), OracleError> {
            if self.read_only {
                return Err(OracleError::ModelFormat("read-only".into()));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, self.generation.to_string())?;
            Ok(())
        }
    }

    /// Oracle whose every evaluation fails.
    #[derive(Debug, Clone)]
    struct BrokenOracle;

    impl Oracle for BrokenOracle {
        fn suggest(&self, _state: &[u8]) -> Result<Suggestion, OracleError> {
            Err(OracleError::EvaluationFailed("broken".into()))
        }

        fn train(
            &mut self,
            _samples: &[TrainingData],
            _progress: &mut dyn FnMut(TrainProgress),
        ) -> Result<(), OracleError> {
            Ok(())
        }

        fn load_model(&mut self, _path: &Path) -> Result<(), OracleError> {
            Ok(())
        }

        fn save_model(&self, _path: &Path) -> Result<(), OracleError> {
            Ok(())
        }
    }

    fn tictactoe() -> Arc<dyn GameRules> {
        Arc::new(TicTacToe::new())
    }

    #[test]
    fn test_full_iteration_on_tictactoe() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.iterations = 2;

        let oracle = TabularOracle::new(9, 0.5);
        let mut coach = Coach::new(config.clone(), tictactoe(), oracle).unwrap();
        let reports = coach.run().unwrap();

        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert_eq!(report.episodes, 4);
            assert!(report.new_samples >= 4 * 5);
            assert!(report.eval.rounds_played >= 1);
        }
        assert_eq!(coach.buffer_len(), reports[1].buffer_len);

        let models = config.models_dir();
        assert!(models.join("previous.json").exists());
        let accepted: Vec<u32> = reports
            .iter()
            .filter(|r| r.accepted)
            .map(|r| r.iteration)
            .collect();
        assert_eq!(models.join("best.json").exists(), !accepted.is_empty());
        for iteration in accepted {
            assert!(models.join(format!("iteration_{}.json", iteration)).exists());
        }

        assert!(dir.path().join("coach_stats.json").exists());
        let snapshot = coach.stats().snapshot();
        assert_eq!(snapshot.episodes_completed, 8);
        assert_eq!(
            snapshot.iterations_accepted + snapshot.iterations_rejected,
            2
        );
    }

    #[test]
    fn test_buffer_evicts_oldest_and_survives_restart() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.max_training_examples = 7;

        {
            let mut coach =
                Coach::new(config.clone(), tictactoe(), TabularOracle::new(9, 0.5)).unwrap();
            let report = coach.run_iteration(1).unwrap();
            assert_eq!(coach.buffer_len(), 7);
            assert_eq!(report.evicted, report.new_samples - 7);
        }

        let coach = Coach::new(config.clone(), tictactoe(), TabularOracle::new(9, 0.5)).unwrap();
        assert_eq!(coach.buffer_len(), 7);

        let replay = ReplayBuffer::new(&config.replay_db_path()).unwrap();
        assert_eq!(replay.count("tictactoe").unwrap(), 7);
    }

    #[test]
    fn test_rejected_oracle_is_rolled_back() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        // First mover always wins, so the new oracle never does
        config.seat_policy = "new_second".into();

        let mut coach =
            Coach::new(config.clone(), Arc::new(FirstMoveWins), GenerationOracle::default())
                .unwrap();
        let report = coach.run_iteration(1).unwrap();

        assert!(!report.accepted);
        assert_eq!(report.eval.new_wins, 0);
        assert_eq!(read_oracle(coach.oracle()).unwrap().generation, 0);
        assert!(config.models_dir().join("previous.json").exists());
        assert!(!config.models_dir().join("best.json").exists());
    }

    #[test]
    fn test_rollback_ignores_checkpoint_from_earlier_run() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.seat_policy = "new_second".into();
        std::fs::create_dir_all(config.models_dir()).unwrap();
        std::fs::write(config.models_dir().join("previous.json"), "5").unwrap();

        let oracle = GenerationOracle {
            generation: 0,
            read_only: true,
        };
        let mut coach = Coach::new(config, Arc::new(FirstMoveWins), oracle).unwrap();
        let report = coach.run_iteration(1).unwrap();

        assert!(!report.accepted);
        assert_eq!(read_oracle(coach.oracle()).unwrap().generation, 0);
    }

    #[test]
    fn test_accepted_oracle_is_checkpointed() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.seat_policy = "new_first".into();

        let mut coach =
            Coach::new(config.clone(), Arc::new(FirstMoveWins), GenerationOracle::default())
                .unwrap();
        let report = coach.run_iteration(1).unwrap();
        assert!(report.accepted);
        assert_eq!(read_oracle(coach.oracle()).unwrap().generation, 1);

        let best = config.models_dir().join("best.json");
        assert!(best.exists());
        assert!(config.models_dir().join("iteration_1.json").exists());

        // A fresh coach starts from the best checkpoint
        let restarted =
            Coach::new(config, Arc::new(FirstMoveWins), GenerationOracle::default()).unwrap();
        assert_eq!(read_oracle(restarted.oracle()).unwrap().generation, 1);
    }

    #[test]
    fn test_failed_self_play_merges_nothing() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let mut coach = Coach::new(config, tictactoe(), BrokenOracle).unwrap();
        let err = coach.run().unwrap_err();
        assert!(err.to_string().contains("iterations failed"));
        assert_eq!(coach.buffer_len(), 0);

        let snapshot = coach.stats().snapshot();
        assert_eq!(snapshot.iterations_failed, 1);
        assert_eq!(snapshot.episodes_completed, 0);
    }

    #[test]
    fn test_corrupt_checkpoint_starts_fresh() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(config.models_dir()).unwrap();
        std::fs::write(config.models_dir().join("best.json"), "not json").unwrap();

        let coach = Coach::new(config, tictactoe(), TabularOracle::new(9, 0.5)).unwrap();
        assert!(read_oracle(coach.oracle()).unwrap().is_empty());
    }

    #[test]
    fn test_play_human_reports_result() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let mut coach =
            Coach::new(config, Arc::new(FirstMoveWins), GenerationOracle::default()).unwrap();

        let mut output = Vec::new();
        let record = coach
            .play_human(Cursor::new("0\n"), &mut output, true)
            .unwrap();
        assert_eq!(record.result, MatchResult::FirstWon);
        assert!(String::from_utf8(output).unwrap().contains("You win!"));
    }
}
