//! Lookup-table oracle.
//!
//! Stands in for a neural network so the loop runs end to end: every state
//! seen in training gets its own (policy, value) entry, nudged towards the
//! training targets at a fixed learning rate. Unseen states get a uniform
//! policy and a value of 0.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use mcts::{Oracle, OracleError, Suggestion, TrainProgress, TrainingData};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Samples per progress report.
const PROGRESS_CHUNK: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    policy: Vec<f32>,
    value: f32,
}

#[derive(Debug, Clone)]
pub struct TabularOracle {
    action_count: usize,
    learning_rate: f32,
    table: HashMap<Vec<u8>, Entry>,
}

/// On-disk checkpoint layout.
#[derive(Debug, Serialize, Deserialize)]
struct SavedTable {
    version: u32,
    action_count: usize,
    entries: Vec<SavedEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedEntry {
    state: Vec<u8>,
    policy: Vec<f32>,
    value: f32,
}

impl SavedTable {
    const VERSION: u32 = 1;
}

impl TabularOracle {
    pub fn new(action_count: usize, learning_rate: f32) -> Self {
        Self {
            action_count,
            learning_rate: learning_rate.clamp(0.0, 1.0),
            table: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn uniform(&self) -> Entry {
        Entry {
            policy: vec![1.0 / self.action_count as f32; self.action_count],
            value: 0.0,
        }
    }

    /// Blend one sample into the table, returning the squared value error
    /// before the update.
    fn learn(&mut self, sample: &TrainingData) -> Result<f32, OracleError> {
        if sample.policy.len() != self.action_count {
            return Err(OracleError::InvalidState(format!(
                "sample policy has {} entries, expected {}",
                sample.policy.len(),
                self.action_count
            )));
        }

        let rate = self.learning_rate;
        let fresh = self.uniform();
        let entry = self.table.entry(sample.state.clone()).or_insert(fresh);

        let error = sample.value - entry.value;
        entry.value += rate * error;
        for (p, &target) in entry.policy.iter_mut().zip(&sample.policy) {
            *p += rate * (target - *p);
        }
        Ok(error * error)
    }
}

impl Oracle for TabularOracle {
    fn suggest(&self, state: &[u8]) -> Result<Suggestion, OracleError> {
        if self.action_count == 0 {
            return Err(OracleError::InvalidState("empty action space".to_string()));
        }
        let entry = self.table.get(state).cloned().unwrap_or_else(|| self.uniform());
        Ok(Suggestion {
            policy: entry.policy,
            value: entry.value,
        })
    }

    fn train(
        &mut self,
        samples: &[TrainingData],
        progress: &mut dyn FnMut(TrainProgress),
    ) -> Result<(), OracleError> {
        let total = samples.len();
        let mut processed = 0;
        for chunk in samples.chunks(PROGRESS_CHUNK) {
            let mut loss = 0.0;
            for sample in chunk {
                loss += self.learn(sample)?;
            }
            processed += chunk.len();
            progress(TrainProgress {
                processed,
                total,
                loss: Some(loss / chunk.len() as f32),
            });
        }
        debug!(samples = total, entries = self.table.len(), "Tabular oracle trained");
        Ok(())
    }

    fn load_model(&mut self, path: &Path) -> Result<(), OracleError> {
        let bytes = fs::read(path)?;
        let saved: SavedTable = serde_json::from_slice(&bytes)
            .map_err(|e| OracleError::ModelFormat(format!("{}: {}", path.display(), e)))?;

        if saved.version != SavedTable::VERSION {
            return Err(OracleError::ModelFormat(format!(
                "unsupported checkpoint version {}, expected {}",
                saved.version,
                SavedTable::VERSION
            )));
        }
        if saved.action_count != self.action_count {
            return Err(OracleError::ModelFormat(format!(
                "checkpoint has {} actions, expected {}",
                saved.action_count, self.action_count
            )));
        }
        if let Some(bad) = saved
            .entries
            .iter()
            .find(|e| e.policy.len() != self.action_count)
        {
            return Err(OracleError::ModelFormat(format!(
                "entry policy has {} values, expected {}",
                bad.policy.len(),
                self.action_count
            )));
        }

        self.table = saved
            .entries
            .into_iter()
            .map(|e| {
                (
                    e.state,
                    Entry {
                        policy: e.policy,
                        value: e.value,
                    },
                )
            })
            .collect();
        debug!(path = %path.display(), entries = self.table.len(), "Loaded tabular checkpoint");
        Ok(())
    }

    fn save_model(&self, path: &Path) -> Result<(), OracleError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut entries: Vec<SavedEntry> = self
            .table
            .iter()
            .map(|(state, entry)| SavedEntry {
                state: state.clone(),
                policy: entry.policy.clone(),
                value: entry.value,
            })
            .collect();
        entries.sort_by(|a, b| a.state.cmp(&b.state));

        let saved = SavedTable {
            version: SavedTable::VERSION,
            action_count: self.action_count,
            entries,
        };
        let json = serde_json::to_vec(&saved)
            .map_err(|e| OracleError::ModelFormat(e.to_string()))?;

        // Write then rename (atomic on most filesystems)
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(state: Vec<u8>, policy: Vec<f32>, value: f32) -> TrainingData {
        TrainingData::new(state, policy, value)
    }

    #[test]
    fn test_unseen_state_is_uniform() {
        let oracle = TabularOracle::new(4, 0.5);
        let s = oracle.suggest(&[1, 2, 3]).unwrap();
        assert_eq!(s.policy, vec![0.25; 4]);
        assert_eq!(s.value, 0.0);
    }

    #[test]
    fn test_train_blends_towards_targets() {
        let mut oracle = TabularOracle::new(2, 0.5);
        let samples = vec![sample(vec![7], vec![1.0, 0.0], 1.0)];
        oracle.train(&samples, &mut |_| {}).unwrap();

        let s = oracle.suggest(&[7]).unwrap();
        assert!((s.value - 0.5).abs() < 1e-6);
        assert!((s.policy[0] - 0.75).abs() < 1e-6);
        assert!((s.policy[1] - 0.25).abs() < 1e-6);

        oracle.train(&samples, &mut |_| {}).unwrap();
        let s = oracle.suggest(&[7]).unwrap();
        assert!((s.value - 0.75).abs() < 1e-6);
        assert_eq!(oracle.len(), 1);
    }

    #[test]
    fn test_progress_reports_per_chunk() {
        let mut oracle = TabularOracle::new(1, 1.0);
        let samples: Vec<TrainingData> = (0..600u32)
            .map(|i| sample(i.to_le_bytes().to_vec(), vec![1.0], 1.0))
            .collect();

        let mut reports = Vec::new();
        oracle.train(&samples, &mut |p| reports.push(p)).unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[2].processed, 600);
        assert!(reports.iter().all(|r| r.total == 600));
        // Every entry started at 0 and the target is 1
        assert_eq!(reports[0].loss, Some(1.0));
    }

    #[test]
    fn test_train_rejects_wrong_policy_length() {
        let mut oracle = TabularOracle::new(3, 0.5);
        let samples = vec![sample(vec![0], vec![1.0], 0.0)];
        assert!(matches!(
            oracle.train(&samples, &mut |_| {}),
            Err(OracleError::InvalidState(_))
        ));
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models").join("best.json");

        let mut oracle = TabularOracle::new(2, 0.3);
        oracle
            .train(
                &[
                    sample(vec![0, 1], vec![0.2, 0.8], -1.0),
                    sample(vec![1, 0], vec![0.9, 0.1], 1.0),
                ],
                &mut |_| {},
            )
            .unwrap();
        oracle.save_model(&path).unwrap();

        let mut restored = TabularOracle::new(2, 0.3);
        restored.load_model(&path).unwrap();
        assert_eq!(restored.table, oracle.table);
    }

    #[test]
    fn test_load_rejects_mismatched_action_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        TabularOracle::new(9, 0.5).save_model(&path).unwrap();

        let mut other = TabularOracle::new(4, 0.5);
        assert!(matches!(
            other.load_model(&path),
            Err(OracleError::ModelFormat(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let mut oracle = TabularOracle::new(2, 0.5);
        assert!(matches!(
            oracle.load_model(&dir.path().join("missing.json")),
            Err(OracleError::Io(_))
        ));
    }
}
