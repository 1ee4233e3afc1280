//! Oracle trait for position evaluation.
//!
//! The oracle provides a prior over actions and a value estimate for a
//! state. In AlphaZero this is a neural network; its internals, training
//! procedure and weight format are opaque to the search.

use std::path::Path;

use thiserror::Error;

use crate::training::TrainingData;

/// Errors that can occur inside an oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Model I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model format error: {0}")]
    ModelFormat(String),
}

/// Result of evaluating a game state.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// Non-negative weights over the full action space. Illegal actions may
    /// be non-zero; the search masks them.
    pub policy: Vec<f32>,

    /// Value estimate for the player about to move, in [-1, 1].
    pub value: f32,
}

/// Progress report emitted while training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainProgress {
    pub processed: usize,
    pub total: usize,
    /// Mean loss over the chunk just processed, when the oracle computes one
    pub loss: Option<f32>,
}

/// Policy-value predictor.
///
/// `suggest` is called concurrently from many workers. `train` and
/// `load_model` take `&mut self`; callers guarantee no inference runs while
/// they execute.
pub trait Oracle: Send + Sync {
    fn suggest(&self, state: &[u8]) -> Result<Suggestion, OracleError>;

    /// Fit the oracle to the full training buffer.
    fn train(
        &mut self,
        samples: &[TrainingData],
        progress: &mut dyn FnMut(TrainProgress),
    ) -> Result<(), OracleError>;

    fn load_model(&mut self, path: &Path) -> Result<(), OracleError>;

    fn save_model(&self, path: &Path) -> Result<(), OracleError>;
}

/// Uniform prior over the whole action space, value always 0.0.
/// Useful for testing the search without a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformOracle {
    action_count: usize,
}

impl UniformOracle {
    pub fn new(action_count: usize) -> Self {
        Self { action_count }
    }
}

impl Oracle for UniformOracle {
    fn suggest(&self, _state: &[u8]) -> Result<Suggestion, OracleError> {
        if self.action_count == 0 {
            return Err(OracleError::InvalidState("empty action space".to_string()));
        }
        let prob = 1.0 / self.action_count as f32;
        Ok(Suggestion {
            policy: vec![prob; self.action_count],
            value: 0.0,
        })
    }

    fn train(
        &mut self,
        samples: &[TrainingData],
        progress: &mut dyn FnMut(TrainProgress),
    ) -> Result<(), OracleError> {
        progress(TrainProgress {
            processed: samples.len(),
            total: samples.len(),
            loss: None,
        });
        Ok(())
    }

    fn load_model(&mut self, _path: &Path) -> Result<(), OracleError> {
        Ok(())
    }

    fn save_model(&self, _path: &Path) -> Result<(), OracleError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_oracle() {
        let oracle = UniformOracle::new(4);
        let suggestion = oracle.suggest(&[0, 0]).unwrap();
        assert_eq!(suggestion.policy, vec![0.25; 4]);
        assert_eq!(suggestion.value, 0.0);
    }

    #[test]
    fn test_uniform_oracle_empty_action_space() {
        let oracle = UniformOracle::new(0);
        assert!(matches!(
            oracle.suggest(&[]),
            Err(OracleError::InvalidState(_))
        ));
    }

    #[test]
    fn test_uniform_train_reports_completion() {
        let mut oracle = UniformOracle::new(2);
        let samples = vec![TrainingData::new(vec![0], vec![0.5, 0.5], 1.0)];
        let mut reports = Vec::new();
        oracle
            .train(&samples, &mut |p| reports.push(p))
            .unwrap();
        assert_eq!(
            reports,
            vec![TrainProgress {
                processed: 1,
                total: 1,
                loss: None
            }]
        );
    }
}
