//! MCTS search implementation.
//!
//! Each descent walks the transposition arena from the root:
//! 1. Fetch the node for the current state and count the visit
//! 2. Unknown state: ask the oracle, then create the node with the masked
//!    priors and back up the negated value
//! 3. Known node: pick the action with the best UCB score, apply it, stop on
//!    a terminal state or flip perspective and continue
//! 4. Backpropagation walks the recorded (node, action) path newest first,
//!    negating the value at every ply

use engine_core::{GameOutcome, GameRules};
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::trace;

use crate::arena::Arena;
use crate::config::MctsConfig;
use crate::node::NodeId;
use crate::oracle::{Oracle, OracleError};
use crate::policy;

/// Errors that can occur during MCTS search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Oracle returned {actual} action probabilities, expected {expected}")]
    PolicyLength { expected: usize, actual: usize },

    #[error("No search has been run from this state")]
    UnknownRoot,

    #[error("Root has no visited actions")]
    NoVisits,

    #[error("Probability vector has no positive mass")]
    DegenerateDistribution,

    #[error("State has {actual} bytes, expected {expected}")]
    StateSize { expected: usize, actual: usize },
}

/// Counters accumulated since the engine was created or last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Descents started
    pub descents: u64,
    /// Nodes expanded with oracle priors
    pub expansions: u64,
    /// Descents that ended on a freshly reached terminal state
    pub terminal_hits: u64,
    /// Expansions where no legal action kept positive prior mass
    pub degenerate_expansions: u64,
    /// Descents that fetched a node already resolved as terminal
    pub revisited_terminals: u64,
    /// Live nodes in the arena
    pub nodes: usize,
}

/// How a descent ended and what value it backs up.
enum Leaf {
    Resolved,
    Expanded(f32),
    Degenerate,
    Terminal(GameOutcome),
    NoAction,
}

/// Search engine owning one arena.
///
/// An engine and its arena must stay on one thread; run one engine per
/// episode or evaluation round.
pub struct SearchEngine<'a, G: GameRules + ?Sized, O: Oracle + ?Sized> {
    game: &'a G,
    oracle: &'a O,
    config: MctsConfig,
    arena: Arena,
    action_count: usize,
    scratch: Vec<u8>,
    mask: Vec<bool>,
    path: Vec<(NodeId, usize)>,
    /// Noise over the root's actions, drawn once per `search` call
    root_noise: Option<Vec<f32>>,
    stats: SearchStats,
}

impl<'a, G: GameRules + ?Sized, O: Oracle + ?Sized> SearchEngine<'a, G, O> {
    pub fn new(game: &'a G, oracle: &'a O, config: MctsConfig) -> Self {
        let action_count = game.action_count();
        Self {
            game,
            oracle,
            config,
            arena: Arena::new(action_count),
            action_count,
            scratch: vec![0; game.state_size()],
            mask: vec![false; action_count],
            path: Vec::new(),
            root_noise: None,
            stats: SearchStats::default(),
        }
    }

    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn stats(&self) -> SearchStats {
        SearchStats {
            nodes: self.arena.len(),
            ..self.stats
        }
    }

    /// Clear the arena for a new search lifetime. Storage is kept.
    pub fn reset(&mut self) {
        self.arena.reset();
        self.stats = SearchStats::default();
    }

    /// Run `num_simulations` descents from `root`.
    ///
    /// `moves_made` is the number of plies already played in the real game;
    /// descents add their depth to it when asking the rules module whether a
    /// simulated position is over.
    pub fn search(
        &mut self,
        root: &[u8],
        moves_made: u32,
        rng: &mut ChaCha20Rng,
    ) -> Result<(), SearchError> {
        if root.len() != self.scratch.len() {
            return Err(SearchError::StateSize {
                expected: self.scratch.len(),
                actual: root.len(),
            });
        }

        // Expand the root up front so every descent records a root action
        let root_id = match self.arena.find(root) {
            Some(id) => id,
            None => {
                self.scratch.copy_from_slice(root);
                self.expand()?.0
            }
        };

        self.root_noise = None;
        if self.config.add_root_noise {
            let root_node = self.arena.get(root_id);
            let valid: Vec<usize> = root_node
                .actions
                .iter()
                .enumerate()
                .filter_map(|(action, stat)| stat.valid.then_some(action))
                .collect();
            if !valid.is_empty() {
                let sample =
                    policy::dirichlet_noise(valid.len(), self.config.dirichlet_alpha, rng);
                let mut noise = vec![0.0; self.action_count];
                for (&action, value) in valid.iter().zip(sample) {
                    noise[action] = value;
                }
                self.root_noise = Some(noise);
            }
        }

        for _ in 0..self.config.num_simulations {
            self.descend(root, moves_made)?;
        }
        Ok(())
    }

    /// One selection / expansion / backpropagation pass.
    fn descend(&mut self, root: &[u8], moves_made: u32) -> Result<(), SearchError> {
        self.stats.descents += 1;
        self.scratch.copy_from_slice(root);
        self.path.clear();

        let leaf = loop {
            let Some(node_id) = self.arena.find(&self.scratch) else {
                let (node_id, value) = self.expand()?;
                self.arena.get_mut(node_id).visits += 1;
                break match value {
                    Some(value) => Leaf::Expanded(value),
                    None => Leaf::Degenerate,
                };
            };
            let node = self.arena.get_mut(node_id);
            node.visits += 1;

            if node.outcome.is_over() {
                break Leaf::Resolved;
            }

            let Some(action) = self.select(node_id) else {
                break Leaf::NoAction;
            };
            self.path.push((node_id, action));
            self.game.execute_action(&mut self.scratch, action);

            let depth = self.path.len() as u32;
            let outcome = self
                .game
                .game_ended(&self.scratch, moves_made + depth, true);
            self.game.flip_to_next_player(&mut self.scratch);
            if outcome.is_over() {
                // Remember the finished state so a later search rooted on it
                // does not re-expand it. Move-limit draws depend on the path.
                if outcome != GameOutcome::DrawByMoveLimit {
                    let (terminal_id, _) = self.arena.get_or_create(&self.scratch);
                    self.arena.get_mut(terminal_id).outcome = outcome;
                }
                break Leaf::Terminal(outcome);
            }
        };

        let value = match leaf {
            Leaf::Resolved => {
                self.stats.revisited_terminals += 1;
                1.0
            }
            Leaf::Expanded(value) => -value,
            Leaf::Degenerate | Leaf::NoAction => 0.0,
            Leaf::Terminal(outcome) => {
                self.stats.terminal_hits += 1;
                outcome.value().abs()
            }
        };

        trace!(
            depth = self.path.len(),
            value = value,
            nodes = self.arena.len(),
            "MCTS descent complete"
        );

        self.backpropagate(value);
        Ok(())
    }

    /// Ask the oracle about the state in the scratch buffer, then create its
    /// node with the masked priors. The value is `None` when no legal action
    /// keeps prior mass. Nothing is added to the arena if the oracle fails.
    fn expand(&mut self) -> Result<(NodeId, Option<f32>), SearchError> {
        let suggestion = self.oracle.suggest(&self.scratch)?;
        if suggestion.policy.len() != self.action_count {
            return Err(SearchError::PolicyLength {
                expected: self.action_count,
                actual: suggestion.policy.len(),
            });
        }

        self.game.valid_actions(&self.scratch, &mut self.mask);
        let mut priors = suggestion.policy;
        let (node_id, _) = self.arena.get_or_create(&self.scratch);
        if !policy::mask_policy(&mut priors, &self.mask) {
            self.stats.degenerate_expansions += 1;
            return Ok((node_id, None));
        }

        let node = self.arena.get_mut(node_id);
        for ((stat, &prior), &legal) in node.actions.iter_mut().zip(&priors).zip(&self.mask) {
            stat.prior = prior;
            stat.valid = legal;
        }
        self.stats.expansions += 1;
        Ok((node_id, Some(suggestion.value)))
    }

    /// Legal action with the highest UCB score; first seen wins ties.
    fn select(&self, node_id: NodeId) -> Option<usize> {
        let node = self.arena.get(node_id);
        let noise = if self.path.is_empty() {
            self.root_noise.as_deref()
        } else {
            None
        };
        let epsilon = self.config.dirichlet_epsilon;

        let mut best: Option<(usize, f32)> = None;
        for (action, stat) in node.actions.iter().enumerate() {
            if !stat.valid {
                continue;
            }
            let prior = match noise {
                Some(noise) => (1.0 - epsilon) * stat.prior + epsilon * noise[action],
                None => stat.prior,
            };
            let score = stat.ucb_score(prior, node.visits, self.config.c_puct);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((action, score));
            }
        }
        best.map(|(action, _)| action)
    }

    fn backpropagate(&mut self, mut value: f32) {
        for &(node_id, action) in self.path.iter().rev() {
            self.arena.get_mut(node_id).actions[action].record(value);
            value = -value;
        }
    }

    /// Visit counts of every root action, or `None` if `root` was never
    /// searched since the last reset.
    pub fn root_visits(&self, root: &[u8]) -> Option<Vec<u32>> {
        let id = self.arena.find(root)?;
        Some(
            self.arena
                .get(id)
                .actions
                .iter()
                .map(|stat| stat.visits)
                .collect(),
        )
    }

    /// Action distribution from the root's visit counts under `temperature`.
    pub fn action_probs(&self, root: &[u8], temperature: f32) -> Result<Vec<f32>, SearchError> {
        let visits = self.root_visits(root).ok_or(SearchError::UnknownRoot)?;
        policy::visit_distribution(&visits, temperature)
    }

    /// One-hot distribution at the most visited root action.
    pub fn best_action_probs(
        &self,
        root: &[u8],
        rng: &mut ChaCha20Rng,
    ) -> Result<Vec<f32>, SearchError> {
        let visits = self.root_visits(root).ok_or(SearchError::UnknownRoot)?;
        policy::best_visit_distribution(&visits, rng)
    }
}
