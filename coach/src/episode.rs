//! Self-play episode generation.
//!
//! One episode plays a full game against itself with a single search
//! engine, sampling each move from the root visit distribution, and labels
//! every recorded position with the final result from that position's
//! mover's point of view.

use anyhow::{bail, Result};
use engine_core::{GameOutcome, GameRules};
use mcts::{policy, MctsConfig, Oracle, SearchEngine, TrainingData};
use rand_chacha::ChaCha20Rng;
use tracing::debug;

/// Knobs for one self-play game.
#[derive(Debug, Clone)]
pub struct EpisodeSettings {
    pub mcts: MctsConfig,
    /// Temperature for moves before `temp_threshold`
    pub temperature: f32,
    /// Temperature from `temp_threshold` onwards
    pub late_temperature: f32,
    /// Ply at which the temperature drops; 0 keeps `temperature` throughout
    pub temp_threshold: u32,
    /// Hard cap on plies; reaching it ends the game as a draw
    pub max_moves: u32,
}

impl Default for EpisodeSettings {
    fn default() -> Self {
        Self {
            mcts: MctsConfig::for_training(),
            temperature: 1.0,
            late_temperature: 0.1,
            temp_threshold: 15,
            max_moves: 200,
        }
    }
}

impl EpisodeSettings {
    pub fn temperature_at(&self, moves_made: u32) -> f32 {
        if moves_made < self.temp_threshold {
            self.temperature
        } else {
            self.late_temperature
        }
    }
}

/// A finished self-play game.
#[derive(Debug, Clone)]
pub struct Episode {
    pub samples: Vec<TrainingData>,
    /// Terminal outcome from the perspective of the player who made the
    /// last move
    pub outcome: GameOutcome,
    pub moves: u32,
}

/// Play one self-play game.
pub fn run_episode<G, O>(
    game: &G,
    oracle: &O,
    settings: &EpisodeSettings,
    rng: &mut ChaCha20Rng,
) -> Result<Episode>
where
    G: GameRules + ?Sized,
    O: Oracle + ?Sized,
{
    let mut engine = SearchEngine::new(game, oracle, settings.mcts.clone());
    let mut state = game.new_state();
    let mut legal = vec![false; game.action_count()];
    let mut pending: Vec<(Vec<u8>, Vec<f32>)> = Vec::new();
    let mut moves = 0u32;

    let outcome = loop {
        if moves >= settings.max_moves {
            break GameOutcome::DrawByMoveLimit;
        }

        engine.search(&state, moves, rng)?;
        let temperature = settings.temperature_at(moves);
        let mut probs = if temperature > 0.0 {
            engine.action_probs(&state, temperature)?
        } else {
            engine.best_action_probs(&state, rng)?
        };

        game.valid_actions(&state, &mut legal);
        if !policy::mask_policy(&mut probs, &legal) {
            bail!("search left no probability on a legal action at ply {}", moves);
        }
        let action = policy::sample_action(&probs, rng)?;

        pending.push((state.clone(), probs));
        game.execute_action(&mut state, action);
        moves += 1;

        let outcome = game.game_ended(&state, moves, false);
        if outcome.is_over() {
            break outcome;
        }
        game.flip_to_next_player(&mut state);
    };

    let samples = backfill(pending, outcome);
    let stats = engine.stats();
    debug!(
        moves,
        ?outcome,
        samples = samples.len(),
        nodes = stats.nodes,
        descents = stats.descents,
        "Episode complete"
    );

    Ok(Episode {
        samples,
        outcome,
        moves,
    })
}

/// Label recorded positions with the final result.
///
/// The outcome is relative to whoever made the last move, which is the
/// mover of the final sample; each step back flips the sign once.
fn backfill(pending: Vec<(Vec<u8>, Vec<f32>)>, outcome: GameOutcome) -> Vec<TrainingData> {
    let last = pending.len();
    pending
        .into_iter()
        .enumerate()
        .map(|(i, (state, probs))| {
            let sign = if (last - 1 - i) % 2 == 0 { 1.0 } else { -1.0 };
            TrainingData::new(state, probs, outcome.value() * sign)
        })
        .collect()
}
