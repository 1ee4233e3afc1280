//! Head-to-head game between two agents.

use anyhow::{Context, Result};
use engine_core::{GameOutcome, GameRules};
use tracing::debug;

use crate::agent::Agent;

/// Result of a match, seen from the first seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    FirstWon,
    SecondWon,
    Draw,
}

/// Finished match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRecord {
    pub result: MatchResult,
    /// Plies played
    pub moves: u32,
    /// Outcome reported by the rules, from the last mover's perspective
    pub outcome: GameOutcome,
}

/// Play one game, `first` moving first, until the rules end it or
/// `max_moves` plies have been played.
///
/// A position with no legal action that the rules have not ended is scored
/// as a draw. An agent returning an illegal action is an error.
pub fn play_match<G: GameRules + ?Sized>(
    game: &G,
    first: &mut dyn Agent,
    second: &mut dyn Agent,
    max_moves: u32,
) -> Result<MatchRecord> {
    let mut state = game.new_state();
    let mut legal = vec![false; game.action_count()];
    let mut moves = 0u32;
    // 0 = first seat to move
    let mut seat = 0usize;

    let (result, outcome) = loop {
        if moves >= max_moves {
            break (MatchResult::Draw, GameOutcome::DrawByMoveLimit);
        }

        game.valid_actions(&state, &mut legal);
        if !legal.iter().any(|&l| l) {
            break (MatchResult::Draw, GameOutcome::Draw);
        }

        let agent: &mut dyn Agent = if seat == 0 { &mut *first } else { &mut *second };
        let action = agent
            .pick_action(&state, &legal, moves)
            .with_context(|| format!("{} failed to move at ply {}", agent.name(), moves))?;
        game.check_action(&state, action).with_context(|| {
            format!("{} played illegal action {} at ply {}", agent.name(), action, moves)
        })?;

        game.execute_action(&mut state, action);
        moves += 1;

        let outcome = game.game_ended(&state, moves, false);
        let mover_won = match outcome {
            GameOutcome::NotOver => {
                game.flip_to_next_player(&mut state);
                seat ^= 1;
                continue;
            }
            GameOutcome::Player1Won => true,
            GameOutcome::Player2Won => false,
            GameOutcome::Draw | GameOutcome::DrawByMoveLimit => {
                break (MatchResult::Draw, outcome);
            }
        };

        let first_won = mover_won == (seat == 0);
        break (
            if first_won {
                MatchResult::FirstWon
            } else {
                MatchResult::SecondWon
            },
            outcome,
        );
    };

    debug!(
        first = first.name(),
        second = second.name(),
        ?result,
        moves,
        "Match finished"
    );
    Ok(MatchRecord {
        result,
        moves,
        outcome,
    })
}
