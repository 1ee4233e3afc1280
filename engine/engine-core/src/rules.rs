//! Rules-module interface consumed by the search engine and the runners.
//!
//! Game states are opaque fixed-size byte buffers that are always expressed
//! from the perspective of the player about to move. Instead of tracking a
//! side-to-move flag, callers apply an action and then ask the rules module to
//! re-express the buffer from the opponent's point of view with
//! [`GameRules::flip_to_next_player`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal status of a game state.
///
/// "Player 1" is the owner of the state buffer's perspective at the moment the
/// outcome is computed. Because outcomes are queried right after an action is
/// applied and before the perspective flip, `Player1Won` means "the player who
/// just moved won".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    #[default]
    NotOver,
    Player1Won,
    Player2Won,
    Draw,
    DrawByMoveLimit,
}

impl GameOutcome {
    /// Whether the game has finished.
    #[inline]
    pub fn is_over(self) -> bool {
        self != GameOutcome::NotOver
    }

    /// Whether the game finished without a winner.
    #[inline]
    pub fn is_draw(self) -> bool {
        matches!(self, GameOutcome::Draw | GameOutcome::DrawByMoveLimit)
    }

    /// Scalar outcome from player 1's perspective: +1 win, -1 loss, 0 otherwise.
    #[inline]
    pub fn value(self) -> f32 {
        match self {
            GameOutcome::Player1Won => 1.0,
            GameOutcome::Player2Won => -1.0,
            GameOutcome::NotOver | GameOutcome::Draw | GameOutcome::DrawByMoveLimit => 0.0,
        }
    }
}

/// Errors raised when a caller hands the rules module an unusable action.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RulesError {
    #[error("action {action} is out of range (action space has {action_count} actions)")]
    ActionOutOfRange { action: usize, action_count: usize },

    #[error("action {action} is not legal in the current state")]
    IllegalAction { action: usize },
}

/// Rules of a two-player, zero-sum, perfect-information game.
///
/// Implementations must be stateless with respect to individual games: every
/// method receives the state buffer it operates on, so one instance can be
/// shared by many concurrently running searches.
pub trait GameRules: Send + Sync + std::fmt::Debug {
    /// Registry identifier (e.g. `"tictactoe"`).
    fn env_id(&self) -> &str;

    /// Size of the fixed action space.
    fn action_count(&self) -> usize;

    /// Size of a state buffer in bytes.
    fn state_size(&self) -> usize;

    /// Write the starting position into `state`.
    fn starting_state(&self, state: &mut [u8]);

    /// Fill `mask` (length [`action_count`](Self::action_count)) with the
    /// legality of every action in `state`.
    fn valid_actions(&self, state: &[u8], mask: &mut [bool]);

    /// Terminal status of `state` after `moves_made` plies.
    ///
    /// `is_simulation` is true for positions reached inside a search descent;
    /// rules modules may apply a different move limit there than in real play.
    fn game_ended(&self, state: &[u8], moves_made: u32, is_simulation: bool) -> GameOutcome;

    /// Apply `action` for the player to move, in place.
    fn execute_action(&self, state: &mut [u8], action: usize);

    /// Re-express `state` from the other player's perspective, in place.
    fn flip_to_next_player(&self, state: &mut [u8]);

    /// Human readable rendering, used for exhibition play.
    fn render(&self, state: &[u8]) -> String {
        format!("{:?}", state)
    }

    /// Allocate a fresh buffer holding the starting position.
    fn new_state(&self) -> Vec<u8> {
        let mut state = vec![0u8; self.state_size()];
        self.starting_state(&mut state);
        state
    }

    /// Check that `action` is in range and legal in `state`.
    fn check_action(&self, state: &[u8], action: usize) -> Result<(), RulesError> {
        let action_count = self.action_count();
        if action >= action_count {
            return Err(RulesError::ActionOutOfRange {
                action,
                action_count,
            });
        }
        let mut mask = vec![false; action_count];
        self.valid_actions(state, &mut mask);
        check_legal(&mask, action)
    }
}

/// Check `action` against an already computed legality mask.
pub fn check_legal(mask: &[bool], action: usize) -> Result<(), RulesError> {
    match mask.get(action) {
        Some(true) => Ok(()),
        Some(false) => Err(RulesError::IllegalAction { action }),
        None => Err(RulesError::ActionOutOfRange {
            action,
            action_count: mask.len(),
        }),
    }
}

/// Indices of the legal actions in a mask.
pub fn legal_actions(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(action, &legal)| legal.then_some(action))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-cell game: action 0 wins on the spot, action 1 passes.
    #[derive(Debug)]
    struct Toy;

    impl GameRules for Toy {
        fn env_id(&self) -> &str {
            "toy"
        }
        fn action_count(&self) -> usize {
            2
        }
        fn state_size(&self) -> usize {
            1
        }
        fn starting_state(&self, state: &mut [u8]) {
            state[0] = 0;
        }
        fn valid_actions(&self, state: &[u8], mask: &mut [bool]) {
            mask[0] = state[0] == 0;
            mask[1] = state[0] == 0;
        }
        fn game_ended(&self, state: &[u8], _moves_made: u32, _is_simulation: bool) -> GameOutcome {
            if state[0] == 1 {
                GameOutcome::Player1Won
            } else {
                GameOutcome::NotOver
            }
        }
        fn execute_action(&self, state: &mut [u8], action: usize) {
            if action == 0 {
                state[0] = 1;
            }
        }
        fn flip_to_next_player(&self, _state: &mut [u8]) {}
    }

    #[test]
    fn test_outcome_values() {
        assert_eq!(GameOutcome::Player1Won.value(), 1.0);
        assert_eq!(GameOutcome::Player2Won.value(), -1.0);
        assert_eq!(GameOutcome::Draw.value(), 0.0);
        assert_eq!(GameOutcome::DrawByMoveLimit.value(), 0.0);
        assert_eq!(GameOutcome::NotOver.value(), 0.0);
    }

    #[test]
    fn test_outcome_predicates() {
        assert!(!GameOutcome::NotOver.is_over());
        assert!(GameOutcome::Draw.is_over());
        assert!(GameOutcome::DrawByMoveLimit.is_draw());
        assert!(!GameOutcome::Player2Won.is_draw());
        assert_eq!(GameOutcome::default(), GameOutcome::NotOver);
    }

    #[test]
    fn test_new_state_uses_starting_position() {
        let state = Toy.new_state();
        assert_eq!(state, vec![0]);
    }

    #[test]
    fn test_check_action() {
        let state = Toy.new_state();
        assert!(Toy.check_action(&state, 0).is_ok());
        assert_eq!(
            Toy.check_action(&state, 5),
            Err(RulesError::ActionOutOfRange {
                action: 5,
                action_count: 2
            })
        );

        let finished = vec![1u8];
        assert_eq!(
            Toy.check_action(&finished, 1),
            Err(RulesError::IllegalAction { action: 1 })
        );
    }

    #[test]
    fn test_check_legal_against_mask() {
        let mask = [true, false];
        assert_eq!(check_legal(&mask, 0), Ok(()));
        assert_eq!(
            check_legal(&mask, 1),
            Err(RulesError::IllegalAction { action: 1 })
        );
        assert_eq!(
            check_legal(&mask, 2),
            Err(RulesError::ActionOutOfRange {
                action: 2,
                action_count: 2
            })
        );
    }

    #[test]
    fn test_legal_actions() {
        assert_eq!(legal_actions(&[true, false, true]), vec![0, 2]);
        assert!(legal_actions(&[false, false]).is_empty());
    }
}
