//! TicTacToe rules module for the zeroloop engine
//!
//! Reference implementation of [`GameRules`]: the board is a nine byte buffer
//! expressed from the perspective of the player about to move.
//!
//! # Usage
//!
//! ```rust
//! use games_tictactoe::register_tictactoe;
//!
//! // Register the game with the global registry
//! register_tictactoe();
//!
//! let game = engine_core::create_game("tictactoe").expect("tictactoe should be registered");
//! let mut state = game.new_state();
//! game.execute_action(&mut state, 4);
//! assert!(!game.game_ended(&state, 1, false).is_over());
//! game.flip_to_next_player(&mut state);
//! ```

use std::sync::Arc;

use engine_core::{register_game, GameOutcome, GameRules};

/// Cell owned by nobody
pub const EMPTY: u8 = 0;
/// Cell owned by the player about to move
pub const MOVER: u8 = 1;
/// Cell owned by the opponent
pub const OPPONENT: u8 = 2;

const CELLS: usize = 9;

// Winning positions (rows, columns, diagonals)
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8], // rows
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8], // columns
    [0, 4, 8],
    [2, 4, 6], // diagonals
];

/// Register TicTacToe with the global game registry
///
/// Call this function once at startup to make TicTacToe available
/// via `engine_core::create_game("tictactoe")`.
pub fn register_tictactoe() {
    register_game("tictactoe".to_string(), || Arc::new(TicTacToe::new()));
}

/// TicTacToe rules
///
/// A full board ends the game after at most nine plies, so move limits are
/// off by default. They exist to exercise the real-play and simulation
/// thresholds that larger games need.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicTacToe {
    move_limit: Option<u32>,
    simulation_move_limit: Option<u32>,
}

impl TicTacToe {
    /// Create TicTacToe rules without move limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `DrawByMoveLimit` once `moves_made` reaches the given limits.
    ///
    /// `real` applies to actual play, `simulation` to positions reached
    /// inside a search descent.
    pub fn with_move_limits(mut self, real: Option<u32>, simulation: Option<u32>) -> Self {
        self.move_limit = real;
        self.simulation_move_limit = simulation;
        self
    }

    /// Owner of a completed line, if any
    fn line_owner(board: &[u8]) -> Option<u8> {
        LINES.iter().find_map(|&[a, b, c]| {
            (board[a] != EMPTY && board[a] == board[b] && board[b] == board[c]).then_some(board[a])
        })
    }
}

impl GameRules for TicTacToe {
    fn env_id(&self) -> &str {
        "tictactoe"
    }

    fn action_count(&self) -> usize {
        CELLS
    }

    fn state_size(&self) -> usize {
        CELLS
    }

    fn starting_state(&self, state: &mut [u8]) {
        state.fill(EMPTY);
    }

    fn valid_actions(&self, state: &[u8], mask: &mut [bool]) {
        let finished = Self::line_owner(state).is_some();
        for (legal, &cell) in mask.iter_mut().zip(state) {
            *legal = !finished && cell == EMPTY;
        }
    }

    fn game_ended(&self, state: &[u8], moves_made: u32, is_simulation: bool) -> GameOutcome {
        match Self::line_owner(state) {
            Some(MOVER) => return GameOutcome::Player1Won,
            Some(_) => return GameOutcome::Player2Won,
            None => {}
        }

        if state.iter().all(|&cell| cell != EMPTY) {
            return GameOutcome::Draw;
        }

        let limit = if is_simulation {
            self.simulation_move_limit
        } else {
            self.move_limit
        };
        match limit {
            Some(limit) if moves_made >= limit => GameOutcome::DrawByMoveLimit,
            _ => GameOutcome::NotOver,
        }
    }

    fn execute_action(&self, state: &mut [u8], action: usize) {
        debug_assert_eq!(state[action], EMPTY, "cell {action} is occupied");
        state[action] = MOVER;
    }

    fn flip_to_next_player(&self, state: &mut [u8]) {
        for cell in state.iter_mut() {
            *cell = match *cell {
                MOVER => OPPONENT,
                OPPONENT => MOVER,
                other => other,
            };
        }
    }

    /// Renders the mover's pieces as `X`, the opponent's as `O` and empty
    /// cells as their action index.
    fn render(&self, state: &[u8]) -> String {
        let mut out = String::with_capacity(40);
        for row in 0..3 {
            for col in 0..3 {
                let idx = row * 3 + col;
                let symbol = match state[idx] {
                    MOVER => 'X',
                    OPPONENT => 'O',
                    _ => char::from(b'0' + idx as u8),
                };
                out.push(symbol);
                if col < 2 {
                    out.push('|');
                }
            }
            if row < 2 {
                out.push_str("\n-+-+-\n");
            }
        }
        out
    }
}
