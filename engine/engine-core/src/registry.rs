//! Static game registry for compile-time game registration
//!
//! Games register a factory under their env_id once at startup; the
//! orchestrator and the binaries look rules modules up by the configured
//! env_id at runtime.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::rules::GameRules;

/// Factory function type for creating rules instances
pub type GameFactory = fn() -> Arc<dyn GameRules>;

/// Thread-safe registry mapping env_id to game factory functions
static REGISTRY: Lazy<Mutex<HashMap<String, GameFactory>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// The registry only holds plain function pointers, so a poisoned lock
/// cannot leave it half-updated.
fn registry() -> MutexGuard<'static, HashMap<String, GameFactory>> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Register a game with the global registry
///
/// Registering the same env_id twice replaces the earlier factory.
///
/// # Example
///
/// ```rust
/// # use std::sync::Arc;
/// # use engine_core::{register_game, GameOutcome, GameRules};
/// #[derive(Debug)]
/// struct Nim;
///
/// impl GameRules for Nim {
///     fn env_id(&self) -> &str { "nim" }
///     fn action_count(&self) -> usize { 3 }
///     fn state_size(&self) -> usize { 1 }
///     fn starting_state(&self, state: &mut [u8]) { state[0] = 10; }
///     fn valid_actions(&self, state: &[u8], mask: &mut [bool]) {
///         for (take, legal) in mask.iter_mut().enumerate() {
///             *legal = usize::from(state[0]) > take;
///         }
///     }
///     fn game_ended(&self, state: &[u8], _moves: u32, _sim: bool) -> GameOutcome {
///         if state[0] == 0 { GameOutcome::Player1Won } else { GameOutcome::NotOver }
///     }
///     fn execute_action(&self, state: &mut [u8], action: usize) { state[0] -= action as u8 + 1; }
///     fn flip_to_next_player(&self, _state: &mut [u8]) {}
/// }
///
/// fn nim_factory() -> Arc<dyn GameRules> {
///     Arc::new(Nim)
/// }
///
/// register_game("nim".to_string(), nim_factory);
/// ```
pub fn register_game(env_id: String, factory: GameFactory) {
    let mut registry = registry();
    if registry.contains_key(&env_id) {
        warn!(env_id = %env_id, "Overriding existing game registration");
    }
    registry.insert(env_id, factory);
}

/// Create a new rules instance by env_id
///
/// Returns `None` (and logs a warning) if the env_id is not registered.
pub fn create_game(env_id: &str) -> Option<Arc<dyn GameRules>> {
    let registry = registry();
    match registry.get(env_id) {
        Some(factory) => Some(factory()),
        None => {
            warn!(env_id = %env_id, "Attempted to create unregistered game");
            None
        }
    }
}

/// Get list of all registered environment IDs
pub fn list_registered_games() -> Vec<String> {
    registry().keys().cloned().collect()
}

/// Check if a game is registered
pub fn is_registered(env_id: &str) -> bool {
    registry().contains_key(env_id)
}

/// Clear all registered games (mainly for testing)
pub fn clear_registry() {
    registry().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::GameOutcome;
    use crate::test_utils::REGISTRY_TEST_MUTEX;

    // Counter game: actions add 1..=n, ends at 10
    #[derive(Debug)]
    struct TestGame {
        name: &'static str,
        actions: usize,
    }

    impl GameRules for TestGame {
        fn env_id(&self) -> &str {
            self.name
        }

        fn action_count(&self) -> usize {
            self.actions
        }

        fn state_size(&self) -> usize {
            1
        }

        fn starting_state(&self, state: &mut [u8]) {
            state[0] = 0;
        }

        fn valid_actions(&self, _state: &[u8], mask: &mut [bool]) {
            mask.fill(true);
        }

        fn game_ended(&self, state: &[u8], _moves_made: u32, _is_simulation: bool) -> GameOutcome {
            if state[0] >= 10 {
                GameOutcome::Player1Won
            } else {
                GameOutcome::NotOver
            }
        }

        fn execute_action(&self, state: &mut [u8], action: usize) {
            state[0] = state[0].saturating_add(action as u8 + 1);
        }

        fn flip_to_next_player(&self, _state: &mut [u8]) {}
    }

    #[test]
    fn test_register_and_create_game() {
        let _guard = REGISTRY_TEST_MUTEX.lock().unwrap();
        clear_registry();

        fn test_factory() -> Arc<dyn GameRules> {
            Arc::new(TestGame {
                name: "test_game",
                actions: 4,
            })
        }

        register_game("test_game".to_string(), test_factory);

        let game = create_game("test_game");
        assert!(game.is_some());

        let game = game.unwrap();
        assert_eq!(game.env_id(), "test_game");
        assert_eq!(game.action_count(), 4);
    }

    #[test]
    fn test_create_nonexistent_game() {
        let _guard = REGISTRY_TEST_MUTEX.lock().unwrap();
        clear_registry();

        let game = create_game("nonexistent");
        assert!(game.is_none());
    }

    #[test]
    fn test_list_registered_games() {
        let _guard = REGISTRY_TEST_MUTEX.lock().unwrap();
        clear_registry();

        fn factory1() -> Arc<dyn GameRules> {
            Arc::new(TestGame {
                name: "game1",
                actions: 2,
            })
        }
        fn factory2() -> Arc<dyn GameRules> {
            Arc::new(TestGame {
                name: "game2",
                actions: 3,
            })
        }

        register_game("game1".to_string(), factory1);
        register_game("game2".to_string(), factory2);

        let mut games = list_registered_games();
        games.sort();

        assert_eq!(games, vec!["game1".to_string(), "game2".to_string()]);
    }

    #[test]
    fn test_is_registered() {
        let _guard = REGISTRY_TEST_MUTEX.lock().unwrap();
        clear_registry();

        fn factory() -> Arc<dyn GameRules> {
            Arc::new(TestGame {
                name: "registered_game",
                actions: 2,
            })
        }

        assert!(!is_registered("registered_game"));

        register_game("registered_game".to_string(), factory);
        assert!(is_registered("registered_game"));
        assert!(!is_registered("unregistered_game"));
    }

    #[test]
    fn test_clear_registry() {
        let _guard = REGISTRY_TEST_MUTEX.lock().unwrap();
        clear_registry();

        fn factory() -> Arc<dyn GameRules> {
            Arc::new(TestGame {
                name: "temp_game",
                actions: 2,
            })
        }

        register_game("temp_game".to_string(), factory);
        assert!(is_registered("temp_game"));

        clear_registry();
        assert!(!is_registered("temp_game"));
        assert!(list_registered_games().is_empty());
    }

    #[test]
    fn test_register_game_overrides_existing_factory() {
        let _guard = REGISTRY_TEST_MUTEX.lock().unwrap();
        clear_registry();

        fn factory_old() -> Arc<dyn GameRules> {
            Arc::new(TestGame {
                name: "override_env",
                actions: 2,
            })
        }

        fn factory_new() -> Arc<dyn GameRules> {
            Arc::new(TestGame {
                name: "override_env",
                actions: 7,
            })
        }

        register_game("override_env".to_string(), factory_old);
        let initial = create_game("override_env").expect("initial factory should produce a game");
        assert_eq!(initial.action_count(), 2);

        register_game("override_env".to_string(), factory_new);
        let updated =
            create_game("override_env").expect("overridden factory should still produce a game");
        assert_eq!(updated.action_count(), 7);

        let registered = list_registered_games();
        assert_eq!(registered, vec!["override_env".to_string()]);
    }

    #[test]
    fn test_created_game_plays_to_completion() {
        let _guard = REGISTRY_TEST_MUTEX.lock().unwrap();
        clear_registry();

        fn factory() -> Arc<dyn GameRules> {
            Arc::new(TestGame {
                name: "counter",
                actions: 3,
            })
        }
        register_game("counter".to_string(), factory);

        let game = create_game("counter").unwrap();
        let mut state = game.new_state();
        let mut moves = 0;
        while !game.game_ended(&state, moves, false).is_over() {
            game.execute_action(&mut state, 2);
            moves += 1;
        }
        assert_eq!(moves, 4);
        assert_eq!(game.game_ended(&state, moves, false), GameOutcome::Player1Won);
    }
}
