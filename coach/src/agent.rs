//! Decision-making agents for the match runner.
//!
//! Every agent answers one question: given a state (from the mover's
//! perspective), its legal-move mask and the number of plies already
//! played, which action does it take?

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use engine_core::{check_legal, legal_actions, GameRules};
use mcts::{policy, MctsConfig, Oracle, SearchEngine};
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use tracing::debug;

/// Anything that can pick a move.
pub trait Agent {
    fn pick_action(&mut self, state: &[u8], legal: &[bool], moves_made: u32) -> Result<usize>;

    fn name(&self) -> &str;
}

/// Search-backed agent.
///
/// The engine's arena lives as long as the agent, so positions reached in
/// earlier turns of the same game are reused. A temperature of 0 plays the
/// most visited move; anything higher samples from the visit distribution.
pub struct MctsAgent<'a, G: GameRules + ?Sized, O: Oracle + ?Sized> {
    name: String,
    engine: SearchEngine<'a, G, O>,
    temperature: f32,
    rng: ChaCha20Rng,
}

impl<'a, G: GameRules + ?Sized, O: Oracle + ?Sized> MctsAgent<'a, G, O> {
    pub fn new(
        name: impl Into<String>,
        game: &'a G,
        oracle: &'a O,
        config: MctsConfig,
        temperature: f32,
        rng: ChaCha20Rng,
    ) -> Self {
        Self {
            name: name.into(),
            engine: SearchEngine::new(game, oracle, config),
            temperature,
            rng,
        }
    }
}

impl<G: GameRules + ?Sized, O: Oracle + ?Sized> Agent for MctsAgent<'_, G, O> {
    fn pick_action(&mut self, state: &[u8], legal: &[bool], moves_made: u32) -> Result<usize> {
        self.engine
            .search(state, moves_made, &mut self.rng)
            .context("search failed")?;

        let probs = if self.temperature > 0.0 {
            self.engine.action_probs(state, self.temperature)?
        } else {
            self.engine.best_action_probs(state, &mut self.rng)?
        };
        let action = policy::sample_action(&probs, &mut self.rng)?;

        check_legal(legal, action)
            .with_context(|| format!("{} picked illegal action {}", self.name, action))?;
        debug!(agent = %self.name, action, moves_made, "MCTS agent moved");
        Ok(action)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Uniformly random legal move.
pub struct RandomAgent {
    rng: ChaCha20Rng,
}

impl RandomAgent {
    pub fn new(rng: ChaCha20Rng) -> Self {
        Self { rng }
    }
}

impl Agent for RandomAgent {
    fn pick_action(&mut self, _state: &[u8], legal: &[bool], _moves_made: u32) -> Result<usize> {
        let actions = legal_actions(legal);
        if actions.is_empty() {
            bail!("no legal action available");
        }
        Ok(actions[self.rng.gen_range(0..actions.len())])
    }

    fn name(&self) -> &str {
        "random"
    }
}

/// Plays a fixed list of moves in order.
pub struct ScriptedAgent {
    moves: VecDeque<usize>,
}

impl ScriptedAgent {
    pub fn new(moves: impl IntoIterator<Item = usize>) -> Self {
        Self {
            moves: moves.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.moves.len()
    }
}

impl Agent for ScriptedAgent {
    fn pick_action(&mut self, _state: &[u8], legal: &[bool], moves_made: u32) -> Result<usize> {
        let action = self
            .moves
            .pop_front()
            .ok_or_else(|| anyhow!("script exhausted at move {}", moves_made))?;
        check_legal(legal, action)
            .with_context(|| format!("scripted action {} is illegal at move {}", action, moves_made))?;
        Ok(action)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Reads action indices from `input`, writing the board and prompts to
/// `output`. Illegal or unparseable input is rejected and asked again.
pub struct HumanAgent<'a, G: GameRules + ?Sized, R: BufRead, W: Write> {
    game: &'a G,
    input: R,
    output: W,
}

impl<'a, G: GameRules + ?Sized, R: BufRead, W: Write> HumanAgent<'a, G, R, W> {
    pub fn new(game: &'a G, input: R, output: W) -> Self {
        Self {
            game,
            input,
            output,
        }
    }
}

impl<G: GameRules + ?Sized, R: BufRead, W: Write> Agent for HumanAgent<'_, G, R, W> {
    fn pick_action(&mut self, state: &[u8], legal: &[bool], moves_made: u32) -> Result<usize> {
        let actions = legal_actions(legal);
        writeln!(self.output, "\n{}", self.game.render(state))?;
        writeln!(self.output, "Move {}. Legal actions: {:?}", moves_made + 1, actions)?;

        let mut line = String::new();
        loop {
            write!(self.output, "> ")?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                bail!("input closed");
            }
            match line.trim().parse::<usize>() {
                Ok(action) if actions.contains(&action) => return Ok(action),
                Ok(action) => writeln!(self.output, "Action {} is not legal here", action)?,
                Err(_) => writeln!(self.output, "Enter one of {:?}", actions)?,
            }
        }
    }

    fn name(&self) -> &str {
        "human"
    }
}
