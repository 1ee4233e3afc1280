//! Arena node representation.
//!
//! One [`StateNode`] exists per unique state seen by a search engine. Edges
//! are not separate objects: each node carries one [`ActionStat`] per action
//! of the game's fixed action space.

use engine_core::GameOutcome;

/// Added to parent visits and to freshly seeded Q values.
pub const TINY_EPSILON: f32 = 1e-8;

/// Index into the node arena. Using a newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Statistics for one action out of one state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActionStat {
    /// Masked, renormalized oracle prior
    pub prior: f32,
    /// Times this action was taken by a descent
    pub visits: u32,
    /// Running mean of backed-up values; exactly 0.0 means "no estimate yet"
    pub q: f32,
    /// Legality in the owning state
    pub valid: bool,
}

impl ActionStat {
    /// Upper-confidence score of this action.
    ///
    /// `prior` is the effective prior (root noise already mixed in).
    /// An unset `q` scores on the exploration term alone.
    #[inline]
    pub fn ucb_score(&self, prior: f32, parent_visits: u32, c_puct: f32) -> f32 {
        if self.q == 0.0 {
            c_puct * prior * (parent_visits as f32 + TINY_EPSILON).sqrt()
        } else {
            self.q + c_puct * prior * (parent_visits as f32).sqrt() / (1.0 + self.visits as f32)
        }
    }

    /// Fold one backed-up value into the running mean.
    #[inline]
    pub fn record(&mut self, value: f32) {
        if self.q == 0.0 {
            self.q = value + TINY_EPSILON;
        } else {
            let n = self.visits as f32;
            self.q = (n * self.q + value) / (n + 1.0);
        }
        self.visits += 1;
    }
}

/// Per-state record owned by the arena.
#[derive(Debug, Clone)]
pub struct StateNode {
    /// Times a descent fetched this node
    pub visits: u32,
    /// Resolved terminal status; `NotOver` until proven otherwise
    pub outcome: GameOutcome,
    /// One entry per action of the game
    pub actions: Vec<ActionStat>,
}

impl StateNode {
    pub fn new(action_count: usize) -> Self {
        Self {
            visits: 0,
            outcome: GameOutcome::NotOver,
            actions: vec![ActionStat::default(); action_count],
        }
    }

    /// Return to the freshly created state, keeping the allocation.
    pub fn clear(&mut self) {
        self.visits = 0;
        self.outcome = GameOutcome::NotOver;
        self.actions.fill(ActionStat::default());
    }

    /// Sum of visits over all actions
    pub fn action_visits(&self) -> u32 {
        self.actions.iter().map(|stat| stat.visits).sum()
    }

    /// Whether any action is marked legal
    pub fn has_valid_action(&self) -> bool {
        self.actions.iter().any(|stat| stat.valid)
    }
}
