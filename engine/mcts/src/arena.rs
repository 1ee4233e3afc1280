//! Transposition arena: one node per unique state, addressed by index.
//!
//! States are fingerprinted by their exact bytes, so two byte-identical
//! buffers always map to the same node. Nodes are never removed
//! individually; [`Arena::reset`] is a logical clear that keeps the backing
//! allocations for the next search lifetime.

use std::borrow::Borrow;
use std::collections::HashMap;

use crate::node::{NodeId, StateNode};

const MIN_CAPACITY: usize = 64;

/// Canonical lookup key for a state: an owned copy of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Box<[u8]>);

impl Fingerprint {
    pub fn of(state: &[u8]) -> Self {
        Self(state.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8]> for Fingerprint {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

/// Growable node storage plus fingerprint index.
#[derive(Debug)]
pub struct Arena {
    nodes: Vec<StateNode>,
    /// Live prefix of `nodes`; slots past it are kept for reuse after a reset
    live: usize,
    index: HashMap<Fingerprint, NodeId>,
    action_count: usize,
}

impl Arena {
    pub fn new(action_count: usize) -> Self {
        Self::with_capacity(action_count, MIN_CAPACITY)
    }

    pub fn with_capacity(action_count: usize, capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            live: 0,
            index: HashMap::with_capacity(capacity),
            action_count,
        }
    }

    /// Fetch the node for `state`, creating it on first sight.
    ///
    /// Returns the node index and whether it was just created. A created node
    /// has zero visits, `NotOver` status and zeroed action statistics.
    pub fn get_or_create(&mut self, state: &[u8]) -> (NodeId, bool) {
        if let Some(&id) = self.index.get(state) {
            return (id, false);
        }

        let id = NodeId(self.live as u32);
        if self.live < self.nodes.len() {
            self.nodes[self.live].clear();
        } else {
            self.grow_if_full();
            self.nodes.push(StateNode::new(self.action_count));
        }
        self.live += 1;
        self.index.insert(Fingerprint::of(state), id);
        (id, true)
    }

    /// Look up a state without creating it.
    pub fn find(&self, state: &[u8]) -> Option<NodeId> {
        self.index.get(state).copied()
    }

    /// # Panics
    ///
    /// Panics if `id` was not returned by this arena since the last reset.
    pub fn get(&self, id: NodeId) -> &StateNode {
        assert!(
            id.index() < self.live,
            "node index {} out of range (arena holds {})",
            id.0,
            self.live
        );
        &self.nodes[id.index()]
    }

    /// # Panics
    ///
    /// Panics if `id` was not returned by this arena since the last reset.
    pub fn get_mut(&mut self, id: NodeId) -> &mut StateNode {
        assert!(
            id.index() < self.live,
            "node index {} out of range (arena holds {})",
            id.0,
            self.live
        );
        &mut self.nodes[id.index()]
    }

    /// Forget every node; allocations are kept.
    pub fn reset(&mut self) {
        self.index.clear();
        self.live = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    pub fn action_count(&self) -> usize {
        self.action_count
    }

    /// Grow storage by half when full.
    fn grow_if_full(&mut self) {
        let capacity = self.nodes.capacity();
        if self.nodes.len() < capacity {
            return;
        }
        let target = (capacity + capacity / 2).max(MIN_CAPACITY);
        self.nodes.reserve_exact(target - self.nodes.len());
    }
}
