// CLASSIFICATION: COMMUNITY
// Filename: registry.rs v0.2
// Author: Lukas Bower
// Date Modified: 2027-03-19

//! Hard-link registry.
//!
//! Maps host source identities (inode numbers) to the volume node that
//! already materialized them, so later names for the same inode become
//! links instead of duplicate content. Scoped to one population run and
//! passed explicitly; entries are never invalidated mid-run.

use std::collections::HashMap;

use crate::volume::NodeId;

/// Identity-to-node map for hard-link folding.
#[derive(Debug, Default)]
pub struct HardlinkRegistry {
    entries: HashMap<u64, NodeId>,
}

impl HardlinkRegistry {
    /// Empty registry for a fresh population run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Node already created for this identity, if any.
    pub fn lookup(&self, identity: u64) -> Option<NodeId> {
        self.entries.get(&identity).copied()
    }

    /// Record the node created for an identity. Called exactly once per
    /// identity, after the first name was materialized.
    pub fn record(&mut self, identity: u64, node: NodeId) {
        let prev = self.entries.insert(identity, node);
        debug_assert!(prev.is_none(), "identity {identity} recorded twice");
    }

    /// Number of identities seen so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no identity has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_after_record() {
        let mut reg = HardlinkRegistry::new();
        assert_eq!(reg.lookup(42), None);
        reg.record(42, NodeId(7));
        assert_eq!(reg.lookup(42), Some(NodeId(7)));
        assert_eq!(reg.lookup(43), None);
        assert_eq!(reg.len(), 1);
    }
}
