// src/registry/mod.rs
//! Process-wide store of observed nodes.

mod filter;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::aggregator::{NodeState, TrackingRules};
use crate::record::CallRecord;

pub use filter::NodeFilter;

/// Point-in-time copy of the registry, ordered by node name.
pub type Snapshot = BTreeMap<String, NodeState>;

/// Concurrent map from caller id to that node's state.
///
/// The map itself is only locked long enough to find or create a node; the
/// fold runs under the node's own mutex, so calls from different nodes never
/// wait on each other and calls from one node apply one at a time.
pub struct Registry {
    nodes: DashMap<String, Arc<Mutex<NodeState>>>,
    rules: TrackingRules,
}

impl Registry {
    pub fn new(rules: TrackingRules) -> Self {
        Self {
            nodes: DashMap::new(),
            rules,
        }
    }

    pub fn rules(&self) -> &TrackingRules {
        &self.rules
    }

    /// Fold a call into its caller's state, creating the node on first sight.
    pub fn record_call(&self, record: &CallRecord) {
        let node = self.node(record.caller_id());
        let applied = node.lock().accumulate(record, &self.rules);

        if applied {
            trace!(
                node = record.caller_id(),
                method = record.method(),
                "call recorded"
            );
        } else {
            debug!(
                node = record.caller_id(),
                method = record.method(),
                args = record.arguments().len(),
                "unexpected argument shape, interface unchanged"
            );
        }
    }

    fn node(&self, caller_id: &str) -> Arc<Mutex<NodeState>> {
        if let Some(existing) = self.nodes.get(caller_id) {
            return existing.value().clone();
        }

        // entry() holds the shard lock, so racing first calls share one state
        self.nodes
            .entry(caller_id.to_string())
            .or_insert_with(|| {
                info!(node = caller_id, "new node observed");
                Arc::new(Mutex::new(NodeState::new(caller_id)))
            })
            .value()
            .clone()
    }

    /// Copy every node matching `filter`.
    ///
    /// Each node is cloned under its lock, so a copy never contains half of a
    /// fold.
    pub fn snapshot(&self, filter: &NodeFilter) -> Snapshot {
        let handles: Vec<Arc<Mutex<NodeState>>> = self
            .nodes
            .iter()
            .filter(|entry| filter.matches(entry.key()))
            .map(|entry| entry.value().clone())
            .collect();

        handles
            .into_iter()
            .map(|node| {
                let state = node.lock().clone();
                (state.name.clone(), state)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(TrackingRules::default())
    }
}
