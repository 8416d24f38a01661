// src/registry/filter.rs
//! Node selection for the exported snapshot.

use std::collections::BTreeSet;

/// Set of node names to document. Empty means every node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeFilter {
    names: BTreeSet<String>,
}

impl NodeFilter {
    /// Names are normalized to the global namespace: `talker` -> `/talker`.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref().trim();
                if name.starts_with('/') {
                    name.to_string()
                } else {
                    format!("/{}", name)
                }
            })
            .collect();
        Self { names }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn matches(&self, node: &str) -> bool {
        self.names.is_empty() || self.names.contains(node)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
