// src/aggregator/mod.rs
//! Folding observed calls into per-node interface descriptions.

mod node;

use serde::{Deserialize, Serialize};

use crate::record::Observation;

pub use node::{Access, NodeState, ParamEntry, ServiceEntry, TopicEntry};

/// What an unregister call does to the documented interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UnregisterPolicy {
    /// Drop the entry; docs show the interface registered at shutdown.
    #[default]
    Remove,
    /// Keep the entry flagged inactive; docs show everything ever used.
    Retain,
}

/// Resources that are never documented.
///
/// The defaults are the ones every node touches through the client library.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreRules {
    pub published_topics: Vec<String>,
    pub subscribed_topics: Vec<String>,
    pub services: Vec<String>,
    pub parameters: Vec<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            published_topics: vec!["/rosout".to_string()],
            subscribed_topics: Vec::new(),
            services: Vec::new(),
            parameters: vec!["/tcp_keepalive".to_string(), "/use_sim_time".to_string()],
        }
    }
}

impl IgnoreRules {
    /// Document everything.
    pub fn none() -> Self {
        Self {
            published_topics: Vec::new(),
            subscribed_topics: Vec::new(),
            services: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn ignores(&self, observation: &Observation<'_>) -> bool {
        let (list, name) = match observation {
            Observation::Publish { topic, .. } | Observation::Unpublish { topic } => {
                (&self.published_topics, *topic)
            }
            Observation::Subscribe { topic, .. } | Observation::Unsubscribe { topic } => {
                (&self.subscribed_topics, *topic)
            }
            Observation::ProvideService { service, .. }
            | Observation::WithdrawService { service }
            | Observation::UseService { service } => (&self.services, *service),
            Observation::SetParam { key, .. }
            | Observation::ReadParam { key }
            | Observation::DeleteParam { key } => (&self.parameters, *key),
        };
        list.iter().any(|ignored| ignored == name)
    }
}

/// Settings that shape the fold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackingRules {
    pub unregister: UnregisterPolicy,
    pub ignore: IgnoreRules,
}
