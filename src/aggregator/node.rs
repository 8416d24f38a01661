// src/aggregator/node.rs
//! Per-node interface model and the fold that builds it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::{TrackingRules, UnregisterPolicy};
use crate::record::{CallRecord, Observation};
use crate::xmlrpc::Value;

/// How a node touched a parameter. Only ever widens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn union(self, other: Access) -> Access {
        if self == other {
            self
        } else {
            Access::ReadWrite
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "write"),
            Access::ReadWrite => write!(f, "read/write"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicEntry {
    pub msg_type: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEntry {
    /// Service URI announced at registration (type is not on the wire).
    pub api: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamEntry {
    /// Last value written by this node, if it ever wrote one.
    pub value: Option<Value>,
    pub access: Access,
    pub active: bool,
}

/// Everything observed about one node.
///
/// Collections are keyed by resource name so a repeated registration
/// refreshes an entry instead of adding one.
#[derive(Debug, Clone, Serialize)]
pub struct NodeState {
    pub name: String,
    pub publishers: BTreeMap<String, TopicEntry>,
    pub subscribers: BTreeMap<String, TopicEntry>,
    pub services_provided: BTreeMap<String, ServiceEntry>,
    pub services_used: BTreeSet<String>,
    pub parameters: BTreeMap<String, ParamEntry>,
    pub calls: u64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl NodeState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            publishers: BTreeMap::new(),
            subscribers: BTreeMap::new(),
            services_provided: BTreeMap::new(),
            services_used: BTreeSet::new(),
            parameters: BTreeMap::new(),
            calls: 0,
            first_seen: None,
            last_seen: None,
        }
    }

    /// Fold one call into this node.
    ///
    /// Never fails: arguments of the wrong shape, or resources on the ignore
    /// lists, leave the interface untouched. Returns whether the interface
    /// model was consulted (an observation could be extracted).
    pub fn accumulate(&mut self, record: &CallRecord, rules: &TrackingRules) -> bool {
        self.calls += 1;
        let at = record.received_at();
        self.first_seen.get_or_insert(at);
        self.last_seen = Some(self.last_seen.map_or(at, |seen| seen.max(at)));

        let Some(observation) = record.observation() else {
            return false;
        };
        if rules.ignore.ignores(&observation) {
            return true;
        }

        let policy = rules.unregister;
        match observation {
            Observation::Publish { topic, msg_type } => {
                upsert_topic(&mut self.publishers, topic, msg_type)
            }
            Observation::Unpublish { topic } => withdraw(&mut self.publishers, topic, policy),
            Observation::Subscribe { topic, msg_type } => {
                upsert_topic(&mut self.subscribers, topic, msg_type)
            }
            Observation::Unsubscribe { topic } => withdraw(&mut self.subscribers, topic, policy),
            Observation::ProvideService { service, api } => {
                self.services_provided.insert(
                    service.to_string(),
                    ServiceEntry {
                        api: api.to_string(),
                        active: true,
                    },
                );
            }
            Observation::WithdrawService { service } => {
                withdraw(&mut self.services_provided, service, policy)
            }
            Observation::UseService { service } => {
                self.services_used.insert(service.to_string());
            }
            Observation::SetParam { key, value } => {
                let entry = self
                    .parameters
                    .entry(key.to_string())
                    .or_insert_with(|| ParamEntry {
                        value: None,
                        access: Access::Write,
                        active: true,
                    });
                entry.value = Some(value.clone());
                entry.access = entry.access.union(Access::Write);
                entry.active = true;
            }
            Observation::ReadParam { key } => {
                let entry = self
                    .parameters
                    .entry(key.to_string())
                    .or_insert_with(|| ParamEntry {
                        value: None,
                        access: Access::Read,
                        active: true,
                    });
                entry.access = entry.access.union(Access::Read);
                entry.active = true;
            }
            Observation::DeleteParam { key } => withdraw(&mut self.parameters, key, policy),
        }
        true
    }

    /// Owned fold, for callers that treat state as a value.
    pub fn fold(mut self, record: &CallRecord, rules: &TrackingRules) -> Self {
        self.accumulate(record, rules);
        self
    }

    /// Filesystem-safe form of the node name: `/ns/talker` -> `ns_talker`.
    pub fn clean_name(&self) -> String {
        let clean = self.name.replace('/', "_");
        match clean.strip_prefix('_') {
            Some(stripped) => stripped.to_string(),
            None => clean,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
            && self.subscribers.is_empty()
            && self.services_provided.is_empty()
            && self.services_used.is_empty()
            && self.parameters.is_empty()
    }
}

fn upsert_topic(topics: &mut BTreeMap<String, TopicEntry>, topic: &str, msg_type: &str) {
    topics.insert(
        topic.to_string(),
        TopicEntry {
            msg_type: msg_type.to_string(),
            active: true,
        },
    );
}

/// Entries that can be flagged inactive under [`UnregisterPolicy::Retain`].
trait Withdrawable {
    fn deactivate(&mut self);
}

impl Withdrawable for TopicEntry {
    fn deactivate(&mut self) {
        self.active = false;
    }
}

impl Withdrawable for ServiceEntry {
    fn deactivate(&mut self) {
        self.active = false;
    }
}

impl Withdrawable for ParamEntry {
    fn deactivate(&mut self) {
        self.active = false;
    }
}

fn withdraw<T: Withdrawable>(entries: &mut BTreeMap<String, T>, name: &str, policy: UnregisterPolicy) {
    match policy {
        UnregisterPolicy::Remove => {
            entries.remove(name);
        }
        UnregisterPolicy::Retain => {
            if let Some(entry) = entries.get_mut(name) {
                entry.deactivate();
            }
        }
    }
}
