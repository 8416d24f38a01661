// src/record.rs
//! Observed master calls and the table that maps wire method names to them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::IpAddr;
use std::time::Instant;

use crate::xmlrpc::{MethodCall, Value};

/// Master API procedures that carry documentation content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Procedure {
    RegisterPublisher,
    UnregisterPublisher,
    RegisterSubscriber,
    UnregisterSubscriber,
    RegisterService,
    UnregisterService,
    LookupService,
    SetParam,
    DeleteParam,
    LookupParam,
    Other,
}

impl Procedure {
    /// Map a wire method name to its procedure.
    pub fn from_method(method: &str) -> Procedure {
        find(method).map(|p| p.procedure).unwrap_or(Procedure::Other)
    }

    pub fn is_tracked(&self) -> bool {
        *self != Procedure::Other
    }
}

/// What a single call says about its caller, borrowed from the record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation<'a> {
    Publish { topic: &'a str, msg_type: &'a str },
    Unpublish { topic: &'a str },
    Subscribe { topic: &'a str, msg_type: &'a str },
    Unsubscribe { topic: &'a str },
    ProvideService { service: &'a str, api: &'a str },
    WithdrawService { service: &'a str },
    UseService { service: &'a str },
    SetParam { key: &'a str, value: &'a Value },
    ReadParam { key: &'a str },
    DeleteParam { key: &'a str },
}

type Extractor = for<'a> fn(&'a [Value]) -> Option<Observation<'a>>;

struct TrackedMethod {
    method: &'static str,
    procedure: Procedure,
    extract: Extractor,
}

/// Tracked master methods. Argument 0 is always the caller id.
/// Adding a procedure is one entry here; nothing in the transport changes.
static TRACKED_METHODS: &[TrackedMethod] = &[
    TrackedMethod {
        method: "registerPublisher",
        procedure: Procedure::RegisterPublisher,
        extract: |args| {
            Some(Observation::Publish {
                topic: str_arg(args, 1)?,
                msg_type: str_arg(args, 2)?,
            })
        },
    },
    TrackedMethod {
        method: "unregisterPublisher",
        procedure: Procedure::UnregisterPublisher,
        extract: |args| {
            Some(Observation::Unpublish {
                topic: str_arg(args, 1)?,
            })
        },
    },
    TrackedMethod {
        method: "registerSubscriber",
        procedure: Procedure::RegisterSubscriber,
        extract: |args| {
            Some(Observation::Subscribe {
                topic: str_arg(args, 1)?,
                msg_type: str_arg(args, 2)?,
            })
        },
    },
    TrackedMethod {
        method: "unregisterSubscriber",
        procedure: Procedure::UnregisterSubscriber,
        extract: |args| {
            Some(Observation::Unsubscribe {
                topic: str_arg(args, 1)?,
            })
        },
    },
    TrackedMethod {
        method: "registerService",
        procedure: Procedure::RegisterService,
        extract: |args| {
            Some(Observation::ProvideService {
                service: str_arg(args, 1)?,
                api: str_arg(args, 2).unwrap_or_default(),
            })
        },
    },
    TrackedMethod {
        method: "unregisterService",
        procedure: Procedure::UnregisterService,
        extract: |args| {
            Some(Observation::WithdrawService {
                service: str_arg(args, 1)?,
            })
        },
    },
    TrackedMethod {
        method: "lookupService",
        procedure: Procedure::LookupService,
        extract: |args| {
            Some(Observation::UseService {
                service: str_arg(args, 1)?,
            })
        },
    },
    TrackedMethod {
        method: "setParam",
        procedure: Procedure::SetParam,
        extract: |args| {
            Some(Observation::SetParam {
                key: str_arg(args, 1)?,
                value: args.get(2)?,
            })
        },
    },
    TrackedMethod {
        method: "deleteParam",
        procedure: Procedure::DeleteParam,
        extract: |args| {
            Some(Observation::DeleteParam {
                key: str_arg(args, 1)?,
            })
        },
    },
    TrackedMethod {
        method: "getParam",
        procedure: Procedure::LookupParam,
        extract: |args| {
            Some(Observation::ReadParam {
                key: str_arg(args, 1)?,
            })
        },
    },
    TrackedMethod {
        method: "hasParam",
        procedure: Procedure::LookupParam,
        extract: |args| {
            Some(Observation::ReadParam {
                key: str_arg(args, 1)?,
            })
        },
    },
    TrackedMethod {
        method: "subscribeParam",
        procedure: Procedure::LookupParam,
        // (caller_id, caller_api, key)
        extract: |args| {
            Some(Observation::ReadParam {
                key: str_arg(args, 2)?,
            })
        },
    },
];

fn find(method: &str) -> Option<&'static TrackedMethod> {
    TRACKED_METHODS.iter().find(|m| m.method == method)
}

fn str_arg(args: &[Value], idx: usize) -> Option<&str> {
    args.get(idx).and_then(Value::as_str)
}

/// One intercepted master call.
///
/// Fields are private; a record never changes after construction.
#[derive(Debug, Clone)]
pub struct CallRecord {
    caller_id: String,
    method: String,
    procedure: Procedure,
    arguments: Vec<Value>,
    captured_at: Instant,
    received_at: DateTime<Utc>,
}

impl CallRecord {
    pub fn new(caller_id: impl Into<String>, method: impl Into<String>, arguments: Vec<Value>) -> Self {
        let method = method.into();
        Self {
            caller_id: caller_id.into(),
            procedure: Procedure::from_method(&method),
            method,
            arguments,
            captured_at: Instant::now(),
            received_at: Utc::now(),
        }
    }

    /// Build a record for a decoded call, or `None` when the method carries
    /// nothing worth documenting.
    ///
    /// The caller id is the first argument. When a client omits it the peer
    /// address stands in, without the port so it stays stable across
    /// reconnects.
    pub fn from_call(call: &MethodCall, origin: Option<IpAddr>) -> Option<Self> {
        if !Procedure::from_method(&call.method).is_tracked() {
            return None;
        }

        let caller_id = match call.params.first().and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => match origin {
                Some(ip) => format!("ip:{}", ip),
                None => "unknown".to_string(),
            },
        };

        Some(Self::new(caller_id, call.method.clone(), call.params.clone()))
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn procedure(&self) -> Procedure {
        self.procedure
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Extract the documented resource, if the arguments have the expected
    /// shape.
    pub fn observation(&self) -> Option<Observation<'_>> {
        let tracked = find(&self.method)?;
        (tracked.extract)(&self.arguments)
    }
}
