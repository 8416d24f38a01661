// src/export/markdown.rs
//! Markdown line model for node pages and the index.

use std::collections::BTreeMap;

use crate::aggregator::NodeState;
use crate::registry::Snapshot;

/// Placeholder left for the author to fill in.
pub const TODO_DESC: &str = "TODO: description";

const INACTIVE: &str = " (unregistered)";

/// Lines of a single node page.
pub fn node_page(node: &NodeState) -> Vec<String> {
    let mut lines = vec![format!("# The {} node", node.name), String::new()];

    lines.push("## Parameters:".to_string());
    for (key, param) in &node.parameters {
        let value = param
            .value
            .as_ref()
            .map(|v| format!(" = {}", v))
            .unwrap_or_default();
        lines.push(format!(
            "- {} [{}]{}{} -- {}",
            private_name(&node.name, key),
            param.access,
            value,
            inactive(param.active),
            TODO_DESC
        ));
    }

    lines.extend([String::new(), "## Services:".to_string()]);
    for (name, service) in &node.services_provided {
        lines.push(format!(
            "- {} [{}]{} -- {}",
            private_name(&node.name, name),
            if service.api.is_empty() { "UNKNOWN" } else { service.api.as_str() },
            inactive(service.active),
            TODO_DESC
        ));
    }

    lines.extend([String::new(), "## Services used:".to_string()]);
    for name in &node.services_used {
        lines.push(format!("- {} -- {}", private_name(&node.name, name), TODO_DESC));
    }

    lines.extend([String::new(), "## Subscribers:".to_string()]);
    for (topic, entry) in &node.subscribers {
        lines.push(format!(
            "- {} [{}]{} -- {}",
            private_name(&node.name, topic),
            entry.msg_type,
            inactive(entry.active),
            TODO_DESC
        ));
    }

    lines.extend([String::new(), "## Publishers:".to_string()]);
    for (topic, entry) in &node.publishers {
        lines.push(format!(
            "- {} [{}]{} -- {}",
            private_name(&node.name, topic),
            entry.msg_type,
            inactive(entry.active),
            TODO_DESC
        ));
    }

    lines
}

/// Lines of the index page; links point at `<stem>.<extension>`, using the
/// node's clean name when `stems` has no entry for it.
pub fn index_page(
    snapshot: &Snapshot,
    stems: &BTreeMap<String, String>,
    extension: &str,
) -> Vec<String> {
    let mut lines = vec![
        "# ROS system documentation".to_string(),
        String::new(),
        "## Nodes".to_string(),
        String::new(),
    ];
    for node in snapshot.values() {
        let stem = stems
            .get(&node.name)
            .cloned()
            .unwrap_or_else(|| node.clean_name());
        lines.push(format!("- [{}]({}.{})", node.name, stem, extension));
    }
    lines
}

/// Show names inside the node's private namespace as `~name`.
fn private_name(node: &str, name: &str) -> String {
    match name.strip_prefix(node).and_then(|rest| rest.strip_prefix('/')) {
        Some(rest) => format!("~{}", rest),
        None => name.to_string(),
    }
}

fn inactive(active: bool) -> &'static str {
    if active {
        ""
    } else {
        INACTIVE
    }
}
