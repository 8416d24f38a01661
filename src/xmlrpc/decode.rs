// src/xmlrpc/decode.rs
//! `methodCall` / `methodResponse` decoding on top of roxmltree.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use roxmltree::{Document, Node};
use std::collections::BTreeMap;
use std::fmt;

use super::Value;

/// Method name used by clients that batch calls (roslaunch does this).
pub const MULTICALL: &str = "system.multicall";

#[derive(Debug)]
pub enum DecodeError {
    Utf8(String),
    Xml(String),
    Malformed(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Utf8(e) => write!(f, "body is not valid UTF-8: {}", e),
            DecodeError::Xml(e) => write!(f, "invalid XML: {}", e),
            DecodeError::Malformed(e) => write!(f, "malformed XML-RPC: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {}

/// A decoded procedure call.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub params: Vec<Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Expand a `system.multicall` into its inner calls.
    ///
    /// Any other call is returned as the single element. Inner entries that
    /// do not have the `{methodName, params}` shape are dropped.
    pub fn flatten(self) -> Vec<MethodCall> {
        if self.method != MULTICALL {
            return vec![self];
        }

        let Some(entries) = self.params.first().and_then(Value::as_array) else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| {
                let members = entry.as_struct()?;
                let method = members.get("methodName")?.as_str()?;
                let params = members
                    .get("params")
                    .and_then(Value::as_array)
                    .map(<[Value]>::to_vec)
                    .unwrap_or_default();
                Some(MethodCall::new(method, params))
            })
            .collect()
    }
}

/// A decoded `methodResponse`.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(Value),
    Fault { code: i64, message: String },
}

pub fn decode_call(body: &[u8]) -> Result<MethodCall, DecodeError> {
    let text = std::str::from_utf8(body).map_err(|e| DecodeError::Utf8(e.to_string()))?;
    let doc = Document::parse(text).map_err(|e| DecodeError::Xml(e.to_string()))?;
    let root = doc.root_element();

    if root.tag_name().name() != "methodCall" {
        return Err(DecodeError::Malformed(format!(
            "expected <methodCall>, found <{}>",
            root.tag_name().name()
        )));
    }

    let method = child(root, "methodName")
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| DecodeError::Malformed("missing <methodName>".to_string()))?;

    let params = match child(root, "params") {
        Some(params) => parse_params(params),
        None => Vec::new(),
    };

    Ok(MethodCall::new(method, params))
}

pub fn decode_response(body: &[u8]) -> Result<MethodResponse, DecodeError> {
    let text = std::str::from_utf8(body).map_err(|e| DecodeError::Utf8(e.to_string()))?;
    let doc = Document::parse(text).map_err(|e| DecodeError::Xml(e.to_string()))?;
    let root = doc.root_element();

    if root.tag_name().name() != "methodResponse" {
        return Err(DecodeError::Malformed(format!(
            "expected <methodResponse>, found <{}>",
            root.tag_name().name()
        )));
    }

    if let Some(fault) = child(root, "fault") {
        let value = child(fault, "value")
            .ok_or_else(|| DecodeError::Malformed("<fault> without <value>".to_string()))?;
        let value = parse_value(value);
        let members = value
            .as_struct()
            .ok_or_else(|| DecodeError::Malformed("fault value is not a struct".to_string()))?;
        let code = match members.get("faultCode") {
            Some(Value::Int(code)) => *code,
            _ => 0,
        };
        let message = members
            .get("faultString")
            .map(Value::to_string)
            .unwrap_or_default();
        return Ok(MethodResponse::Fault { code, message });
    }

    let params = child(root, "params")
        .ok_or_else(|| DecodeError::Malformed("missing <params> or <fault>".to_string()))?;
    let value = parse_params(params)
        .into_iter()
        .next()
        .ok_or_else(|| DecodeError::Malformed("response carries no value".to_string()))?;

    Ok(MethodResponse::Success(value))
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    elements(node).find(|n| n.tag_name().name() == name)
}

fn parse_params(params: Node) -> Vec<Value> {
    elements(params)
        .filter(|n| n.tag_name().name() == "param")
        .map(|param| child(param, "value").map(parse_value).unwrap_or(Value::Nil))
        .collect()
}

/// Decode one `<value>`.
///
/// Never fails: the master accepts values this model has no type for, so a
/// scalar that does not parse is kept as `Value::Other` and the call still
/// goes through.
fn parse_value(value: Node) -> Value {
    // An untyped <value> is a string
    let Some(typed) = elements(value).next() else {
        return Value::String(value.text().unwrap_or_default().to_string());
    };

    let tag = typed.tag_name().name();
    let text = typed.text().unwrap_or_default();
    let other = || Value::Other {
        tag: tag.to_string(),
        text: text.to_string(),
    };

    match tag {
        "i4" | "int" | "i8" => text.trim().parse::<i64>().map(Value::Int).unwrap_or_else(|_| other()),
        "boolean" => match text.trim() {
            "1" | "true" => Value::Bool(true),
            "0" | "false" => Value::Bool(false),
            _ => other(),
        },
        "string" => Value::String(text.to_string()),
        "double" => text.trim().parse::<f64>().map(Value::Double).unwrap_or_else(|_| other()),
        "dateTime.iso8601" => Value::DateTime(text.trim().to_string()),
        "base64" => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD
                .decode(compact.as_bytes())
                .map(Value::Base64)
                .unwrap_or_else(|_| other())
        }
        "nil" => Value::Nil,
        "array" => {
            let items: Vec<Value> = child(typed, "data")
                .map(|data| {
                    elements(data)
                        .filter(|n| n.tag_name().name() == "value")
                        .map(parse_value)
                        .collect()
                })
                .unwrap_or_default();
            Value::Array(items)
        }
        "struct" => {
            let members = elements(typed)
                .filter(|n| n.tag_name().name() == "member")
                .map(|member| {
                    let name = child(member, "name")
                        .and_then(|n| n.text())
                        .unwrap_or_default()
                        .to_string();
                    let value = child(member, "value").map(parse_value).unwrap_or(Value::Nil);
                    (name, value)
                })
                .collect::<BTreeMap<_, _>>();
            Value::Struct(members)
        }
        _ => other(),
    }
}
