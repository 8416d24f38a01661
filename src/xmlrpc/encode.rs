// src/xmlrpc/encode.rs
//! Minimal XML-RPC encoder.
//!
//! Forwarded traffic is never re-encoded; this is only used for the proxy's
//! own faults and for calls the proxy originates (the startup `getPid` check).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt::Write as _;

use super::Value;

/// Standard XML-RPC fault codes (xmlrpc-epi interoperability list).
pub const FAULT_PARSE_ERROR: i64 = -32700;

pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall>\n<methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName>\n<params>\n");
    for param in params {
        out.push_str("<param>");
        encode_value(&mut out, param);
        out.push_str("</param>\n");
    }
    out.push_str("</params>\n</methodCall>\n");
    out
}

pub fn encode_response(value: &Value) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodResponse>\n<params>\n<param>");
    encode_value(&mut out, value);
    out.push_str("</param>\n</params>\n</methodResponse>\n");
    out
}

pub fn encode_fault(code: i64, message: &str) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodResponse>\n<fault>\n");
    out.push_str("<value><struct>");
    out.push_str("<member><name>faultCode</name>");
    encode_value(&mut out, &Value::Int(code));
    out.push_str("</member><member><name>faultString</name>");
    encode_value(&mut out, &Value::String(message.to_string()));
    out.push_str("</member></struct></value>\n</fault>\n</methodResponse>\n");
    out
}

pub fn encode_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Int(n) => {
            if i32::try_from(*n).is_ok() {
                let _ = write!(out, "<int>{}</int>", n);
            } else {
                let _ = write!(out, "<i8>{}</i8>", n);
            }
        }
        Value::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        Value::String(s) => {
            let _ = write!(out, "<string>{}</string>", escape(s));
        }
        Value::Double(d) => {
            let _ = write!(out, "<double>{}</double>", d);
        }
        Value::DateTime(s) => {
            let _ = write!(out, "<dateTime.iso8601>{}</dateTime.iso8601>", escape(s));
        }
        Value::Base64(bytes) => {
            let _ = write!(out, "<base64>{}</base64>", STANDARD.encode(bytes));
        }
        Value::Nil => out.push_str("<nil/>"),
        Value::Other { tag, text } => {
            let _ = write!(out, "<{}>{}</{}>", tag, escape(text), tag);
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                let _ = write!(out, "<member><name>{}</name>", escape(name));
                encode_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
