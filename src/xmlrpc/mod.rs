// src/xmlrpc/mod.rs
//! XML-RPC codec for the master API.

mod decode;
mod encode;
mod value;

pub use decode::{decode_call, decode_response, DecodeError, MethodCall, MethodResponse, MULTICALL};
pub use encode::{encode_call, encode_fault, encode_response, encode_value, FAULT_PARSE_ERROR};
pub use value::Value;
