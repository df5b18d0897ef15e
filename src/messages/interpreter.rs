use thiserror::Error;

use crate::{
    messages::value::Value,
    types::EntityId,
};

/// Errors that can occur while unpacking a wire payload into a [`Value`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpretError {
    /// The payload carried no bytes at all
    #[error("Packed value is empty")]
    EmptyPayload,

    /// The leading tag byte does not name a known value kind
    #[error("Unknown value tag {tag} in packed value")]
    UnknownTag { tag: u8 },

    /// The payload ended before the announced content did
    #[error("Packed value truncated: needed {needed} more bytes")]
    Truncated { needed: usize },

    /// A packed string was not valid utf-8
    #[error("Packed string is not valid utf-8")]
    InvalidUtf8,
}

/// The pluggable value encode/decode seam. Entity references and asset
/// references pass through here, so an implementation may resolve or inject
/// handles while packing/unpacking.
pub trait ValueInterpreter {
    fn pack(&self, value: &Value) -> Vec<u8>;
    fn unpack(&self, payload: &[u8]) -> Result<Value, InterpretError>;
}

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_BYTES: u8 = 5;
const TAG_ENTITY: u8 = 6;
const TAG_ASSET: u8 = 7;

/// Default interpreter: one tag byte followed by a little-endian payload.
/// Strings and byte blobs are length-prefixed with a u32.
pub struct BasicInterpreter;

impl ValueInterpreter for BasicInterpreter {
    fn pack(&self, value: &Value) -> Vec<u8> {
        match value {
            Value::Null => vec![TAG_NULL],
            Value::Bool(b) => vec![TAG_BOOL, *b as u8],
            Value::Int(i) => {
                let mut out = vec![TAG_INT];
                out.extend_from_slice(&i.to_le_bytes());
                out
            }
            Value::Float(f) => {
                let mut out = vec![TAG_FLOAT];
                out.extend_from_slice(&f.to_le_bytes());
                out
            }
            Value::Str(s) => pack_blob(TAG_STR, s.as_bytes()),
            Value::Bytes(b) => pack_blob(TAG_BYTES, b),
            Value::Entity(entity) => {
                let mut out = vec![TAG_ENTITY];
                out.extend_from_slice(&entity.value().to_le_bytes());
                out
            }
            Value::Asset(path) => pack_blob(TAG_ASSET, path.as_bytes()),
        }
    }

    fn unpack(&self, payload: &[u8]) -> Result<Value, InterpretError> {
        let (&tag, rest) = payload.split_first().ok_or(InterpretError::EmptyPayload)?;
        match tag {
            TAG_NULL => Ok(Value::Null),
            TAG_BOOL => {
                let bytes: [u8; 1] = take(rest)?;
                Ok(Value::Bool(bytes[0] != 0))
            }
            TAG_INT => Ok(Value::Int(i64::from_le_bytes(take(rest)?))),
            TAG_FLOAT => Ok(Value::Float(f64::from_le_bytes(take(rest)?))),
            TAG_STR => {
                let blob = unpack_blob(rest)?;
                let text =
                    String::from_utf8(blob).map_err(|_| InterpretError::InvalidUtf8)?;
                Ok(Value::Str(text))
            }
            TAG_BYTES => Ok(Value::Bytes(unpack_blob(rest)?)),
            TAG_ENTITY => {
                let bytes: [u8; 2] = take(rest)?;
                Ok(Value::Entity(EntityId::new(u16::from_le_bytes(bytes))))
            }
            TAG_ASSET => {
                let blob = unpack_blob(rest)?;
                let path =
                    String::from_utf8(blob).map_err(|_| InterpretError::InvalidUtf8)?;
                Ok(Value::Asset(path))
            }
            tag => Err(InterpretError::UnknownTag { tag }),
        }
    }
}

fn pack_blob(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(content);
    out
}

fn unpack_blob(payload: &[u8]) -> Result<Vec<u8>, InterpretError> {
    let length_bytes: [u8; 4] = take(payload)?;
    let length = u32::from_le_bytes(length_bytes) as usize;
    let content = &payload[4..];
    if content.len() < length {
        return Err(InterpretError::Truncated {
            needed: length - content.len(),
        });
    }
    Ok(content[..length].to_vec())
}

fn take<const N: usize>(payload: &[u8]) -> Result<[u8; N], InterpretError> {
    if payload.len() < N {
        return Err(InterpretError::Truncated {
            needed: N - payload.len(),
        });
    }
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&payload[..N]);
    Ok(bytes)
}
