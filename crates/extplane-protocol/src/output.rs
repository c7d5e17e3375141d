//! Lines sent from the ExtPlane server to the client
//!
//! # Format
//! - Greeting: `EXTPLANE`
//! - Scalar update: `u<tag> <identifier> <value> <trailing>`
//! - Array update: `u<tag> <identifier> [v1,v2,...]`
//!
//! The marker may be followed by a single space before the tag
//! (`u f sim/...` and `uf sim/...` decode the same). Array payloads may
//! contain spaces after the commas.

use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::dataref::{validate_identifier, Dataref, DatarefType, DatarefValue};
use crate::error::DecodeError;

/// Greeting line sent by the server when a client connects
pub const GREETING: &str = "EXTPLANE";

/// Leading marker of a value update line
pub const UPDATE_MARKER: char = 'u';

/// A decoded server line
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// The server greeted us
    Connected,
    /// A dataref has a new value
    ///
    /// The dataref is built fresh from the line: it carries identity only,
    /// with no accuracy and no stored value.
    ValueChanged(Dataref, DatarefValue),
}

impl Output {
    /// Decode one line (without terminator)
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        if line == GREETING {
            return Ok(Output::Connected);
        }

        match line.strip_prefix(UPDATE_MARKER) {
            Some(rest) => decode_update(rest),
            None => Err(DecodeError::UnknownPrefix(line.to_string())),
        }
    }
}

/// Decode one line; see [`Output::decode`]
pub fn decode(line: &str) -> Result<Output, DecodeError> {
    Output::decode(line)
}

fn decode_update(rest: &str) -> Result<Output, DecodeError> {
    let rest = rest.strip_prefix(' ').unwrap_or(rest);

    let (kind, remainder) = DatarefType::match_tag(rest)
        .ok_or_else(|| DecodeError::UnknownValueType(rest.to_string()))?;

    // The tag must be a whole token: `fx ...` is not a float update
    let fields = match remainder.strip_prefix(' ') {
        Some(fields) => fields,
        None if remainder.is_empty() => {
            let expected = if kind.is_array() { 2 } else { 3 };
            return Err(DecodeError::CommandMissingParts { expected, found: 0 });
        }
        None => return Err(DecodeError::UnknownValueType(rest.to_string())),
    };

    let (identifier, raw_value) = if kind.is_array() {
        let parts: Vec<&str> = fields.splitn(2, ' ').collect();
        match parts.as_slice() {
            [identifier, raw_value] => (*identifier, *raw_value),
            _ => {
                return Err(DecodeError::CommandMissingParts {
                    expected: 2,
                    found: parts.len(),
                })
            }
        }
    } else {
        let parts: Vec<&str> = fields.split(' ').collect();
        match parts.as_slice() {
            [identifier, raw_value, _trailing] => (*identifier, *raw_value),
            _ => {
                return Err(DecodeError::CommandMissingParts {
                    expected: 3,
                    found: parts.len(),
                })
            }
        }
    };

    validate_identifier(identifier)?;
    let value = parse_value(kind, raw_value)?;
    let dataref = Dataref::new(identifier, kind)?;

    Ok(Output::ValueChanged(dataref, value))
}

fn parse_value(kind: DatarefType, raw: &str) -> Result<DatarefValue, DecodeError> {
    match kind {
        DatarefType::Int => parse_scalar(raw).map(DatarefValue::Int),
        DatarefType::Float => parse_scalar(raw).map(DatarefValue::Float),
        DatarefType::Double => parse_scalar(raw).map(DatarefValue::Double),
        DatarefType::IntArray => parse_list(raw).map(DatarefValue::IntArray),
        DatarefType::FloatArray => parse_list(raw).map(DatarefValue::FloatArray),
        DatarefType::Base64 => BASE64
            .decode(raw)
            .map(DatarefValue::Bytes)
            .map_err(|_| DecodeError::InvalidValue(raw.to_string())),
    }
}

fn parse_scalar<T: FromStr>(raw: &str) -> Result<T, DecodeError> {
    raw.parse::<T>()
        .map_err(|_| DecodeError::InvalidValue(raw.to_string()))
}

/// Parse a bracketed, comma-separated list
///
/// Elements that fail to parse are dropped rather than failing the line;
/// servers pad lists with placeholders and clients keep the usable entries.
fn parse_list<T: FromStr>(raw: &str) -> Result<Vec<T>, DecodeError> {
    let inner = raw
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| DecodeError::InvalidValue(raw.to_string()))?
        .trim();

    if inner.is_empty() {
        return Ok(Vec::new());
    }

    let mut values = Vec::new();
    for element in inner.split(',') {
        match element.trim().parse::<T>() {
            Ok(v) => values.push(v),
            Err(_) => tracing::trace!("Dropping unparseable list element {:?}", element),
        }
    }
    Ok(values)
}
