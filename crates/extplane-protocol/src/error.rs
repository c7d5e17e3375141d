//! Error types for ExtPlane identifier validation, decoding and command building

use thiserror::Error;

use crate::dataref::DatarefType;

/// Reasons a dataref identifier is rejected
///
/// Checked in declaration order: a string that both starts with `/` and
/// contains a `-` reports [`ValidationError::InvalidStart`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationError {
    /// Identifier starts with a `/` (empty first path segment)
    #[error("identifier must not start with '/'")]
    InvalidStart,

    /// Identifier has fewer than two `/`-separated segments
    #[error("identifier needs at least two '/'-separated segments")]
    TooShort,

    /// Identifier contains something other than letters, digits, `_` or `/`
    #[error("identifier contains characters other than letters, digits, '_' and '/'")]
    InvalidCharacters,
}

/// Errors that can occur while decoding one line of server output
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Line is neither the greeting nor a value update
    #[error("unknown prefix: {0:?}")]
    UnknownPrefix(String),

    /// Value update has the wrong number of fields
    #[error("expected {expected} fields, found {found}")]
    CommandMissingParts { expected: usize, found: usize },

    /// No known type tag follows the update marker
    #[error("unknown value type: {0:?}")]
    UnknownValueType(String),

    /// Value field cannot be parsed as the tagged type
    #[error("invalid value: {0:?}")]
    InvalidValue(String),

    /// Identifier field fails validation
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] ValidationError),
}

/// Errors raised while building datarefs and commands
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// Identifier validation error
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Decode error
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Accuracy was given for a type the server ignores it for
    #[error("accuracy is not supported for {kind} datarefs")]
    AccuracyNotSupported { kind: DatarefType },

    /// Accuracy is negative, NaN or infinite
    #[error("invalid accuracy: {0}")]
    InvalidAccuracy(f64),

    /// A value of one kind was given for a dataref of another
    #[error("value type mismatch: dataref is {expected}, value is {found}")]
    ValueTypeMismatch {
        expected: DatarefType,
        found: DatarefType,
    },
}
