//! Datarefs, their value types and identifier validation
//!
//! A dataref is a named simulator variable such as
//! `sim/flightmodel/misc/h_ind`. Its identity is the pair of identifier and
//! [`DatarefType`]; the accuracy threshold and the last known value ride along
//! but never take part in equality or hashing.

use std::fmt;
use std::hash::{Hash, Hasher};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{ProtocolError, ValidationError};

/// Value kind of a dataref, as tagged on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DatarefType {
    /// 32/64-bit integer: `i`
    Int,
    /// Single precision float: `f`
    Float,
    /// Double precision float: `d`
    Double,
    /// Integer array: `ia`
    IntArray,
    /// Float array: `fa`
    FloatArray,
    /// Raw bytes, base64 encoded on the wire: `b`
    Base64,
}

impl DatarefType {
    /// Every type, in declaration order
    pub const ALL: [DatarefType; 6] = [
        DatarefType::Int,
        DatarefType::Float,
        DatarefType::Double,
        DatarefType::IntArray,
        DatarefType::FloatArray,
        DatarefType::Base64,
    ];

    /// Wire tag following the update marker
    pub fn tag(&self) -> &'static str {
        match self {
            DatarefType::Int => "i",
            DatarefType::Float => "f",
            DatarefType::Double => "d",
            DatarefType::IntArray => "ia",
            DatarefType::FloatArray => "fa",
            DatarefType::Base64 => "b",
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            DatarefType::Int => "int",
            DatarefType::Float => "float",
            DatarefType::Double => "double",
            DatarefType::IntArray => "intArray",
            DatarefType::FloatArray => "floatArray",
            DatarefType::Base64 => "base64Blob",
        }
    }

    /// Look up a type by its exact wire tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Match the longest tag that prefixes `input`
    ///
    /// Returns the type and the input with the tag removed. Tags overlap
    /// (`i` prefixes `ia`), so every candidate is considered and the longest
    /// wins; equal lengths keep declaration order.
    pub fn match_tag(input: &str) -> Option<(Self, &str)> {
        let kind = Self::ALL
            .into_iter()
            .filter(|kind| input.starts_with(kind.tag()))
            .fold(None, |best: Option<DatarefType>, kind| match best {
                Some(best) if best.tag().len() >= kind.tag().len() => Some(best),
                _ => Some(kind),
            })?;
        Some((kind, &input[kind.tag().len()..]))
    }

    /// Whether the server honours an accuracy threshold for this type
    pub fn supports_accuracy(&self) -> bool {
        matches!(self, DatarefType::Int | DatarefType::Float | DatarefType::Double)
    }

    /// Whether values of this type are bracketed lists
    pub fn is_array(&self) -> bool {
        matches!(self, DatarefType::IntArray | DatarefType::FloatArray)
    }
}

impl fmt::Display for DatarefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed dataref value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DatarefValue {
    Int(i64),
    Float(f32),
    Double(f64),
    IntArray(Vec<i64>),
    FloatArray(Vec<f32>),
    Bytes(Vec<u8>),
}

impl DatarefValue {
    /// The dataref type this value belongs to
    pub fn kind(&self) -> DatarefType {
        match self {
            DatarefValue::Int(_) => DatarefType::Int,
            DatarefValue::Float(_) => DatarefType::Float,
            DatarefValue::Double(_) => DatarefType::Double,
            DatarefValue::IntArray(_) => DatarefType::IntArray,
            DatarefValue::FloatArray(_) => DatarefType::FloatArray,
            DatarefValue::Bytes(_) => DatarefType::Base64,
        }
    }
}

/// Formats the value the way `set` expects it on the wire
impl fmt::Display for DatarefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", item)?;
            }
            f.write_str("]")
        }

        match self {
            DatarefValue::Int(v) => write!(f, "{}", v),
            DatarefValue::Float(v) => write!(f, "{}", v),
            DatarefValue::Double(v) => write!(f, "{}", v),
            DatarefValue::IntArray(v) => list(f, v),
            DatarefValue::FloatArray(v) => list(f, v),
            DatarefValue::Bytes(v) => f.write_str(&BASE64.encode(v)),
        }
    }
}

/// Identity of a dataref: identifier plus type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DatarefId {
    pub identifier: String,
    pub kind: DatarefType,
}

impl fmt::Display for DatarefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identifier, self.kind)
    }
}

/// A simulator variable
///
/// Construction validates the identifier, so every `Dataref` in hand is
/// well-formed.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Dataref {
    id: DatarefId,
    accuracy: Option<f64>,
    value: Option<DatarefValue>,
}

impl Dataref {
    /// Create a dataref, validating its identifier
    pub fn new(identifier: impl Into<String>, kind: DatarefType) -> Result<Self, ValidationError> {
        let identifier = identifier.into();
        validate_identifier(&identifier)?;
        Ok(Self {
            id: DatarefId { identifier, kind },
            accuracy: None,
            value: None,
        })
    }

    /// Attach an accuracy threshold
    ///
    /// Only int, float and double datarefs accept one.
    pub fn with_accuracy(mut self, accuracy: f64) -> Result<Self, ProtocolError> {
        if !self.id.kind.supports_accuracy() {
            return Err(ProtocolError::AccuracyNotSupported { kind: self.id.kind });
        }
        if !accuracy.is_finite() || accuracy < 0.0 {
            return Err(ProtocolError::InvalidAccuracy(accuracy));
        }
        self.accuracy = Some(accuracy);
        Ok(self)
    }

    pub fn identifier(&self) -> &str {
        &self.id.identifier
    }

    pub fn kind(&self) -> DatarefType {
        self.id.kind
    }

    pub fn id(&self) -> &DatarefId {
        &self.id
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.accuracy
    }

    /// Last known value, `None` until the first update arrives
    pub fn value(&self) -> Option<&DatarefValue> {
        self.value.as_ref()
    }

    /// Store a new value, rejecting one of the wrong kind
    pub fn set_value(&mut self, value: DatarefValue) -> Result<(), ProtocolError> {
        if value.kind() != self.id.kind {
            return Err(ProtocolError::ValueTypeMismatch {
                expected: self.id.kind,
                found: value.kind(),
            });
        }
        self.value = Some(value);
        Ok(())
    }
}

impl PartialEq for Dataref {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Dataref {}

impl Hash for Dataref {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Dataref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

/// Check an identifier against the dataref grammar
///
/// Valid identifiers do not start with `/`, have at least two
/// `/`-separated segments, and contain only letters, decimal digits,
/// `_` and `/`.
pub fn validate_identifier(identifier: &str) -> Result<(), ValidationError> {
    if identifier.starts_with('/') {
        return Err(ValidationError::InvalidStart);
    }

    if identifier.split('/').count() < 2 {
        return Err(ValidationError::TooShort);
    }

    let valid = identifier
        .chars()
        .all(|c| c.is_alphabetic() || c.is_ascii_digit() || c == '_' || c == '/');
    if !valid {
        return Err(ValidationError::InvalidCharacters);
    }

    Ok(())
}
