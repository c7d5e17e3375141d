//! Commands sent from the client to the ExtPlane server
//!
//! Each command encodes to exactly one ASCII line without a terminator;
//! framing is left to [`crate::codec::frame_line`].

use crate::dataref::{Dataref, DatarefType, DatarefValue};
use crate::error::ProtocolError;

/// `extplane-set` key controlling how often the server pushes updates
pub const UPDATE_INTERVAL_SETTING: &str = "update_interval";

/// Update interval presets for the `update_interval` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UpdateInterval {
    Hz60,
    #[default]
    Hz30,
    Hz10,
}

impl UpdateInterval {
    /// Value sent with `extplane-set update_interval`
    pub fn wire_value(&self) -> &'static str {
        match self {
            UpdateInterval::Hz60 => "0.6",
            UpdateInterval::Hz30 => "0.33",
            UpdateInterval::Hz10 => "0.1",
        }
    }
}

/// A client-to-server command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `sub <identifier> [accuracy]`
    Subscribe(Dataref),
    /// `unsub <identifier>`
    Unsubscribe(Dataref),
    /// `set <identifier> <value>`
    SetValue { dataref: Dataref, value: DatarefValue },
    /// `key <id>`
    KeyTap(String),
    /// `but <id>`
    ButtonPress(String),
    /// `rel <id>`
    ButtonRelease(String),
    /// `cmd once <name>`
    CommandOnce(String),
    /// `cmd begin <name>`
    CommandBegin(String),
    /// `cmd end <name>`
    CommandEnd(String),
    /// `extplane-set <key> <value>`
    ChangeSetting { key: String, value: String },
    /// `disconnect`
    Disconnect,
}

impl Command {
    pub fn subscribe(dataref: Dataref) -> Self {
        Command::Subscribe(dataref)
    }

    pub fn unsubscribe(dataref: Dataref) -> Self {
        Command::Unsubscribe(dataref)
    }

    /// Build a `set` command, rejecting a value of the wrong kind
    pub fn set_value(dataref: Dataref, value: DatarefValue) -> Result<Self, ProtocolError> {
        if value.kind() != dataref.kind() {
            return Err(ProtocolError::ValueTypeMismatch {
                expected: dataref.kind(),
                found: value.kind(),
            });
        }
        Ok(Command::SetValue { dataref, value })
    }

    pub fn key_tap(id: impl Into<String>) -> Self {
        Command::KeyTap(id.into())
    }

    pub fn button_press(id: impl Into<String>) -> Self {
        Command::ButtonPress(id.into())
    }

    pub fn button_release(id: impl Into<String>) -> Self {
        Command::ButtonRelease(id.into())
    }

    pub fn command_once(name: impl Into<String>) -> Self {
        Command::CommandOnce(name.into())
    }

    pub fn command_begin(name: impl Into<String>) -> Self {
        Command::CommandBegin(name.into())
    }

    pub fn command_end(name: impl Into<String>) -> Self {
        Command::CommandEnd(name.into())
    }

    pub fn change_setting(key: impl Into<String>, value: impl Into<String>) -> Self {
        Command::ChangeSetting {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `extplane-set update_interval <value>`
    pub fn update_interval(interval: UpdateInterval) -> Self {
        Self::change_setting(UPDATE_INTERVAL_SETTING, interval.wire_value())
    }

    /// Encode to a single wire line, without terminator
    pub fn encode(&self) -> String {
        match self {
            Command::Subscribe(dataref) => {
                let mut line = format!("sub {}", dataref.identifier());
                if let Some(accuracy) = dataref.accuracy() {
                    match dataref.kind() {
                        DatarefType::Float | DatarefType::Double => {
                            line.push_str(&format!(" {:.2}", accuracy));
                        }
                        DatarefType::Int => {
                            line.push_str(&format!(" {}", accuracy.trunc() as i64));
                        }
                        DatarefType::IntArray | DatarefType::FloatArray | DatarefType::Base64 => {}
                    }
                }
                line
            }
            Command::Unsubscribe(dataref) => format!("unsub {}", dataref.identifier()),
            Command::SetValue { dataref, value } => {
                format!("set {} {}", dataref.identifier(), value)
            }
            Command::KeyTap(id) => format!("key {}", id),
            Command::ButtonPress(id) => format!("but {}", id),
            Command::ButtonRelease(id) => format!("rel {}", id),
            Command::CommandOnce(name) => format!("cmd once {}", name),
            Command::CommandBegin(name) => format!("cmd begin {}", name),
            Command::CommandEnd(name) => format!("cmd end {}", name),
            Command::ChangeSetting { key, value } => format!("extplane-set {} {}", key, value),
            Command::Disconnect => "disconnect".to_string(),
        }
    }
}
