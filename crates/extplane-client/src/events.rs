//! Unified event stream for the client
//!
//! Subscription lifecycle, value changes, decode failures and raw line
//! traffic are all emitted through a single event channel so observers see
//! them in protocol order.

use extplane_protocol::{Dataref, DecodeError};

/// Unified event enum for all client activity
#[derive(Debug, Clone)]
pub enum ClientEvent {
    // -------------------------------------------------------------------------
    // Connection lifecycle events
    // -------------------------------------------------------------------------
    /// The transport connected
    Connected,

    /// The transport disconnected
    Disconnected {
        /// Why the connection ended, if known
        reason: Option<String>,
    },

    /// The server sent its `EXTPLANE` greeting
    ServerGreeting,

    // -------------------------------------------------------------------------
    // Subscription events
    // -------------------------------------------------------------------------
    /// The server acknowledged a subscription with its first value
    Subscribed {
        /// The subscribed dataref, carrying its first value
        dataref: Dataref,
    },

    /// A subscribed dataref changed value
    ValueChanged {
        /// The dataref with its new value stored
        dataref: Dataref,
    },

    /// A dataref was unsubscribed
    Unsubscribed {
        /// The removed dataref
        dataref: Dataref,
    },

    /// A subscription has waited for its first value longer than the threshold
    RegistrationStalled {
        /// The in-flight dataref
        dataref: Dataref,
        /// Time since the `sub` was sent (milliseconds)
        elapsed_ms: u64,
    },

    /// A server line could not be decoded
    DecodeFailed {
        /// The offending line
        line: String,
        /// Why it failed
        error: DecodeError,
    },

    // -------------------------------------------------------------------------
    // Traffic events
    // -------------------------------------------------------------------------
    /// Line received from the server
    LineIn {
        line: String,
    },

    /// Line sent to the server
    LineOut {
        line: String,
    },

    /// An error occurred in the client
    Error {
        /// Source of the error
        source: String,
        /// Error message
        message: String,
    },
}

impl ClientEvent {
    /// Check if this is a traffic event
    pub fn is_traffic(&self) -> bool {
        matches!(self, ClientEvent::LineIn { .. } | ClientEvent::LineOut { .. })
    }

    /// Check if this is a connection lifecycle event
    pub fn is_connection_lifecycle(&self) -> bool {
        matches!(
            self,
            ClientEvent::Connected | ClientEvent::Disconnected { .. } | ClientEvent::ServerGreeting
        )
    }

    /// Get the dataref this event concerns, if any
    pub fn dataref(&self) -> Option<&Dataref> {
        match self {
            ClientEvent::Subscribed { dataref }
            | ClientEvent::ValueChanged { dataref }
            | ClientEvent::Unsubscribed { dataref }
            | ClientEvent::RegistrationStalled { dataref, .. } => Some(dataref),
            _ => None,
        }
    }
}
