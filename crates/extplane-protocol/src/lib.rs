//! ExtPlane Protocol Library
//!
//! This crate provides encoding and decoding for the ExtPlane protocol, the
//! line-oriented ASCII protocol X-Plane's ExtPlane plugin speaks over TCP:
//!
//! - **Datarefs**: validated identifiers with a wire value type
//! - **Commands**: `sub`, `unsub`, `set`, key/button/command triggers and settings
//! - **Output**: the `EXTPLANE` greeting and `u<tag>` value updates
//! - **Framing**: a streaming line codec for bytes arriving from a socket
//!
//! The protocol is asymmetric: the client only sends commands and the server
//! only sends greetings and value updates, so nothing here round-trips.
//!
//! # Example
//!
//! ```rust
//! use extplane_protocol::{Command, Dataref, DatarefType, DatarefValue, LineCodec, Output};
//!
//! let altitude = Dataref::new("sim/flightmodel/misc/h_ind", DatarefType::Float)
//!     .unwrap()
//!     .with_accuracy(10.0)
//!     .unwrap();
//! assert_eq!(
//!     Command::subscribe(altitude).encode(),
//!     "sub sim/flightmodel/misc/h_ind 10.00"
//! );
//!
//! let mut codec = LineCodec::new();
//! codec.push_bytes(b"u f sim/flightmodel/misc/h_ind 1500.00 0\n");
//! if let Some((_, Ok(Output::ValueChanged(dataref, value)))) = codec.next_output() {
//!     assert_eq!(dataref.identifier(), "sim/flightmodel/misc/h_ind");
//!     assert_eq!(value, DatarefValue::Float(1500.0));
//! }
//! ```

pub mod codec;
pub mod command;
pub mod dataref;
pub mod error;
pub mod output;

pub use codec::{frame_line, LineCodec};
pub use command::{Command, UpdateInterval};
pub use dataref::{validate_identifier, Dataref, DatarefId, DatarefType, DatarefValue};
pub use error::{DecodeError, ProtocolError, ValidationError};
pub use output::{decode, Output, GREETING, UPDATE_MARKER};
