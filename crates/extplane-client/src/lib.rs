//! ExtPlane Client
//!
//! This crate keeps X-Plane dataref subscriptions alive over an ExtPlane
//! connection and turns the server's value pushes into events.
//!
//! # Architecture
//!
//! - [`SubscriptionManager`] is the synchronous state machine: registered,
//!   pending-registration and pending-unregistration sets, plus the single
//!   `sub` awaiting its first value
//! - The client actor ([`run_client_actor`]) owns the manager and processes
//!   caller requests and transport notifications one at a time
//! - A connection task ([`run_connection`], [`run_tcp_session`]) frames lines
//!   on the socket and reports connects and disconnects to the actor
//! - All activity comes back through a single [`ClientEvent`] stream
//!
//! Subscriptions survive reconnects: the actor re-sends `sub` for every
//! registered dataref when a transport connects and resumes the pending queue.
//!
//! # Example
//!
//! ```rust,no_run
//! use extplane_client::{run_tcp_session, ClientConfig, ClientEvent, ExtPlaneClient};
//! use extplane_protocol::DatarefType;
//!
//! # async fn example() -> Result<(), extplane_client::ClientError> {
//! let config = ClientConfig::default();
//! let (client, mut events, _actor) = ExtPlaneClient::spawn(config.clone());
//! tokio::spawn(run_tcp_session(config, client.sender()));
//!
//! client
//!     .register_identifier("sim/flightmodel/misc/h_ind", DatarefType::Float, Some(10.0))
//!     .await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let ClientEvent::ValueChanged { dataref } = event {
//!         println!("{} = {:?}", dataref.identifier(), dataref.value());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod manager;
pub mod state;

// Re-export actor types
pub use actor::{run_client_actor, ClientCommand};
pub use client::ExtPlaneClient;
pub use config::{ClientConfig, DEFAULT_PORT};
pub use connection::{connect_tcp, run_connection, run_tcp_session};
pub use error::ClientError;
pub use events::ClientEvent;
pub use manager::SubscriptionManager;
pub use state::{SubscriptionSnapshot, SubscriptionState};
