//! Client Actor
//!
//! This module provides the async actor that owns the [`SubscriptionManager`].
//! Caller requests and transport notifications arrive as messages on one
//! channel and are processed strictly in order, so every state transition
//! completes before the next line or request is looked at.
//!
//! # Architecture
//!
//! The actor receives commands through a channel and emits events through another.
//! This allows callers to:
//! - Register and unregister datarefs, send arbitrary commands, query state
//! - Receive all events (traffic, values, errors) through a unified stream
//!
//! The transport task talks to the actor through the same command channel
//! (`TransportConnected`, `LineReceived`, `TransportDisconnected`), and the
//! actor writes outbound lines back through the sender it was handed on connect.
//!
//! # Example
//!
//! ```rust,ignore
//! use extplane_client::actor::{run_client_actor, ClientCommand};
//! use extplane_client::ClientConfig;
//! use tokio::sync::mpsc;
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(256);
//! let (event_tx, mut event_rx) = mpsc::channel(256);
//!
//! // Spawn the actor
//! tokio::spawn(run_client_actor(cmd_rx, event_tx, ClientConfig::default()));
//!
//! // Send commands and receive events
//! ```

use extplane_protocol::{Command, Dataref, DatarefId, DatarefValue};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::events::ClientEvent;
use crate::manager::SubscriptionManager;
use crate::state::SubscriptionSnapshot;

/// Commands sent to the client actor
#[derive(Debug)]
pub enum ClientCommand {
    /// Subscribe to a dataref
    Register {
        /// The dataref to subscribe to
        dataref: Dataref,
        /// Whether the dataref was newly queued
        response: oneshot::Sender<bool>,
    },

    /// Unsubscribe from a dataref
    Unregister {
        /// Identity of the dataref to remove
        id: DatarefId,
        /// Whether the dataref was registered
        response: oneshot::Sender<bool>,
    },

    /// Send an arbitrary command to the server
    Send {
        /// The command to send
        command: Command,
        /// Whether a transport was connected to take it
        response: oneshot::Sender<bool>,
    },

    /// Query the subscription sets
    QuerySubscriptions {
        response: oneshot::Sender<SubscriptionSnapshot>,
    },

    /// Query the last value of a registered dataref
    QueryValue {
        id: DatarefId,
        response: oneshot::Sender<Option<DatarefValue>>,
    },

    /// A transport connected; outbound lines go to `line_tx`
    ///
    /// The line channel is unbounded so flushing never waits on the
    /// transport, which may itself be waiting to hand the actor a line.
    TransportConnected {
        line_tx: mpsc::UnboundedSender<String>,
    },

    /// The transport disconnected
    TransportDisconnected {
        reason: Option<String>,
    },

    /// One line (without terminator) arrived from the server
    LineReceived {
        line: String,
    },

    /// Shutdown the actor
    Shutdown,
}

/// Internal state for the client actor
struct ClientActorState {
    /// The subscription state machine
    manager: SubscriptionManager,
    /// Outbound line sender for the connected transport
    line_tx: Option<mpsc::UnboundedSender<String>>,
}

impl ClientActorState {
    fn new(config: &ClientConfig) -> Self {
        Self {
            manager: SubscriptionManager::with_update_interval(config.update_interval),
            line_tx: None,
        }
    }
}

/// Forward buffered manager events, then write queued commands
async fn flush(state: &mut ClientActorState, event_tx: &mpsc::Sender<ClientEvent>) {
    for event in state.manager.drain_events() {
        let _ = event_tx.send(event).await;
    }

    for command in state.manager.take_outbound() {
        let line = command.encode();
        debug!("OUT -> {}", line);

        let _ = event_tx
            .send(ClientEvent::LineOut { line: line.clone() })
            .await;

        let Some(ref tx) = state.line_tx else {
            continue;
        };
        if let Err(e) = tx.send(line) {
            warn!("Failed to send to transport: {}", e);
            let _ = event_tx
                .send(ClientEvent::Error {
                    source: "Transport".to_string(),
                    message: format!("Send failed: {}", e),
                })
                .await;
        }
    }
}

/// Run the client actor
///
/// This async function owns the subscription state machine and processes
/// every command in arrival order, emitting events through the event channel.
///
/// # Arguments
///
/// * `cmd_rx` - Receiver for commands sent to the actor
/// * `event_tx` - Sender for events emitted by the actor
/// * `config` - Update interval and stall threshold
pub async fn run_client_actor(
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
    event_tx: mpsc::Sender<ClientEvent>,
    config: ClientConfig,
) {
    let mut state = ClientActorState::new(&config);
    let stall_threshold = config.stall_threshold();
    info!("Client actor started");

    // Liveness check for a subscription the server never acknowledges
    let mut stall_timer = interval(Duration::from_secs(1));
    stall_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break; };
                match cmd {
                    ClientCommand::Register { dataref, response } => {
                        let queued = state.manager.register(dataref);
                        let _ = response.send(queued);
                    }

                    ClientCommand::Unregister { id, response } => {
                        let removed = state.manager.unregister(&id);
                        let _ = response.send(removed);
                    }

                    ClientCommand::Send { command, response } => {
                        let sent = state.manager.send(command);
                        let _ = response.send(sent);
                    }

                    ClientCommand::QuerySubscriptions { response } => {
                        let _ = response.send(state.manager.snapshot());
                    }

                    ClientCommand::QueryValue { id, response } => {
                        let _ = response.send(state.manager.value(&id).cloned());
                    }

                    ClientCommand::TransportConnected { line_tx } => {
                        state.line_tx = Some(line_tx);
                        state.manager.on_connected();
                    }

                    ClientCommand::TransportDisconnected { reason } => {
                        state.line_tx = None;
                        state.manager.on_disconnected(reason);
                    }

                    ClientCommand::LineReceived { line } => {
                        debug!("IN  <- {}", line);
                        let _ = event_tx
                            .send(ClientEvent::LineIn { line: line.clone() })
                            .await;

                        // Decode failures are already reported as events
                        let _ = state.manager.handle_line(&line);
                    }

                    ClientCommand::Shutdown => {
                        info!("Client actor shutting down");
                        break;
                    }
                }

                flush(&mut state, &event_tx).await;
            }

            _ = stall_timer.tick() => {
                if state.manager.check_stalled(stall_threshold) {
                    flush(&mut state, &event_tx).await;
                }
            }
        }
    }

    info!("Client actor stopped");
}

#[cfg(test)]
mod tests {
    use extplane_protocol::DatarefType;

    use super::*;

    fn spawn_actor() -> (
        mpsc::Sender<ClientCommand>,
        mpsc::Receiver<ClientEvent>,
        tokio::task::JoinHandle<()>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(64);
        let handle = tokio::spawn(run_client_actor(cmd_rx, event_tx, ClientConfig::default()));
        (cmd_tx, event_rx, handle)
    }

    async fn register(cmd_tx: &mpsc::Sender<ClientCommand>, dataref: Dataref) -> bool {
        let (resp_tx, resp_rx) = oneshot::channel();
        cmd_tx
            .send(ClientCommand::Register {
                dataref,
                response: resp_tx,
            })
            .await
            .unwrap();
        resp_rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_register_then_connect_writes_sub() {
        let (cmd_tx, mut event_rx, actor_handle) = spawn_actor();

        let dataref = Dataref::new("sim/flightmodel/misc/h_ind", DatarefType::Float).unwrap();
        assert!(register(&cmd_tx, dataref).await);

        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        cmd_tx
            .send(ClientCommand::TransportConnected { line_tx })
            .await
            .unwrap();

        assert_eq!(
            line_rx.recv().await.as_deref(),
            Some("sub sim/flightmodel/misc/h_ind")
        );

        // Connected first, then the traffic for the sub
        assert!(matches!(
            event_rx.recv().await.unwrap(),
            ClientEvent::Connected
        ));
        match event_rx.recv().await.unwrap() {
            ClientEvent::LineOut { line } => assert_eq!(line, "sub sim/flightmodel/misc/h_ind"),
            other => panic!("Expected LineOut event, got {:?}", other),
        }

        cmd_tx.send(ClientCommand::Shutdown).await.unwrap();
        actor_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_value_line_updates_query() {
        let (cmd_tx, mut event_rx, actor_handle) = spawn_actor();

        let (line_tx, _line_rx) = mpsc::unbounded_channel();
        cmd_tx
            .send(ClientCommand::TransportConnected { line_tx })
            .await
            .unwrap();

        let dataref = Dataref::new("sim/a/b", DatarefType::Int).unwrap();
        register(&cmd_tx, dataref.clone()).await;

        cmd_tx
            .send(ClientCommand::LineReceived {
                line: "u i sim/a/b 42 0".to_string(),
            })
            .await
            .unwrap();

        let (resp_tx, resp_rx) = oneshot::channel();
        cmd_tx
            .send(ClientCommand::QueryValue {
                id: dataref.id().clone(),
                response: resp_tx,
            })
            .await
            .unwrap();
        assert_eq!(resp_rx.await.unwrap(), Some(DatarefValue::Int(42)));

        // Drain until the Subscribed event shows up
        loop {
            match event_rx.recv().await.unwrap() {
                ClientEvent::Subscribed { dataref: d } => {
                    assert_eq!(d, dataref);
                    assert_eq!(d.value(), Some(&DatarefValue::Int(42)));
                    break;
                }
                _ => continue,
            }
        }

        cmd_tx.send(ClientCommand::Shutdown).await.unwrap();
        actor_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_line_reported_not_fatal() {
        let (cmd_tx, mut event_rx, actor_handle) = spawn_actor();

        cmd_tx
            .send(ClientCommand::LineReceived {
                line: "u q sim/a/b 1 0".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(
            event_rx.recv().await.unwrap(),
            ClientEvent::LineIn { .. }
        ));
        match event_rx.recv().await.unwrap() {
            ClientEvent::DecodeFailed { line, .. } => assert_eq!(line, "u q sim/a/b 1 0"),
            other => panic!("Expected DecodeFailed event, got {:?}", other),
        }

        // Actor keeps serving requests
        let (resp_tx, resp_rx) = oneshot::channel();
        cmd_tx
            .send(ClientCommand::QuerySubscriptions { response: resp_tx })
            .await
            .unwrap();
        assert!(resp_rx.await.unwrap().is_empty());

        cmd_tx.send(ClientCommand::Shutdown).await.unwrap();
        actor_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_without_transport_is_refused() {
        let (cmd_tx, _event_rx, actor_handle) = spawn_actor();

        let (resp_tx, resp_rx) = oneshot::channel();
        cmd_tx
            .send(ClientCommand::Send {
                command: Command::command_once("sim/operation/pause_toggle"),
                response: resp_tx,
            })
            .await
            .unwrap();
        assert!(!resp_rx.await.unwrap());

        cmd_tx.send(ClientCommand::Shutdown).await.unwrap();
        actor_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_stops_when_senders_dropped() {
        let (cmd_tx, _event_rx, actor_handle) = spawn_actor();
        drop(cmd_tx);
        actor_handle.await.unwrap();
    }
}
