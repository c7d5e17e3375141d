//! Handle for talking to a running client actor

use extplane_protocol::{Command, Dataref, DatarefType, DatarefValue};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::actor::{run_client_actor, ClientCommand};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::ClientEvent;
use crate::state::SubscriptionSnapshot;

/// Cloneable handle to a client actor
///
/// Every method enqueues a message and awaits the actor's reply; none of
/// them wait on the network.
#[derive(Debug, Clone)]
pub struct ExtPlaneClient {
    cmd_tx: mpsc::Sender<ClientCommand>,
}

impl ExtPlaneClient {
    /// Spawn a client actor
    ///
    /// Returns the handle, the event stream and the actor's join handle.
    /// Connect a transport with [`crate::connection::run_tcp_session`] or
    /// [`crate::connection::run_connection`] using [`ExtPlaneClient::sender`].
    pub fn spawn(config: ClientConfig) -> (Self, mpsc::Receiver<ClientEvent>, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_bound());
        let (event_tx, event_rx) = mpsc::channel(config.channel_bound());
        let handle = tokio::spawn(run_client_actor(cmd_rx, event_tx, config));
        (Self { cmd_tx }, event_rx, handle)
    }

    /// Wrap an existing actor command sender
    pub fn from_sender(cmd_tx: mpsc::Sender<ClientCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Command sender, for wiring up a transport task
    pub fn sender(&self) -> mpsc::Sender<ClientCommand> {
        self.cmd_tx.clone()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ClientCommand,
    ) -> Result<T, ClientError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(resp_tx))
            .await
            .map_err(|_| ClientError::ActorClosed)?;
        resp_rx.await.map_err(|_| ClientError::ActorClosed)
    }

    /// Subscribe to a dataref
    ///
    /// Returns `false` if it was already registered or pending.
    pub async fn register(&self, dataref: Dataref) -> Result<bool, ClientError> {
        self.request(|response| ClientCommand::Register { dataref, response })
            .await
    }

    /// Validate an identifier and subscribe to it
    ///
    /// Validation and accuracy errors are returned before anything is sent
    /// to the actor.
    pub async fn register_identifier(
        &self,
        identifier: &str,
        kind: DatarefType,
        accuracy: Option<f64>,
    ) -> Result<bool, ClientError> {
        let mut dataref = Dataref::new(identifier, kind)?;
        if let Some(accuracy) = accuracy {
            dataref = dataref.with_accuracy(accuracy)?;
        }
        self.register(dataref).await
    }

    /// Unsubscribe from a dataref
    ///
    /// Returns `false` if it was not registered.
    pub async fn unregister(&self, dataref: &Dataref) -> Result<bool, ClientError> {
        let id = dataref.id().clone();
        self.request(|response| ClientCommand::Unregister { id, response })
            .await
    }

    /// Send a command to the server
    pub async fn send(&self, command: Command) -> Result<(), ClientError> {
        let sent = self
            .request(|response| ClientCommand::Send { command, response })
            .await?;
        if sent {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    /// Write a value to a dataref
    pub async fn set_value(&self, dataref: Dataref, value: DatarefValue) -> Result<(), ClientError> {
        self.send(Command::set_value(dataref, value)?).await
    }

    /// Copy the subscription sets
    pub async fn subscriptions(&self) -> Result<SubscriptionSnapshot, ClientError> {
        self.request(|response| ClientCommand::QuerySubscriptions { response })
            .await
    }

    /// Last value of a registered dataref
    pub async fn value(&self, dataref: &Dataref) -> Result<Option<DatarefValue>, ClientError> {
        let id = dataref.id().clone();
        self.request(|response| ClientCommand::QueryValue { id, response })
            .await
    }

    /// Stop the actor
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.cmd_tx
            .send(ClientCommand::Shutdown)
            .await
            .map_err(|_| ClientError::ActorClosed)
    }
}
