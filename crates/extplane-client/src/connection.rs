//! Async transport connection
//!
//! Each connection runs in its own spawned task, reading bytes from the
//! socket, framing them into lines and forwarding those to the client actor,
//! while writing the lines the actor hands back. Any `AsyncRead + AsyncWrite`
//! works; tests use `tokio::io::duplex()` in place of a socket.

use std::io;

use extplane_protocol::{frame_line, LineCodec};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::actor::ClientCommand;
use crate::config::ClientConfig;
use crate::error::ClientError;

/// Run one connection until it closes
///
/// Reports `TransportConnected` on start and `TransportDisconnected` on the
/// way out, whether the peer closed, an I/O error occurred, or the actor
/// dropped its line sender. Returns the I/O error, if any, that ended it.
///
/// Reading and writing run concurrently: a write stalled on a slow peer
/// never stops inbound lines reaching the actor, and forwarding inbound
/// lines never stops queued outbound lines from draining.
pub async fn run_connection<T>(
    io: T,
    name: String,
    client_tx: mpsc::Sender<ClientCommand>,
) -> io::Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    if client_tx
        .send(ClientCommand::TransportConnected { line_tx })
        .await
        .is_err()
    {
        debug!("Client actor gone before {} connected", name);
        return Ok(());
    }
    info!("Connected to {}", name);

    let (mut reader, mut writer) = tokio::io::split(io);

    let result = tokio::select! {
        read = read_lines(&mut reader, &client_tx) => read,
        write = write_lines(&mut writer, &mut line_rx) => write,
    };

    let reason = match &result {
        Ok(reason) => reason.clone(),
        Err(e) => {
            warn!("Connection to {} failed: {}", name, e);
            e.to_string()
        }
    };
    info!("Disconnected from {}: {}", name, reason);
    let _ = client_tx
        .send(ClientCommand::TransportDisconnected {
            reason: Some(reason),
        })
        .await;

    result.map(|_| ())
}

/// Forward complete inbound lines to the actor until EOF
async fn read_lines<R>(reader: &mut R, client_tx: &mpsc::Sender<ClientCommand>) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut codec = LineCodec::new();
    let mut buf = vec![0u8; 4096];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok("connection closed by server".to_string());
        }

        codec.push_bytes(&buf[..n]);
        while let Some(line) = codec.next_line() {
            if client_tx
                .send(ClientCommand::LineReceived { line })
                .await
                .is_err()
            {
                return Ok("client actor stopped".to_string());
            }
        }
    }
}

/// Write outbound lines until the actor drops its sender
///
/// Lines queued before the sender was dropped are still written, so a
/// final `disconnect` reaches the server.
async fn write_lines<W>(
    writer: &mut W,
    line_rx: &mut mpsc::UnboundedReceiver<String>,
) -> io::Result<String>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = line_rx.recv().await {
        writer.write_all(&frame_line(&line)).await?;
        writer.flush().await?;
    }

    writer.shutdown().await?;
    Ok("client closed the connection".to_string())
}

/// Open a TCP connection to the configured server and spawn its task
pub async fn connect_tcp(
    config: &ClientConfig,
    client_tx: mpsc::Sender<ClientCommand>,
) -> Result<JoinHandle<io::Result<()>>, ClientError> {
    let address = config.address();
    let stream = TcpStream::connect(&address).await?;
    stream.set_nodelay(true)?;

    Ok(tokio::spawn(run_connection(stream, address, client_tx)))
}

/// Keep a TCP connection up until the client actor goes away
///
/// Reconnects after `reconnect_delay_ms` whenever a connection attempt fails
/// or an established connection drops. The actor replays subscriptions on
/// each reconnect.
pub async fn run_tcp_session(config: ClientConfig, client_tx: mpsc::Sender<ClientCommand>) {
    let delay = config.reconnect_delay();

    while !client_tx.is_closed() {
        match connect_tcp(&config, client_tx.clone()).await {
            Ok(handle) => match handle.await {
                Ok(Ok(())) => debug!("Connection to {} ended", config.address()),
                Ok(Err(e)) => warn!("Connection to {} ended with error: {}", config.address(), e),
                Err(e) => warn!("Connection task panicked: {}", e),
            },
            Err(e) => warn!("Failed to connect to {}: {}", config.address(), e),
        }

        if client_tx.is_closed() {
            break;
        }
        tokio::time::sleep(delay).await;
    }

    info!("TCP session for {} stopped", config.address());
}
