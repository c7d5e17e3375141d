//! ExtPlane Monitor
//!
//! Connects to X-Plane through the ExtPlane plugin, subscribes to a set of
//! datarefs and logs every value change until interrupted.

mod settings;

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use extplane_client::{run_tcp_session, ClientEvent, ExtPlaneClient};
use extplane_protocol::{Command, UpdateInterval};
use settings::{DatarefSpec, Settings};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Update rate requested from the server
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Rate {
    /// 60 updates per second
    Hz60,
    /// 30 updates per second
    Hz30,
    /// 10 updates per second
    Hz10,
}

impl From<Rate> for UpdateInterval {
    fn from(rate: Rate) -> Self {
        match rate {
            Rate::Hz60 => UpdateInterval::Hz60,
            Rate::Hz30 => UpdateInterval::Hz30,
            Rate::Hz10 => UpdateInterval::Hz10,
        }
    }
}

/// Watch X-Plane datarefs over ExtPlane
#[derive(Debug, Parser)]
#[command(name = "extplane-monitor", version, about)]
struct Cli {
    /// Host running X-Plane with the ExtPlane plugin
    #[arg(long)]
    host: Option<String>,

    /// ExtPlane TCP port
    #[arg(long)]
    port: Option<u16>,

    /// Ask the server for a specific update rate
    #[arg(long, value_enum)]
    rate: Option<Rate>,

    /// Log every protocol line sent and received
    #[arg(long)]
    traffic: bool,

    /// Write the merged settings back to the settings file
    #[arg(long)]
    save: bool,

    /// Datarefs to watch, as <tag>:<identifier>[:<accuracy>]
    /// (tags: i, f, d, ia, fa, b)
    #[arg(value_name = "DATAREF")]
    datarefs: Vec<DatarefSpec>,
}

impl Cli {
    /// Override saved settings with command line values
    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.client.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.client.port = port;
        }
        if let Some(rate) = self.rate {
            settings.client.update_interval = Some(rate.into());
        }
        if self.traffic {
            settings.show_traffic = true;
        }
        for spec in &self.datarefs {
            settings.add_dataref(spec.clone());
        }
    }
}

fn log_event(event: &ClientEvent, show_traffic: bool) {
    match event {
        ClientEvent::Connected => info!("Connected"),
        ClientEvent::Disconnected { reason } => {
            warn!("Disconnected: {}", reason.as_deref().unwrap_or("unknown"))
        }
        ClientEvent::ServerGreeting => info!("ExtPlane server ready"),
        ClientEvent::Subscribed { dataref } => info!("Subscribed to {}", dataref.id()),
        ClientEvent::ValueChanged { dataref } => match dataref.value() {
            Some(value) => info!("{} = {}", dataref.identifier(), value),
            None => debug!("{} changed without a value", dataref.identifier()),
        },
        ClientEvent::Unsubscribed { dataref } => info!("Unsubscribed from {}", dataref.id()),
        ClientEvent::RegistrationStalled {
            dataref,
            elapsed_ms,
        } => warn!(
            "No value for {} after {} ms; is the identifier right?",
            dataref.id(),
            elapsed_ms
        ),
        ClientEvent::DecodeFailed { line, error } => warn!("Bad line {:?}: {}", line, error),
        ClientEvent::LineIn { line } if show_traffic => info!("<- {}", line),
        ClientEvent::LineOut { line } if show_traffic => info!("-> {}", line),
        ClientEvent::LineIn { .. } | ClientEvent::LineOut { .. } => {}
        ClientEvent::Error { source, message } => warn!("{}: {}", source, message),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "extplane_monitor=info,extplane_client=info,extplane_protocol=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load();
    cli.apply(&mut settings);
    settings.client.validate().context("invalid client settings")?;

    if cli.save {
        let path = settings.save().map_err(|e| anyhow!(e))?;
        info!("Saved settings to {}", path.display());
    }

    let datarefs = settings
        .datarefs
        .iter()
        .map(|spec| spec.to_dataref().map_err(|e| anyhow!(e)))
        .collect::<Result<Vec<_>>>()?;
    if datarefs.is_empty() {
        warn!("No datarefs to watch; pass some as <tag>:<identifier>[:<accuracy>]");
    }

    info!("Starting ExtPlane monitor for {}", settings.client.address());
    let config = settings.client.clone();
    let (client, mut events, actor) = ExtPlaneClient::spawn(config.clone());
    let session = tokio::spawn(run_tcp_session(config, client.sender()));

    for dataref in datarefs {
        client
            .register(dataref)
            .await
            .context("client stopped while registering datarefs")?;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break; };
                log_event(&event, settings.show_traffic);
            }

            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Interrupted, disconnecting");
                if let Err(e) = client.send(Command::Disconnect).await {
                    debug!("Could not send disconnect: {}", e);
                }
                break;
            }
        }
    }

    // Nobody reads events from here on; the actor must not wait on them
    drop(events);

    // Dropping the actor closes the line channel; the connection writes
    // what is queued (the `disconnect`) before the session winds down
    client.shutdown().await.ok();
    actor.await.context("client actor panicked")?;

    let drain = settings.client.reconnect_delay() + Duration::from_secs(1);
    let session_abort = session.abort_handle();
    if tokio::time::timeout(drain, session).await.is_err() {
        debug!("TCP session still busy after {:?}; aborting", drain);
        session_abort.abort();
    }

    info!("ExtPlane monitor stopped");
    Ok(())
}
