//! # nanoled: LED controller console
//!
//! Composition root that wires a transport to the Nano connector and drives
//! it from an interactive console.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the tracing subscriber
//! - Construct the selected transport (btleplug or virtual)
//! - Spawn the event pump and the observer printer
//! - Read commands from stdin until `quit`, EOF or Ctrl-C
//! - On exit, disconnect, release the transport and flush console output
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no connector logic belongs here.

mod config;
mod console;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use nanoled_adapter_ble::BtleplugTransport;
use nanoled_adapter_virtual::VirtualTransport;
use nanoled_app::NanoConnector;
use nanoled_app::event_bus::BroadcastObserver;
use nanoled_app::ports::{ConnectorObserver, Transport};
use nanoled_app::pump::{self, EventReceiver};
use nanoled_domain::event::ConnectorEvent;

use crate::config::{Config, ConsoleConfig, TransportKind};
use crate::console::{Command, Flow};

/// How long the printer gets to flush the last events on exit.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Releasing a transport once the connector is done with it.
trait Shutdown {
    async fn shutdown(self);
}

impl Shutdown for BtleplugTransport {
    async fn shutdown(self) {
        BtleplugTransport::shutdown(self).await;
    }
}

impl Shutdown for VirtualTransport {
    async fn shutdown(self) {}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .with_writer(std::io::stderr)
        .init();

    let observer = BroadcastObserver::new(config.console.event_capacity);
    match config.transport.kind {
        TransportKind::Ble => {
            let (sender, receiver) = pump::channel();
            let transport = BtleplugTransport::new(config.ble, sender).await?;
            run(transport, observer, receiver, config.console).await
        }
        TransportKind::Virtual => {
            let (sender, receiver) = pump::channel();
            let transport = VirtualTransport::new(config.virtual_device, sender);
            run(transport, observer, receiver, config.console).await
        }
    }
}

async fn run<T: Transport + Shutdown + 'static>(
    transport: T,
    observer: BroadcastObserver,
    events: EventReceiver<T::Handle>,
    console_config: ConsoleConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let printer = tokio::spawn(print_events(
        observer.subscribe(),
        console_config.clone(),
        std::io::stdout(),
    ));
    let connector = Arc::new(NanoConnector::new(transport, observer));
    let pump = tokio::spawn(pump::run(Arc::clone(&connector), events));

    println!("{}", console::HELP);
    connector.connect();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                let (flow, reply) = console::execute(&connector, command, console_config.output);
                if let Some(reply) = reply {
                    println!("{reply}");
                }
                if flow == Flow::Quit {
                    break;
                }
            }
            Err(err) => println!("{err}"),
        }
    }

    tracing::info!("shutting down");
    connector.disconnect();
    close(connector, pump).await;
    if tokio::time::timeout(DRAIN_TIMEOUT, printer).await.is_err() {
        tracing::warn!("console output did not drain in time");
    }
    Ok(())
}

/// Stop the pump, then release the transport and the observer.
///
/// Dropping the observer closes the broadcast channel, which ends the
/// printer once it has written what is still queued.
async fn close<T, O>(connector: Arc<NanoConnector<T, O>>, pump: JoinHandle<()>)
where
    T: Transport + Shutdown,
    O: ConnectorObserver,
{
    // the transport holds a sender, so the pump never sees the channel close
    pump.abort();
    let _ = pump.await;
    match Arc::try_unwrap(connector) {
        Ok(connector) => {
            let (transport, observer) = connector.into_parts();
            drop(observer);
            transport.shutdown().await;
        }
        Err(_) => tracing::warn!("connector still shared, skipping transport shutdown"),
    }
}

/// Write every observer event to `out` until the channel closes.
async fn print_events(
    mut events: broadcast::Receiver<ConnectorEvent>,
    config: ConsoleConfig,
    mut out: impl Write,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = console::render(&event, chrono::Local::now(), &config)
                    && writeln!(out, "{line}").is_err()
                {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "console fell behind, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
