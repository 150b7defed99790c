//! # nanoled-adapter-ble
//!
//! [`Transport`] over a real BLE stack, via `btleplug`.
//!
//! ## How it works
//!
//! btleplug is async; the connector's transport contract is fire-and-forget.
//! Each trait method enqueues a command for a single worker task, which
//! performs the btleplug calls in order and publishes the outcome on the
//! event channel drained by [`nanoled_app::pump::run`].
//!
//! | Transport call | btleplug | Reported as |
//! |----------------|----------|-------------|
//! | `start_scan` | `Central::start_scan` + event stream | `ScanMatch` / `ScanFailed` |
//! | `connect` | `Peripheral::connect` (with timeout) | `ConnectionStateChanged` |
//! | `discover_services` | `Peripheral::discover_services` | `ServicesDiscovered` |
//! | `submit_read` | `Peripheral::read` | `ReadComplete` |
//! | `submit_write` | `Peripheral::write` (with response) | `WriteComplete` |
//!
//! A link drop is noticed through `CentralEvent::DeviceDisconnected` and
//! reported as `ConnectionStateChanged { state: Disconnected }`. The adapter's
//! power state is followed through `CentralEvent::StateUpdate`, so
//! `is_enabled` reflects an adapter switched on after startup.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `nanoled-app` and `nanoled-domain`.

mod config;
mod error;
mod power;
mod scanner;
mod worker;

pub use config::BleConfig;
pub use error::BleError;

use btleplug::api::{Characteristic, Manager as _};
use btleplug::platform::Manager;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use nanoled_app::ports::{ScannedPeripheral, Transport};
use nanoled_app::pump::EventSender;
use nanoled_domain::protocol::ScanSettings;

use crate::power::AdapterPower;
use crate::worker::{Command, Worker};

/// btleplug-backed [`Transport`].
///
/// Must be created inside a tokio runtime. Call
/// [`shutdown`](Self::shutdown) to let queued commands, such as a final
/// disconnect, reach the peripheral before the runtime stops.
pub struct BtleplugTransport {
    power: AdapterPower,
    power_watch: JoinHandle<()>,
    commands: mpsc::UnboundedSender<Command>,
    worker: JoinHandle<()>,
}

impl BtleplugTransport {
    /// Open the configured host adapter and start the worker.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotAvailable`] when there is no adapter at
    /// `config.adapter_index`, or [`BleError::Btleplug`] when the platform
    /// BLE manager cannot be opened.
    pub async fn new(
        config: BleConfig,
        events: EventSender<Characteristic>,
    ) -> Result<Self, BleError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .nth(config.adapter_index)
            .ok_or(BleError::NotAvailable)?;

        let enabled = scanner::adapter_enabled(&adapter).await;
        tracing::info!(adapter_index = config.adapter_index, enabled, "BLE adapter opened");
        let power = AdapterPower::new(enabled);
        let power_watch = power.watch(adapter.clone());

        let (commands, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(Worker::new(adapter, config, events).run(receiver));

        Ok(Self {
            power,
            power_watch,
            commands,
            worker,
        })
    }

    /// Close the command queue and wait for the worker to drain it.
    pub async fn shutdown(self) {
        let Self {
            power_watch,
            commands,
            worker,
            ..
        } = self;
        power_watch.abort();
        drop(commands);
        if let Err(err) = worker.await {
            tracing::warn!(%err, "ble worker ended abnormally");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::error!("ble worker is gone");
        }
    }
}

impl Transport for BtleplugTransport {
    type Handle = Characteristic;

    fn is_enabled(&self) -> bool {
        self.power.is_on()
    }

    fn start_scan(&self, settings: &ScanSettings) {
        self.send(Command::StartScan(*settings));
    }

    fn stop_scan(&self) {
        self.send(Command::StopScan);
    }

    fn connect(&self, peripheral: &ScannedPeripheral) {
        self.send(Command::Connect(peripheral.clone()));
    }

    fn discover_services(&self) {
        self.send(Command::DiscoverServices);
    }

    fn submit_read(&self, handle: &Characteristic) {
        self.send(Command::Read(handle.clone()));
    }

    fn submit_write(&self, handle: &Characteristic, payload: &[u8]) {
        self.send(Command::Write(handle.clone(), payload.to_vec()));
    }

    fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    fn close(&self) {
        self.send(Command::Close);
    }
}
