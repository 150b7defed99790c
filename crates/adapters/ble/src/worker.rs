//! The task that turns transport commands into btleplug calls.
//!
//! [`BtleplugTransport`](crate::BtleplugTransport) methods only enqueue a
//! [`Command`]; this worker executes them one at a time, in order, and
//! reports every outcome as a [`TransportEvent`]. Only the scan runs in its
//! own task so that a later `StopScan` can interrupt it.

use btleplug::api::{Central as _, CentralEvent, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

use nanoled_app::ports::{
    GattCharacteristic, GattService, GattStatus, LinkState, ScannedPeripheral, TransportEvent,
};
use nanoled_app::pump::EventSender;
use nanoled_domain::protocol::ScanSettings;

use crate::config::BleConfig;
use crate::error::BleError;
use crate::scanner;

/// Status reported when btleplug fails; it has no GATT status codes.
pub(crate) const GATT_FAILURE: GattStatus = GattStatus::Failure(0x101);

#[derive(Debug)]
pub(crate) enum Command {
    StartScan(ScanSettings),
    StopScan,
    Connect(ScannedPeripheral),
    DiscoverServices,
    Read(Characteristic),
    Write(Characteristic, Vec<u8>),
    Disconnect,
    Close,
}

pub(crate) struct Worker {
    adapter: Adapter,
    config: BleConfig,
    events: EventSender<Characteristic>,
    peripheral: Option<Peripheral>,
    scan: Option<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn new(
        adapter: Adapter,
        config: BleConfig,
        events: EventSender<Characteristic>,
    ) -> Self {
        Self {
            adapter,
            config,
            events,
            peripheral: None,
            scan: None,
            watcher: None,
        }
    }

    /// Execute commands until the transport is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            tracing::trace!(?command, "ble command");
            match command {
                Command::StartScan(settings) => self.start_scan(settings),
                Command::StopScan => self.stop_scan().await,
                Command::Connect(target) => self.connect(&target).await,
                Command::DiscoverServices => self.discover_services().await,
                Command::Read(characteristic) => self.read(characteristic).await,
                Command::Write(characteristic, payload) => {
                    self.write(characteristic, &payload).await;
                }
                Command::Disconnect => self.disconnect().await,
                Command::Close => self.close(),
            }
        }
        self.close();
        tracing::debug!("ble worker stopped");
    }

    fn emit(&self, event: TransportEvent<Characteristic>) {
        // the pump is gone only during shutdown
        let _ = self.events.send(event);
    }

    fn start_scan(&mut self, settings: ScanSettings) {
        if let Some(previous) = self.scan.take() {
            previous.abort();
        }
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let timeout = self.config.scan_timeout();
        tracing::info!(service = %settings.service, ?timeout, "ble scan started");

        self.scan = Some(tokio::spawn(async move {
            let event = match scanner::first_match(&adapter, settings.service, timeout).await {
                Ok(found) => {
                    tracing::info!(id = %found.id, name = ?found.name, "ble scan matched");
                    TransportEvent::ScanMatch(found)
                }
                Err(err) => {
                    tracing::warn!(%err, "ble scan failed");
                    TransportEvent::ScanFailed {
                        reason: err.to_string(),
                    }
                }
            };
            let _ = events.send(event);
        }));
    }

    async fn stop_scan(&mut self) {
        if let Some(scan) = self.scan.take() {
            scan.abort();
        }
        if let Err(err) = self.adapter.stop_scan().await {
            tracing::debug!(%err, "stop_scan failed");
        }
    }

    #[tracing::instrument(skip(self, target), fields(id = %target.id))]
    async fn connect(&mut self, target: &ScannedPeripheral) {
        match self.try_connect(target).await {
            Ok(peripheral) => {
                self.watch_disconnect(&peripheral);
                self.peripheral = Some(peripheral);
                tracing::info!("ble connected");
                self.emit(TransportEvent::ConnectionStateChanged {
                    status: GattStatus::Success,
                    state: LinkState::Connected,
                });
            }
            Err(err) => {
                tracing::warn!(%err, "ble connect failed");
                self.emit(TransportEvent::ConnectionStateChanged {
                    status: GATT_FAILURE,
                    state: LinkState::Disconnected,
                });
            }
        }
    }

    async fn try_connect(&self, target: &ScannedPeripheral) -> Result<Peripheral, BleError> {
        let peripheral = scanner::find_peripheral(&self.adapter, &target.id).await?;
        let limit = self.config.connect_timeout();
        tokio::time::timeout(limit, peripheral.connect())
            .await
            .map_err(|_| BleError::ConnectTimeout {
                secs: limit.as_secs(),
            })??;
        Ok(peripheral)
    }

    /// Report a link drop that nobody asked for.
    fn watch_disconnect(&mut self, peripheral: &Peripheral) {
        if let Some(previous) = self.watcher.take() {
            previous.abort();
        }
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let peripheral_id = peripheral.id();
        self.watcher = Some(tokio::spawn(async move {
            let mut stream = match adapter.events().await {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::warn!(%err, "could not subscribe to adapter events");
                    return;
                }
            };
            while let Some(event) = stream.next().await {
                if let CentralEvent::DeviceDisconnected(id) = event
                    && id == peripheral_id
                {
                    tracing::info!(?id, "peripheral disconnected");
                    let _ = events.send(TransportEvent::ConnectionStateChanged {
                        status: GattStatus::Success,
                        state: LinkState::Disconnected,
                    });
                    break;
                }
            }
        }));
    }

    async fn discover_services(&mut self) {
        let event = match self.try_discover().await {
            Ok(services) => TransportEvent::ServicesDiscovered {
                status: GattStatus::Success,
                services,
            },
            Err(err) => {
                tracing::warn!(%err, "service discovery failed");
                TransportEvent::ServicesDiscovered {
                    status: GATT_FAILURE,
                    services: Vec::new(),
                }
            }
        };
        self.emit(event);
    }

    async fn try_discover(&self) -> Result<Vec<GattService<Characteristic>>, BleError> {
        let peripheral = self.peripheral.as_ref().ok_or(BleError::NotConnected)?;
        peripheral.discover_services().await?;
        Ok(peripheral
            .services()
            .into_iter()
            .map(|service| GattService {
                uuid: service.uuid,
                characteristics: service
                    .characteristics
                    .into_iter()
                    .map(|c| GattCharacteristic { uuid: c.uuid, handle: c })
                    .collect(),
            })
            .collect())
    }

    #[tracing::instrument(skip(self, characteristic), fields(characteristic = %characteristic.uuid))]
    async fn read(&self, characteristic: Characteristic) {
        let result = match &self.peripheral {
            Some(peripheral) => peripheral.read(&characteristic).await.map_err(BleError::from),
            None => Err(BleError::NotConnected),
        };
        let (value, status) = match result {
            Ok(value) => (value, GattStatus::Success),
            Err(err) => {
                tracing::warn!(%err, "read failed");
                (Vec::new(), GATT_FAILURE)
            }
        };
        self.emit(TransportEvent::ReadComplete {
            characteristic: characteristic.uuid,
            value,
            status,
        });
    }

    #[tracing::instrument(skip(self, characteristic), fields(characteristic = %characteristic.uuid))]
    async fn write(&self, characteristic: Characteristic, payload: &[u8]) {
        let result = match &self.peripheral {
            Some(peripheral) => peripheral
                .write(&characteristic, payload, WriteType::WithResponse)
                .await
                .map_err(BleError::from),
            None => Err(BleError::NotConnected),
        };
        let status = match result {
            Ok(()) => GattStatus::Success,
            Err(err) => {
                tracing::warn!(%err, "write failed");
                GATT_FAILURE
            }
        };
        self.emit(TransportEvent::WriteComplete {
            characteristic: characteristic.uuid,
            status,
        });
    }

    async fn disconnect(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        if let Some(peripheral) = &self.peripheral
            && let Err(err) = peripheral.disconnect().await
        {
            tracing::warn!(%err, "failed to disconnect peripheral");
        }
    }

    fn close(&mut self) {
        if let Some(scan) = self.scan.take() {
            scan.abort();
        }
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        if self.peripheral.take().is_some() {
            tracing::debug!("ble session closed");
        }
    }
}
