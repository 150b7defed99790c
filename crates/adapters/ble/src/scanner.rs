//! Scanning for the LED controller.

use std::time::Duration;

use btleplug::api::{Central, CentralEvent, CentralState, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Peripheral};
use tokio_stream::StreamExt as _;
use uuid::Uuid;

use nanoled_app::ports::ScannedPeripheral;

use crate::error::BleError;

/// Whether the adapter reports itself powered on.
///
/// An adapter that cannot report its state is assumed usable: some
/// platforms only know once a scan has been attempted.
pub(crate) async fn adapter_enabled(adapter: &Adapter) -> bool {
    match adapter.adapter_state().await {
        Ok(CentralState::PoweredOn) => true,
        Ok(state) => {
            tracing::debug!(?state, "adapter not powered on");
            false
        }
        Err(err) => {
            tracing::warn!(%err, "could not read adapter state, assuming enabled");
            true
        }
    }
}

/// Scan until the first peripheral advertising `service` shows up.
///
/// The scan is left running; the caller stops it.
///
/// # Errors
///
/// Returns [`BleError::ScanTimeout`] when `timeout` elapses first,
/// [`BleError::ScanEnded`] when the adapter's event stream closes, or
/// [`BleError::Btleplug`] when the adapter rejects the scan.
pub(crate) async fn first_match(
    adapter: &Adapter,
    service: Uuid,
    timeout: Option<Duration>,
) -> Result<ScannedPeripheral, BleError> {
    let mut events = adapter.events().await?;
    adapter
        .start_scan(ScanFilter {
            services: vec![service],
        })
        .await?;

    let search = async {
        while let Some(event) = events.next().await {
            let (CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id)) = event
            else {
                continue;
            };
            let Ok(peripheral) = adapter.peripheral(&id).await else {
                continue;
            };
            if let Some(found) = matching(&peripheral, service).await {
                return Ok(found);
            }
        }
        Err(BleError::ScanEnded)
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, search)
            .await
            .map_err(|_| BleError::ScanTimeout {
                secs: limit.as_secs(),
            })?,
        None => search.await,
    }
}

/// `Some` when the peripheral advertises `service`.
async fn matching(peripheral: &Peripheral, service: Uuid) -> Option<ScannedPeripheral> {
    let props = peripheral.properties().await.ok().flatten()?;
    if !props.services.contains(&service) {
        tracing::trace!(id = %peripheral.id(), "advertisement without LED service");
        return None;
    }
    Some(ScannedPeripheral {
        id: peripheral.id().to_string(),
        name: props.local_name,
    })
}

/// Look a scanned peripheral up again by its id.
///
/// # Errors
///
/// Returns [`BleError::PeripheralNotFound`] when the adapter has forgotten it.
pub(crate) async fn find_peripheral(adapter: &Adapter, id: &str) -> Result<Peripheral, BleError> {
    adapter
        .peripherals()
        .await?
        .into_iter()
        .find(|p| p.id().to_string() == id)
        .ok_or_else(|| BleError::PeripheralNotFound { id: id.to_owned() })
}
