//! Tracking whether the host adapter is powered on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use btleplug::api::{Central as _, CentralEvent, CentralState};
use btleplug::platform::Adapter;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

/// Last known power state of the adapter, shared with the watcher task.
#[derive(Debug, Clone)]
pub(crate) struct AdapterPower {
    on: Arc<AtomicBool>,
}

impl AdapterPower {
    pub(crate) fn new(on: bool) -> Self {
        Self {
            on: Arc::new(AtomicBool::new(on)),
        }
    }

    pub(crate) fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }

    /// Store `state`; returns `true` when the flag flipped.
    pub(crate) fn record(&self, state: &CentralState) -> bool {
        let on = matches!(state, CentralState::PoweredOn);
        self.on.swap(on, Ordering::Relaxed) != on
    }

    /// Follow the adapter's `StateUpdate` events until the stream ends.
    pub(crate) fn watch(&self, adapter: Adapter) -> JoinHandle<()> {
        let power = self.clone();
        tokio::spawn(async move {
            let mut stream = match adapter.events().await {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::warn!(%err, "could not follow adapter power state");
                    return;
                }
            };
            while let Some(event) = stream.next().await {
                if let CentralEvent::StateUpdate(state) = event
                    && power.record(&state)
                {
                    tracing::info!(?state, "adapter power changed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_follow_power_updates() {
        let power = AdapterPower::new(false);

        assert!(power.record(&CentralState::PoweredOn));
        assert!(power.is_on());
        assert!(!power.record(&CentralState::PoweredOn));

        assert!(power.record(&CentralState::PoweredOff));
        assert!(!power.is_on());
    }

    #[test]
    fn should_treat_unknown_state_as_off() {
        let power = AdapterPower::new(true);

        assert!(power.record(&CentralState::Unknown));
        assert!(!power.is_on());
    }

    #[test]
    fn should_share_state_between_clones() {
        let power = AdapterPower::new(false);
        let watcher_side = power.clone();

        watcher_side.record(&CentralState::PoweredOn);

        assert!(power.is_on());
    }
}
