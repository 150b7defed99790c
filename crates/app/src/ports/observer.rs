//! Observer port: how the connector talks to the user interface.

use std::sync::Arc;

use nanoled_domain::event::ConnectorEvent;

/// Receives the connector's lifecycle events.
///
/// Calls arrive outside the connector's critical section, so an observer may
/// call straight back into the connector (e.g. issue a write from
/// [`connected`](Self::connected)).
pub trait ConnectorObserver: Send + Sync {
    /// A free-form log line.
    fn status(&self, message: &str);

    /// Initialization finished and cached values are valid.
    fn connected(&self);

    /// The session ended.
    fn disconnected(&self);

    /// A battery voltage read completed.
    fn battery_voltage(&self, volts: f32);

    /// Dispatch a [`ConnectorEvent`] to the matching method.
    fn notify(&self, event: &ConnectorEvent) {
        match event {
            ConnectorEvent::Status { message } => self.status(message),
            ConnectorEvent::Connected => self.connected(),
            ConnectorEvent::Disconnected => self.disconnected(),
            ConnectorEvent::BatteryVoltage { volts } => self.battery_voltage(*volts),
        }
    }
}

impl<T: ConnectorObserver + ?Sized> ConnectorObserver for Arc<T> {
    fn status(&self, message: &str) {
        (**self).status(message);
    }

    fn connected(&self) {
        (**self).connected();
    }

    fn disconnected(&self) {
        (**self).disconnected();
    }

    fn battery_voltage(&self, volts: f32) {
        (**self).battery_voltage(volts);
    }

    fn notify(&self, event: &ConnectorEvent) {
        (**self).notify(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl ConnectorObserver for Calls {
        fn status(&self, message: &str) {
            self.0.lock().unwrap().push(format!("status:{message}"));
        }
        fn connected(&self) {
            self.0.lock().unwrap().push("connected".to_owned());
        }
        fn disconnected(&self) {
            self.0.lock().unwrap().push("disconnected".to_owned());
        }
        fn battery_voltage(&self, volts: f32) {
            self.0.lock().unwrap().push(format!("voltage:{volts}"));
        }
    }

    #[test]
    fn should_dispatch_each_event_to_its_method() {
        let calls = Arc::new(Calls::default());
        let observer: Arc<Calls> = Arc::clone(&calls);
        observer.notify(&ConnectorEvent::status("hello"));
        observer.notify(&ConnectorEvent::Connected);
        observer.notify(&ConnectorEvent::BatteryVoltage { volts: 3.5 });
        observer.notify(&ConnectorEvent::Disconnected);

        assert_eq!(
            *calls.0.lock().unwrap(),
            vec!["status:hello", "connected", "voltage:3.5", "disconnected"]
        );
    }
}
