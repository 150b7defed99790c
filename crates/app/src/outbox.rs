//! Ordered, re-entrant delivery of observer events.
//!
//! Events are pushed while the session lock is held, so the outbox order is
//! the critical-section order. Delivery happens after the lock is released:
//! the first caller that finds the outbox idle drains it, every other caller
//! (including one re-entering from inside the observer) only appends.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use nanoled_domain::event::ConnectorEvent;

use crate::ports::ConnectorObserver;

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<ConnectorEvent>,
    delivering: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Outbox {
    inner: Mutex<Inner>,
}

/// Resets the `delivering` flag even when an observer panics.
struct Delivering<'a>(&'a Outbox);

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        self.0.lock().delivering = false;
    }
}

impl Outbox {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, events: Vec<ConnectorEvent>) {
        if events.is_empty() {
            return;
        }
        self.lock().queue.extend(events);
    }

    pub(crate) fn deliver<O: ConnectorObserver>(&self, observer: &O) {
        {
            let mut inner = self.lock();
            if inner.delivering {
                return;
            }
            inner.delivering = true;
        }
        let guard = Delivering(self);
        loop {
            let next = {
                let mut inner = self.lock();
                match inner.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        inner.delivering = false;
                        break;
                    }
                }
            };
            observer.notify(&next);
        }
        std::mem::forget(guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Echo {
        outbox: Arc<Outbox>,
        seen: Mutex<Vec<String>>,
    }

    impl ConnectorObserver for Echo {
        fn status(&self, message: &str) {
            self.seen.lock().unwrap().push(message.to_owned());
            if message == "first" {
                self.outbox.push(vec![ConnectorEvent::status("nested")]);
                self.outbox.deliver(self);
            }
        }
        fn connected(&self) {}
        fn disconnected(&self) {}
        fn battery_voltage(&self, _volts: f32) {}
    }

    #[test]
    fn should_deliver_nested_events_after_current_batch() {
        let outbox = Arc::new(Outbox::default());
        let echo = Echo {
            outbox: Arc::clone(&outbox),
            seen: Mutex::new(Vec::new()),
        };

        outbox.push(vec![
            ConnectorEvent::status("first"),
            ConnectorEvent::status("second"),
        ]);
        outbox.deliver(&echo);

        assert_eq!(
            *echo.seen.lock().unwrap(),
            vec!["first", "second", "nested"]
        );
    }

    #[test]
    fn should_be_reusable_after_drain() {
        let outbox = Arc::new(Outbox::default());
        let echo = Echo {
            outbox: Arc::clone(&outbox),
            seen: Mutex::new(Vec::new()),
        };

        outbox.push(vec![ConnectorEvent::status("a")]);
        outbox.deliver(&echo);
        outbox.push(vec![ConnectorEvent::status("b")]);
        outbox.deliver(&echo);

        assert_eq!(*echo.seen.lock().unwrap(), vec!["a", "b"]);
    }
}
