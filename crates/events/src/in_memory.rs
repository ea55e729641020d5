//! In-memory notifier for tests/dev.

use std::sync::{Mutex, mpsc};
use std::time::Duration;

use crate::event::Event;
use crate::notifier::{Notifier, NotifyError};

/// A subscription to the events flowing through an [`InMemoryNotifier`].
///
/// Each subscription gets a copy of every notified event (broadcast
/// semantics). Intended for single-threaded consumption.
#[derive(Debug)]
pub struct Subscription<E> {
    receiver: mpsc::Receiver<E>,
}

impl<E> Subscription<E> {
    /// Block until the next event is available.
    pub fn recv(&self) -> Result<E, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Result<E, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for an event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<E, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// In-memory fan-out notifier.
///
/// - No IO / no async
/// - Best-effort fan-out
/// - At-least-once acceptable (subscribers must be idempotent)
#[derive(Debug)]
pub struct InMemoryNotifier<E> {
    subscribers: Mutex<Vec<mpsc::Sender<E>>>,
}

impl<E> InMemoryNotifier<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber; it receives every event notified after this
    /// call returns.
    pub fn subscribe(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive events until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription { receiver: rx }
    }
}

impl<E> Default for InMemoryNotifier<E> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<E: Event> Notifier<E> for InMemoryNotifier<E> {
    fn notify(&self, events: &[E]) -> Result<(), NotifyError> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| NotifyError::Delivery("subscriber lock poisoned".to_string()))?;

        for event in events {
            // Drop any dead subscribers while delivering.
            subs.retain(|tx| tx.send(event.clone()).is_ok());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Ping {
        at: DateTime<Utc>,
    }

    impl Event for Ping {
        fn event_type(&self) -> &'static str {
            "test.ping"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn subscribers_receive_each_notified_event() {
        let notifier = InMemoryNotifier::new();
        let sub_a = notifier.subscribe();
        let sub_b = notifier.subscribe();

        let ping = Ping { at: Utc::now() };
        notifier.notify(std::slice::from_ref(&ping)).unwrap();

        assert_eq!(sub_a.recv_timeout(Duration::from_secs(1)).unwrap(), ping);
        assert_eq!(sub_b.recv_timeout(Duration::from_secs(1)).unwrap(), ping);
    }

    #[test]
    fn dropped_subscribers_do_not_fail_delivery() {
        let notifier = InMemoryNotifier::new();
        drop(notifier.subscribe());
        let live = notifier.subscribe();

        let ping = Ping { at: Utc::now() };
        notifier.notify(std::slice::from_ref(&ping)).unwrap();

        assert_eq!(live.recv_timeout(Duration::from_secs(1)).unwrap(), ping);
    }
}
