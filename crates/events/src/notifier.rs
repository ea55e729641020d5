//! Post-commit notification contract.
//!
//! A [`Notifier`] is the pluggable sink the write coordinator hands freshly
//! committed events to: a message bus, a webhook dispatcher, an audit log.
//! Delivery is fire-and-forget from the writer's perspective; a failed
//! delivery is reported to the caller for logging but must never be treated
//! as a failure of the already-committed write.

use std::sync::Arc;

use thiserror::Error;

use crate::event::Event;

/// Notification delivery error.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Delivery to the sink failed (events stay committed; safe to re-publish).
    #[error("event delivery failed: {0}")]
    Delivery(String),
}

/// Best-effort sink for committed domain events.
///
/// Implementations must tolerate redelivery: the write path may hand the
/// same events to a notifier again after a partial delivery failure, so
/// downstream consumers have to be idempotent.
pub trait Notifier<E: Event>: Send + Sync {
    /// Deliver an ordered batch of events produced by one committed write.
    fn notify(&self, events: &[E]) -> Result<(), NotifyError>;
}

impl<E, N> Notifier<E> for Arc<N>
where
    E: Event,
    N: Notifier<E> + ?Sized,
{
    fn notify(&self, events: &[E]) -> Result<(), NotifyError> {
        (**self).notify(events)
    }
}

/// Notifier that only logs events.
///
/// Mirrors what a production deployment does before a real broker is wired
/// in: every committed event is visible in the structured logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl<E: Event> Notifier<E> for TracingNotifier {
    fn notify(&self, events: &[E]) -> Result<(), NotifyError> {
        for event in events {
            tracing::info!(
                event_type = event.event_type(),
                occurred_at = %event.occurred_at(),
                "domain event dispatched"
            );
        }
        Ok(())
    }
}
