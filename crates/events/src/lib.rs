//! `corebank-events` — event contract and post-commit notification.
//!
//! Events describe **committed** state changes. The write path persists
//! first, then hands the resulting events to a [`Notifier`]; delivery is
//! best-effort and never affects the outcome of the write that produced it.

pub mod event;
pub mod in_memory;
pub mod notifier;

pub use event::Event;
pub use in_memory::{InMemoryNotifier, Subscription};
pub use notifier::{Notifier, NotifyError, TracingNotifier};
