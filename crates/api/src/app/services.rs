//! Infrastructure wiring for the HTTP layer.
//!
//! Backend selection happens here: with `DATABASE_URL` set the service runs
//! against Postgres; without it, an in-memory store is wired in so the API
//! can run in dev/test without external services. The rest of the app only
//! ever sees the [`LedgerWriter`] over trait objects.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use corebank_events::{Notifier, TracingNotifier};
use corebank_infra::{InMemoryLedgerStore, LedgerStore, LedgerWriter, PostgresLedgerStore};
use corebank_ledger::LedgerEvent;

type DynLedgerWriter = LedgerWriter<Arc<dyn LedgerStore>, Arc<dyn Notifier<LedgerEvent>>>;

/// Shared application services handed to every handler.
pub struct AppServices {
    writer: DynLedgerWriter,
}

impl AppServices {
    pub fn new(store: Arc<dyn LedgerStore>, notifier: Arc<dyn Notifier<LedgerEvent>>) -> Self {
        Self {
            writer: LedgerWriter::new(store, notifier),
        }
    }

    /// Fully in-memory services (dev mode and black-box tests).
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(TracingNotifier::new()),
        )
    }

    pub fn writer(&self) -> &DynLedgerWriter {
        &self.writer
    }
}

/// Build services from the process environment.
pub async fn build_services() -> anyhow::Result<AppServices> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await?;
            tracing::info!("ledger store backend: postgres");
            Ok(AppServices::new(
                Arc::new(PostgresLedgerStore::new(pool)),
                Arc::new(TracingNotifier::new()),
            ))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory ledger store");
            Ok(AppServices::in_memory())
        }
    }
}
