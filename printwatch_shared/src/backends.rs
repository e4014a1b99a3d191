//! Collaborator traits the ingestion path writes through.
//!
//! Only the shapes the reconciler needs are fixed here. In-memory
//! implementations live in the service crate; real deployments put a
//! database and a cache behind the same traits.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::print_job::{CurrentPrint, PrintChange, PrintEventKind, PrintStamp};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("current print for printer {printer_id} changed concurrently")]
    Conflict { printer_id: String },
    #[error("backend error: {0}")]
    Backend(String),
}

/// Durable per-printer "current print" record.
#[async_trait]
pub trait PrintStateStore: Send + Sync + 'static {
    async fn load(&self, printer_id: &str) -> Result<Option<CurrentPrint>, StoreError>;

    /// Apply `change` only if the stored current print still has the stamp
    /// `expected` (or is still absent when `expected` is `None`). Otherwise
    /// fails with [`StoreError::Conflict`] and stores nothing.
    async fn commit(
        &self,
        printer_id: &str,
        expected: Option<PrintStamp>,
        change: PrintChange,
    ) -> Result<(), StoreError>;

    /// Retired prints, oldest first.
    async fn history(&self, printer_id: &str) -> Result<Vec<CurrentPrint>, StoreError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync + 'static {
    async fn set(&self, printer_id: &str, settings: BTreeMap<String, String>) -> Result<(), StoreError>;
    async fn get(&self, printer_id: &str) -> Result<Option<BTreeMap<String, String>>, StoreError>;
}

/// Short-lived status snapshot shown to the UI.
#[async_trait]
pub trait StatusCache: Send + Sync + 'static {
    async fn set(
        &self,
        printer_id: &str,
        status: BTreeMap<String, String>,
        ttl: Duration,
    ) -> Result<(), StoreError>;
    /// `None` once the entry has expired.
    async fn get(&self, printer_id: &str) -> Result<Option<BTreeMap<String, String>>, StoreError>;
}

#[async_trait]
pub trait PrintEventLog: Send + Sync + 'static {
    async fn record(&self, print: &CurrentPrint, kind: PrintEventKind) -> Result<(), StoreError>;
}

/// Tells observers a printer's state may have changed.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, printer_id: &str) -> Result<(), StoreError>;
}
