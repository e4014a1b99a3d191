//! In-memory collaborators for tests, replays and single-node deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use printwatch_shared::{
    Clock, CurrentPrint, Notifier, PrintChange, PrintEventKind, PrintEventLog, PrintStamp,
    PrintStateStore, SettingsStore, StatusCache, StoreError,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ingest::Backends;

#[derive(Debug, Default)]
struct PrinterRecord {
    current: Option<CurrentPrint>,
    history: Vec<CurrentPrint>,
}

#[derive(Debug, Default)]
pub struct InMemoryPrintStore {
    printers: Mutex<HashMap<String, PrinterRecord>>,
}

impl InMemoryPrintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a printer's current print, bypassing the compare-and-set check.
    pub fn put_current(&self, print: CurrentPrint) {
        let mut printers = self.printers.lock().unwrap_or_else(PoisonError::into_inner);
        let printer_id = print.printer_id.clone();
        printers.entry(printer_id).or_default().current = Some(print);
    }
}

#[async_trait]
impl PrintStateStore for InMemoryPrintStore {
    async fn load(&self, printer_id: &str) -> Result<Option<CurrentPrint>, StoreError> {
        let printers = self.printers.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(printers.get(printer_id).and_then(|record| record.current.clone()))
    }

    async fn commit(
        &self,
        printer_id: &str,
        expected: Option<PrintStamp>,
        change: PrintChange,
    ) -> Result<(), StoreError> {
        let mut printers = self.printers.lock().unwrap_or_else(PoisonError::into_inner);
        let record = printers.entry(printer_id.to_string()).or_default();
        if record.current.as_ref().map(CurrentPrint::stamp) != expected {
            return Err(StoreError::Conflict { printer_id: printer_id.to_string() });
        }
        if let Some(retired) = change.retired {
            record.history.push(retired);
        }
        record.current = change.current;
        Ok(())
    }

    async fn history(&self, printer_id: &str) -> Result<Vec<CurrentPrint>, StoreError> {
        let printers = self.printers.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(printers.get(printer_id).map(|record| record.history.clone()).unwrap_or_default())
    }
}

/// Settings are merged key by key, like a hash in a key/value store.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    settings: Mutex<HashMap<String, BTreeMap<String, String>>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn set(&self, printer_id: &str, settings: BTreeMap<String, String>) -> Result<(), StoreError> {
        let mut all = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        all.entry(printer_id.to_string()).or_default().extend(settings);
        Ok(())
    }

    async fn get(&self, printer_id: &str) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        let all = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(all.get(printer_id).cloned())
    }
}

/// Status snapshots that expire. Each write replaces the previous snapshot
/// and restarts its TTL.
pub struct InMemoryStatusCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, (BTreeMap<String, String>, DateTime<Utc>)>>,
}

impl InMemoryStatusCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, entries: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl StatusCache for InMemoryStatusCache {
    async fn set(
        &self,
        printer_id: &str,
        status: BTreeMap<String, String>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| StoreError::Backend(e.to_string()))?;
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(ttl)
            .ok_or_else(|| StoreError::Backend(format!("status TTL of {}s overflows", ttl.num_seconds())))?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(printer_id.to_string(), (status, expires_at));
        Ok(())
    }

    async fn get(&self, printer_id: &str) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match entries.get(printer_id) {
            Some((status, expires_at)) if now < *expires_at => return Ok(Some(status.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(printer_id);
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintEventRecord {
    pub print_id: Uuid,
    pub printer_id: String,
    pub kind: PrintEventKind,
}

#[derive(Debug, Default)]
pub struct InMemoryPrintEventLog {
    records: Mutex<Vec<PrintEventRecord>>,
}

impl InMemoryPrintEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PrintEventRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl PrintEventLog for InMemoryPrintEventLog {
    async fn record(&self, print: &CurrentPrint, kind: PrintEventKind) -> Result<(), StoreError> {
        tracing::info!("Print '{}' on printer {}: {}", print.file_name, print.printer_id, kind);
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(PrintEventRecord {
            print_id: print.id,
            printer_id: print.printer_id.clone(),
            kind,
        });
        Ok(())
    }
}

/// Published once per processed report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterUpdated {
    pub printer_id: String,
}

/// Fans printer updates out to UI subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<PrinterUpdated>,
}

impl BroadcastNotifier {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PrinterUpdated> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, printer_id: &str) -> Result<(), StoreError> {
        // No subscribers is not an error; nobody is watching this printer.
        if self.tx.send(PrinterUpdated { printer_id: printer_id.to_string() }).is_err() {
            tracing::debug!("No subscribers for printer {} update", printer_id);
        }
        Ok(())
    }
}

/// Concrete handles to every in-memory collaborator.
#[derive(Clone)]
pub struct MemoryBackends {
    pub prints: Arc<InMemoryPrintStore>,
    pub settings: Arc<InMemorySettingsStore>,
    pub status: Arc<InMemoryStatusCache>,
    pub events: Arc<InMemoryPrintEventLog>,
    pub notifier: Arc<BroadcastNotifier>,
}

impl MemoryBackends {
    pub fn new(clock: Arc<dyn Clock>, notify_buffer: usize) -> Self {
        Self {
            prints: Arc::new(InMemoryPrintStore::new()),
            settings: Arc::new(InMemorySettingsStore::new()),
            status: Arc::new(InMemoryStatusCache::new(clock)),
            events: Arc::new(InMemoryPrintEventLog::new()),
            notifier: Arc::new(BroadcastNotifier::new(notify_buffer)),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            prints: self.prints.clone(),
            settings: self.settings.clone(),
            status: self.status.clone(),
            events: self.events.clone(),
            notifier: self.notifier.clone(),
        }
    }
}
