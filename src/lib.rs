// printwatch: reconciles printer agent status reports into current print state

pub mod config;
pub mod ingest;
pub mod memory;
pub mod normalizer;
pub mod reconcile;
pub mod replay;
pub mod web;

pub use ingest::{Backends, IngestError, IngestOutcome, Protocol, StatusIngestor};
pub use memory::MemoryBackends;
pub use printwatch_shared::{Clock, ManualClock, SystemClock};
