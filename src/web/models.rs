//! Contains the data models for API responses.

use printwatch_shared::{CurrentPrint, JobState};
use serde::Serialize;
use std::collections::BTreeMap;

/// Response for `GET /api/v1/printers/{printer_id}/current_print`.
#[derive(Serialize, Debug)]
pub struct CurrentPrintResponse {
    pub state: JobState,
    pub print: CurrentPrint,
}

impl From<CurrentPrint> for CurrentPrintResponse {
    fn from(print: CurrentPrint) -> Self {
        Self { state: print.state(), print }
    }
}

/// Response for `GET /api/v1/printers/{printer_id}/status`.
#[derive(Serialize, Debug)]
pub struct StatusResponse {
    pub printer_id: String,
    /// Normalized `state`, `progress` and `temperatures`, each as a string.
    pub status: BTreeMap<String, String>,
}

/// Response for `GET /api/v1/printers/{printer_id}/prints`.
#[derive(Serialize, Debug)]
pub struct PrintHistoryResponse {
    pub printer_id: String,
    pub prints: Vec<CurrentPrint>,
}
