//! Feeds recorded reports through an ingestion pipeline.
//!
//! Input is NDJSON. Each line is either a bare report or
//! `{"at": <epoch seconds>, "report": {...}}`; timed lines move the replay
//! clock before the report is processed so debounce windows behave as they
//! did live.

use chrono::DateTime;
use printwatch_shared::ManualClock;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::ingest::{IngestOutcome, StatusIngestor};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    Timed { at: i64, report: Value },
    Bare(Value),
}

#[derive(Debug, Default)]
pub struct ReplaySummary {
    pub outcomes: Vec<IngestOutcome>,
    /// Lines that were not valid JSON or were rejected by ingestion.
    pub rejected: usize,
}

pub async fn replay<R>(
    ingestor: &StatusIngestor,
    clock: &ManualClock,
    printer_id: &str,
    reader: R,
) -> std::io::Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = ReplaySummary::default();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let report = match serde_json::from_str::<ReplayLine>(&line) {
            Ok(ReplayLine::Timed { at, report }) => match DateTime::from_timestamp(at, 0) {
                Some(now) => {
                    clock.set(now);
                    report
                }
                None => {
                    tracing::warn!("Line {}: timestamp {} out of range", line_no, at);
                    summary.rejected += 1;
                    continue;
                }
            },
            Ok(ReplayLine::Bare(report)) => report,
            Err(e) => {
                tracing::warn!("Line {}: invalid JSON: {}", line_no, e);
                summary.rejected += 1;
                continue;
            }
        };
        match ingestor.ingest(printer_id, report).await {
            Ok(outcome) => summary.outcomes.push(outcome),
            Err(e) => {
                tracing::warn!("Line {}: {}", line_no, e);
                summary.rejected += 1;
            }
        }
    }

    Ok(summary)
}
