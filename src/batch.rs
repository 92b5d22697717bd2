//! Batch assessment.
//!
//! Records are independent, so they run concurrently on the blocking pool,
//! bounded by a semaphore. Each record's outcome is isolated: an error or a
//! panic fails that record only. Cancelling stops records that have not yet
//! started; anything already finished stays in the report.

use crate::error::{ChurnError, Result};
use crate::pipeline::{customer_id, Assessment, ChurnPipeline};
use crate::record::RawRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared cancellation flag for a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Success,
    Error,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResult {
    /// Position in the input
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<Assessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_processed: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    pub results: Vec<RecordResult>,
}

pub struct BatchRunner {
    pipeline: Arc<ChurnPipeline>,
    workers: usize,
    cancel: CancelToken,
}

impl BatchRunner {
    /// Runner using the pipeline's configured worker count.
    pub fn new(pipeline: Arc<ChurnPipeline>) -> Self {
        let workers = pipeline.config().batch.workers.max(1);
        Self {
            pipeline,
            workers,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Assess every record; results come back in input order.
    pub async fn run(&self, records: Vec<RawRecord>) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "Batch {} started: {} records, {} workers",
            run_id,
            records.len(),
            self.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let handles: Vec<_> = records
            .into_iter()
            .map(|record| {
                let semaphore = Arc::clone(&semaphore);
                let pipeline = Arc::clone(&self.pipeline);
                let cancel = self.cancel.clone();
                let id = customer_id(&record);
                let handle = tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| ChurnError::Cancelled)?;
                    if cancel.is_cancelled() {
                        return Err(ChurnError::Cancelled);
                    }
                    tokio::task::spawn_blocking(move || pipeline.assess(&record))
                        .await
                        .map_err(|e| ChurnError::Inference(format!("Record task failed: {}", e)))?
                });
                (id, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (index, (customer_id, handle)) in handles.into_iter().enumerate() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(ChurnError::Inference(format!("Record task failed: {}", e))),
            };
            results.push(match outcome {
                Ok(assessment) => RecordResult {
                    index,
                    customer_id,
                    status: RecordStatus::Success,
                    assessment: Some(assessment),
                    error: None,
                },
                Err(ChurnError::Cancelled) => RecordResult {
                    index,
                    customer_id,
                    status: RecordStatus::Skipped,
                    assessment: None,
                    error: None,
                },
                Err(e) => {
                    warn!("Record {} failed: {}", index, e);
                    RecordResult {
                        index,
                        customer_id,
                        status: RecordStatus::Error,
                        assessment: None,
                        error: Some(e.to_string()),
                    }
                }
            });
        }

        let count = |status: RecordStatus| results.iter().filter(|r| r.status == status).count();
        let success_count = count(RecordStatus::Success);
        let error_count = count(RecordStatus::Error);
        let skipped_count = count(RecordStatus::Skipped);

        let report = BatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            total_processed: success_count + error_count,
            success_count,
            error_count,
            skipped_count,
            results,
        };
        info!(
            "Batch {} finished: {} ok, {} failed, {} skipped",
            run_id, report.success_count, report.error_count, report.skipped_count
        );
        report
    }
}

/// Read records from a CSV (header row = field names) or JSON lines file.
/// A `.json` file may also hold a single array of records.
pub fn read_records(path: &Path) -> Result<Vec<RawRecord>> {
    let file = std::fs::File::open(path)?;
    match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
        Some("csv") => records_from_csv(file),
        Some("json") => {
            let mut content = String::new();
            BufReader::new(file).read_to_string(&mut content)?;
            if content.trim_start().starts_with('[') {
                Ok(serde_json::from_str(&content)?)
            } else {
                records_from_jsonl(content.as_bytes())
            }
        }
        _ => records_from_jsonl(BufReader::new(file)),
    }
}

pub fn records_from_csv<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: RawRecord = headers
            .iter()
            .zip(row.iter())
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(name, cell)| (name.to_string(), Value::String(cell.to_string())))
            .collect();
        records.push(record);
    }
    Ok(records)
}

pub fn records_from_jsonl<R: BufRead>(reader: R) -> Result<Vec<RawRecord>> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: RawRecord = serde_json::from_str(&line)
            .map_err(|e| ChurnError::Input(format!("line {}: {}", line_no + 1, e)))?;
        records.push(record);
    }
    Ok(records)
}
