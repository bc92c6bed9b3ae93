//! Batch driver over lists of card photographs.
//!
//! Walks the input files in order, runs the recognition pipeline on each
//! and hands one outcome per file to a sink. A shared cancel token stops
//! the run between files; files after the stop point get no outcome at
//! all. Per-file problems are recorded in the outcome, only sink errors
//! abort the batch.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::vision::{AttemptResult, CardPipeline, TextRecognizer};

/// Terminal status of one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Recognition completed; the fields may still be empty.
    Success,
    /// Every recognition pass failed on every layout.
    Failure,
    /// The input path does not exist.
    FileMissing,
    /// The file could not be read or decoded as an image.
    ProcessingError,
}

/// Per-file extraction record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub filename: String,
    pub name: String,
    pub ethnicity: String,
    pub status: OutcomeStatus,
    pub note: Option<String>,
}

/// Anything that can run the full recognition pipeline on one file.
pub trait ImageRecognizer {
    fn recognize_image(&self, path: &Path) -> Result<AttemptResult>;
}

impl<E: TextRecognizer> ImageRecognizer for CardPipeline<E> {
    fn recognize_image(&self, path: &Path) -> Result<AttemptResult> {
        CardPipeline::recognize_image(self, path)
    }
}

/// Receives outcomes as they are produced.
pub trait OutcomeSink {
    fn record(&mut self, outcome: &Outcome) -> Result<()>;

    /// Called once after the last outcome, cancelled runs included.
    fn finish(&mut self, _summary: &BatchSummary) -> Result<()> {
        Ok(())
    }
}

/// Cooperative cancellation flag shared with the batch loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Tally of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub missing: usize,
    pub errored: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    /// Files that actually produced an outcome.
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.missing + self.errored
    }
}

/// Sequential driver that turns a list of image paths into outcomes.
pub struct BatchProcessor<R> {
    recognizer: R,
    cancel: CancelToken,
}

impl<R: ImageRecognizer> BatchProcessor<R> {
    pub fn new(recognizer: R) -> Self {
        Self {
            recognizer,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process every path in order, feeding each outcome to the sink.
    pub fn process<S: OutcomeSink>(
        &self,
        paths: &[PathBuf],
        sink: &mut S,
    ) -> Result<BatchSummary> {
        let mut summary = BatchSummary {
            total: paths.len(),
            ..Default::default()
        };

        for (index, path) in paths.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                info!(
                    processed = summary.processed(),
                    total = summary.total,
                    "batch cancelled, remaining files skipped"
                );
                break;
            }

            info!(
                image = index + 1,
                total = summary.total,
                file = %path.display(),
                "processing image"
            );
            let outcome = self.process_one(path);
            match outcome.status {
                OutcomeStatus::Success => summary.succeeded += 1,
                OutcomeStatus::Failure => summary.failed += 1,
                OutcomeStatus::FileMissing => summary.missing += 1,
                OutcomeStatus::ProcessingError => summary.errored += 1,
            }
            sink.record(&outcome)?;
        }

        sink.finish(&summary)?;
        Ok(summary)
    }

    fn process_one(&self, path: &Path) -> Outcome {
        let filename = file_name_of(path);
        if !path.exists() {
            warn!(file = %filename, "input file missing");
            return Outcome {
                filename,
                name: String::new(),
                ethnicity: String::new(),
                status: OutcomeStatus::FileMissing,
                note: Some("file not found".to_string()),
            };
        }

        match self.recognizer.recognize_image(path) {
            Ok(attempt) if attempt.succeeded() => {
                info!(
                    file = %filename,
                    layout = attempt.layout,
                    name = %attempt.name,
                    ethnicity = %attempt.ethnicity,
                    "image processed"
                );
                Outcome {
                    filename,
                    name: attempt.name,
                    ethnicity: attempt.ethnicity,
                    status: OutcomeStatus::Success,
                    note: None,
                }
            }
            Ok(attempt) => {
                warn!(
                    file = %filename,
                    layout = attempt.layout,
                    error = attempt.error.as_deref().unwrap_or(""),
                    "every recognition pass failed"
                );
                Outcome {
                    filename,
                    name: attempt.name,
                    ethnicity: attempt.ethnicity,
                    status: OutcomeStatus::Failure,
                    note: attempt.error,
                }
            }
            Err(err) => {
                let note = format!("{err:#}");
                warn!(file = %filename, error = %note, "image processing failed");
                Outcome {
                    filename,
                    name: String::new(),
                    ethnicity: String::new(),
                    status: OutcomeStatus::ProcessingError,
                    note: Some(note),
                }
            }
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
