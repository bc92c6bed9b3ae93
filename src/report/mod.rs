//! Report serialization.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::batch::{BatchSummary, Outcome, OutcomeSink};

/// Buffers outcomes and writes them as a pretty-printed JSON array once
/// the batch finishes. Nothing touches the filesystem before `finish`,
/// so a cancelled run still leaves a complete report of what it did.
pub struct JsonReportSink {
    path: PathBuf,
    outcomes: Vec<Outcome>,
}

impl JsonReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            outcomes: Vec::new(),
        }
    }
}

impl OutcomeSink for JsonReportSink {
    fn record(&mut self, outcome: &Outcome) -> Result<()> {
        self.outcomes.push(outcome.clone());
        Ok(())
    }

    fn finish(&mut self, summary: &BatchSummary) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("creating report directory {}", parent.display())
                })?;
            }
        }

        let json =
            serde_json::to_string_pretty(&self.outcomes).context("serializing report")?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing report {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            records = self.outcomes.len(),
            succeeded = summary.succeeded,
            "report written"
        );
        Ok(())
    }
}

/// Collecting sink for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    pub outcomes: Vec<Outcome>,
    pub finished: Option<BatchSummary>,
}

#[cfg(test)]
impl OutcomeSink for MemorySink {
    fn record(&mut self, outcome: &Outcome) -> Result<()> {
        self.outcomes.push(outcome.clone());
        Ok(())
    }

    fn finish(&mut self, summary: &BatchSummary) -> Result<()> {
        self.finished = Some(*summary);
        Ok(())
    }
}
