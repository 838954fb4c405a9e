//! JSON export of simulation runs.
//!
//! Two shapes: an append-only JSON-lines round log written as the run
//! progresses, and a single full-run document written at the end. Export is
//! strictly observational; a failed write is logged and the in-memory run
//! continues untouched.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::error;

use goodhart_core::record::RoundRecord;

/// Append-only JSON-lines round log, one record per line.
pub struct RoundLogWriter {
    path: PathBuf,
    file: Option<File>,
}

impl RoundLogWriter {
    /// Opens (or creates) the log for appending. An open failure is logged
    /// and yields a writer that drops records.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                error!(path = %path.display(), "failed to open round log: {e}");
                None
            }
        };
        Self { path, file }
    }

    /// Appends one record. Serialization or IO failure is logged, never
    /// propagated.
    pub fn append(&mut self, record: &RoundRecord) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                error!(round = record.round, "failed to serialize round record: {e}");
                return;
            }
        };
        if let Err(e) = writeln!(file, "{line}") {
            error!(path = %self.path.display(), round = record.round, "failed to append round record: {e}");
        }
    }
}

/// Complete run export for offline analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Full rounds executed (excluding the round-0 baseline)
    pub rounds: u64,

    /// Every round record, baseline first
    pub records: Vec<RoundRecord>,

    /// Final result
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl RunExport {
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            rounds: 0,
            records: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    pub fn add_record(&mut self, record: RoundRecord) {
        self.rounds = record.round;
        self.records.push(record);
    }

    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes the export as pretty JSON.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
