//! Concrete §4.H alarm sink: an append-only JSON-Lines event journal plus an
//! in-memory table of current alarm projections, grounded on the teacher's
//! append-only compliance audit log (`ComplianceAuditLog`).

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use siem_runtime::{AlarmError, AlarmSink};
use siem_types::{AlarmEventRecord, BacklogSnapshot};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("failed to open alarm-event journal at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write alarm-event journal: {0}")]
    Write(#[source] std::io::Error),
}

impl From<JournalError> for AlarmError {
    fn from(err: JournalError) -> Self {
        AlarmError::SinkUnavailable(err.to_string())
    }
}

/// Appends one line per matched event to `logs/siem_alarm_events.json`
/// (§6), and keeps the current alarm projection for every live backlog in
/// an in-memory table for diagnostics (the CLI's `status` subcommand).
pub struct FileAlarmSink {
    journal: Mutex<File>,
    alarms: Mutex<BTreeMap<String, BacklogSnapshot>>,
}

impl FileAlarmSink {
    /// Opens (creating if absent) `<base_dir>/logs/siem_alarm_events.json`
    /// in append mode. `base_dir/logs` must already exist (§6's
    /// environment precondition) — this does not create directories.
    pub fn open(base_dir: &Path) -> Result<Self, JournalError> {
        let path = base_dir.join("logs").join("siem_alarm_events.json");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| JournalError::Open {
                path: path.clone(),
                source,
            })?;
        restrict_permissions(&file, &path);
        Ok(Self {
            journal: Mutex::new(file),
            alarms: Mutex::new(BTreeMap::new()),
        })
    }

    /// Current alarm projections, ordered by backlog id, for diagnostics.
    pub fn snapshots(&self) -> Vec<BacklogSnapshot> {
        self.alarms.lock().expect("alarm table poisoned").values().cloned().collect()
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &File, path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(err) = file.set_permissions(std::fs::Permissions::from_mode(0o600)) {
        tracing::warn!(?path, %err, "failed to restrict alarm journal permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &File, _path: &Path) {}

impl AlarmSink for FileAlarmSink {
    fn alarm_upsert(&self, snapshot: &BacklogSnapshot) -> Result<(), AlarmError> {
        self.alarms
            .lock()
            .expect("alarm table poisoned")
            .insert(snapshot.backlog_id.clone(), snapshot.clone());
        Ok(())
    }

    fn alarm_remove(&self, backlog_id: &str) -> Result<(), AlarmError> {
        self.alarms.lock().expect("alarm table poisoned").remove(backlog_id);
        Ok(())
    }

    fn record_event(&self, record: &AlarmEventRecord) -> Result<(), AlarmError> {
        let line = serde_json::to_string(record).map_err(|err| AlarmError::SinkUnavailable(err.to_string()))?;
        let mut file = self.journal.lock().expect("journal mutex poisoned");
        writeln!(file, "{line}").map_err(JournalError::Write)?;
        file.flush().map_err(JournalError::Write)?;
        Ok(())
    }
}
