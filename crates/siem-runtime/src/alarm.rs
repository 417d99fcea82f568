//! §4.H Alarm Projector: the trait the core calls; concrete sinks
//! (file-backed, in-memory) live outside this crate.

use siem_types::{AlarmEventRecord, BacklogSnapshot};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("alarm sink unavailable: {0}")]
    SinkUnavailable(String),
}

/// Pushes alarm deltas derived from a backlog to wherever alarms are
/// consumed. Calls are idempotent from the core's point of view: it never
/// retries a failed projection itself (§7 `SinkUnavailable`).
pub trait AlarmSink: Send + Sync {
    fn alarm_upsert(&self, snapshot: &BacklogSnapshot) -> Result<(), AlarmError>;
    fn alarm_remove(&self, backlog_id: &str) -> Result<(), AlarmError>;
    fn record_event(&self, record: &AlarmEventRecord) -> Result<(), AlarmError>;
}

/// Sink that drops everything. Useful for tests and for `validate`-style CLI
/// runs that resolve directives without wanting to touch disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAlarmSink;

impl AlarmSink for NullAlarmSink {
    fn alarm_upsert(&self, _snapshot: &BacklogSnapshot) -> Result<(), AlarmError> {
        Ok(())
    }
    fn alarm_remove(&self, _backlog_id: &str) -> Result<(), AlarmError> {
        Ok(())
    }
    fn record_event(&self, _record: &AlarmEventRecord) -> Result<(), AlarmError> {
        Ok(())
    }
}
