//! §4.F Reaper: a periodic single-flight scan expiring stage-timed-out
//! backlogs. Shape grounded on the teacher's cluster supervisor monitor
//! loop — a `tokio::time::interval` with `Skip` behavior (never lets ticks
//! pile up) raced against a shutdown signal in `tokio::select!`.

use std::sync::Arc;
use std::time::Duration;

use siem_kernel::Clock;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::alarm::AlarmSink;
use crate::registry::Registry;

const TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Spawns the reaper task. Returns a handle joinable on shutdown and the
/// sender used to request one.
pub fn spawn(
    registry: Arc<Registry>,
    clock: Arc<dyn Clock>,
    alarm: Arc<dyn AlarmSink>,
    removal_tx: mpsc::Sender<String>,
) -> (JoinHandle<()>, oneshot::Sender<()>) {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweep(&registry, clock.as_ref(), alarm.as_ref(), &removal_tx).await;
                }
                _ = &mut shutdown_rx => {
                    tracing::info!("reaper shutting down");
                    break;
                }
            }
        }
    });

    (handle, shutdown_tx)
}

async fn sweep(registry: &Registry, clock: &dyn Clock, alarm: &dyn AlarmSink, removal_tx: &mpsc::Sender<String>) {
    let now = clock.now();
    for backlog in registry.snapshot() {
        let timed_out = {
            let state = backlog.lock();
            state.is_stage_timed_out(now)
        };
        if !timed_out {
            continue;
        }
        let id = {
            let mut state = backlog.lock();
            state.mark_timed_out(now);
            state.id.clone()
        };
        if let Err(err) = alarm.alarm_remove(&id) {
            tracing::warn!(backlog_id = %id, %err, "alarm remove failed during reaping");
        }
        if removal_tx.send(id.clone()).await.is_err() {
            tracing::warn!(backlog_id = %id, "removal consumer gone, backlog will leak in registry");
        }
    }
}
