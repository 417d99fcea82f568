//! The `Engine` handle: the single explicit owner of what `SPEC_FULL.md` §5
//! otherwise calls out as process-scoped singletons (registry, ID generator,
//! reaper ticker, removal queue). `init`/`shutdown` on the handle replace
//! globals, per §9's recommendation.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use siem_kernel::{AssetLookup, Clock, IdGenerator, RuleMatcher};
use siem_types::{Directive, NormalizedEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::alarm::AlarmSink;
use crate::dispatcher;
use crate::registry::Registry;

const REMOVAL_QUEUE_CAPACITY: usize = 1024;

/// Everything the dispatcher and reaper need from the host, bundled so
/// `Engine::init` takes one argument instead of four.
pub struct Collaborators {
    pub matcher: Arc<dyn RuleMatcher>,
    pub assets: Arc<dyn AssetLookup>,
    pub alarm: Arc<dyn AlarmSink>,
    pub clock: Arc<dyn Clock>,
}

pub struct Engine {
    registry: Arc<Registry>,
    id_gen: Mutex<IdGenerator>,
    collaborators: Collaborators,
    removal_tx: mpsc::Sender<String>,
    removal_consumer: JoinHandle<()>,
    reaper_handle: JoinHandle<()>,
    reaper_shutdown: oneshot::Sender<()>,
}

impl Engine {
    /// §6 `init()`: seeds the ID generator, starts the reaper, starts the
    /// removal consumer.
    pub fn init(collaborators: Collaborators, id_seed: u64) -> Self {
        let registry = Arc::new(Registry::new());
        let (removal_tx, mut removal_rx) = mpsc::channel::<String>(REMOVAL_QUEUE_CAPACITY);

        let consumer_registry = registry.clone();
        let removal_consumer = tokio::spawn(async move {
            while let Some(id) = removal_rx.recv().await {
                consumer_registry.remove(&id);
            }
        });

        let (reaper_handle, reaper_shutdown) = crate::reaper::spawn(
            registry.clone(),
            collaborators.clock.clone(),
            collaborators.alarm.clone(),
            removal_tx.clone(),
        );

        Self {
            registry,
            id_gen: Mutex::new(IdGenerator::new(id_seed)),
            collaborators,
            removal_tx,
            removal_consumer,
            reaper_handle,
            reaper_shutdown,
        }
    }

    /// §6 `process(event, directive)`. Isolates a panic inside a single
    /// event's processing so one malformed event cannot bring the process
    /// down (§7).
    pub fn process(&self, event: &NormalizedEvent, directive: &Directive) {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            dispatcher::process(
                event,
                directive,
                &self.registry,
                &self.id_gen,
                self.collaborators.matcher.as_ref(),
                self.collaborators.assets.as_ref(),
                self.collaborators.alarm.as_ref(),
                self.collaborators.clock.as_ref(),
                &self.removal_tx,
            );
        }));
        if let Err(panic) = result {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(conn_id = %event.conn_id, event_id = %event.event_id, %message, "event processing panicked, dropping event");
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The §6 backlog-snapshot projection of every currently live backlog.
    pub fn snapshots(&self) -> Vec<siem_types::BacklogSnapshot> {
        self.registry.snapshot().iter().map(|b| b.snapshot()).collect()
    }

    /// Cancels the reaper's ticker, drains pending removals, stops
    /// accepting new removal requests.
    pub async fn shutdown(self) {
        let _ = self.reaper_shutdown.send(());
        let _ = self.reaper_handle.await;
        drop(self.removal_tx);
        let _ = self.removal_consumer.await;
    }
}
