//! §4.G Dispatcher: per-event matching against live backlogs, with
//! create-new fallback.

use std::sync::{Arc, Mutex};

use siem_kernel::{resolve_directive, AssetLookup, BacklogState, Clock, Effect, IdGenerator, RuleMatcher};
use siem_types::{AlarmEventRecord, Directive, NormalizedEvent};
use tokio::sync::mpsc;

use crate::alarm::AlarmSink;
use crate::registry::{Backlog, Registry};

fn execute_effects(
    backlog: &Arc<Backlog>,
    effects: &[Effect],
    alarm: &dyn AlarmSink,
    removal_tx: &mpsc::Sender<String>,
) {
    for effect in effects {
        match effect {
            Effect::RecordEvent {
                backlog_id,
                stage,
                event_id,
            } => {
                let record = AlarmEventRecord {
                    alarm_id: backlog_id.clone(),
                    stage: *stage,
                    event_id: event_id.clone(),
                };
                if let Err(err) = alarm.record_event(&record) {
                    tracing::warn!(backlog_id = %backlog_id, %err, "alarm event record failed");
                }
            }
            Effect::AlarmChanged => {
                let snapshot = backlog.snapshot();
                if let Err(err) = alarm.alarm_upsert(&snapshot) {
                    tracing::warn!(backlog_id = %snapshot.backlog_id, %err, "alarm upsert failed");
                }
            }
            Effect::Completed | Effect::TimedOut => {
                let id = backlog.lock().id.clone();
                if let Err(err) = alarm.alarm_remove(&id) {
                    tracing::warn!(backlog_id = %id, %err, "alarm remove failed");
                }
                if removal_tx.try_send(id.clone()).is_err() {
                    tracing::warn!(backlog_id = %id, "removal queue full or closed, dropping removal request");
                }
            }
        }
    }
}

/// §4.G: the dispatcher entry point, invoked once per `(event, directive)`
/// candidate pair. Never panics across a single call unless the caller's
/// collaborators themselves are broken; `siem-runtime::Engine::process`
/// isolates panics at this boundary.
#[allow(clippy::too_many_arguments)]
pub fn process(
    event: &NormalizedEvent,
    directive: &Directive,
    registry: &Registry,
    id_gen: &Mutex<IdGenerator>,
    matcher: &dyn RuleMatcher,
    assets: &dyn AssetLookup,
    alarm: &dyn AlarmSink,
    clock: &dyn Clock,
    removal_tx: &mpsc::Sender<String>,
) {
    let now = clock.now();
    let candidates = registry.by_directive(directive.id);
    let mut found = false;

    for backlog in &candidates {
        let (stage_idx, matched) = {
            let state = backlog.lock();
            if state.current_stage <= 1 {
                continue;
            }
            let idx = state.current_stage - 1;
            (idx, matcher.matches(event, &state.directive.rules[idx].rule))
        };
        if !matched {
            continue;
        }
        found = true;
        let effects = backlog.lock().process_matched_event(event, stage_idx, now, assets);
        execute_effects(backlog, &effects, alarm, removal_tx);
    }

    if found {
        return;
    }

    let id = id_gen.lock().expect("id generator poisoned").next_id();
    let resolved = match resolve_directive(directive, event, assets) {
        Ok(d) => d,
        Err(err) => {
            tracing::warn!(conn_id = %event.conn_id, %err, "dropping event: directive failed to resolve");
            return;
        }
    };

    let (state, mut effects) = BacklogState::new(id, resolved, now, event, assets);
    let backlog = Arc::new(Backlog::new(state));
    effects.extend(backlog.lock().process_matched_event(event, 0, now, assets));
    registry.insert(backlog.clone());
    execute_effects(&backlog, &effects, alarm, removal_tx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use siem_kernel::{AssetLookup, RuleMatcher};
    use siem_types::{AddrSpec, Directive, PortSpec, Rule};
    use std::collections::BTreeMap;

    struct AlwaysMatches;
    impl RuleMatcher for AlwaysMatches {
        fn matches(&self, _event: &NormalizedEvent, _rule: &Rule) -> bool {
            true
        }
    }

    struct NoAssets;
    impl AssetLookup for NoAssets {
        fn asset_name(&self, _ip: std::net::IpAddr) -> Option<String> {
            None
        }
        fn asset_value(&self, _ip: std::net::IpAddr) -> i64 {
            0
        }
    }

    struct FixedClock(i64);
    impl siem_kernel::Clock for FixedClock {
        fn now(&self) -> i64 {
            self.0
        }
    }

    fn stage(occurrence: u32) -> Rule {
        Rule {
            from: AddrSpec::Any,
            to: AddrSpec::Any,
            port_from: PortSpec::Any,
            port_to: PortSpec::Any,
            occurrence,
            timeout: 60,
            reliability: 1,
            attributes: BTreeMap::new(),
        }
    }

    fn event(id: &str) -> NormalizedEvent {
        NormalizedEvent {
            event_id: id.into(),
            src_ip: "1.1.1.1".parse().unwrap(),
            dst_ip: "2.2.2.2".parse().unwrap(),
            src_port: 1,
            dst_port: 2,
            conn_id: "c".into(),
            attributes: BTreeMap::new(),
        }
    }

    /// §9 open question 1: a stage-1 candidate never rescans existing
    /// stage-1 backlogs of the same directive, so two sequential stage-1
    /// matches produce two backlogs, not one advanced twice.
    #[test]
    fn two_stage_one_matches_produce_two_backlogs() {
        let directive = Directive {
            id: 1,
            name: "n".into(),
            priority: 1,
            kingdom: "k".into(),
            category: "c".into(),
            rules: vec![stage(2)],
        };
        let registry = Registry::new();
        let id_gen = Mutex::new(IdGenerator::new(1));
        let clock = FixedClock(0);
        let (tx, _rx) = mpsc::channel(8);

        process(
            &event("e1"),
            &directive,
            &registry,
            &id_gen,
            &AlwaysMatches,
            &NoAssets,
            &crate::alarm::NullAlarmSink,
            &clock,
            &tx,
        );
        process(
            &event("e2"),
            &directive,
            &registry,
            &id_gen,
            &AlwaysMatches,
            &NoAssets,
            &crate::alarm::NullAlarmSink,
            &clock,
            &tx,
        );

        let backlogs = registry.by_directive(1);
        assert_eq!(backlogs.len(), 2);
        assert!(backlogs.iter().all(|b| b.lock().current_stage == 1));
    }

    /// Once a backlog has advanced past its first stage, a matching event
    /// for the same directive advances the existing backlog instead of
    /// opening a new one.
    #[test]
    fn matching_event_advances_existing_backlog_past_stage_one() {
        let directive = Directive {
            id: 2,
            name: "n".into(),
            priority: 1,
            kingdom: "k".into(),
            category: "c".into(),
            rules: vec![stage(1), stage(1)],
        };
        let registry = Registry::new();
        let id_gen = Mutex::new(IdGenerator::new(2));
        let clock = FixedClock(0);
        let (tx, _rx) = mpsc::channel(8);

        process(
            &event("e1"),
            &directive,
            &registry,
            &id_gen,
            &AlwaysMatches,
            &NoAssets,
            &crate::alarm::NullAlarmSink,
            &clock,
            &tx,
        );
        assert_eq!(registry.by_directive(2).len(), 1);
        assert_eq!(registry.by_directive(2)[0].lock().current_stage, 2);

        process(
            &event("e2"),
            &directive,
            &registry,
            &id_gen,
            &AlwaysMatches,
            &NoAssets,
            &crate::alarm::NullAlarmSink,
            &clock,
            &tx,
        );
        // The second event finished the last stage; still one backlog, now
        // fully progressed rather than a second one created.
        assert_eq!(registry.by_directive(2).len(), 1);
    }

    /// A backlog completing its last stage requests removal through the
    /// queue rather than mutating the registry directly.
    #[test]
    fn completed_backlog_requests_removal() {
        let directive = Directive {
            id: 3,
            name: "n".into(),
            priority: 1,
            kingdom: "k".into(),
            category: "c".into(),
            rules: vec![stage(1)],
        };
        let registry = Registry::new();
        let id_gen = Mutex::new(IdGenerator::new(3));
        let clock = FixedClock(0);
        let (tx, mut rx) = mpsc::channel(8);

        process(
            &event("e1"),
            &directive,
            &registry,
            &id_gen,
            &AlwaysMatches,
            &NoAssets,
            &crate::alarm::NullAlarmSink,
            &clock,
            &tx,
        );

        let removed_id = rx.try_recv().expect("removal requested");
        let backlog = &registry.by_directive(3)[0];
        assert_eq!(backlog.lock().id, removed_id);
        // The dispatcher only requests removal; the registry itself is only
        // mutated by the removal-consumer task (see `Engine`).
        assert_eq!(registry.by_directive(3).len(), 1);
    }
}
