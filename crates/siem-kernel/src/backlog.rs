//! §4.D Backlog Entity: per-chain state and its pure stage-progression
//! transitions. Every method here takes `now` and any external collaborator
//! it needs as an explicit parameter and returns the effects the caller
//! (`siem-runtime`) must execute — no IO, no clock, no hidden state.

use std::net::IpAddr;

use siem_types::{BacklogDirective, NormalizedEvent, RuleStatus};

use crate::risk::stage_risk;
use crate::traits::AssetLookup;

/// Side effects a backlog transition requests of its runtime host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append `(backlog_id, stage, event_id)` to the alarm-event journal.
    RecordEvent {
        backlog_id: String,
        stage: usize,
        event_id: String,
    },
    /// Project the current backlog snapshot to the alarm sink.
    AlarmChanged,
    /// The backlog finished its last stage; remove it from the registry and
    /// the alarm sink.
    Completed,
    /// The current stage's deadline passed; remove it from the registry and
    /// the alarm sink. Distinguished from `Completed` only for logging.
    TimedOut,
}

/// A live backlog's mutable state (§3 `Backlog`).
#[derive(Debug, Clone)]
pub struct BacklogState {
    pub id: String,
    pub directive: BacklogDirective,
    pub current_stage: usize,
    pub highest_stage: usize,
    pub risk: i64,
    pub status_time: i64,
    pub src_ips: Vec<IpAddr>,
    pub dst_ips: Vec<IpAddr>,
}

fn insert_unique(list: &mut Vec<IpAddr>, ip: IpAddr) {
    if !list.contains(&ip) {
        list.push(ip);
    }
}

impl BacklogState {
    /// Creates a freshly-resolved backlog at stage 1, per §4.G step 3.
    /// `directive` must already have its back-references resolved
    /// (`resolver::resolve_directive`). Establishes the initial risk from
    /// stage 0's rule against `first_event`, since stage 0 never goes
    /// through `increase_stage`'s recompute for single-stage directives.
    pub fn new(
        id: String,
        mut directive: BacklogDirective,
        now: i64,
        first_event: &NormalizedEvent,
        assets: &dyn AssetLookup,
    ) -> (Self, Vec<Effect>) {
        let highest_stage = directive.rules.len();
        directive.rules[0].start_time = now;
        let risk = stage_risk(directive.priority, &directive.rules[0].rule, first_event, assets);
        let state = Self {
            id,
            directive,
            current_stage: 1,
            highest_stage,
            risk,
            status_time: now,
            src_ips: Vec::new(),
            dst_ips: Vec::new(),
        };
        (state, vec![Effect::AlarmChanged])
    }

    fn append_event(&mut self, event: &NormalizedEvent, stage_idx: usize, now: i64) -> Vec<Effect> {
        self.directive.rules[stage_idx].events.push(event.event_id.clone());
        insert_unique(&mut self.src_ips, event.src_ip);
        insert_unique(&mut self.dst_ips, event.dst_ip);
        self.status_time = now;
        vec![Effect::RecordEvent {
            backlog_id: self.id.clone(),
            stage: stage_idx + 1,
            event_id: event.event_id.clone(),
        }]
    }

    /// §4.D `ensureActive`.
    fn ensure_active(&mut self, stage_idx: usize, now: i64) -> Vec<Effect> {
        let rule = &mut self.directive.rules[stage_idx];
        let mut changed = false;
        if rule.start_time == 0 {
            rule.start_time = now;
            changed = true;
        }
        if rule.status != RuleStatus::Active {
            rule.status = RuleStatus::Active;
            changed = true;
        }
        if changed {
            self.status_time = now;
            vec![Effect::AlarmChanged]
        } else {
            Vec::new()
        }
    }

    /// §4.D `setStatus`, applied to the current stage only.
    fn set_status(&mut self, status: RuleStatus, now: i64) -> Vec<Effect> {
        let idx = self.current_stage - 1;
        self.directive.rules[idx].status = status;
        self.status_time = now;
        vec![Effect::AlarmChanged]
    }

    /// §4.D `processMatchedEvent`. `stage_idx` is the 0-based index of the
    /// rule `event` matched, which must equal `current_stage - 1`.
    pub fn process_matched_event(
        &mut self,
        event: &NormalizedEvent,
        stage_idx: usize,
        now: i64,
        assets: &dyn AssetLookup,
    ) -> Vec<Effect> {
        debug_assert_eq!(stage_idx, self.current_stage - 1);

        let mut effects = self.append_event(event, stage_idx, now);

        let rule = &self.directive.rules[stage_idx];
        if (rule.events.len() as u32) < rule.rule.occurrence {
            effects.extend(self.ensure_active(stage_idx, now));
            return effects;
        }

        effects.extend(self.set_status(RuleStatus::Finished, now));

        if stage_idx + 1 == self.highest_stage {
            effects.push(Effect::Completed);
            return effects;
        }

        effects.extend(self.increase_stage(event, now, assets));
        effects
    }

    /// §4.D `increaseStage`: advance to the next rule, recompute risk
    /// against its (already-resolved) `From`/`To`.
    fn increase_stage(&mut self, event: &NormalizedEvent, now: i64, assets: &dyn AssetLookup) -> Vec<Effect> {
        self.current_stage += 1;
        let idx = self.current_stage - 1;
        {
            let rule = &mut self.directive.rules[idx];
            rule.start_time = now;
            rule.status = RuleStatus::Active;
        }
        self.status_time = now;

        let new_risk = stage_risk(self.directive.priority, &self.directive.rules[idx].rule, event, assets);
        if new_risk != self.risk {
            self.risk = new_risk;
            vec![Effect::AlarmChanged]
        } else {
            Vec::new()
        }
    }

    /// True once `now` has passed the current stage's deadline. Used by the
    /// reaper (§4.F); does not mutate state.
    pub fn is_stage_timed_out(&self, now: i64) -> bool {
        let rule = &self.directive.rules[self.current_stage - 1];
        now > rule.start_time + rule.rule.timeout
    }

    /// §4.F: expires the current stage. Terminal — callers must remove the
    /// backlog from the registry and the alarm sink after this.
    pub fn mark_timed_out(&mut self, now: i64) -> Vec<Effect> {
        let mut effects = self.set_status(RuleStatus::Timeout, now);
        effects.push(Effect::TimedOut);
        effects
    }
}
