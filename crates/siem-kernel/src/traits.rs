//! External collaborators the core consumes (`SPEC_FULL.md` §6). The core
//! never implements these itself beyond `SystemClock`; real implementations
//! live in `siem-directives`, `siem-alarm`, and `siem-runtime`.

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use siem_types::{NormalizedEvent, Rule};

/// The event/rule matching predicate. Implementations decide whether `event`
/// satisfies `rule`'s `From`/`To`/`PortFrom`/`PortTo`/attribute constraints.
pub trait RuleMatcher: Send + Sync {
    fn matches(&self, event: &NormalizedEvent, rule: &Rule) -> bool;
}

/// Asset inventory lookup. Absence is not an error: name falls back to the
/// IP's own string form, value falls back to 0.
pub trait AssetLookup: Send + Sync {
    fn asset_name(&self, ip: IpAddr) -> Option<String>;
    fn asset_value(&self, ip: IpAddr) -> i64;
}

/// Wall-clock source, abstracted so the core's pure functions still take
/// `now` explicitly and tests can supply a fixed clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// `SystemTime`-backed clock for production use.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_secs() as i64
    }
}
