//! Core type definitions for the SIEM correlation engine.
//!
//! This crate holds only data: the event shape events arrive in, the
//! directive/rule template language, and the resolved, serializable shape a
//! live backlog is rendered as for diagnostics. None of these types know how
//! to match, resolve, or schedule anything — that lives in `siem-kernel` and
//! `siem-runtime`.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A normalized security event, already parsed and enriched upstream.
///
/// The core never mutates an event; it only reads fields needed for
/// matching, substitution, and bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub event_id: String,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    /// Opaque trace correlator threaded through log lines for this event.
    pub conn_id: String,
    /// Additional attributes consulted by the external rule-matching
    /// predicate (protocol, plugin id, signature, ...). The core never
    /// interprets these itself.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// One side of a rule's address match: `From` or `To`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddrSpec {
    Any,
    HomeNet,
    NotHomeNet,
    /// A concrete address or CIDR, kept as written — the core treats it as
    /// an opaque token; interpreting it is the external matcher's job.
    Literal(String),
    /// A 1-based back-reference to an earlier stage's resolved value.
    BackRef(u32),
}

impl AddrSpec {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any | Self::HomeNet | Self::NotHomeNet)
    }
}

impl fmt::Display for AddrSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "ANY"),
            Self::HomeNet => write!(f, "HOME_NET"),
            Self::NotHomeNet => write!(f, "!HOME_NET"),
            Self::Literal(s) => write!(f, "{s}"),
            Self::BackRef(n) => write!(f, ":{n}"),
        }
    }
}

impl FromStr for AddrSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ANY" => Self::Any,
            "HOME_NET" => Self::HomeNet,
            "!HOME_NET" => Self::NotHomeNet,
            _ => {
                if let Some(n) = parse_backref(s) {
                    Self::BackRef(n)
                } else {
                    Self::Literal(s.to_string())
                }
            }
        })
    }
}

/// A port match: `ANY`, a literal (already-stringified) port, or a
/// back-reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortSpec {
    Any,
    /// Ports are compared as trimmed decimal strings once resolved — see
    /// the port-comparison open question in `SPEC_FULL.md` §9.
    Literal(String),
    BackRef(u32),
}

impl PortSpec {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "ANY"),
            Self::Literal(s) => write!(f, "{s}"),
            Self::BackRef(n) => write!(f, ":{n}"),
        }
    }
}

impl FromStr for PortSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ANY" => Self::Any,
            _ => {
                if let Some(n) = parse_backref(s) {
                    Self::BackRef(n)
                } else {
                    Self::Literal(s.trim().to_string())
                }
            }
        })
    }
}

fn parse_backref(s: &str) -> Option<u32> {
    let digits = s.strip_prefix(':')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// One stage's match condition, occurrence count, and time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub from: AddrSpec,
    pub to: AddrSpec,
    pub port_from: PortSpec,
    pub port_to: PortSpec,
    /// Matching events required to finish this stage. Must be >= 1.
    pub occurrence: u32,
    /// Seconds this stage may remain active before the reaper expires it.
    /// Must be > 0.
    pub timeout: i64,
    /// 0-10; contributes to the risk score when this stage is current.
    pub reliability: u8,
    /// Matcher attributes consumed by the external rule predicate
    /// (protocol, plugin id/sid, and the like).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// A named, prioritized template describing an attack scenario as an
/// ordered list of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub id: u64,
    /// May contain the literal tokens `SRC_IP`/`DST_IP`, substituted when a
    /// backlog is created from this template.
    pub name: String,
    /// 1-5.
    pub priority: u8,
    pub kingdom: String,
    pub category: String,
    pub rules: Vec<Rule>,
}

/// Lifecycle status of one backlog stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Inactive,
    Active,
    Finished,
    Timeout,
}

/// A rule as held by a live backlog: the resolved template plus the stage's
/// own progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogRule {
    pub rule: Rule,
    pub status: RuleStatus,
    /// Unix seconds; 0 until the stage becomes active.
    pub start_time: i64,
    pub events: Vec<String>,
}

/// A backlog's own copy of the directive template: resolved back-references,
/// substituted name, per-rule progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogDirective {
    pub id: u64,
    pub name: String,
    pub priority: u8,
    pub kingdom: String,
    pub category: String,
    pub rules: Vec<BacklogRule>,
}

/// Serializable diagnostic projection of a live backlog, matching the shape
/// persisted by the alarm projector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklogSnapshot {
    pub backlog_id: String,
    pub status_time: i64,
    pub risk: i64,
    pub current_stage: usize,
    pub highest_stage: usize,
    pub directive: BacklogDirective,
    pub src_ips: Vec<IpAddr>,
    pub dst_ips: Vec<IpAddr>,
}

/// A single line of the append-only alarm-event journal (`SPEC_FULL.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmEventRecord {
    pub alarm_id: String,
    pub stage: usize,
    pub event_id: String,
}
