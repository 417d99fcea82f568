//! A minimal, deliberately small `RuleMatcher`: `ANY` / `HOME_NET` /
//! `!HOME_NET` / CIDR / literal address comparison, and trimmed-decimal-string
//! port comparison (§9 open question 3: no numeric range syntax). Good
//! enough to drive the dispatcher end to end; not a general IDS rule
//! language — protocol/service/attribute matching is left to a real
//! upstream matcher in production.

use std::net::{IpAddr, Ipv4Addr};

use siem_kernel::RuleMatcher;
use siem_types::{AddrSpec, NormalizedEvent, PortSpec, Rule};

fn parse_cidr(spec: &str) -> Option<(Ipv4Addr, u8)> {
    let (addr, prefix) = spec.split_once('/')?;
    let addr: Ipv4Addr = addr.parse().ok()?;
    let prefix: u8 = prefix.parse().ok()?;
    if prefix > 32 {
        return None;
    }
    Some((addr, prefix))
}

fn ipv4_in_cidr(ip: Ipv4Addr, network: Ipv4Addr, prefix: u8) -> bool {
    if prefix == 0 {
        return true;
    }
    let mask = u32::MAX << (32 - prefix);
    u32::from(ip) & mask == u32::from(network) & mask
}

fn addr_matches(spec: &AddrSpec, ip: IpAddr, home_net: &[(Ipv4Addr, u8)]) -> bool {
    match spec {
        AddrSpec::Any => true,
        AddrSpec::HomeNet => is_home(ip, home_net),
        AddrSpec::NotHomeNet => !is_home(ip, home_net),
        AddrSpec::Literal(s) => {
            if let Some((network, prefix)) = parse_cidr(s) {
                matches!(ip, IpAddr::V4(v4) if ipv4_in_cidr(v4, network, prefix))
            } else {
                s.parse::<IpAddr>().map(|literal| literal == ip).unwrap_or(false)
            }
        }
        AddrSpec::BackRef(_) => {
            debug_assert!(false, "unresolved back-reference reached the matcher");
            false
        }
    }
}

fn is_home(ip: IpAddr, home_net: &[(Ipv4Addr, u8)]) -> bool {
    let IpAddr::V4(v4) = ip else { return false };
    home_net.iter().any(|(network, prefix)| ipv4_in_cidr(v4, *network, *prefix))
}

fn port_matches(spec: &PortSpec, port: u16) -> bool {
    match spec {
        PortSpec::Any => true,
        PortSpec::Literal(s) => s.trim() == port.to_string(),
        PortSpec::BackRef(_) => {
            debug_assert!(false, "unresolved back-reference reached the matcher");
            false
        }
    }
}

/// Matches an event's four addressing fields against a resolved rule.
/// `home_net` is a set of IPv4 CIDRs; `HOME_NET`/`!HOME_NET` always evaluate
/// false for IPv6 addresses (a known limitation of this minimal matcher).
pub struct SimpleMatcher {
    home_net: Vec<(Ipv4Addr, u8)>,
}

impl SimpleMatcher {
    pub fn new(home_net: Vec<(Ipv4Addr, u8)>) -> Self {
        Self { home_net }
    }
}

impl RuleMatcher for SimpleMatcher {
    fn matches(&self, event: &NormalizedEvent, rule: &Rule) -> bool {
        addr_matches(&rule.from, event.src_ip, &self.home_net)
            && addr_matches(&rule.to, event.dst_ip, &self.home_net)
            && port_matches(&rule.port_from, event.src_port)
            && port_matches(&rule.port_to, event.dst_port)
    }
}
