//! §4.C Risk Calculator.

use std::net::IpAddr;

use siem_types::{AddrSpec, NormalizedEvent, Rule};

use crate::traits::AssetLookup;

/// Resolves a rule-side address to the concrete IP risk should be scored
/// against: a literal resolves to itself, anything still a wildcard (rule 0
/// is never rewritten) falls back to the triggering event's own address,
/// mirroring the resolver's own wildcard-substitution rule in §4.B.
fn effective_ip(spec: &AddrSpec, fallback: IpAddr) -> Option<IpAddr> {
    match spec {
        AddrSpec::Literal(s) => s.parse().ok(),
        _ => Some(fallback),
    }
}

/// `risk = priority * reliability * max(assetValue(From), assetValue(To)) / 25`,
/// truncating integer arithmetic, scored against `rule`'s own `From`/`To`
/// using `event` to resolve any address still a wildcard.
pub fn stage_risk(
    priority: u8,
    rule: &Rule,
    event: &NormalizedEvent,
    assets: &dyn AssetLookup,
) -> i64 {
    let from_value = effective_ip(&rule.from, event.src_ip)
        .map(|ip| assets.asset_value(ip))
        .unwrap_or(0);
    let to_value = effective_ip(&rule.to, event.dst_ip)
        .map(|ip| assets.asset_value(ip))
        .unwrap_or(0);
    let value = from_value.max(to_value);
    i64::from(priority) * i64::from(rule.reliability) * value / 25
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::net::Ipv4Addr;

    struct FlatAssets(i64);
    impl AssetLookup for FlatAssets {
        fn asset_name(&self, _ip: IpAddr) -> Option<String> {
            None
        }
        fn asset_value(&self, _ip: IpAddr) -> i64 {
            self.0
        }
    }

    fn event(src: &str, dst: &str) -> NormalizedEvent {
        NormalizedEvent {
            event_id: "e1".into(),
            src_ip: src.parse().unwrap(),
            dst_ip: dst.parse().unwrap(),
            src_port: 1,
            dst_port: 2,
            conn_id: "c1".into(),
            attributes: BTreeMap::new(),
        }
    }

    fn any_rule(priority_unused: u8, reliability: u8) -> Rule {
        let _ = priority_unused;
        Rule {
            from: AddrSpec::Any,
            to: AddrSpec::Any,
            port_from: siem_types::PortSpec::Any,
            port_to: siem_types::PortSpec::Any,
            occurrence: 1,
            timeout: 60,
            reliability,
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn scenario_s1_risk() {
        let rule = any_rule(3, 5);
        let e = event("10.0.0.1", "10.0.0.2");
        let risk = stage_risk(3, &rule, &e, &FlatAssets(2));
        assert_eq!(risk, 1); // 3*5*2/25 = 1 (truncating)
    }

    #[test]
    fn wildcard_falls_back_to_event_ip() {
        let rule = any_rule(5, 1);
        let e = event("1.1.1.1", "2.2.2.2");
        struct Asymmetric;
        impl AssetLookup for Asymmetric {
            fn asset_name(&self, _ip: IpAddr) -> Option<String> {
                None
            }
            fn asset_value(&self, ip: IpAddr) -> i64 {
                if ip == Ipv4Addr::new(1, 1, 1, 1) {
                    5
                } else {
                    0
                }
            }
        }
        let risk = stage_risk(5, &rule, &e, &Asymmetric);
        assert_eq!(risk, 1); // 5*1*max(5,0)/25 = 1
    }

    #[test]
    fn literal_address_ignores_event() {
        let mut rule = any_rule(5, 8);
        rule.from = AddrSpec::Literal("1.1.1.1".into());
        rule.to = AddrSpec::Literal("2.2.2.2".into());
        let e = event("9.9.9.9", "8.8.8.8");
        struct OnlyFrom;
        impl AssetLookup for OnlyFrom {
            fn asset_name(&self, _ip: IpAddr) -> Option<String> {
                None
            }
            fn asset_value(&self, ip: IpAddr) -> i64 {
                if ip == Ipv4Addr::new(1, 1, 1, 1) {
                    5
                } else {
                    0
                }
            }
        }
        let risk = stage_risk(5, &rule, &e, &OnlyFrom);
        assert_eq!(risk, 8); // 5*8*max(5,0)/25 = 8, matches S2's stage-2 recompute
    }

    #[test]
    fn unparseable_literal_scores_zero() {
        let mut rule = any_rule(5, 5);
        rule.from = AddrSpec::Literal("10.0.0.0/24".into());
        rule.to = AddrSpec::Literal("10.0.0.0/24".into());
        let e = event("1.1.1.1", "2.2.2.2");
        let risk = stage_risk(5, &rule, &e, &FlatAssets(9));
        assert_eq!(risk, 0);
    }
}
