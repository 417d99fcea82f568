//! §4.B Rule Resolver: clones a directive template into a backlog's own
//! directive, substituting the first event's address/port into wildcard
//! fields and resolving `:N` back-references strictly backward.

use siem_types::{AddrSpec, BacklogDirective, BacklogRule, Directive, NormalizedEvent, PortSpec, RuleStatus};

use crate::error::{CoreError, Result};
use crate::traits::AssetLookup;

#[derive(Clone, Copy)]
enum Side {
    From,
    To,
}

fn resolve_addr(
    directive_id: u64,
    field: &'static str,
    spec: &AddrSpec,
    stage_idx: usize,
    built: &[BacklogRule],
    first_event: &NormalizedEvent,
    side: Side,
) -> Result<AddrSpec> {
    let AddrSpec::BackRef(n) = spec else {
        return Ok(spec.clone());
    };
    let n = *n;
    if n < 1 || n as usize > stage_idx {
        return Err(CoreError::BadReference {
            directive_id,
            stage: stage_idx + 1,
            field,
            n,
            max: stage_idx,
        });
    }
    let referenced = &built[n as usize - 1].rule;
    let referenced_value = match side {
        Side::From => &referenced.from,
        Side::To => &referenced.to,
    };
    if referenced_value.is_wildcard() {
        let fallback = match side {
            Side::From => first_event.src_ip,
            Side::To => first_event.dst_ip,
        };
        Ok(AddrSpec::Literal(fallback.to_string()))
    } else {
        Ok(referenced_value.clone())
    }
}

fn resolve_port(
    directive_id: u64,
    field: &'static str,
    spec: &PortSpec,
    stage_idx: usize,
    built: &[BacklogRule],
    first_event: &NormalizedEvent,
    side: Side,
) -> Result<PortSpec> {
    let PortSpec::BackRef(n) = spec else {
        return Ok(spec.clone());
    };
    let n = *n;
    if n < 1 || n as usize > stage_idx {
        return Err(CoreError::BadReference {
            directive_id,
            stage: stage_idx + 1,
            field,
            n,
            max: stage_idx,
        });
    }
    let referenced = &built[n as usize - 1].rule;
    let referenced_value = match side {
        Side::From => &referenced.port_from,
        Side::To => &referenced.port_to,
    };
    if referenced_value.is_wildcard() {
        let fallback = match side {
            Side::From => first_event.src_port,
            Side::To => first_event.dst_port,
        };
        Ok(PortSpec::Literal(fallback.to_string()))
    } else {
        Ok(referenced_value.clone())
    }
}

fn substitute_name(template: &str, first_event: &NormalizedEvent, assets: &dyn AssetLookup) -> String {
    let src_name = assets
        .asset_name(first_event.src_ip)
        .unwrap_or_else(|| first_event.src_ip.to_string());
    let dst_name = assets
        .asset_name(first_event.dst_ip)
        .unwrap_or_else(|| first_event.dst_ip.to_string());
    template.replace("SRC_IP", &src_name).replace("DST_IP", &dst_name)
}

/// Clones `template` into a backlog directive, resolving every `:N`
/// back-reference against `first_event`.
pub fn resolve_directive(
    template: &Directive,
    first_event: &NormalizedEvent,
    assets: &dyn AssetLookup,
) -> Result<BacklogDirective> {
    let name = substitute_name(&template.name, first_event, assets);
    let mut rules: Vec<BacklogRule> = Vec::with_capacity(template.rules.len());

    for (i, rule) in template.rules.iter().enumerate() {
        let mut resolved = rule.clone();
        if i >= 1 {
            resolved.from = resolve_addr(template.id, "From", &resolved.from, i, &rules, first_event, Side::From)?;
            resolved.to = resolve_addr(template.id, "To", &resolved.to, i, &rules, first_event, Side::To)?;
            resolved.port_from = resolve_port(
                template.id,
                "PortFrom",
                &resolved.port_from,
                i,
                &rules,
                first_event,
                Side::From,
            )?;
            resolved.port_to = resolve_port(
                template.id,
                "PortTo",
                &resolved.port_to,
                i,
                &rules,
                first_event,
                Side::To,
            )?;
        }
        let status = if i == 0 { RuleStatus::Active } else { RuleStatus::Inactive };
        rules.push(BacklogRule {
            rule: resolved,
            status,
            start_time: 0,
            events: Vec::new(),
        });
    }

    Ok(BacklogDirective {
        id: template.id,
        name,
        priority: template.priority,
        kingdom: template.kingdom.clone(),
        category: template.category.clone(),
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::net::IpAddr;
    use test_case::test_case;

    struct Assets;
    impl AssetLookup for Assets {
        fn asset_name(&self, ip: IpAddr) -> Option<String> {
            if ip.to_string() == "10.0.0.1" {
                Some("web01".to_string())
            } else {
                None
            }
        }
        fn asset_value(&self, _ip: IpAddr) -> i64 {
            0
        }
    }

    fn event(src: &str, dst: &str) -> NormalizedEvent {
        NormalizedEvent {
            event_id: "e1".into(),
            src_ip: src.parse().unwrap(),
            dst_ip: dst.parse().unwrap(),
            src_port: 1111,
            dst_port: 2222,
            conn_id: "c1".into(),
            attributes: BTreeMap::new(),
        }
    }

    fn rule(from: AddrSpec, to: AddrSpec) -> siem_types::Rule {
        siem_types::Rule {
            from,
            to,
            port_from: PortSpec::Any,
            port_to: PortSpec::Any,
            occurrence: 1,
            timeout: 60,
            reliability: 5,
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn rule_zero_is_never_rewritten_and_marked_active() {
        let directive = Directive {
            id: 1,
            name: "n".into(),
            priority: 3,
            kingdom: "k".into(),
            category: "c".into(),
            rules: vec![rule(AddrSpec::Any, AddrSpec::Any)],
        };
        let resolved = resolve_directive(&directive, &event("1.1.1.1", "2.2.2.2"), &Assets).unwrap();
        assert_eq!(resolved.rules[0].rule.from, AddrSpec::Any);
        assert_eq!(resolved.rules[0].status, RuleStatus::Active);
    }

    #[test]
    fn scenario_s2_backref_resolution() {
        let directive = Directive {
            id: 2,
            name: "n".into(),
            priority: 5,
            kingdom: "k".into(),
            category: "c".into(),
            rules: vec![
                rule(AddrSpec::Any, AddrSpec::Any),
                rule(AddrSpec::BackRef(1), AddrSpec::BackRef(1)),
            ],
        };
        let resolved = resolve_directive(&directive, &event("1.1.1.1", "2.2.2.2"), &Assets).unwrap();
        assert_eq!(resolved.rules[1].rule.from, AddrSpec::Literal("1.1.1.1".into()));
        assert_eq!(resolved.rules[1].rule.to, AddrSpec::Literal("2.2.2.2".into()));
        assert_eq!(resolved.rules[1].status, RuleStatus::Inactive);
    }

    #[test]
    fn scenario_s5_name_substitution() {
        let directive = Directive {
            id: 5,
            name: "Attack from SRC_IP to DST_IP".into(),
            priority: 1,
            kingdom: "k".into(),
            category: "c".into(),
            rules: vec![rule(AddrSpec::Any, AddrSpec::Any)],
        };
        let resolved = resolve_directive(&directive, &event("10.0.0.1", "10.0.0.2"), &Assets).unwrap();
        assert_eq!(resolved.name, "Attack from web01 to 10.0.0.2");
    }

    #[test]
    fn forward_reference_is_rejected() {
        let directive = Directive {
            id: 9,
            name: "n".into(),
            priority: 1,
            kingdom: "k".into(),
            category: "c".into(),
            rules: vec![
                rule(AddrSpec::Any, AddrSpec::Any),
                rule(AddrSpec::BackRef(2), AddrSpec::Any),
            ],
        };
        let err = resolve_directive(&directive, &event("1.1.1.1", "2.2.2.2"), &Assets).unwrap_err();
        assert_eq!(
            err,
            CoreError::BadReference {
                directive_id: 9,
                stage: 2,
                field: "From",
                n: 2,
                max: 1,
            }
        );
    }

    #[test]
    fn zero_reference_is_rejected() {
        let directive = Directive {
            id: 9,
            name: "n".into(),
            priority: 1,
            kingdom: "k".into(),
            category: "c".into(),
            rules: vec![
                rule(AddrSpec::Any, AddrSpec::Any),
                rule(AddrSpec::BackRef(0), AddrSpec::Any),
            ],
        };
        assert!(resolve_directive(&directive, &event("1.1.1.1", "2.2.2.2"), &Assets).is_err());
    }

    /// A 5-stage directive whose last stage's `From` back-references `n`,
    /// parametrized across the legal boundary (`1..=4`) and past it on
    /// either side.
    #[test_case(1, true; "earliest stage")]
    #[test_case(2, true; "middle stage")]
    #[test_case(4, true; "immediately preceding stage")]
    #[test_case(5, false; "self-reference")]
    #[test_case(6, false; "reference past the end")]
    #[test_case(0, false; "zero is not a valid back-reference")]
    fn backref_bound_at_last_stage(n: u32, expect_ok: bool) {
        let mut rules = vec![rule(AddrSpec::Any, AddrSpec::Any); 4];
        rules.push(rule(AddrSpec::BackRef(n), AddrSpec::Any));
        let directive = Directive {
            id: 42,
            name: "n".into(),
            priority: 1,
            kingdom: "k".into(),
            category: "c".into(),
            rules,
        };
        let result = resolve_directive(&directive, &event("1.1.1.1", "2.2.2.2"), &Assets);
        assert_eq!(result.is_ok(), expect_ok);
    }

    #[test]
    fn resolved_literal_chains_through_a_third_stage() {
        let directive = Directive {
            id: 3,
            name: "n".into(),
            priority: 1,
            kingdom: "k".into(),
            category: "c".into(),
            rules: vec![
                rule(AddrSpec::Any, AddrSpec::Any),
                rule(AddrSpec::BackRef(1), AddrSpec::BackRef(1)),
                rule(AddrSpec::BackRef(2), AddrSpec::Literal("9.9.9.9".into())),
            ],
        };
        let resolved = resolve_directive(&directive, &event("1.1.1.1", "2.2.2.2"), &Assets).unwrap();
        assert_eq!(resolved.rules[2].rule.from, AddrSpec::Literal("1.1.1.1".into()));
        assert_eq!(resolved.rules[2].rule.to, AddrSpec::Literal("9.9.9.9".into()));
    }
}
