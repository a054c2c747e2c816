//! Integration tests for the policy compiler.
//!
//! These tests drive the public API end to end: policy snapshots in,
//! compiled ACLs, address sets and port groups out.

use std::collections::HashSet;
use std::thread;

use anp_compiler::matcher::UNSPECIFIED_L4_MATCH;
use anp_compiler::{
    AclAction, AddressFamilies, AddressFamily, CompileError, Direction, ObjectIdentity, Policy,
    PolicyCompiler, PolicyFlavor, PolicyKind, PolicySetDocument, PortSpec, PriorityViolation,
    Protocol, ProtocolKey, Rule, RuleAction, SkippedPolicy,
};
use pretty_assertions::assert_eq;

fn peer(flavor: PolicyFlavor, name: &str, direction: Direction, index: usize) -> ObjectIdentity {
    ObjectIdentity::peer_address_set(flavor, name, direction, index)
}

fn deny_dns() -> (Policy, ObjectIdentity) {
    let peer1 = peer(PolicyFlavor::Standard, "deny-dns", Direction::Egress, 0);
    let policy = Policy::standard("deny-dns", 10)
        .with_rule(
            Direction::Egress,
            Rule::new(RuleAction::Deny, peer1.clone()).with_ports([
                PortSpec::single(Protocol::Udp, 53),
                PortSpec::single(Protocol::Tcp, 53),
            ]),
        )
        .unwrap();
    (policy, peer1)
}

fn mixed_policy(name: &str, priority: i32) -> Policy {
    let f = PolicyFlavor::Standard;
    let mut policy = Policy::standard(name, priority);
    policy
        .add_rule(
            Direction::Ingress,
            Rule::new(RuleAction::Allow, peer(f, name, Direction::Ingress, 0)).with_ports([
                PortSpec::single(Protocol::Tcp, 80),
                PortSpec::range(Protocol::Tcp, 8000, 8080),
                PortSpec::single(Protocol::Sctp, 9),
            ]),
        )
        .unwrap();
    policy
        .add_rule(
            Direction::Ingress,
            Rule::new(RuleAction::Pass, peer(f, name, Direction::Ingress, 1)),
        )
        .unwrap();
    policy
        .add_rule(
            Direction::Egress,
            Rule::new(RuleAction::Deny, peer(f, name, Direction::Egress, 0))
                .with_port(PortSpec::any(Protocol::Udp)),
        )
        .unwrap();
    policy
}

#[test]
fn test_deny_dns_end_to_end() {
    let (policy, peer1) = deny_dns();
    let compiler = PolicyCompiler::with_families(AddressFamilies::IPV4);
    let acls = compiler.compile(&policy, Direction::Egress).unwrap();

    let hash = peer1.address_set_name(AddressFamily::Ipv4);
    assert_eq!(acls.len(), 2);
    for (acl, proto) in acls.iter().zip(["udp", "tcp"]) {
        assert_eq!(
            acl.match_expr,
            format!("(ip4.dst == ${}) && {} && {}.dst==53", hash, proto, proto)
        );
        assert_eq!(acl.action, AclAction::Drop);
        assert_eq!(acl.priority, Some(10));
    }
    assert_eq!(
        acls[0].identity.protocol,
        Some(ProtocolKey::Protocol(Protocol::Udp))
    );
    assert_eq!(
        acls[1].identity.protocol,
        Some(ProtocolKey::Protocol(Protocol::Tcp))
    );
    assert_ne!(acls[0].name, acls[1].name);

    assert!(compiler
        .compile(&policy, Direction::Ingress)
        .unwrap()
        .is_empty());
}

#[test]
fn test_determinism_across_compilers() {
    let policy = mixed_policy("mixed", 3);
    let a = PolicyCompiler::with_families(AddressFamilies::DUAL_STACK);
    let b = PolicyCompiler::with_families(AddressFamilies::DUAL_STACK);
    for direction in Direction::ALL {
        assert_eq!(
            a.compile(&policy, direction).unwrap(),
            b.compile(&policy, direction).unwrap()
        );
    }
}

#[test]
fn test_concurrent_compilation_matches_sequential() {
    let compiler = PolicyCompiler::with_families(AddressFamilies::DUAL_STACK);
    let policies: Vec<Policy> = (0..16)
        .map(|i| mixed_policy(&format!("policy-{}", i), i))
        .collect();

    let sequential: Vec<_> = policies
        .iter()
        .map(|p| compiler.compile_policy(p).unwrap())
        .collect();

    let concurrent: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = policies
            .iter()
            .map(|p| {
                let compiler = &compiler;
                scope.spawn(move || compiler.compile_policy(p).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequential, concurrent);

    let names: HashSet<_> = sequential
        .iter()
        .flat_map(|c| c.acls.iter().map(|a| a.name.clone()))
        .collect();
    let total: usize = sequential.iter().map(|c| c.acls.len()).sum();
    assert_eq!(names.len(), total);
}

#[test]
fn test_no_port_rule_yields_one_acl() {
    let policy = mixed_policy("np", 1);
    let compiler = PolicyCompiler::default();
    let acls = compiler.compile(&policy, Direction::Ingress).unwrap();

    let no_port: Vec<_> = acls
        .iter()
        .filter(|a| a.identity.rule_index == Some(1))
        .collect();
    assert_eq!(no_port.len(), 1);
    assert_eq!(no_port[0].identity.protocol, Some(ProtocolKey::Unspecified));
    assert_eq!(no_port[0].action, AclAction::Pass);
    assert!(!no_port[0].match_expr.contains("&&"));
    assert!(!no_port[0].match_expr.contains(UNSPECIFIED_L4_MATCH));
}

#[test]
fn test_mixed_rule_matches() {
    let policy = mixed_policy("mx", 1);
    let compiler = PolicyCompiler::default();
    let acls = compiler.compile(&policy, Direction::Ingress).unwrap();

    assert_eq!(acls.len(), 3);
    assert!(acls[0]
        .match_expr
        .ends_with("tcp && (tcp.dst==80 || 8000<=tcp.dst<=8080)"));
    assert!(acls[1].match_expr.ends_with("sctp && sctp.dst==9"));

    let egress = compiler.compile(&policy, Direction::Egress).unwrap();
    assert_eq!(egress.len(), 1);
    assert!(egress[0].match_expr.ends_with(") && udp"));
}

#[test]
fn test_dual_stack_l3() {
    let (policy, peer1) = deny_dns();
    let acls = PolicyCompiler::with_families(AddressFamilies::DUAL_STACK)
        .compile(&policy, Direction::Egress)
        .unwrap();
    let expected = format!(
        "((ip4.dst == ${} || ip6.dst == ${}))",
        peer1.address_set_name(AddressFamily::Ipv4),
        peer1.address_set_name(AddressFamily::Ipv6)
    );
    assert!(acls[0].match_expr.starts_with(&expected));

    let v4_only = PolicyCompiler::with_families(AddressFamilies::IPV4)
        .compile(&policy, Direction::Egress)
        .unwrap();
    assert!(!v4_only[0].match_expr.contains("ip6"));
}

#[test]
fn test_standard_and_baseline_never_collide() {
    let sf = PolicyFlavor::Standard;
    let bf = PolicyFlavor::Baseline;
    let standard = Policy::standard("same", 1)
        .with_rule(
            Direction::Ingress,
            Rule::new(RuleAction::Allow, peer(sf, "same", Direction::Ingress, 0)),
        )
        .unwrap();
    let baseline = Policy::baseline("same")
        .with_rule(
            Direction::Ingress,
            Rule::new(RuleAction::Allow, peer(bf, "same", Direction::Ingress, 0)),
        )
        .unwrap();

    let compiler = PolicyCompiler::default();
    let a = compiler.compile_policy(&standard).unwrap();
    let b = compiler.compile_policy(&baseline).unwrap();
    assert_ne!(a.acls[0].identity, b.acls[0].identity);
    assert_ne!(a.acls[0].name, b.acls[0].name);
    assert_ne!(a.port_group.name, b.port_group.name);
    assert_ne!(
        a.address_sets[0].names[&AddressFamily::Ipv4],
        b.address_sets[0].names[&AddressFamily::Ipv4]
    );
}

#[test]
fn test_reconcile_reports_every_conflict() {
    let snapshot = vec![
        mixed_policy("a", 50),
        mixed_policy("b", 50),
        mixed_policy("c", -5),
        mixed_policy("d", 99),
        Policy::baseline("default"),
    ];
    let report = PolicyCompiler::default().reconcile(&snapshot);

    assert_eq!(
        report.violations,
        vec![
            PriorityViolation::Duplicate {
                policy: "b".to_string(),
                existing: "a".to_string(),
                priority: 50,
            },
            PriorityViolation::OutOfRange {
                policy: "c".to_string(),
                priority: -5,
                min: 0,
                max: 99,
            },
        ]
    );
    let skipped: Vec<_> = report.skipped.iter().map(|s| s.policy.as_str()).collect();
    assert_eq!(skipped, vec!["b", "c"]);
    let compiled: Vec<_> = report.compiled.iter().map(|c| c.policy.as_str()).collect();
    assert_eq!(compiled, vec!["a", "d", "default"]);
}

#[test]
fn test_baseline_survives_excluded_standard_of_same_name() {
    let baseline = Policy::baseline("default")
        .with_rule(
            Direction::Ingress,
            Rule::new(
                RuleAction::Deny,
                peer(PolicyFlavor::Baseline, "default", Direction::Ingress, 0),
            ),
        )
        .unwrap();
    let snapshot = vec![
        Policy::standard("web", 5),
        Policy::standard("default", 5),
        baseline,
    ];
    let report = PolicyCompiler::default().reconcile(&snapshot);

    assert_eq!(
        report.skipped,
        vec![SkippedPolicy {
            policy: "default".to_string(),
            flavor: PolicyFlavor::Standard,
        }]
    );
    let compiled: Vec<_> = report
        .compiled
        .iter()
        .map(|c| (c.policy.as_str(), c.flavor))
        .collect();
    assert_eq!(
        compiled,
        vec![
            ("web", PolicyFlavor::Standard),
            ("default", PolicyFlavor::Baseline),
        ]
    );
    let default = report.get(PolicyFlavor::Baseline, "default").unwrap();
    assert_eq!(default.acls.len(), 1);
    assert_eq!(default.acls[0].action, AclAction::Drop);
    assert!(report.get(PolicyFlavor::Standard, "default").is_none());
}

#[test]
fn test_reconcile_isolates_invariant_failures() {
    let broken = Policy::from_parts(
        "broken",
        PolicyKind::Baseline,
        Vec::new(),
        vec![Rule::new(
            RuleAction::Pass,
            peer(PolicyFlavor::Baseline, "broken", Direction::Egress, 0),
        )],
    );
    let snapshot = vec![broken, mixed_policy("ok", 1)];
    let report = PolicyCompiler::default().reconcile(&snapshot);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].policy, "broken");
    assert!(matches!(
        report.failures[0].error,
        CompileError::IllegalAction {
            action: RuleAction::Pass,
            ..
        }
    ));
    assert_eq!(report.failures[0].flavor, PolicyFlavor::Baseline);
    assert!(report.get(PolicyFlavor::Standard, "ok").is_some());
    assert!(!report.is_clean());
}

#[test]
fn test_document_to_report() {
    let yaml = r#"
policies:
  - name: deny-dns
    priority: 10
    egress:
      - action: Deny
        ports:
          - { protocol: UDP, port: 53 }
          - { protocol: TCP, port: 53 }
"#;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policies.yaml");
    std::fs::write(&path, yaml).unwrap();

    let snapshot = PolicySetDocument::load(&path)
        .unwrap()
        .to_policies()
        .unwrap();
    let report = PolicyCompiler::default().reconcile(&snapshot);
    assert!(report.is_clean());

    let (expected, _) = deny_dns();
    assert_eq!(snapshot[0], expected);

    let json = serde_json::to_value(&report).unwrap();
    let acls = &json["compiled"][0]["acls"];
    assert_eq!(acls.as_array().unwrap().len(), 2);
    assert_eq!(acls[0]["action"], "drop");
    assert_eq!(acls[0]["priority"], 10);
    assert_eq!(acls[0]["external_ids"]["port-policy-protocol"], "udp");
}
