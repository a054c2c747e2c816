//! Match expression rendering.
//!
//! Builds the L3 (peer address set membership) and L4 (protocol/port)
//! clauses of an ACL match and composes them into one match per
//! (rule, protocol) pair.
//!
//! # Grammar
//!
//! ```text
//! L3 (IPv4 only)   (ip4.src == $<v4-set>)
//! L3 (dual stack)  ((ip4.src == $<v4-set> || ip6.src == $<v6-set>))
//! L4 no ports      tcp
//! L4 one port      tcp && tcp.dst==80
//! L4 port list     tcp && tcp.dst=={80,443}
//! L4 mixed         tcp && (tcp.dst==80 || 1000<=tcp.dst<=2000)
//! rule             <l3> && <l4>
//! ```

use itertools::Itertools;

use crate::config::AddressFamilies;
use crate::identity::ObjectIdentity;
use crate::ports::{PortGroup, ProtocolGroups};
use crate::types::{Direction, Protocol, ProtocolKey};

/// L4 clause of a rule without port specifications.
///
/// Never ANDed into a match: such rules match on L3 alone.
pub const UNSPECIFIED_L4_MATCH: &str = "unspecified";

/// Renders the peer clause for `direction`.
///
/// Ingress peers are matched on the source address, egress peers on the
/// destination address. The result is always wrapped in one enclosing
/// parenthesis so it can be ANDed safely.
pub fn build_l3(direction: Direction, peer: &ObjectIdentity, families: AddressFamilies) -> String {
    let field = direction.peer_field();
    let clauses: Vec<String> = families
        .enabled()
        .map(|family| {
            format!(
                "{}.{} == ${}",
                family.match_prefix(),
                field,
                peer.address_set_name(family)
            )
        })
        .collect();

    let inner = if families.is_dual_stack() {
        format!("({})", clauses.join(" || "))
    } else {
        clauses.concat()
    };
    format!("({})", inner)
}

/// Renders the L4 clause of one protocol group.
pub fn build_l4(protocol: ProtocolKey, group: &PortGroup) -> String {
    match protocol {
        ProtocolKey::Unspecified => UNSPECIFIED_L4_MATCH.to_string(),
        ProtocolKey::Protocol(protocol) => build_protocol_l4(protocol, group),
    }
}

fn build_protocol_l4(protocol: Protocol, group: &PortGroup) -> String {
    let proto = protocol.as_str();
    if group.is_unrestricted() {
        return proto.to_string();
    }

    let mut disjuncts = Vec::with_capacity(1 + group.ranges().len());
    match group.discrete() {
        [] => {}
        [port] => disjuncts.push(format!("{}.dst=={}", proto, port)),
        ports => disjuncts.push(format!("{}.dst=={{{}}}", proto, ports.iter().join(","))),
    }
    disjuncts.extend(group.ranges().iter().cloned());

    if disjuncts.len() > 1 {
        format!("{} && ({})", proto, disjuncts.join(" || "))
    } else {
        format!("{} && {}", proto, disjuncts.concat())
    }
}

/// Composes the final ACL match from an L3 and an L4 clause.
pub fn build_rule_match(l3: &str, l4: &str) -> String {
    if l4 == UNSPECIFIED_L4_MATCH {
        l3.to_string()
    } else {
        format!("{} && {}", l3, l4)
    }
}

/// Builds one match per protocol group, in group order.
pub fn build_rule_matches(l3: &str, groups: &ProtocolGroups) -> Vec<(ProtocolKey, String)> {
    groups
        .iter()
        .map(|(protocol, group)| {
            let l4 = build_l4(protocol, group);
            (protocol, build_rule_match(l3, &l4))
        })
        .collect()
}
