//! Port/protocol grouping.
//!
//! Groups a rule's port specifications by protocol, splitting each protocol's
//! entries into discrete ports and rendered range clauses. Groups and ports
//! keep first-seen order; nothing here iterates an unordered map.

use crate::types::{PortSpec, Protocol, ProtocolKey};

/// Ports collected for one protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortGroup {
    discrete: Vec<u16>,
    ranges: Vec<String>,
    any_port: bool,
}

impl PortGroup {
    /// Discrete ports in encounter order.
    pub fn discrete(&self) -> &[u16] {
        &self.discrete
    }

    /// Range clauses (`<port><=<proto>.dst<=<end>`) in encounter order.
    pub fn ranges(&self) -> &[String] {
        &self.ranges
    }

    /// True when the group carries no port restriction.
    pub fn is_unrestricted(&self) -> bool {
        self.any_port || (self.discrete.is_empty() && self.ranges.is_empty())
    }

    fn push(&mut self, spec: &PortSpec) {
        if self.any_port {
            return;
        }
        if spec.is_any_port() {
            // Port 0 lifts every restriction on this protocol.
            self.any_port = true;
            self.discrete.clear();
            self.ranges.clear();
        } else if let Some(end) = spec.range_end() {
            self.ranges.push(format!(
                "{}<={}.dst<={}",
                spec.port,
                spec.protocol.as_str(),
                end
            ));
        } else {
            self.discrete.push(spec.port);
        }
    }
}

/// Order-preserving protocol to port-group mapping for one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolGroups {
    groups: Vec<(ProtocolKey, PortGroup)>,
}

impl ProtocolGroups {
    /// Groups for a rule with no port specifications.
    pub fn unspecified() -> Self {
        Self {
            groups: vec![(ProtocolKey::Unspecified, PortGroup::default())],
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns the group for `protocol`, if any spec named it.
    pub fn get(&self, protocol: Protocol) -> Option<&PortGroup> {
        let key = ProtocolKey::Protocol(protocol);
        self.groups.iter().find(|(k, _)| *k == key).map(|(_, g)| g)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProtocolKey, &PortGroup)> {
        self.groups.iter().map(|(key, group)| (*key, group))
    }

    fn entry(&mut self, protocol: Protocol) -> &mut PortGroup {
        let key = ProtocolKey::Protocol(protocol);
        let pos = match self.groups.iter().position(|(k, _)| *k == key) {
            Some(pos) => pos,
            None => {
                self.groups.push((key, PortGroup::default()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[pos].1
    }
}

/// Groups `ports` by protocol in a single pass.
///
/// An empty slice yields the single [`ProtocolKey::Unspecified`] group.
pub fn group_ports(ports: &[PortSpec]) -> ProtocolGroups {
    if ports.is_empty() {
        return ProtocolGroups::unspecified();
    }

    let mut groups = ProtocolGroups { groups: Vec::new() };
    for spec in ports {
        groups.entry(spec.protocol).push(spec);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_ports_yield_sentinel() {
        let groups = group_ports(&[]);
        assert_eq!(groups.len(), 1);
        let (key, group) = groups.iter().next().unwrap();
        assert_eq!(key, ProtocolKey::Unspecified);
        assert!(group.is_unrestricted());
    }

    #[test]
    fn test_discrete_and_ranges() {
        let groups = group_ports(&[
            PortSpec::single(Protocol::Tcp, 80),
            PortSpec::range(Protocol::Tcp, 1000, 2000),
            PortSpec::single(Protocol::Tcp, 443),
        ]);
        let tcp = groups.get(Protocol::Tcp).unwrap();
        assert_eq!(tcp.discrete(), &[80, 443]);
        assert_eq!(tcp.ranges(), &["1000<=tcp.dst<=2000".to_string()]);
        assert!(!tcp.is_unrestricted());
    }

    #[test]
    fn test_equal_end_port_is_discrete() {
        let groups = group_ports(&[PortSpec::range(Protocol::Udp, 53, 53)]);
        let udp = groups.get(Protocol::Udp).unwrap();
        assert_eq!(udp.discrete(), &[53]);
        assert!(udp.ranges().is_empty());
    }

    #[test]
    fn test_protocol_order_is_first_seen() {
        let groups = group_ports(&[
            PortSpec::single(Protocol::Udp, 53),
            PortSpec::single(Protocol::Tcp, 53),
            PortSpec::single(Protocol::Udp, 5353),
            PortSpec::single(Protocol::Sctp, 9),
        ]);
        let keys: Vec<_> = groups.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                ProtocolKey::Protocol(Protocol::Udp),
                ProtocolKey::Protocol(Protocol::Tcp),
                ProtocolKey::Protocol(Protocol::Sctp),
            ]
        );
        assert_eq!(groups.get(Protocol::Udp).unwrap().discrete(), &[53, 5353]);
    }

    #[test]
    fn test_zero_port_lifts_restriction() {
        let groups = group_ports(&[
            PortSpec::single(Protocol::Tcp, 80),
            PortSpec::any(Protocol::Tcp),
            PortSpec::range(Protocol::Tcp, 1000, 2000),
            PortSpec::single(Protocol::Udp, 53),
        ]);
        let tcp = groups.get(Protocol::Tcp).unwrap();
        assert!(tcp.is_unrestricted());
        assert!(tcp.discrete().is_empty());
        assert!(tcp.ranges().is_empty());
        assert!(!groups.get(Protocol::Udp).unwrap().is_unrestricted());
    }

    #[test]
    fn test_duplicate_ports_are_kept() {
        let groups = group_ports(&[
            PortSpec::single(Protocol::Tcp, 80),
            PortSpec::single(Protocol::Tcp, 80),
        ]);
        assert_eq!(groups.get(Protocol::Tcp).unwrap().discrete(), &[80, 80]);
    }
}
