//! Policy input types.
//!
//! These are the semantic fields of admin network policies as delivered by the
//! watch layer: flavor, priority, per-direction rule lists, peers and ports.
//! Illegal flavor/action combinations are rejected when a rule is added, so a
//! constructed [`Policy`] only ever carries actions its flavor allows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CompileError, ParseError};
use crate::identity::ObjectIdentity;

/// Policy flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyFlavor {
    /// Admin network policy (prioritized, allow/deny/pass).
    Standard,
    /// Baseline admin network policy (allow/deny only, no priority).
    Baseline,
}

impl PolicyFlavor {
    /// Owner type name used in identities and external IDs.
    pub const fn owner_type(&self) -> &'static str {
        match self {
            Self::Standard => "AdminNetworkPolicy",
            Self::Baseline => "BaselineAdminNetworkPolicy",
        }
    }

    /// Short prefix used for readable port group names.
    pub const fn short_prefix(&self) -> &'static str {
        match self {
            Self::Standard => "ANP",
            Self::Baseline => "BANP",
        }
    }
}

impl fmt::Display for PolicyFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Baseline => write!(f, "baseline"),
        }
    }
}

/// Rule direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Ingress, Direction::Egress];

    /// Address field a peer is matched against: the source for ingress,
    /// the destination for egress.
    pub const fn peer_field(&self) -> &'static str {
        match self {
            Self::Ingress => "src",
            Self::Egress => "dst",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => write!(f, "Ingress"),
            Self::Egress => write!(f, "Egress"),
        }
    }
}

impl FromStr for Direction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ingress" => Ok(Self::Ingress),
            "egress" => Ok(Self::Egress),
            _ => Err(ParseError::InvalidDirection(s.to_string())),
        }
    }
}

/// L4 protocol of a port specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    /// Token used for this protocol in match expressions.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Sctp => "sctp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TCP" => Ok(Self::Tcp),
            "UDP" => Ok(Self::Udp),
            "SCTP" => Ok(Self::Sctp),
            _ => Err(ParseError::InvalidProtocol(s.to_string())),
        }
    }
}

impl TryFrom<String> for Protocol {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Protocol> for String {
    fn from(value: Protocol) -> Self {
        value.as_str().to_string()
    }
}

/// Protocol key of a generated ACL.
///
/// Rules without port specifications compile to a single ACL keyed by
/// [`ProtocolKey::Unspecified`], rendered as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProtocolKey {
    Unspecified,
    Protocol(Protocol),
}

impl fmt::Display for ProtocolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => write!(f, "None"),
            Self::Protocol(protocol) => write!(f, "{}", protocol),
        }
    }
}

impl FromStr for ProtocolKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "None" {
            return Ok(Self::Unspecified);
        }
        s.parse().map(Self::Protocol)
    }
}

impl TryFrom<String> for ProtocolKey {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProtocolKey> for String {
    fn from(value: ProtocolKey) -> Self {
        value.to_string()
    }
}

impl From<Protocol> for ProtocolKey {
    fn from(value: Protocol) -> Self {
        Self::Protocol(value)
    }
}

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Match expression prefix (`ip4` / `ip6`).
    pub const fn match_prefix(&self) -> &'static str {
        match self {
            Self::Ipv4 => "ip4",
            Self::Ipv6 => "ip6",
        }
    }

    /// Suffix distinguishing per-family address sets.
    pub const fn set_suffix(&self) -> &'static str {
        match self {
            Self::Ipv4 => "v4",
            Self::Ipv6 => "v6",
        }
    }
}

/// Abstract rule action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RuleAction {
    Allow,
    Deny,
    Pass,
}

impl RuleAction {
    /// Returns true if policies of `flavor` may use this action.
    pub const fn is_legal_for(&self, flavor: PolicyFlavor) -> bool {
        match (flavor, self) {
            (PolicyFlavor::Standard, _) => true,
            (PolicyFlavor::Baseline, Self::Allow | Self::Deny) => true,
            (PolicyFlavor::Baseline, Self::Pass) => false,
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "Allow"),
            Self::Deny => write!(f, "Deny"),
            Self::Pass => write!(f, "Pass"),
        }
    }
}

impl FromStr for RuleAction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            "pass" => Ok(Self::Pass),
            _ => Err(ParseError::InvalidAction(s.to_string())),
        }
    }
}

impl TryFrom<String> for RuleAction {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RuleAction> for String {
    fn from(value: RuleAction) -> Self {
        value.to_string()
    }
}

/// A (protocol, port, end-port) port specification.
///
/// Port 0 means any port. An end port that is present, non-zero and different
/// from `port` turns the spec into the inclusive range `[port, end_port]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortSpec {
    pub protocol: Protocol,
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_port: Option<u16>,
}

impl PortSpec {
    /// Single port (or any port when `port` is 0).
    pub const fn single(protocol: Protocol, port: u16) -> Self {
        Self {
            protocol,
            port,
            end_port: None,
        }
    }

    /// Inclusive port range.
    pub const fn range(protocol: Protocol, port: u16, end_port: u16) -> Self {
        Self {
            protocol,
            port,
            end_port: Some(end_port),
        }
    }

    /// Any port of `protocol`.
    pub const fn any(protocol: Protocol) -> Self {
        Self::single(protocol, 0)
    }

    /// Returns the range end if this spec denotes a range.
    pub fn range_end(&self) -> Option<u16> {
        self.end_port.filter(|end| *end != 0 && *end != self.port)
    }

    /// Returns true if this spec places no port restriction on its protocol.
    pub fn is_any_port(&self) -> bool {
        self.port == 0 && self.range_end().is_none()
    }
}

/// One rule of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    /// Address set the peer selector resolves to.
    pub peer: ObjectIdentity,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
}

impl Rule {
    pub fn new(action: RuleAction, peer: ObjectIdentity) -> Self {
        Self {
            action,
            peer,
            ports: Vec::new(),
        }
    }

    pub fn with_port(mut self, port: PortSpec) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = PortSpec>) -> Self {
        self.ports.extend(ports);
        self
    }
}

/// Flavor-specific policy attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flavor", rename_all = "lowercase")]
pub enum PolicyKind {
    Standard { priority: i32 },
    Baseline,
}

impl PolicyKind {
    pub const fn flavor(&self) -> PolicyFlavor {
        match self {
            Self::Standard { .. } => PolicyFlavor::Standard,
            Self::Baseline => PolicyFlavor::Baseline,
        }
    }

    pub const fn priority(&self) -> Option<i32> {
        match self {
            Self::Standard { priority } => Some(*priority),
            Self::Baseline => None,
        }
    }
}

/// A policy snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    name: String,
    kind: PolicyKind,
    ingress: Vec<Rule>,
    egress: Vec<Rule>,
}

impl Policy {
    /// Creates an empty standard policy.
    pub fn standard(name: impl Into<String>, priority: i32) -> Self {
        Self::new(name, PolicyKind::Standard { priority })
    }

    /// Creates an empty baseline policy.
    pub fn baseline(name: impl Into<String>) -> Self {
        Self::new(name, PolicyKind::Baseline)
    }

    pub fn new(name: impl Into<String>, kind: PolicyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ingress: Vec::new(),
            egress: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn flavor(&self) -> PolicyFlavor {
        self.kind.flavor()
    }

    /// Policy priority; `None` for baseline policies.
    pub fn priority(&self) -> Option<i32> {
        self.kind.priority()
    }

    /// Rules of one direction, in evaluation order.
    pub fn rules(&self, direction: Direction) -> &[Rule] {
        match direction {
            Direction::Ingress => &self.ingress,
            Direction::Egress => &self.egress,
        }
    }

    /// Appends a rule to `direction`.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::IllegalAction`] if the rule's action is not
    /// allowed for this policy's flavor.
    pub fn add_rule(&mut self, direction: Direction, rule: Rule) -> Result<(), CompileError> {
        let index = self.rules(direction).len();
        if !rule.action.is_legal_for(self.flavor()) {
            return Err(CompileError::IllegalAction {
                policy: self.name.clone(),
                flavor: self.flavor(),
                direction,
                rule_index: index,
                action: rule.action,
            });
        }
        match direction {
            Direction::Ingress => self.ingress.push(rule),
            Direction::Egress => self.egress.push(rule),
        }
        Ok(())
    }

    /// Builder form of [`Policy::add_rule`].
    pub fn with_rule(mut self, direction: Direction, rule: Rule) -> Result<Self, CompileError> {
        self.add_rule(direction, rule)?;
        Ok(self)
    }

    /// Snapshot constructor that bypasses action checks.
    ///
    /// Only for callers that already hold validated rules; the compiler
    /// still rejects illegal actions.
    pub fn from_parts(
        name: impl Into<String>,
        kind: PolicyKind,
        ingress: Vec<Rule>,
        egress: Vec<Rule>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            ingress,
            egress,
        }
    }
}
