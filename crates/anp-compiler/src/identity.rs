//! Object identities for generated control-plane objects.
//!
//! Every ACL, address set and port group produced by the compiler carries an
//! [`ObjectIdentity`]: a structured key made of the owner kind, the owning
//! policy name, and (where applicable) the rule direction, rule index and
//! protocol. Identities are compared structurally. The hashed
//! [`ObjectIdentity::short_name`] is only a projection for stores that need
//! bounded physical names.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{AddressFamily, Direction, PolicyFlavor, ProtocolKey};

/// External ID key: controller that owns the object.
pub const OWNER_CONTROLLER_KEY: &str = "k8s.ovn.org/owner-controller";
/// External ID key: owner type (flavor).
pub const OWNER_TYPE_KEY: &str = "k8s.ovn.org/owner-type";
/// External ID key: owning policy name.
pub const OBJECT_NAME_KEY: &str = "k8s.ovn.org/name";
/// External ID key: unique object id.
pub const PRIMARY_ID_KEY: &str = "k8s.ovn.org/id";
/// External ID key: rule direction.
pub const POLICY_DIRECTION_KEY: &str = "direction";
/// External ID key: rule index within its direction.
pub const GRESS_INDEX_KEY: &str = "gress-index";
/// External ID key: port policy protocol.
pub const PORT_POLICY_PROTOCOL_KEY: &str = "port-policy-protocol";

/// Kind of generated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Acl,
    AddressSet,
    PortGroup,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acl => write!(f, "ACL"),
            Self::AddressSet => write!(f, "AddressSet"),
            Self::PortGroup => write!(f, "PortGroup"),
        }
    }
}

/// Owner kind: object kind plus policy flavor.
///
/// Standard and baseline objects never share an owner kind, so they cannot
/// alias even with identical names and indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerKind {
    pub object: ObjectKind,
    pub flavor: PolicyFlavor,
}

impl OwnerKind {
    pub const fn new(object: ObjectKind, flavor: PolicyFlavor) -> Self {
        Self { object, flavor }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object, self.flavor.owner_type())
    }
}

/// Structured identity of a generated object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectIdentity {
    pub owner: OwnerKind,
    pub policy_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ProtocolKey>,
}

impl ObjectIdentity {
    /// Base identity of a rule's ACLs, before refinement with a protocol.
    pub fn rule(
        flavor: PolicyFlavor,
        policy_name: impl Into<String>,
        direction: Direction,
        rule_index: usize,
    ) -> Self {
        Self {
            owner: OwnerKind::new(ObjectKind::Acl, flavor),
            policy_name: policy_name.into(),
            direction: Some(direction),
            rule_index: Some(rule_index),
            protocol: None,
        }
    }

    /// Identity of the ACL generated for one (rule, protocol) pair.
    pub fn acl(
        flavor: PolicyFlavor,
        policy_name: impl Into<String>,
        direction: Direction,
        rule_index: usize,
        protocol: ProtocolKey,
    ) -> Self {
        Self {
            protocol: Some(protocol),
            ..Self::rule(flavor, policy_name, direction, rule_index)
        }
    }

    /// Identity of the address set holding a rule's peer addresses.
    pub fn peer_address_set(
        flavor: PolicyFlavor,
        policy_name: impl Into<String>,
        direction: Direction,
        rule_index: usize,
    ) -> Self {
        Self {
            owner: OwnerKind::new(ObjectKind::AddressSet, flavor),
            policy_name: policy_name.into(),
            direction: Some(direction),
            rule_index: Some(rule_index),
            protocol: None,
        }
    }

    /// Identity of the port group a policy's ACLs are attached to.
    pub fn port_group(flavor: PolicyFlavor, policy_name: impl Into<String>) -> Self {
        Self {
            owner: OwnerKind::new(ObjectKind::PortGroup, flavor),
            policy_name: policy_name.into(),
            direction: None,
            rule_index: None,
            protocol: None,
        }
    }

    /// Returns a copy refined with `protocol`.
    pub fn with_protocol(&self, protocol: ProtocolKey) -> Self {
        Self {
            protocol: Some(protocol),
            ..self.clone()
        }
    }

    /// Canonical human-readable rendering.
    ///
    /// Port groups render as `ANP:<name>` / `BANP:<name>`; everything else as
    /// `<object>:<owner-type>:<name>` followed by each present field.
    ///
    /// Each object kind always carries the same set of trailing fields, so the
    /// name is recovered by stripping the fixed prefix and the fixed number of
    /// trailing fields. The rendering stays injective even for names
    /// containing `:`.
    pub fn canonical(&self) -> String {
        if self.owner.object == ObjectKind::PortGroup {
            return format!("{}:{}", self.owner.flavor.short_prefix(), self.policy_name);
        }

        let mut out = format!("{}:{}", self.owner, self.policy_name);
        if let Some(direction) = self.direction {
            out.push(':');
            out.push_str(&direction.to_string());
        }
        if let Some(index) = self.rule_index {
            out.push(':');
            out.push_str(&index.to_string());
        }
        if let Some(protocol) = self.protocol {
            out.push(':');
            out.push_str(&protocol.to_string());
        }
        out
    }

    /// Stable hashed name derived from the canonical rendering.
    pub fn short_name(&self) -> String {
        hash_name(&self.canonical())
    }

    /// Physical name of the per-family address set for this identity.
    pub fn address_set_name(&self, family: AddressFamily) -> String {
        hash_name(&format!("{}_{}", self.canonical(), family.set_suffix()))
    }

    /// External IDs the persistence layer stores alongside the object.
    pub fn external_ids(&self, controller: &str) -> BTreeMap<&'static str, String> {
        let mut ids = BTreeMap::new();
        ids.insert(OWNER_CONTROLLER_KEY, controller.to_string());
        ids.insert(OWNER_TYPE_KEY, self.owner.flavor.owner_type().to_string());
        ids.insert(OBJECT_NAME_KEY, self.policy_name.clone());
        ids.insert(PRIMARY_ID_KEY, format!("{}:{}", controller, self.canonical()));
        if let Some(direction) = self.direction {
            ids.insert(POLICY_DIRECTION_KEY, direction.to_string());
        }
        if let Some(index) = self.rule_index {
            ids.insert(GRESS_INDEX_KEY, index.to_string());
        }
        if let Some(protocol) = self.protocol {
            ids.insert(PORT_POLICY_PROTOCOL_KEY, protocol.to_string());
        }
        ids
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Hashes a readable name into a bounded identifier.
///
/// The result is `a` followed by the decimal value of the first eight bytes
/// of the SHA-256 digest, so it always starts with a letter.
pub fn hash_name(readable: &str) -> String {
    let digest = Sha256::digest(readable.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("a{}", u64::from_be_bytes(prefix))
}
