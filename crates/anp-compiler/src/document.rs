//! Policy set documents.
//!
//! A document is the file form of a policy snapshot, as consumed by the
//! `anpc` binary. Rule peers are not spelled out: each rule's peer resolves to
//! the address set derived from its policy, direction and index.
//!
//! ```yaml
//! policies:
//!   - name: deny-dns
//!     flavor: standard
//!     priority: 10
//!     egress:
//!       - action: Deny
//!         ports:
//!           - { protocol: UDP, port: 53 }
//!           - { protocol: TCP, port: 53 }
//!   - name: default
//!     flavor: baseline
//!     ingress:
//!       - action: Allow
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::config::is_json;
use crate::error::{ConfigError, DocumentError};
use crate::identity::ObjectIdentity;
use crate::types::{Direction, Policy, PolicyFlavor, PolicyKind, PortSpec, Rule, RuleAction};

/// A rule as written in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDocument {
    pub action: RuleAction,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
}

/// A policy as written in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    pub name: String,
    #[serde(default = "default_flavor")]
    pub flavor: PolicyFlavor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default)]
    pub ingress: Vec<RuleDocument>,
    #[serde(default)]
    pub egress: Vec<RuleDocument>,
}

fn default_flavor() -> PolicyFlavor {
    PolicyFlavor::Standard
}

impl PolicyDocument {
    /// Converts the document into a validated [`Policy`].
    pub fn to_policy(&self) -> Result<Policy, DocumentError> {
        let kind = match (self.flavor, self.priority) {
            (PolicyFlavor::Standard, Some(priority)) => PolicyKind::Standard { priority },
            (PolicyFlavor::Standard, None) => {
                return Err(DocumentError::MissingPriority {
                    policy: self.name.clone(),
                })
            }
            (PolicyFlavor::Baseline, None) => PolicyKind::Baseline,
            (PolicyFlavor::Baseline, Some(_)) => {
                return Err(DocumentError::UnexpectedPriority {
                    policy: self.name.clone(),
                })
            }
        };

        let mut policy = Policy::new(self.name.clone(), kind);
        for (direction, rules) in [
            (Direction::Ingress, &self.ingress),
            (Direction::Egress, &self.egress),
        ] {
            for (index, rule) in rules.iter().enumerate() {
                let peer =
                    ObjectIdentity::peer_address_set(self.flavor, &self.name, direction, index);
                policy.add_rule(
                    direction,
                    Rule::new(rule.action, peer).with_ports(rule.ports.iter().copied()),
                )?;
            }
        }
        Ok(policy)
    }
}

/// A snapshot of policies read from a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySetDocument {
    #[serde(default)]
    pub policies: Vec<PolicyDocument>,
}

impl PolicySetDocument {
    /// Reads a YAML or JSON policy set file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let document: PolicySetDocument = if is_json(path) {
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };

        debug!(
            "Loaded {} policies from {}",
            document.policies.len(),
            path.display()
        );
        Ok(document)
    }

    /// Converts every policy, stopping at the first invalid one.
    ///
    /// Names must be unique per flavor: a standard and a baseline policy may
    /// share a name, two policies of the same flavor may not.
    pub fn to_policies(&self) -> Result<Vec<Policy>, DocumentError> {
        let mut seen = HashSet::new();
        self.policies
            .iter()
            .enumerate()
            .map(|(position, doc)| {
                if doc.name.is_empty() {
                    return Err(DocumentError::EmptyName { position });
                }
                if !seen.insert((doc.flavor, doc.name.as_str())) {
                    return Err(DocumentError::DuplicateName {
                        flavor: doc.flavor,
                        policy: doc.name.clone(),
                    });
                }
                doc.to_policy()
            })
            .collect()
    }
}
