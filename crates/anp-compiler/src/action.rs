//! Rule action to ACL action mapping.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{PolicyFlavor, RuleAction};

/// ACL action codes understood by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AclAction {
    /// Allow the packet and its related/return traffic.
    AllowRelated,
    /// Drop the packet.
    Drop,
    /// Skip the remaining ACLs of this tier.
    Pass,
}

impl AclAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AllowRelated => "allow-related",
            Self::Drop => "drop",
            Self::Pass => "pass",
        }
    }
}

impl fmt::Display for AclAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a standard policy rule action.
pub const fn map_standard(action: RuleAction) -> AclAction {
    match action {
        RuleAction::Allow => AclAction::AllowRelated,
        RuleAction::Deny => AclAction::Drop,
        RuleAction::Pass => AclAction::Pass,
    }
}

/// Maps a baseline policy rule action.
///
/// Returns `None` for [`RuleAction::Pass`], which baseline policies cannot
/// carry.
pub const fn map_baseline(action: RuleAction) -> Option<AclAction> {
    match action {
        RuleAction::Allow => Some(AclAction::AllowRelated),
        RuleAction::Deny => Some(AclAction::Drop),
        RuleAction::Pass => None,
    }
}

/// Maps `action` for a policy of `flavor`; `None` if the pair is illegal.
pub const fn map_action(flavor: PolicyFlavor, action: RuleAction) -> Option<AclAction> {
    match flavor {
        PolicyFlavor::Standard => Some(map_standard(action)),
        PolicyFlavor::Baseline => map_baseline(action),
    }
}
