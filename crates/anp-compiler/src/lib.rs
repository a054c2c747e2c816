//! Admin network policy compiler.
//!
//! This crate compiles priority-ordered admin network policies (standard and
//! baseline flavors) into the object model of the virtual-network control
//! plane:
//!
//! - [`CompiledAcl`]: one ACL per (rule, protocol) pair with its match
//!   expression, action and priority
//! - [`CompiledAddressSet`]: the peer address sets the matches reference
//! - [`CompiledPortGroup`]: the port group a policy's ACLs attach to
//!
//! Every generated object carries a structured [`ObjectIdentity`] and a
//! stable hashed physical name derived from it.
//!
//! # Architecture
//!
//! ```text
//! identity   ports
//!     │        │
//!     └── matcher ── action ── priority
//!              │
//!          compiler ──> CompiledPolicy / ReconcileReport
//! ```
//!
//! The core performs no I/O. Watching policies, persisting the output and
//! deciding when to recompile belong to the caller.
//!
//! # Example
//!
//! ```
//! use anp_compiler::{
//!     AddressFamilies, Direction, ObjectIdentity, Policy, PolicyCompiler, PolicyFlavor,
//!     PortSpec, Protocol, Rule, RuleAction,
//! };
//!
//! let peer = ObjectIdentity::peer_address_set(PolicyFlavor::Standard, "deny-dns", Direction::Egress, 0);
//! let policy = Policy::standard("deny-dns", 10)
//!     .with_rule(
//!         Direction::Egress,
//!         Rule::new(RuleAction::Deny, peer).with_port(PortSpec::single(Protocol::Udp, 53)),
//!     )
//!     .unwrap();
//!
//! let compiler = PolicyCompiler::with_families(AddressFamilies::IPV4);
//! let acls = compiler.compile(&policy, Direction::Egress).unwrap();
//! assert_eq!(acls.len(), 1);
//! assert!(acls[0].match_expr.ends_with("&& udp && udp.dst==53"));
//! ```

pub mod action;
pub mod compiler;
pub mod config;
pub mod document;
pub mod error;
pub mod identity;
pub mod matcher;
pub mod ports;
pub mod priority;
pub mod types;

pub use action::AclAction;
pub use compiler::{
    CompiledAcl, CompiledAddressSet, CompiledPolicy, CompiledPortGroup, PolicyCompiler,
    PolicyFailure, ReconcileReport, SkippedPolicy,
};
pub use config::{AddressFamilies, CompilerConfig};
pub use document::{PolicyDocument, PolicySetDocument, RuleDocument};
pub use error::{CompileError, ConfigError, DocumentError, Error, ParseError, Result};
pub use identity::{ObjectIdentity, ObjectKind, OwnerKind};
pub use ports::{group_ports, PortGroup, ProtocolGroups};
pub use priority::{PriorityConflicts, PriorityViolation, MAX_PRIORITY, MIN_PRIORITY};
pub use types::{
    AddressFamily, Direction, Policy, PolicyFlavor, PolicyKind, PortSpec, Protocol, ProtocolKey,
    Rule, RuleAction,
};
