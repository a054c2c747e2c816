//! Policy compiler.
//!
//! Turns policy snapshots into the ACLs, address sets and port groups the
//! persistence layer reconciles against the control-plane database.
//!
//! # Architecture
//!
//! ```text
//! policy snapshot
//!        │
//!        ▼
//!  priority::validate ──> PriorityConflicts (offenders skipped)
//!        │
//!        ▼
//!  per rule, in index order:
//!    identity ─ build_l3 ─ group_ports ─ build_l4/build_rule_match ─ map_action
//!        │
//!        ▼
//!  CompiledPolicy { port_group, address_sets, acls }
//! ```
//!
//! Compilation is pure: the same snapshot always yields byte-identical output
//! in the same order, and a [`PolicyCompiler`] can be shared across worker
//! threads without synchronization.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use crate::action::{map_action, AclAction};
use crate::config::{AddressFamilies, CompilerConfig, DEFAULT_CONTROLLER};
use crate::error::{CompileError, ConfigError};
use crate::identity::ObjectIdentity;
use crate::matcher::{build_l3, build_rule_matches};
use crate::ports::group_ports;
use crate::priority::{self, PriorityViolation};
use crate::types::{AddressFamily, Direction, Policy, PolicyFlavor};

/// One compiled ACL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledAcl {
    pub identity: ObjectIdentity,
    /// Hashed physical name.
    pub name: String,
    #[serde(rename = "match")]
    pub match_expr: String,
    pub action: AclAction,
    /// Policy priority; `None` for baseline policies.
    pub priority: Option<i32>,
    pub external_ids: BTreeMap<&'static str, String>,
}

/// A referenced port group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledPortGroup {
    pub identity: ObjectIdentity,
    pub name: String,
    pub external_ids: BTreeMap<&'static str, String>,
}

/// A referenced peer address set with its per-family physical names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledAddressSet {
    pub identity: ObjectIdentity,
    pub names: BTreeMap<AddressFamily, String>,
    pub external_ids: BTreeMap<&'static str, String>,
}

/// Everything generated for one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledPolicy {
    pub policy: String,
    pub flavor: PolicyFlavor,
    pub port_group: CompiledPortGroup,
    pub address_sets: Vec<CompiledAddressSet>,
    /// Ingress ACLs followed by egress ACLs, each in rule order.
    pub acls: Vec<CompiledAcl>,
}

/// A policy whose compilation was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyFailure {
    pub policy: String,
    pub flavor: PolicyFlavor,
    pub error: CompileError,
}

/// A policy left out of compilation because of a priority violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPolicy {
    pub policy: String,
    pub flavor: PolicyFlavor,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub compiled: Vec<CompiledPolicy>,
    pub violations: Vec<PriorityViolation>,
    pub skipped: Vec<SkippedPolicy>,
    pub failures: Vec<PolicyFailure>,
}

impl ReconcileReport {
    /// True when every policy of the snapshot compiled.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.failures.is_empty()
    }

    pub fn get(&self, flavor: PolicyFlavor, policy: &str) -> Option<&CompiledPolicy> {
        self.compiled
            .iter()
            .find(|c| c.flavor == flavor && c.policy == policy)
    }
}

/// Compiles admin network policies into control-plane objects.
#[derive(Debug, Clone)]
pub struct PolicyCompiler {
    families: AddressFamilies,
    controller: String,
}

impl Default for PolicyCompiler {
    fn default() -> Self {
        Self::with_families(AddressFamilies::default())
    }
}

impl PolicyCompiler {
    /// Creates a compiler from a validated configuration.
    pub fn new(config: &CompilerConfig) -> Result<Self, ConfigError> {
        let families = config.validate()?;
        Ok(Self {
            families,
            controller: config.controller.clone(),
        })
    }

    /// Creates a compiler for `families` owned by the default controller.
    pub fn with_families(families: AddressFamilies) -> Self {
        Self {
            families,
            controller: DEFAULT_CONTROLLER.to_string(),
        }
    }

    pub fn families(&self) -> AddressFamilies {
        self.families
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Compiles the rules of one direction of `policy`.
    ///
    /// Emits one ACL per (rule, protocol) pair in rule order, and exactly one
    /// ACL for a rule without ports.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::IllegalAction`] if a rule carries an action
    /// its policy flavor does not allow. Nothing of the policy is emitted.
    pub fn compile(
        &self,
        policy: &Policy,
        direction: Direction,
    ) -> Result<Vec<CompiledAcl>, CompileError> {
        let flavor = policy.flavor();
        let mut acls = Vec::new();

        for (index, rule) in policy.rules(direction).iter().enumerate() {
            let action = map_action(flavor, rule.action).ok_or_else(|| {
                error!(
                    "Illegal action {} in {} policy {} ({} rule {})",
                    rule.action,
                    flavor,
                    policy.name(),
                    direction,
                    index
                );
                CompileError::IllegalAction {
                    policy: policy.name().to_string(),
                    flavor,
                    direction,
                    rule_index: index,
                    action: rule.action,
                }
            })?;

            let base = ObjectIdentity::rule(flavor, policy.name(), direction, index);
            let l3 = build_l3(direction, &rule.peer, self.families);
            let groups = group_ports(&rule.ports);

            for (protocol, match_expr) in build_rule_matches(&l3, &groups) {
                let identity = base.with_protocol(protocol);
                debug!("Compiled ACL {} match '{}' action {}", identity, match_expr, action);
                acls.push(CompiledAcl {
                    name: identity.short_name(),
                    external_ids: identity.external_ids(&self.controller),
                    identity,
                    match_expr,
                    action,
                    priority: policy.priority(),
                });
            }
        }

        Ok(acls)
    }

    /// Compiles both directions of `policy` plus the objects they reference.
    pub fn compile_policy(&self, policy: &Policy) -> Result<CompiledPolicy, CompileError> {
        let flavor = policy.flavor();

        let mut acls = self.compile(policy, Direction::Ingress)?;
        acls.extend(self.compile(policy, Direction::Egress)?);

        let mut address_sets: Vec<CompiledAddressSet> = Vec::new();
        for direction in Direction::ALL {
            for rule in policy.rules(direction) {
                if address_sets.iter().any(|set| set.identity == rule.peer) {
                    continue;
                }
                address_sets.push(self.address_set(&rule.peer));
            }
        }

        let pg_identity = ObjectIdentity::port_group(flavor, policy.name());
        let port_group = CompiledPortGroup {
            name: pg_identity.short_name(),
            external_ids: pg_identity.external_ids(&self.controller),
            identity: pg_identity,
        };

        info!(
            "Compiled {} policy {}: {} ACLs, {} address sets",
            flavor,
            policy.name(),
            acls.len(),
            address_sets.len()
        );

        Ok(CompiledPolicy {
            policy: policy.name().to_string(),
            flavor,
            port_group,
            address_sets,
            acls,
        })
    }

    /// Runs one reconciliation pass over a consistent snapshot.
    ///
    /// Priorities are validated once against the whole snapshot before any
    /// policy is compiled. Offending standard policies are skipped by snapshot
    /// position, so a baseline policy sharing an offender's name still
    /// compiles. A policy whose compilation fails is recorded in the report
    /// without affecting the others.
    pub fn reconcile(&self, snapshot: &[Policy]) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let conflicts = priority::validate(snapshot).err();

        for (position, policy) in snapshot.iter().enumerate() {
            if conflicts.as_ref().is_some_and(|c| c.is_excluded(position)) {
                report.skipped.push(SkippedPolicy {
                    policy: policy.name().to_string(),
                    flavor: policy.flavor(),
                });
                continue;
            }
            match self.compile_policy(policy) {
                Ok(compiled) => report.compiled.push(compiled),
                Err(error) => report.failures.push(PolicyFailure {
                    policy: policy.name().to_string(),
                    flavor: policy.flavor(),
                    error,
                }),
            }
        }

        if let Some(conflicts) = conflicts {
            for violation in conflicts.violations() {
                warn!("{}", violation);
            }
            report.violations = conflicts.into_violations();
        }

        report
    }

    fn address_set(&self, identity: &ObjectIdentity) -> CompiledAddressSet {
        CompiledAddressSet {
            identity: identity.clone(),
            names: self
                .families
                .enabled()
                .map(|family| (family, identity.address_set_name(family)))
                .collect(),
            external_ids: identity.external_ids(&self.controller),
        }
    }
}
