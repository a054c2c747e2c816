//! Compiler configuration.
//!
//! Address-family enablement is passed explicitly to the compiler instead of
//! being read from process-wide state, so either family combination can be
//! exercised side by side.
//!
//! Configuration files are YAML or JSON:
//!
//! ```yaml
//! ipv4_mode: true
//! ipv6_mode: true
//! controller: default-network-controller
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::types::AddressFamily;

/// Controller name stamped into external IDs by default.
pub const DEFAULT_CONTROLLER: &str = "default-network-controller";

/// Enabled address families. At least one family is always enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressFamilies {
    ipv4: bool,
    ipv6: bool,
}

impl AddressFamilies {
    pub const IPV4: AddressFamilies = AddressFamilies {
        ipv4: true,
        ipv6: false,
    };
    pub const IPV6: AddressFamilies = AddressFamilies {
        ipv4: false,
        ipv6: true,
    };
    pub const DUAL_STACK: AddressFamilies = AddressFamilies {
        ipv4: true,
        ipv6: true,
    };

    /// Creates a family set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoAddressFamily`] if both flags are false.
    pub fn new(ipv4: bool, ipv6: bool) -> Result<Self, ConfigError> {
        if !ipv4 && !ipv6 {
            return Err(ConfigError::NoAddressFamily);
        }
        Ok(Self { ipv4, ipv6 })
    }

    pub const fn is_dual_stack(&self) -> bool {
        self.ipv4 && self.ipv6
    }

    /// Enabled families, IPv4 first.
    pub fn enabled(&self) -> impl Iterator<Item = AddressFamily> {
        let v4 = self.ipv4.then_some(AddressFamily::Ipv4);
        let v6 = self.ipv6.then_some(AddressFamily::Ipv6);
        v4.into_iter().chain(v6)
    }
}

impl Default for AddressFamilies {
    fn default() -> Self {
        Self::IPV4
    }
}

/// Compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// IPv4 address family enabled in the cluster.
    pub ipv4_mode: bool,
    /// IPv6 address family enabled in the cluster.
    pub ipv6_mode: bool,
    /// Controller recorded as owner of generated objects.
    pub controller: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            ipv4_mode: true,
            ipv6_mode: false,
            controller: DEFAULT_CONTROLLER.to_string(),
        }
    }
}

impl CompilerConfig {
    /// Checks the configuration and returns the enabled families.
    pub fn validate(&self) -> Result<AddressFamilies, ConfigError> {
        if self.controller.is_empty() {
            return Err(ConfigError::EmptyController);
        }
        AddressFamilies::new(self.ipv4_mode, self.ipv6_mode)
    }

    /// Loads and validates a configuration file.
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: CompilerConfig = if is_json(path) {
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

        config.validate()?;
        Ok(config)
    }
}

pub(crate) fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
