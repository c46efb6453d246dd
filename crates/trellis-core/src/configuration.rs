//! Role-based configurations and the "extends from" graph between them.
//!
//! A configuration's role decides what it may be used for: a *bucket* only
//! declares dependencies, a *consumable* configuration is exposed to other
//! projects as a variant, and a *resolvable* configuration requests
//! resolution of everything it declares or inherits. Role changes go
//! through a validated transition table and are recorded.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::attributes::AttributeSet;
use crate::component::Artifact;
use crate::dependency::Dependency;

/// A planned, one-way change of role. While migrating, a configuration keeps
/// the usages of the role it migrates from, but usages the target role
/// forbids are reported as deprecated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleMigration {
    LegacyToBucket,
    LegacyToConsumable,
    LegacyToResolvable,
    ConsumableToRetired,
    ResolvableToRetired,
}

impl RoleMigration {
    const ALL: [RoleMigration; 5] = [
        RoleMigration::LegacyToBucket,
        RoleMigration::LegacyToConsumable,
        RoleMigration::LegacyToResolvable,
        RoleMigration::ConsumableToRetired,
        RoleMigration::ResolvableToRetired,
    ];

    pub fn from(self) -> ConfigurationRole {
        match self {
            RoleMigration::LegacyToBucket
            | RoleMigration::LegacyToConsumable
            | RoleMigration::LegacyToResolvable => ConfigurationRole::Legacy,
            RoleMigration::ConsumableToRetired => ConfigurationRole::Consumable,
            RoleMigration::ResolvableToRetired => ConfigurationRole::Resolvable,
        }
    }

    pub fn to(self) -> ConfigurationRole {
        match self {
            RoleMigration::LegacyToBucket => ConfigurationRole::Bucket,
            RoleMigration::LegacyToConsumable => ConfigurationRole::Consumable,
            RoleMigration::LegacyToResolvable => ConfigurationRole::Resolvable,
            RoleMigration::ConsumableToRetired | RoleMigration::ResolvableToRetired => {
                ConfigurationRole::Retired
            }
        }
    }

    fn name(self) -> &'static str {
        match self {
            RoleMigration::LegacyToBucket => "legacy-to-bucket",
            RoleMigration::LegacyToConsumable => "legacy-to-consumable",
            RoleMigration::LegacyToResolvable => "legacy-to-resolvable",
            RoleMigration::ConsumableToRetired => "consumable-to-retired",
            RoleMigration::ResolvableToRetired => "resolvable-to-retired",
        }
    }
}

/// What a configuration may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConfigurationRole {
    /// Declares dependencies; never resolved or consumed.
    Bucket,
    /// Exposed as a variant to other projects.
    Consumable,
    /// Requests resolution of its declared and inherited dependencies.
    Resolvable,
    /// Every usage allowed. Meant to be migrated to a narrower role.
    Legacy,
    /// No usage allowed. Terminal.
    Retired,
    /// On its way from one role to another.
    Migrating(RoleMigration),
}

/// An operation whose legality depends on the configuration role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Usage {
    Declare,
    Consume,
    Resolve,
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Usage::Declare => "declare dependencies",
            Usage::Consume => "be consumed",
            Usage::Resolve => "be resolved",
        })
    }
}

impl ConfigurationRole {
    pub fn permits(self, usage: Usage) -> bool {
        use ConfigurationRole::*;
        match (self, usage) {
            (Migrating(m), usage) => m.from().permits(usage),
            (Retired, _) => false,
            (Legacy, _) => true,
            (_, Usage::Declare) => true,
            (Consumable, Usage::Consume) => true,
            (Resolvable, Usage::Resolve) => true,
            _ => false,
        }
    }

    pub fn can_declare(self) -> bool {
        self.permits(Usage::Declare)
    }

    pub fn can_consume(self) -> bool {
        self.permits(Usage::Consume)
    }

    pub fn can_resolve(self) -> bool {
        self.permits(Usage::Resolve)
    }

    /// Whether `usage` is allowed now but will be refused once a pending
    /// migration completes.
    pub fn is_deprecated(self, usage: Usage) -> bool {
        match self {
            ConfigurationRole::Migrating(m) => m.from().permits(usage) && !m.to().permits(usage),
            _ => false,
        }
    }

    /// The transition table. There are no edges back, so every change is
    /// one-shot.
    pub fn can_transition_to(self, to: ConfigurationRole) -> bool {
        use ConfigurationRole::*;
        match (self, to) {
            (Migrating(m), to) => m.to() == to,
            (from, Migrating(m)) => m.from() == from,
            (Legacy, Bucket | Consumable | Resolvable | Retired) => true,
            (Consumable | Resolvable, Retired) => true,
            _ => false,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ConfigurationRole::Bucket => "bucket",
            ConfigurationRole::Consumable => "consumable",
            ConfigurationRole::Resolvable => "resolvable",
            ConfigurationRole::Legacy => "legacy",
            ConfigurationRole::Retired => "retired",
            ConfigurationRole::Migrating(m) => m.name(),
        }
    }
}

impl fmt::Display for ConfigurationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigurationRole {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let role = match s {
            "bucket" => ConfigurationRole::Bucket,
            "consumable" => ConfigurationRole::Consumable,
            "resolvable" => ConfigurationRole::Resolvable,
            "legacy" => ConfigurationRole::Legacy,
            "retired" => ConfigurationRole::Retired,
            other => RoleMigration::ALL
                .into_iter()
                .find(|m| m.name() == other)
                .map(ConfigurationRole::Migrating)
                .ok_or_else(|| ConfigurationError::InvalidRole(other.to_string()))?,
        };
        Ok(role)
    }
}

impl TryFrom<String> for ConfigurationRole {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConfigurationRole> for String {
    fn from(role: ConfigurationRole) -> Self {
        role.name().to_string()
    }
}

/// Errors from declaring or using configurations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ConfigurationError {
    #[error("Configuration '{0}' not found")]
    Unknown(String),

    #[error("Configuration '{0}' already exists")]
    Duplicate(String),

    #[error("Unknown configuration role '{0}'")]
    #[diagnostic(help(
        "Valid roles: bucket, consumable, resolvable, legacy, retired, or a migration such as consumable-to-retired"
    ))]
    InvalidRole(String),

    #[error("Configuration '{configuration}' with role {role} cannot {operation}")]
    IllegalRoleOperation {
        configuration: String,
        role: ConfigurationRole,
        operation: String,
    },

    #[error("Configuration hierarchy would contain a cycle: {}", .path.join(" -> "))]
    ConfigurationCycle { path: Vec<String> },
}

/// A recorded role change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleTransition {
    pub from: ConfigurationRole,
    pub to: ConfigurationRole,
}

/// A dependency together with the configuration that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    pub configuration: String,
    pub dependency: Dependency,
}

/// A named, role-tagged container of dependencies.
#[derive(Debug, Clone)]
pub struct Configuration {
    name: String,
    role: ConfigurationRole,
    locked: bool,
    description: Option<String>,
    dependencies: Vec<Dependency>,
    extends_from: Vec<usize>,
    attributes: AttributeSet,
    artifacts: Vec<Artifact>,
    history: Vec<RoleTransition>,
}

impl Configuration {
    fn new(name: &str, role: ConfigurationRole, locked: bool) -> Self {
        Self {
            name: name.to_string(),
            role,
            locked,
            description: None,
            dependencies: Vec::new(),
            extends_from: Vec::new(),
            attributes: AttributeSet::new(),
            artifacts: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ConfigurationRole {
        self.role
    }

    /// Locked configurations refuse role changes other than completing a
    /// migration they were created with.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Dependencies declared directly on this configuration.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Requested attributes when resolvable, offered attributes when consumable.
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name, value);
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn add_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    pub fn role_history(&self) -> &[RoleTransition] {
        &self.history
    }
}

/// All configurations of one project, stored in an arena so "extends from"
/// edges are plain indices.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationContainer {
    configurations: Vec<Configuration>,
    by_name: BTreeMap<String, usize>,
}

impl ConfigurationContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        name: &str,
        role: ConfigurationRole,
    ) -> Result<&mut Configuration, ConfigurationError> {
        self.insert(name, role, false)
    }

    /// Create a configuration whose role can only change by completing a
    /// migration it starts in.
    pub fn create_locked(
        &mut self,
        name: &str,
        role: ConfigurationRole,
    ) -> Result<&mut Configuration, ConfigurationError> {
        self.insert(name, role, true)
    }

    pub fn bucket(&mut self, name: &str) -> Result<&mut Configuration, ConfigurationError> {
        self.insert(name, ConfigurationRole::Bucket, false)
    }

    pub fn consumable(&mut self, name: &str) -> Result<&mut Configuration, ConfigurationError> {
        self.insert(name, ConfigurationRole::Consumable, false)
    }

    pub fn resolvable(&mut self, name: &str) -> Result<&mut Configuration, ConfigurationError> {
        self.insert(name, ConfigurationRole::Resolvable, false)
    }

    pub fn consumable_locked(
        &mut self,
        name: &str,
    ) -> Result<&mut Configuration, ConfigurationError> {
        self.insert(name, ConfigurationRole::Consumable, true)
    }

    pub fn resolvable_locked(
        &mut self,
        name: &str,
    ) -> Result<&mut Configuration, ConfigurationError> {
        self.insert(name, ConfigurationRole::Resolvable, true)
    }

    /// A locked configuration that is already on its way to another role.
    pub fn migrating_locked(
        &mut self,
        name: &str,
        migration: RoleMigration,
    ) -> Result<&mut Configuration, ConfigurationError> {
        self.insert(name, ConfigurationRole::Migrating(migration), true)
    }

    fn insert(
        &mut self,
        name: &str,
        role: ConfigurationRole,
        locked: bool,
    ) -> Result<&mut Configuration, ConfigurationError> {
        if self.by_name.contains_key(name) {
            return Err(ConfigurationError::Duplicate(name.to_string()));
        }
        let idx = self.configurations.len();
        self.configurations
            .push(Configuration::new(name, role, locked));
        self.by_name.insert(name.to_string(), idx);
        Ok(&mut self.configurations[idx])
    }

    pub fn get(&self, name: &str) -> Option<&Configuration> {
        self.by_name.get(name).map(|&idx| &self.configurations[idx])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Configuration> {
        self.by_name
            .get(name)
            .copied()
            .map(move |idx| &mut self.configurations[idx])
    }

    /// Configurations in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Configuration> {
        self.configurations.iter()
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    fn index_of(&self, name: &str) -> Result<usize, ConfigurationError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ConfigurationError::Unknown(name.to_string()))
    }

    /// Check that the configuration's role permits `usage`. Usages a pending
    /// migration will remove are allowed with a deprecation warning.
    pub fn check_usage(&self, name: &str, usage: Usage) -> Result<(), ConfigurationError> {
        let conf = &self.configurations[self.index_of(name)?];
        if !conf.role.permits(usage) {
            return Err(ConfigurationError::IllegalRoleOperation {
                configuration: name.to_string(),
                role: conf.role,
                operation: usage.to_string(),
            });
        }
        if conf.role.is_deprecated(usage) {
            tracing::warn!(
                "Configuration '{name}' is migrating ({}); using it to {usage} is deprecated",
                conf.role
            );
        }
        Ok(())
    }

    /// Declare a dependency on a configuration whose role allows it.
    pub fn add_dependency(
        &mut self,
        configuration: &str,
        dependency: Dependency,
    ) -> Result<(), ConfigurationError> {
        self.check_usage(configuration, Usage::Declare)?;
        let idx = self.index_of(configuration)?;
        self.configurations[idx].dependencies.push(dependency);
        Ok(())
    }

    /// Make `child` inherit every dependency of `parent`. Rejects edges that
    /// would close a cycle.
    pub fn extends_from(&mut self, child: &str, parent: &str) -> Result<(), ConfigurationError> {
        let child_idx = self.index_of(child)?;
        let parent_idx = self.index_of(parent)?;

        if let Some(mut path) = self.ancestry_path(parent_idx, child_idx) {
            path.insert(0, child.to_string());
            return Err(ConfigurationError::ConfigurationCycle { path });
        }

        let edges = &mut self.configurations[child_idx].extends_from;
        if !edges.contains(&parent_idx) {
            edges.push(parent_idx);
        }
        Ok(())
    }

    /// Names along an extends-from chain from `start` up to `target`.
    fn ancestry_path(&self, start: usize, target: usize) -> Option<Vec<String>> {
        let mut parents: BTreeMap<usize, usize> = BTreeMap::new();
        let mut queue = VecDeque::from([start]);
        let mut seen = HashSet::from([start]);
        while let Some(idx) = queue.pop_front() {
            if idx == target {
                let mut path = vec![self.configurations[idx].name.clone()];
                let mut cur = idx;
                while let Some(&prev) = parents.get(&cur) {
                    path.push(self.configurations[prev].name.clone());
                    cur = prev;
                }
                path.reverse();
                return Some(path);
            }
            for &parent in &self.configurations[idx].extends_from {
                if seen.insert(parent) {
                    parents.insert(parent, idx);
                    queue.push_back(parent);
                }
            }
        }
        None
    }

    /// Names of the configurations `name` directly extends.
    pub fn extends_of(&self, name: &str) -> Result<Vec<&str>, ConfigurationError> {
        let idx = self.index_of(name)?;
        Ok(self.configurations[idx]
            .extends_from
            .iter()
            .map(|&p| self.configurations[p].name.as_str())
            .collect())
    }

    /// The configuration followed by everything it transitively extends,
    /// breadth-first in declaration order.
    pub fn hierarchy(&self, name: &str) -> Result<Vec<&Configuration>, ConfigurationError> {
        let start = self.index_of(name)?;
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);
        let mut seen = HashSet::from([start]);
        while let Some(idx) = queue.pop_front() {
            order.push(&self.configurations[idx]);
            for &parent in &self.configurations[idx].extends_from {
                if seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(order)
    }

    /// Declared plus inherited dependencies, computed now. Identical
    /// declarations inherited through several paths appear once.
    pub fn all_dependencies(&self, name: &str) -> Result<Vec<DeclaredDependency>, ConfigurationError> {
        let mut seen: HashSet<&Dependency> = HashSet::new();
        let mut declared = Vec::new();
        for conf in self.hierarchy(name)? {
            for dep in &conf.dependencies {
                if seen.insert(dep) {
                    declared.push(DeclaredDependency {
                        configuration: conf.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(declared)
    }

    /// Change a configuration's role according to the transition table.
    pub fn transition(
        &mut self,
        name: &str,
        role: ConfigurationRole,
    ) -> Result<(), ConfigurationError> {
        let idx = self.index_of(name)?;
        let conf = &mut self.configurations[idx];
        let from = conf.role;
        let completing = matches!(from, ConfigurationRole::Migrating(m) if m.to() == role);

        if conf.locked && !completing {
            return Err(ConfigurationError::IllegalRoleOperation {
                configuration: name.to_string(),
                role: from,
                operation: format!("change role to {role} while locked"),
            });
        }
        if !from.can_transition_to(role) {
            return Err(ConfigurationError::IllegalRoleOperation {
                configuration: name.to_string(),
                role: from,
                operation: format!("change role to {role}"),
            });
        }

        conf.role = role;
        conf.history.push(RoleTransition { from, to: role });
        tracing::info!("Configuration '{name}' changed role: {from} -> {role}");
        Ok(())
    }

    /// Finish a pending migration, returning the new role.
    pub fn complete_migration(&mut self, name: &str) -> Result<ConfigurationRole, ConfigurationError> {
        let idx = self.index_of(name)?;
        let role = self.configurations[idx].role;
        match role {
            ConfigurationRole::Migrating(m) => {
                self.transition(name, m.to())?;
                Ok(m.to())
            }
            _ => Err(ConfigurationError::IllegalRoleOperation {
                configuration: name.to_string(),
                role,
                operation: "complete a migration".to_string(),
            }),
        }
    }
}
