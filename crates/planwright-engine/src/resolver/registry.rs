//! `(domain, phase)` and `(domain, extension)` lookup tables

use std::collections::BTreeMap;

use planwright_config::{Config, SYSTEM_DOMAIN};
use planwright_utils::error::ResolutionError;
use planwright_utils::types::PhaseId;
use serde::{Deserialize, Serialize};

/// Kinds of extension skill a domain may supply
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
    strum::VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExtensionType {
    /// Codebase analysis and deliverable shaping during `3-outline`
    Outline,
    /// Finding suppression and acceptance policy during `6-finalize`
    Triage,
}

/// Explicit lookup table from `(domain, phase)` to a workflow skill.
///
/// Built once from configuration. A miss is always a [`ResolutionError`];
/// there is no fallback skill.
#[derive(Debug, Clone, Default)]
pub struct SkillRegistry {
    domains: BTreeMap<String, i32>,
    workflow: BTreeMap<(String, PhaseId), String>,
    extensions: BTreeMap<(String, ExtensionType), String>,
}

impl SkillRegistry {
    /// Register every configured domain.
    ///
    /// The shared `[workflow]` table is registered for each domain first, then
    /// the domain's own `workflow` table overrides it phase by phase.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::default();
        for (name, domain) in &config.domains {
            registry.add_domain(name, domain.priority);
            for phase in PhaseId::ALL {
                if let Some(skill) = config.workflow_skill(name, phase) {
                    registry.register(name, phase, skill);
                }
            }
            if let Some(skill) = &domain.outline_extension {
                registry.register_extension(name, ExtensionType::Outline, skill);
            }
            if let Some(skill) = &domain.triage_extension {
                registry.register_extension(name, ExtensionType::Triage, skill);
            }
        }
        tracing::debug!(
            domains = registry.domains.len(),
            skills = registry.workflow.len(),
            extensions = registry.extensions.len(),
            "skill registry built"
        );
        registry
    }

    pub fn add_domain(&mut self, domain: &str, priority: i32) {
        self.domains.insert(domain.to_string(), priority);
    }

    /// Register or replace the workflow skill for a pair.
    pub fn register(&mut self, domain: &str, phase: PhaseId, skill: impl Into<String>) {
        self.workflow
            .insert((domain.to_string(), phase), skill.into());
    }

    pub fn register_extension(
        &mut self,
        domain: &str,
        extension: ExtensionType,
        skill: impl Into<String>,
    ) {
        self.extensions
            .insert((domain.to_string(), extension), skill.into());
    }

    /// Domains known to the registry, sorted by name.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    #[must_use]
    pub fn priority(&self, domain: &str) -> Option<i32> {
        self.domains.get(domain).copied()
    }

    /// Fails for the system domain and for domains that were never configured.
    pub fn check_domain(&self, domain: &str) -> Result<(), ResolutionError> {
        if domain == SYSTEM_DOMAIN {
            return Err(ResolutionError::ReservedDomain {
                domain: domain.to_string(),
            });
        }
        if !self.domains.contains_key(domain) {
            return Err(ResolutionError::UnknownDomain {
                domain: domain.to_string(),
            });
        }
        Ok(())
    }

    /// The one workflow skill for `(domain, phase)`.
    ///
    /// ```rust
    /// use planwright_engine::resolver::SkillRegistry;
    /// use planwright_utils::types::PhaseId;
    ///
    /// let mut registry = SkillRegistry::default();
    /// registry.add_domain("java", 10);
    /// registry.register("java", PhaseId::Execute, "java-execute");
    /// assert_eq!(registry.resolve("java", PhaseId::Execute).unwrap(), "java-execute");
    /// assert!(registry.resolve("java", PhaseId::Plan).is_err());
    /// assert!(registry.resolve("go", PhaseId::Execute).is_err());
    /// ```
    pub fn resolve(&self, domain: &str, phase: PhaseId) -> Result<&str, ResolutionError> {
        self.check_domain(domain)?;
        self.workflow
            .get(&(domain.to_string(), phase))
            .map(String::as_str)
            .ok_or_else(|| ResolutionError::NoWorkflowSkill {
                domain: domain.to_string(),
                phase: phase.to_string(),
            })
    }

    /// Zero or one extension skill for `(domain, extension)`.
    pub fn resolve_extension(
        &self,
        domain: &str,
        extension: ExtensionType,
    ) -> Result<Option<&str>, ResolutionError> {
        self.check_domain(domain)?;
        Ok(self
            .extensions
            .get(&(domain.to_string(), extension))
            .map(String::as_str))
    }
}
