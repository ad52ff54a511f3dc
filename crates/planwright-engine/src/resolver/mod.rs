//! Skill and extension resolution
//!
//! [`SkillRegistry`] answers "which skill runs this phase for this domain".
//! [`DomainResolver`] adds the domain extensions on top: test-file patterns
//! for the optimizer, merged outline guidance, and finding triage.

mod extension;
mod registry;
mod triage;

pub use extension::{
    CodebaseAnalysis, ConfiguredExtension, DeliverablePatterns, DomainExtension, FileConcern,
    SeverityGuidelines, SuppressionSyntax,
};
pub use registry::{ExtensionType, SkillRegistry};
pub use triage::{Finding, TriageDecision};

use std::collections::BTreeMap;
use std::sync::Arc;

use planwright_config::Config;
use planwright_utils::error::ResolutionError;
use planwright_utils::types::PhaseId;
use serde::Serialize;

/// Outline guidance contributed by one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainGuidance {
    pub domain: String,
    pub priority: i32,
    pub analysis: CodebaseAnalysis,
}

/// The registry plus one extension per domain.
#[derive(Clone)]
pub struct DomainResolver {
    registry: SkillRegistry,
    extensions: BTreeMap<String, Arc<dyn DomainExtension>>,
}

impl std::fmt::Debug for DomainResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainResolver")
            .field("registry", &self.registry)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DomainResolver {
    /// Registry and [`ConfiguredExtension`]s for every configured domain.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let extensions = config
            .domains
            .iter()
            .map(|(name, domain)| {
                let ext: Arc<dyn DomainExtension> =
                    Arc::new(ConfiguredExtension::new(name.clone(), domain.clone()));
                (name.clone(), ext)
            })
            .collect();
        Self {
            registry: SkillRegistry::from_config(config),
            extensions,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    /// Replace a domain's extension with a custom implementation.
    ///
    /// The domain must already be configured.
    pub fn register_extension(
        &mut self,
        extension: Arc<dyn DomainExtension>,
    ) -> Result<(), ResolutionError> {
        let domain = extension.domain().to_string();
        self.registry.check_domain(&domain)?;
        tracing::debug!(domain = %domain, "custom domain extension registered");
        self.extensions.insert(domain, extension);
        Ok(())
    }

    pub fn resolve(&self, domain: &str, phase: PhaseId) -> Result<&str, ResolutionError> {
        self.registry.resolve(domain, phase)
    }

    pub fn resolve_extension(
        &self,
        domain: &str,
        extension: ExtensionType,
    ) -> Result<Option<&str>, ResolutionError> {
        self.registry.resolve_extension(domain, extension)
    }

    fn extension(&self, domain: &str) -> Result<Option<&dyn DomainExtension>, ResolutionError> {
        self.registry.check_domain(domain)?;
        Ok(self.extensions.get(domain).map(Arc::as_ref))
    }

    /// The domain's deliverable patterns, or the defaults.
    pub fn deliverable_patterns(&self, domain: &str) -> Result<DeliverablePatterns, ResolutionError> {
        Ok(self
            .extension(domain)?
            .and_then(|e| e.deliverable_patterns())
            .unwrap_or_default())
    }

    /// Outline guidance for the given domains, highest priority first, then by
    /// name. Domains whose extension offers no analysis are left out.
    pub fn outline_guidance<'a, I>(&self, domains: I) -> Result<Vec<DomainGuidance>, ResolutionError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out: Vec<DomainGuidance> = Vec::new();
        for domain in domains {
            if out.iter().any(|g| g.domain == domain) {
                continue;
            }
            let Some(analysis) = self
                .extension(domain)?
                .and_then(|e| e.codebase_analysis())
            else {
                continue;
            };
            out.push(DomainGuidance {
                domain: domain.to_string(),
                priority: self.registry.priority(domain).unwrap_or_default(),
                analysis,
            });
        }
        out.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.domain.cmp(&b.domain)));
        Ok(out)
    }

    /// Decide a finding using its own domain's policy only.
    ///
    /// A fix-severity finding is fixed. A suppressible one is suppressed when
    /// the domain has an annotation syntax. Everything else is accepted.
    pub fn triage(&self, finding: &Finding) -> Result<TriageDecision, ResolutionError> {
        let extension = self.extension(&finding.domain)?;
        let guidelines = extension
            .and_then(|e| e.severity_guidelines())
            .unwrap_or_default();

        if guidelines.requires_fix(&finding.severity) {
            return Ok(TriageDecision::Fix);
        }
        if guidelines.allows_suppression(&finding.severity)
            && let Some(syntax) = extension.and_then(|e| e.suppression_syntax())
        {
            return Ok(TriageDecision::Suppress {
                annotation: syntax.annotate(&finding.rule),
            });
        }
        Ok(TriageDecision::Accept)
    }
}
