//! Domain extension hooks
//!
//! A domain supplies knowledge to the engine through four named hooks. Every
//! hook is optional; when a domain leaves one out the engine uses the default
//! documented on the hook's output type.

use planwright_config::DomainConfig;
use serde::{Deserialize, Serialize};

/// Heuristics handed to codebase analysis during outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebaseAnalysis {
    /// Outline extension skill that performs the analysis, if any
    pub skill: Option<String>,
    pub hints: Vec<String>,
}

/// Concern a file belongs to when an oversized deliverable is split.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FileConcern {
    Source,
    Test,
    Resource,
    Documentation,
}

/// Path patterns that shape deliverables into tasks.
///
/// Default: the common test layouts of mainstream ecosystems
/// ([`DeliverablePatterns::DEFAULT_TEST_PATTERNS`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverablePatterns {
    /// Substrings that mark a path as test code
    pub test_patterns: Vec<String>,
}

impl DeliverablePatterns {
    pub const DEFAULT_TEST_PATTERNS: &'static [&'static str] = &[
        "test/",
        "tests/",
        "__tests__/",
        "_test.",
        ".test.",
        ".spec.",
        "Test.",
        "Tests.",
    ];

    const DOC_EXTENSIONS: &'static [&'static str] = &["md", "rst", "adoc", "txt"];
    const RESOURCE_EXTENSIONS: &'static [&'static str] = &[
        "json",
        "yml",
        "yaml",
        "xml",
        "properties",
        "toml",
        "ini",
        "sql",
        "css",
        "scss",
        "html",
        "svg",
        "png",
    ];

    #[must_use]
    pub fn is_test(&self, path: &str) -> bool {
        self.test_patterns.iter().any(|p| path.contains(p.as_str()))
    }

    /// Concern of one affected file. Test patterns win over extensions.
    #[must_use]
    pub fn classify(&self, path: &str) -> FileConcern {
        if self.is_test(path) {
            return FileConcern::Test;
        }
        let normalized = path.replace('\\', "/");
        if normalized.starts_with("docs/") || normalized.contains("/docs/") {
            return FileConcern::Documentation;
        }
        let extension = normalized
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some(ext) if Self::DOC_EXTENSIONS.contains(&ext) => FileConcern::Documentation,
            Some(ext) if Self::RESOURCE_EXTENSIONS.contains(&ext) => FileConcern::Resource,
            _ if normalized.contains("/resources/") => FileConcern::Resource,
            _ => FileConcern::Source,
        }
    }
}

impl Default for DeliverablePatterns {
    fn default() -> Self {
        Self {
            test_patterns: Self::DEFAULT_TEST_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }
}

/// Annotation template for suppressing a finding in code.
///
/// No default: without this hook a finding is never suppressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionSyntax {
    /// Template where `{rule}` stands for the finding's rule id
    pub template: String,
}

impl SuppressionSyntax {
    #[must_use]
    pub fn annotate(&self, rule: &str) -> String {
        self.template.replace("{rule}", rule)
    }
}

/// Which finding severities must be fixed and which may be suppressed.
///
/// Default: `error` must be fixed, nothing is suppressible, everything else
/// is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityGuidelines {
    pub fix: Vec<String>,
    pub suppress: Vec<String>,
}

impl SeverityGuidelines {
    #[must_use]
    pub fn requires_fix(&self, severity: &str) -> bool {
        self.fix.iter().any(|s| s.eq_ignore_ascii_case(severity))
    }

    #[must_use]
    pub fn allows_suppression(&self, severity: &str) -> bool {
        self.suppress.iter().any(|s| s.eq_ignore_ascii_case(severity))
    }
}

impl Default for SeverityGuidelines {
    fn default() -> Self {
        Self {
            fix: vec!["error".to_string()],
            suppress: Vec::new(),
        }
    }
}

/// Domain knowledge supplied at named hook points.
///
/// Implementations apply only to work belonging to [`domain`](Self::domain).
/// Every hook defaults to `None`, meaning "use the engine default".
pub trait DomainExtension: Send + Sync {
    fn domain(&self) -> &str;

    fn codebase_analysis(&self) -> Option<CodebaseAnalysis> {
        None
    }

    fn deliverable_patterns(&self) -> Option<DeliverablePatterns> {
        None
    }

    fn suppression_syntax(&self) -> Option<SuppressionSyntax> {
        None
    }

    fn severity_guidelines(&self) -> Option<SeverityGuidelines> {
        None
    }
}

/// Extension backed by a `[domains.<name>]` configuration section.
///
/// A hook is present only when its configuration keys are set.
#[derive(Debug, Clone)]
pub struct ConfiguredExtension {
    domain: String,
    config: DomainConfig,
}

impl ConfiguredExtension {
    #[must_use]
    pub fn new(domain: impl Into<String>, config: DomainConfig) -> Self {
        Self {
            domain: domain.into(),
            config,
        }
    }
}

impl DomainExtension for ConfiguredExtension {
    fn domain(&self) -> &str {
        &self.domain
    }

    fn codebase_analysis(&self) -> Option<CodebaseAnalysis> {
        if self.config.outline_extension.is_none() && self.config.analysis_hints.is_empty() {
            return None;
        }
        Some(CodebaseAnalysis {
            skill: self.config.outline_extension.clone(),
            hints: self.config.analysis_hints.clone(),
        })
    }

    fn deliverable_patterns(&self) -> Option<DeliverablePatterns> {
        if self.config.test_patterns.is_empty() {
            return None;
        }
        Some(DeliverablePatterns {
            test_patterns: self.config.test_patterns.clone(),
        })
    }

    fn suppression_syntax(&self) -> Option<SuppressionSyntax> {
        self.config
            .suppression_syntax
            .as_ref()
            .map(|template| SuppressionSyntax {
                template: template.clone(),
            })
    }

    fn severity_guidelines(&self) -> Option<SeverityGuidelines> {
        if self.config.fix_severities.is_empty() && self.config.suppress_severities.is_empty() {
            return None;
        }
        Some(SeverityGuidelines {
            fix: self.config.fix_severities.clone(),
            suppress: self.config.suppress_severities.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classification() {
        let patterns = DeliverablePatterns::default();
        assert_eq!(
            patterns.classify("src/main/java/App.java"),
            FileConcern::Source
        );
        assert_eq!(
            patterns.classify("src/test/java/AppTest.java"),
            FileConcern::Test
        );
        assert_eq!(patterns.classify("web/login.spec.ts"), FileConcern::Test);
        assert_eq!(
            patterns.classify("src/main/resources/application.yml"),
            FileConcern::Resource
        );
        assert_eq!(patterns.classify("README.md"), FileConcern::Documentation);
        assert_eq!(patterns.classify("docs/guide/intro"), FileConcern::Documentation);
    }

    #[test]
    fn test_configured_patterns_replace_defaults() {
        let patterns = DeliverablePatterns {
            test_patterns: vec!["src/it/".to_string()],
        };
        assert_eq!(patterns.classify("src/it/FlowIT.java"), FileConcern::Test);
        assert_eq!(patterns.classify("src/test/AppTest.java"), FileConcern::Source);
    }

    #[test]
    fn test_configured_extension_hooks() {
        let ext = ConfiguredExtension::new(
            "java",
            DomainConfig {
                outline_extension: Some("java-outline".to_string()),
                test_patterns: vec!["src/test/".to_string()],
                suppression_syntax: Some("@SuppressWarnings(\"{rule}\")".to_string()),
                ..DomainConfig::default()
            },
        );
        assert_eq!(ext.domain(), "java");
        assert_eq!(
            ext.codebase_analysis().and_then(|a| a.skill).as_deref(),
            Some("java-outline")
        );
        assert!(ext.deliverable_patterns().is_some());
        assert_eq!(
            ext.suppression_syntax().unwrap().annotate("unchecked"),
            "@SuppressWarnings(\"unchecked\")"
        );
        assert!(ext.severity_guidelines().is_none());
    }

    #[test]
    fn test_empty_section_has_no_hooks() {
        let ext = ConfiguredExtension::new("go", DomainConfig::default());
        assert!(ext.codebase_analysis().is_none());
        assert!(ext.deliverable_patterns().is_none());
        assert!(ext.suppression_syntax().is_none());
        assert!(ext.severity_guidelines().is_none());
    }
}
