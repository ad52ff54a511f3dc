//! Configuration management for planwright
//!
//! Hierarchical configuration with discovery and precedence:
//! programmatic > file > defaults. TOML files carry `[defaults]`,
//! `[optimizer]`, `[loops]`, `[workflow]` and `[domains.<name>]` sections.

mod builder;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use model::*;
pub use planwright_utils::types::ConfigSource;

use camino::Utf8PathBuf;
use planwright_utils::types::PhaseId;
use std::collections::BTreeMap;

/// Stock workflow skills, one per phase.
#[must_use]
pub fn default_workflow() -> BTreeMap<String, String> {
    [
        (PhaseId::Init, "plan-init"),
        (PhaseId::Refine, "plan-refine"),
        (PhaseId::Outline, "plan-outline"),
        (PhaseId::Plan, "plan-compile"),
        (PhaseId::Execute, "plan-execute"),
        (PhaseId::Finalize, "plan-finalize"),
    ]
    .into_iter()
    .map(|(phase, skill)| (phase.as_str().to_string(), skill.to_string()))
    .collect()
}

impl Config {
    /// State directory: explicit `state_dir`, else `PLANWRIGHT_HOME`, else `.planwright`.
    #[must_use]
    pub fn state_dir(&self) -> Utf8PathBuf {
        self.defaults
            .state_dir
            .as_ref()
            .map_or_else(planwright_utils::paths::planwright_home, Utf8PathBuf::from)
    }

    #[must_use]
    pub fn lock_ttl_seconds(&self) -> u64 {
        self.defaults.lock_ttl_seconds.unwrap_or(DEFAULT_LOCK_TTL_SECS)
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.defaults.verbose.unwrap_or(false)
    }

    #[must_use]
    pub fn aggregation_threshold(&self) -> usize {
        self.optimizer
            .aggregation_threshold
            .unwrap_or(DEFAULT_AGGREGATION_THRESHOLD)
    }

    #[must_use]
    pub fn split_ceiling(&self) -> usize {
        self.optimizer.split_ceiling.unwrap_or(DEFAULT_SPLIT_CEILING)
    }

    #[must_use]
    pub fn split_oversized(&self) -> bool {
        self.optimizer.split_oversized.unwrap_or(true)
    }

    #[must_use]
    pub fn execute_max_iterations(&self) -> u32 {
        self.loops
            .execute_max_iterations
            .unwrap_or(DEFAULT_EXECUTE_MAX_ITERATIONS)
    }

    #[must_use]
    pub fn finalize_max_iterations(&self) -> u32 {
        self.loops
            .finalize_max_iterations
            .unwrap_or(DEFAULT_FINALIZE_MAX_ITERATIONS)
    }

    /// Names of the configured domains, sorted.
    #[must_use]
    pub fn domain_names(&self) -> Vec<&str> {
        self.domains.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn is_configured_domain(&self, name: &str) -> bool {
        self.domains.contains_key(name)
    }

    /// Domains ordered by descending priority, then name.
    #[must_use]
    pub fn domains_by_priority(&self) -> Vec<(&str, &DomainConfig)> {
        let mut out: Vec<(&str, &DomainConfig)> =
            self.domains.iter().map(|(k, v)| (k.as_str(), v)).collect();
        out.sort_by(|a, b| b.1.priority.cmp(&a.1.priority).then_with(|| a.0.cmp(b.0)));
        out
    }

    /// Workflow skill for a domain and phase: the domain override, else the
    /// shared `[workflow]` entry. `None` for unknown domains.
    #[must_use]
    pub fn workflow_skill(&self, domain: &str, phase: PhaseId) -> Option<&str> {
        let domain_config = self.domains.get(domain)?;
        domain_config
            .workflow
            .get(phase.as_str())
            .or_else(|| self.workflow.get(phase.as_str()))
            .map(String::as_str)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Config {
    /// A valid configuration with `java` and `javascript` domains and the stock
    /// workflow, for tests that do not exercise discovery.
    #[must_use]
    pub fn minimal_for_testing() -> Self {
        let java = DomainConfig {
            priority: 10,
            outline_extension: Some("java-outline".to_string()),
            triage_extension: Some("java-triage".to_string()),
            test_patterns: vec!["src/test/".to_string()],
            suppression_syntax: Some("@SuppressWarnings(\"{rule}\")".to_string()),
            fix_severities: vec!["error".to_string()],
            suppress_severities: vec!["warning".to_string()],
            ..DomainConfig::default()
        };
        let javascript = DomainConfig {
            priority: 5,
            test_patterns: vec![".test.".to_string(), "__tests__/".to_string()],
            ..DomainConfig::default()
        };

        Config {
            defaults: Defaults::default(),
            optimizer: OptimizerConfig::default(),
            loops: LoopsConfig::default(),
            workflow: default_workflow(),
            domains: [
                ("java".to_string(), java),
                ("javascript".to_string(), javascript),
            ]
            .into_iter()
            .collect(),
            source_attribution: std::collections::HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planwright_utils::error::ConfigError;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const FULL_CONFIG: &str = r#"
[defaults]
lock_ttl_seconds = 600

[optimizer]
aggregation_threshold = 6
split_ceiling = 12

[loops]
execute_max_iterations = 4

[workflow]
"1-init" = "plan-init"
"2-refine" = "plan-refine"
"3-outline" = "plan-outline"
"4-plan" = "plan-compile"
"5-execute" = "plan-execute"
"6-finalize" = "plan-finalize"

[domains.java]
priority = 10
workflow = { "5-execute" = "java-execute" }
outline_extension = "java-outline"
test_patterns = ["src/test/"]

[domains.javascript]
priority = 20
"#;

    fn create_test_config_file(dir: &Path, content: &str) -> PathBuf {
        let home = dir.join(".planwright");
        planwright_utils::paths::ensure_dir_all(&home).unwrap();
        let config_path = home.join("config.toml");
        fs::write(&config_path, content).unwrap();
        config_path
    }

    #[test]
    fn test_defaults() {
        let config = Config::minimal_for_testing();
        config.validate().unwrap();
        assert_eq!(config.aggregation_threshold(), 10);
        assert_eq!(config.split_ceiling(), 15);
        assert!(config.split_oversized());
        assert_eq!(config.execute_max_iterations(), 5);
        assert_eq!(config.finalize_max_iterations(), 3);
        assert_eq!(config.lock_ttl_seconds(), 3600);
    }

    #[test]
    fn test_discovery_loads_file_values() {
        let temp = TempDir::new().unwrap();
        create_test_config_file(temp.path(), FULL_CONFIG);

        let config = Config::discover_from(temp.path()).unwrap();
        assert_eq!(config.aggregation_threshold(), 6);
        assert_eq!(config.split_ceiling(), 12);
        assert_eq!(config.execute_max_iterations(), 4);
        assert_eq!(config.finalize_max_iterations(), 3);
        assert_eq!(config.lock_ttl_seconds(), 600);
        assert_eq!(
            config.source_attribution.get("aggregation_threshold"),
            Some(&ConfigSource::Config)
        );
        assert_eq!(
            config.source_attribution.get("finalize_max_iterations"),
            Some(&ConfigSource::Default)
        );
    }

    #[test]
    fn test_discovery_walks_upward_and_stops_at_repo_root() {
        let temp = TempDir::new().unwrap();
        create_test_config_file(temp.path(), FULL_CONFIG);

        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let found = Config::discover_config_file_from(&nested).unwrap();
        assert_eq!(found, Some(temp.path().join(".planwright").join("config.toml")));

        let repo = temp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();
        let inner = repo.join("src");
        fs::create_dir_all(&inner).unwrap();
        assert_eq!(Config::discover_config_file_from(&inner).unwrap(), None);
    }

    #[test]
    fn test_domain_workflow_overrides_shared_table() {
        let config = Config::from_toml_str(FULL_CONFIG).unwrap();
        assert_eq!(
            config.workflow_skill("java", PhaseId::Execute),
            Some("java-execute")
        );
        assert_eq!(
            config.workflow_skill("javascript", PhaseId::Execute),
            Some("plan-execute")
        );
        assert_eq!(config.workflow_skill("cobol", PhaseId::Execute), None);
    }

    #[test]
    fn test_domains_by_priority_descending_then_name() {
        let config = Config::from_toml_str(FULL_CONFIG).unwrap();
        let order: Vec<&str> = config.domains_by_priority().into_iter().map(|d| d.0).collect();
        assert_eq!(order, vec!["javascript", "java"]);
    }

    #[test]
    fn test_missing_domains_rejected() {
        let err = Config::from_toml_str("[optimizer]\nsplit_ceiling = 20\n").unwrap_err();
        let config_err = err.downcast_ref::<ConfigError>().unwrap();
        assert!(matches!(config_err, ConfigError::InvalidValue { key, .. } if key == "domains"));
    }

    #[test]
    fn test_system_domain_rejected() {
        let err = Config::builder()
            .shared_workflow_defaults()
            .domain("system", DomainConfig::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "domains.system"));
    }

    #[test]
    fn test_threshold_ordering_enforced() {
        let err = Config::builder()
            .shared_workflow_defaults()
            .domain("java", DomainConfig::default())
            .aggregation_threshold(20)
            .split_ceiling(15)
            .build()
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "aggregation_threshold")
        );
    }

    #[test]
    fn test_zero_loop_cap_rejected() {
        let err = Config::builder()
            .shared_workflow_defaults()
            .domain("java", DomainConfig::default())
            .execute_max_iterations(0)
            .build()
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "execute_max_iterations")
        );
    }

    #[test]
    fn test_unresolvable_phase_rejected() {
        let err = Config::builder()
            .workflow_skill(PhaseId::Init, "plan-init")
            .domain("java", DomainConfig::default())
            .build()
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value } => {
                assert_eq!(key, "domains.java");
                assert!(value.contains("2-refine"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_workflow_phase_rejected() {
        let toml = format!("{FULL_CONFIG}\n[domains.go]\nworkflow = {{ \"7-deploy\" = \"x\" }}\n");
        assert!(Config::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_builder_attribution_and_effective_config() {
        let config = Config::builder()
            .shared_workflow_defaults()
            .domain("java", DomainConfig::default())
            .state_dir("/srv/plans")
            .split_ceiling(20)
            .build()
            .unwrap();

        assert_eq!(config.state_dir(), Utf8PathBuf::from("/srv/plans"));
        let effective = config.effective_config();
        assert_eq!(
            effective.get("split_ceiling"),
            Some(&("20".to_string(), "programmatic".to_string()))
        );
        assert_eq!(
            effective.get("aggregation_threshold"),
            Some(&("10".to_string(), "default".to_string()))
        );
    }

    #[test]
    #[serial_test::serial]
    fn test_state_dir_falls_back_to_home() {
        let guard = planwright_utils::paths::with_isolated_home();
        let config = Config::minimal_for_testing();
        assert_eq!(config.state_dir(), guard.home());
    }
}
