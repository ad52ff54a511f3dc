use std::collections::BTreeMap;

use planwright_utils::error::ConfigError;
use planwright_utils::types::PhaseId;

use super::{Config, ConfigSource, Defaults, DomainConfig, LoopsConfig, OptimizerConfig};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use planwright_config::{Config, DomainConfig};
    /// use planwright_utils::types::PhaseId;
    ///
    /// let config = Config::builder()
    ///     .state_dir("/tmp/plans")
    ///     .shared_workflow_defaults()
    ///     .domain("java", DomainConfig::default())
    ///     .aggregation_threshold(8)
    ///     .build()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.aggregation_threshold(), 8);
    /// assert_eq!(config.workflow_skill("java", PhaseId::Execute), Some("plan-execute"));
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent builder for [`Config`].
///
/// All values set via the builder are attributed to
/// `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    state_dir: Option<String>,
    lock_ttl_seconds: Option<u64>,
    verbose: Option<bool>,
    aggregation_threshold: Option<usize>,
    split_ceiling: Option<usize>,
    split_oversized: Option<bool>,
    execute_max_iterations: Option<u32>,
    finalize_max_iterations: Option<u32>,
    workflow: BTreeMap<String, String>,
    domains: BTreeMap<String, DomainConfig>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state_dir(mut self, path: impl Into<String>) -> Self {
        self.state_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn lock_ttl_seconds(mut self, secs: u64) -> Self {
        self.lock_ttl_seconds = Some(secs);
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    #[must_use]
    pub fn aggregation_threshold(mut self, files: usize) -> Self {
        self.aggregation_threshold = Some(files);
        self
    }

    #[must_use]
    pub fn split_ceiling(mut self, files: usize) -> Self {
        self.split_ceiling = Some(files);
        self
    }

    #[must_use]
    pub fn split_oversized(mut self, enabled: bool) -> Self {
        self.split_oversized = Some(enabled);
        self
    }

    #[must_use]
    pub fn execute_max_iterations(mut self, cap: u32) -> Self {
        self.execute_max_iterations = Some(cap);
        self
    }

    #[must_use]
    pub fn finalize_max_iterations(mut self, cap: u32) -> Self {
        self.finalize_max_iterations = Some(cap);
        self
    }

    /// Register the shared workflow skill for one phase.
    #[must_use]
    pub fn workflow_skill(mut self, phase: PhaseId, skill: impl Into<String>) -> Self {
        self.workflow.insert(phase.as_str().to_string(), skill.into());
        self
    }

    /// Register the stock `plan-*` workflow skills for every phase.
    #[must_use]
    pub fn shared_workflow_defaults(mut self) -> Self {
        for (phase, skill) in super::default_workflow() {
            self.workflow.entry(phase).or_insert(skill);
        }
        self
    }

    #[must_use]
    pub fn domain(mut self, name: impl Into<String>, domain: DomainConfig) -> Self {
        self.domains.insert(name.into(), domain);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config {
            defaults: Defaults::default(),
            optimizer: OptimizerConfig::default(),
            loops: LoopsConfig::default(),
            workflow: BTreeMap::new(),
            domains: BTreeMap::new(),
            source_attribution: std::collections::HashMap::new(),
        };

        for key in [
            "lock_ttl_seconds",
            "aggregation_threshold",
            "split_ceiling",
            "split_oversized",
            "execute_max_iterations",
            "finalize_max_iterations",
        ] {
            config
                .source_attribution
                .insert(key.to_string(), ConfigSource::Default);
        }

        fn mark(config: &mut Config, key: &str) {
            config
                .source_attribution
                .insert(key.to_string(), ConfigSource::Programmatic);
        }

        if self.state_dir.is_some() {
            config.defaults.state_dir = self.state_dir;
            mark(&mut config, "state_dir");
        }
        if self.lock_ttl_seconds.is_some() {
            config.defaults.lock_ttl_seconds = self.lock_ttl_seconds;
            mark(&mut config, "lock_ttl_seconds");
        }
        if self.verbose.is_some() {
            config.defaults.verbose = self.verbose;
            mark(&mut config, "verbose");
        }
        if self.aggregation_threshold.is_some() {
            config.optimizer.aggregation_threshold = self.aggregation_threshold;
            mark(&mut config, "aggregation_threshold");
        }
        if self.split_ceiling.is_some() {
            config.optimizer.split_ceiling = self.split_ceiling;
            mark(&mut config, "split_ceiling");
        }
        if self.split_oversized.is_some() {
            config.optimizer.split_oversized = self.split_oversized;
            mark(&mut config, "split_oversized");
        }
        if self.execute_max_iterations.is_some() {
            config.loops.execute_max_iterations = self.execute_max_iterations;
            mark(&mut config, "execute_max_iterations");
        }
        if self.finalize_max_iterations.is_some() {
            config.loops.finalize_max_iterations = self.finalize_max_iterations;
            mark(&mut config, "finalize_max_iterations");
        }
        if !self.workflow.is_empty() {
            config.workflow = self.workflow;
            mark(&mut config, "workflow");
        }
        for name in self.domains.keys() {
            mark(&mut config, &format!("domains.{name}"));
        }
        config.domains = self.domains;

        config.validate()?;
        Ok(config)
    }
}
