use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::{Config, ConfigSource, Defaults, DomainConfig, LoopsConfig, OptimizerConfig};

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<Defaults>,
    optimizer: Option<PartialOptimizer>,
    loops: Option<PartialLoops>,
    workflow: Option<BTreeMap<String, String>>,
    domains: Option<BTreeMap<String, DomainConfig>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialOptimizer {
    aggregation_threshold: Option<usize>,
    split_ceiling: Option<usize>,
    split_oversized: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialLoops {
    execute_max_iterations: Option<u32>,
    finalize_max_iterations: Option<u32>,
}

impl Config {
    /// Discover configuration from the current working directory upward.
    pub fn discover() -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir)
    }

    /// Discover configuration starting from a specific directory.
    ///
    /// The path-driven variant tests use to avoid process-global state. A
    /// missing config file is not an error: defaults apply, though a config
    /// with no domains fails validation.
    pub fn discover_from(start_dir: &Path) -> Result<Self> {
        let config_path = Self::discover_config_file_from(start_dir)?;
        match config_path {
            Some(path) => Self::from_file(&path),
            None => {
                let config = Self::assemble(TomlConfig::default(), None);
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from an explicit file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file_config = Self::load_config_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?;
        let config = Self::assemble(file_config, Some(path));
        config.validate()?;
        tracing::debug!(path = %path.display(), domains = config.domains.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text, with file attribution.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file_config: TomlConfig =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        let config = Self::assemble(file_config, Some(Path::new("<inline>")));
        config.validate()?;
        Ok(config)
    }

    fn assemble(file_config: TomlConfig, path: Option<&Path>) -> Self {
        let mut source_attribution = HashMap::new();
        let mut defaults = Defaults::default();
        let mut optimizer = OptimizerConfig::default();
        let mut loops = LoopsConfig::default();
        let mut workflow = BTreeMap::new();
        let mut domains = BTreeMap::new();

        for key in [
            "lock_ttl_seconds",
            "aggregation_threshold",
            "split_ceiling",
            "split_oversized",
            "execute_max_iterations",
            "finalize_max_iterations",
        ] {
            source_attribution.insert(key.to_string(), ConfigSource::Default);
        }

        if path.is_some() {
            let source = ConfigSource::Config;
            let mut mark = |key: &str| {
                source_attribution.insert(key.to_string(), source.clone());
            };

            if let Some(file_defaults) = file_config.defaults {
                if file_defaults.state_dir.is_some() {
                    defaults.state_dir = file_defaults.state_dir;
                    mark("state_dir");
                }
                if file_defaults.lock_ttl_seconds.is_some() {
                    defaults.lock_ttl_seconds = file_defaults.lock_ttl_seconds;
                    mark("lock_ttl_seconds");
                }
                if file_defaults.verbose.is_some() {
                    defaults.verbose = file_defaults.verbose;
                    mark("verbose");
                }
            }

            if let Some(file_optimizer) = file_config.optimizer {
                if file_optimizer.aggregation_threshold.is_some() {
                    optimizer.aggregation_threshold = file_optimizer.aggregation_threshold;
                    mark("aggregation_threshold");
                }
                if file_optimizer.split_ceiling.is_some() {
                    optimizer.split_ceiling = file_optimizer.split_ceiling;
                    mark("split_ceiling");
                }
                if file_optimizer.split_oversized.is_some() {
                    optimizer.split_oversized = file_optimizer.split_oversized;
                    mark("split_oversized");
                }
            }

            if let Some(file_loops) = file_config.loops {
                if file_loops.execute_max_iterations.is_some() {
                    loops.execute_max_iterations = file_loops.execute_max_iterations;
                    mark("execute_max_iterations");
                }
                if file_loops.finalize_max_iterations.is_some() {
                    loops.finalize_max_iterations = file_loops.finalize_max_iterations;
                    mark("finalize_max_iterations");
                }
            }

            if let Some(file_workflow) = file_config.workflow {
                workflow = file_workflow;
                mark("workflow");
            }

            if let Some(file_domains) = file_config.domains {
                for name in file_domains.keys() {
                    mark(&format!("domains.{name}"));
                }
                domains = file_domains;
            }
        }

        Config {
            defaults,
            optimizer,
            loops,
            workflow,
            domains,
            source_attribution,
        }
    }

    /// Search upward from `start_dir` for `.planwright/config.toml`.
    ///
    /// Stops at the filesystem root or at the first repository root
    /// (`.git`, `.hg`, `.svn`) without a config.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current_dir = start_dir.to_path_buf();

        loop {
            let config_path = current_dir
                .join(planwright_utils::paths::DEFAULT_HOME)
                .join("config.toml");
            if config_path.exists() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config file: {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {e}",
                path.display()
            )),
        }
    }
}
