use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use planwright_utils::types::ConfigSource;

pub const DEFAULT_LOCK_TTL_SECS: u64 = 3600;
pub const DEFAULT_AGGREGATION_THRESHOLD: usize = 10;
pub const DEFAULT_SPLIT_CEILING: usize = 15;
pub const DEFAULT_EXECUTE_MAX_ITERATIONS: u32 = 5;
pub const DEFAULT_FINALIZE_MAX_ITERATIONS: u32 = 3;

/// Name of the internal domain. Never valid on deliverables, tasks or config.
pub const SYSTEM_DOMAIN: &str = "system";

/// Configuration for plan orchestration.
///
/// # Configuration File Format
///
/// ```toml
/// [defaults]
/// lock_ttl_seconds = 3600
///
/// [optimizer]
/// aggregation_threshold = 10
/// split_ceiling = 15
///
/// [loops]
/// execute_max_iterations = 5
/// finalize_max_iterations = 3
///
/// [workflow]
/// "1-init" = "plan-init"
/// "2-refine" = "plan-refine"
/// "3-outline" = "plan-outline"
/// "4-plan" = "plan-compile"
/// "5-execute" = "plan-execute"
/// "6-finalize" = "plan-finalize"
///
/// [domains.java]
/// priority = 10
/// workflow = { "5-execute" = "java-execute" }
/// outline_extension = "java-outline"
/// triage_extension = "java-triage"
/// test_patterns = ["src/test/"]
/// suppression_syntax = "@SuppressWarnings(\"{rule}\")"
/// fix_severities = ["error", "warning"]
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub defaults: Defaults,
    pub optimizer: OptimizerConfig,
    pub loops: LoopsConfig,
    /// Workflow skill per phase, shared by every domain unless overridden.
    pub workflow: BTreeMap<String, String>,
    /// Configured domains keyed by name.
    pub domains: BTreeMap<String, DomainConfig>,
    /// Source attribution for each setting.
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// General settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Explicit state directory; otherwise `PLANWRIGHT_HOME` or `.planwright`.
    pub state_dir: Option<String>,
    pub lock_ttl_seconds: Option<u64>,
    pub verbose: Option<bool>,
}

/// Task optimizer thresholds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OptimizerConfig {
    /// Merged groups must stay strictly below this many files.
    pub aggregation_threshold: Option<usize>,
    /// Units above this many files are split by concern.
    pub split_ceiling: Option<usize>,
    pub split_oversized: Option<bool>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            aggregation_threshold: Some(DEFAULT_AGGREGATION_THRESHOLD),
            split_ceiling: Some(DEFAULT_SPLIT_CEILING),
            split_oversized: Some(true),
        }
    }
}

/// Iteration caps for the re-entrant phases
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoopsConfig {
    pub execute_max_iterations: Option<u32>,
    pub finalize_max_iterations: Option<u32>,
}

impl Default for LoopsConfig {
    fn default() -> Self {
        Self {
            execute_max_iterations: Some(DEFAULT_EXECUTE_MAX_ITERATIONS),
            finalize_max_iterations: Some(DEFAULT_FINALIZE_MAX_ITERATIONS),
        }
    }
}

/// One `[domains.<name>]` section.
///
/// Everything beyond `priority` and `workflow` feeds the domain's extension
/// hooks; an absent value means the hook is absent and the engine default
/// applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DomainConfig {
    /// Higher priority wins when guidance from several domains is merged.
    #[serde(default)]
    pub priority: i32,
    /// Per-phase workflow skill overrides for this domain.
    #[serde(default)]
    pub workflow: BTreeMap<String, String>,
    pub outline_extension: Option<String>,
    pub triage_extension: Option<String>,
    /// Hints handed to codebase analysis during outline.
    #[serde(default)]
    pub analysis_hints: Vec<String>,
    /// Path fragments that mark a file as test code.
    #[serde(default)]
    pub test_patterns: Vec<String>,
    /// Annotation template; `{rule}` is replaced by the finding's rule id.
    pub suppression_syntax: Option<String>,
    /// Severities that require a fix.
    #[serde(default)]
    pub fix_severities: Vec<String>,
    /// Severities that may be suppressed instead of fixed.
    #[serde(default)]
    pub suppress_severities: Vec<String>,
}
