use std::collections::HashMap;

use super::{Config, ConfigSource};

fn stable_source_label(source: &ConfigSource) -> &'static str {
    match source {
        ConfigSource::Config => "config",
        ConfigSource::Programmatic => "programmatic",
        ConfigSource::Default => "default",
    }
}

fn source_label(source: Option<&ConfigSource>) -> String {
    stable_source_label(source.unwrap_or(&ConfigSource::Default)).to_string()
}

impl Config {
    /// Effective configuration as `key -> (value, source)` pairs
    #[must_use]
    pub fn effective_config(&self) -> HashMap<String, (String, String)> {
        let mut config = HashMap::new();

        let mut add = |key: &str, value: String| {
            let source = source_label(self.source_attribution.get(key));
            config.insert(key.to_string(), (value, source));
        };

        add("state_dir", self.state_dir().to_string());
        add("lock_ttl_seconds", self.lock_ttl_seconds().to_string());
        add("aggregation_threshold", self.aggregation_threshold().to_string());
        add("split_ceiling", self.split_ceiling().to_string());
        add("split_oversized", self.split_oversized().to_string());
        add("execute_max_iterations", self.execute_max_iterations().to_string());
        add("finalize_max_iterations", self.finalize_max_iterations().to_string());

        let workflow: Vec<String> = self
            .workflow
            .iter()
            .map(|(phase, skill)| format!("{phase}={skill}"))
            .collect();
        add("workflow", workflow.join(", "));

        for (name, domain) in &self.domains {
            add(&format!("domains.{name}"), format!("priority={}", domain.priority));
        }

        config
    }
}
