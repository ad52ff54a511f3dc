use planwright_utils::error::ConfigError;
use planwright_utils::types::PhaseId;

use super::{Config, SYSTEM_DOMAIN};

fn invalid(key: impl Into<String>, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        value: value.into(),
    }
}

fn check_workflow_table(
    section: &str,
    table: &std::collections::BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    for (phase, skill) in table {
        if phase.parse::<PhaseId>().is_err() {
            return Err(invalid(
                format!("{section}.{phase}"),
                "is not a phase (expected 1-init .. 6-finalize)",
            ));
        }
        if skill.trim().is_empty() {
            return Err(invalid(format!("{section}.{phase}"), "skill name is empty"));
        }
    }
    Ok(())
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ttl) = self.defaults.lock_ttl_seconds {
            if ttl < 60 {
                return Err(invalid("lock_ttl_seconds", "must be at least 60 seconds (1 minute)"));
            }
            if ttl > 86400 {
                return Err(invalid(
                    "lock_ttl_seconds",
                    "exceeds maximum limit of 86400 seconds (24 hours)",
                ));
            }
        }

        if self.aggregation_threshold() == 0 {
            return Err(invalid("aggregation_threshold", "must be greater than 0"));
        }
        if self.split_ceiling() == 0 {
            return Err(invalid("split_ceiling", "must be greater than 0"));
        }
        if self.aggregation_threshold() > self.split_ceiling() {
            return Err(invalid(
                "aggregation_threshold",
                format!(
                    "{} exceeds split_ceiling {}",
                    self.aggregation_threshold(),
                    self.split_ceiling()
                ),
            ));
        }

        if self.execute_max_iterations() == 0 {
            return Err(invalid("execute_max_iterations", "must be at least 1"));
        }
        if self.finalize_max_iterations() == 0 {
            return Err(invalid("finalize_max_iterations", "must be at least 1"));
        }

        check_workflow_table("workflow", &self.workflow)?;

        if self.domains.is_empty() {
            return Err(invalid("domains", "at least one [domains.<name>] section is required"));
        }

        for (name, domain) in &self.domains {
            if name.trim().is_empty() {
                return Err(invalid("domains", "domain name is empty"));
            }
            if name.eq_ignore_ascii_case(SYSTEM_DOMAIN) {
                return Err(invalid(
                    format!("domains.{name}"),
                    "the system domain is reserved",
                ));
            }

            let section = format!("domains.{name}.workflow");
            check_workflow_table(&section, &domain.workflow)?;

            for (key, value) in [
                ("outline_extension", &domain.outline_extension),
                ("triage_extension", &domain.triage_extension),
                ("suppression_syntax", &domain.suppression_syntax),
            ] {
                if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                    return Err(invalid(format!("domains.{name}.{key}"), "must not be empty"));
                }
            }

            for phase in PhaseId::ALL {
                if self.workflow_skill(name, phase).is_none() {
                    return Err(invalid(
                        format!("domains.{name}"),
                        format!("no workflow skill for phase {phase}"),
                    ));
                }
            }
        }

        Ok(())
    }
}
