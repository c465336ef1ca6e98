use std::path::Path;

use crate::config::schema::EngineConfig;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    let positive = [
        ("poll_interval_secs", config.poll_interval_secs as usize),
        ("audit_log_cap", config.audit_log_cap),
        ("snapshot_retention", config.snapshot_retention),
        ("event_capacity", config.event_capacity),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(ConfigError::Validation {
                message: format!("'{}' must be greater than zero", field),
            });
        }
    }

    if config.actor.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "'actor' must not be blank".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use std::io::Write;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = load_config_from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.max_errors, 10);
        assert_eq!(config.empty_page_limit, 3);
        assert_eq!(config.audit_log_cap, 500);
        assert_eq!(config.snapshot_retention, 10);
        assert_eq!(config.actor, "system");
    }

    #[test]
    fn test_load_overrides() {
        let config_json = r#"
        {
            "poll_interval_secs": 2,
            "max_errors": 4,
            "environment": "staging",
            "database_path": "/tmp/leads.db",
            "actor": "ops"
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.poll_interval().as_secs(), 2);
        assert_eq!(config.max_errors, 4);
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(
            config.database_path.as_deref(),
            Some(Path::new("/tmp/leads.db"))
        );
        assert_eq!(config.actor, "ops");
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = load_config_from_str(r#"{"poll_interval_secs": 0}"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_zero_audit_cap_is_rejected() {
        let result = load_config_from_str(r#"{"audit_log_cap": 0}"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_blank_actor_is_rejected() {
        let result = load_config_from_str(r#"{"actor": "  "}"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ poll_interval_secs: ");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"empty_page_limit": 5}}"#).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.empty_page_limit, 5);
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/definitely/not/here/leadminer.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
