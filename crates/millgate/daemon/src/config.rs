//! Daemon configuration: engine knobs, role rosters, and logging.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use millgate_engine::EngineConfig;
use millgate_types::RoleTag;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Engine tuning knobs.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Role rosters: which identities serve each role. Unstaffed roles
    /// fall back to the requester at assignment time.
    #[serde(default)]
    pub roles: HashMap<RoleTag, Vec<String>>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            roles: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from defaults, an optional file, and
    /// MILLGATE_-prefixed environment variables, in that order.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with MILLGATE_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("MILLGATE")
                .separator("_")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_need_no_file() {
        let config = DaemonConfig::default();
        assert_eq!(config.engine.sweep_interval_secs, 900);
        assert_eq!(config.engine.retention_days, 30);
        assert!(config.roles.is_empty());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn role_rosters_deserialize_by_tag() {
        let config: DaemonConfig = serde_json::from_str(
            r#"{
                "roles": {
                    "quality": ["inspector-1", "inspector-2"],
                    "supervision": ["supervisor-1"]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.roles[&RoleTag::Quality].len(), 2);
        assert_eq!(config.roles[&RoleTag::Supervision], vec!["supervisor-1"]);
        assert_eq!(config.engine.sweep_interval_secs, 900);
    }

    #[test]
    fn engine_section_overrides_selected_fields() {
        let config: DaemonConfig = serde_json::from_str(
            r#"{ "engine": { "sweep_interval_secs": 60 }, "logging": { "json": true } }"#,
        )
        .unwrap();

        assert_eq!(config.engine.sweep_interval_secs, 60);
        assert_eq!(config.engine.retention_interval_secs, 86_400);
        assert!(config.logging.json);
    }
}
