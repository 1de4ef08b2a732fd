use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::master::{GrandMasterMode, GrandMasterScope};
use crate::Settings;

/// Loads, validates and persists console settings.
///
/// Settings live in a versioned JSON file (`lumen.json` in the working
/// directory unless a path is given). A missing file is created with defaults.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
    created_at: Option<String>,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub engine: EngineConfigSchema,
    pub output: OutputConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigSchema {
    pub tick_rate_hz: ConfigOption<u32>,
    pub max_running_functions: ConfigOption<usize>,
    pub grand_master_mode: ConfigOption<GrandMasterMode>,
    pub grand_master_scope: ConfigOption<GrandMasterScope>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfigSchema {
    pub dmx_enabled: ConfigOption<bool>,
    pub dmx_broadcast: ConfigOption<bool>,
    pub dmx_source_ip: ConfigOption<String>,
    pub dmx_dest_ip: ConfigOption<String>,
    pub dmx_port: ConfigOption<u16>,
    pub dmx_output_fps: ConfigOption<f64>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
    pub requires_restart: bool,
}

impl<T> ConfigOption<T> {
    fn new(default: T, description: &str, requires_restart: bool) -> Self {
        Self {
            default,
            valid_range: None,
            valid_choices: None,
            description: description.to_string(),
            requires_restart,
        }
    }

    fn range(mut self, min: T, max: T) -> Self {
        self.valid_range = Some((min, max));
        self
    }

    fn choices(mut self, choices: Vec<T>) -> Self {
        self.valid_choices = Some(choices);
        self
    }
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path: config_path.unwrap_or_else(|| PathBuf::from("lumen.json")),
            settings: Settings::default(),
            created_at: None,
        }
    }

    /// Load settings from the configuration file, writing defaults first if
    /// there is none. Settings that fail validation are rejected.
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::info!(
                "No config at {}, writing defaults",
                self.config_path.display()
            );
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}, missing settings use defaults",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::ValidationError)?;

        log::info!("Loaded config from {}", self.config_path.display());
        self.settings = config_file.settings;
        self.created_at = Some(config_file.created_at);
        Ok(self.settings.clone())
    }

    pub fn save(&mut self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created_at = self.created_at.get_or_insert_with(|| now.clone()).clone();
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at,
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Validate, apply and persist new settings.
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn schema() -> ConfigSchema {
        let defaults = Settings::default();
        ConfigSchema {
            engine: EngineConfigSchema {
                tick_rate_hz: ConfigOption::new(
                    defaults.tick_rate_hz,
                    "Function engine ticks per second",
                    true,
                )
                .range(1, 200),
                max_running_functions: ConfigOption::new(
                    defaults.max_running_functions,
                    "Maximum number of simultaneously running function instances",
                    false,
                )
                .range(1, 65536),
                grand_master_mode: ConfigOption::new(
                    defaults.grand_master_mode,
                    "Reduce scales channels, Limit caps them at the master level",
                    false,
                )
                .choices(vec![GrandMasterMode::Reduce, GrandMasterMode::Limit]),
                grand_master_scope: ConfigOption::new(
                    defaults.grand_master_scope,
                    "Channels the grand master applies to",
                    false,
                )
                .choices(vec![GrandMasterScope::Intensity, GrandMasterScope::All]),
            },
            output: OutputConfigSchema {
                dmx_enabled: ConfigOption::new(
                    defaults.dmx_enabled,
                    "Enable DMX output via Art-Net",
                    true,
                ),
                dmx_broadcast: ConfigOption::new(
                    defaults.dmx_broadcast,
                    "Use broadcast mode for Art-Net (vs unicast)",
                    true,
                ),
                dmx_source_ip: ConfigOption::new(
                    defaults.dmx_source_ip,
                    "Source IP address for Art-Net output",
                    true,
                ),
                dmx_dest_ip: ConfigOption::new(
                    defaults.dmx_dest_ip,
                    "Destination IP address for Art-Net unicast",
                    true,
                ),
                dmx_port: ConfigOption::new(defaults.dmx_port, "UDP port for Art-Net output", true)
                    .range(1024, 65535),
                dmx_output_fps: ConfigOption::new(
                    defaults.dmx_output_fps,
                    "Art-Net frames per second",
                    true,
                )
                .range(1.0, 44.0),
            },
        }
    }

    /// Validate settings against the schema, collecting every violation.
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        if let Some((min, max)) = schema.engine.tick_rate_hz.valid_range {
            if settings.tick_rate_hz < min || settings.tick_rate_hz > max {
                errors.push(format!("tick_rate_hz must be between {} and {}", min, max));
            }
        }

        if let Some((min, max)) = schema.engine.max_running_functions.valid_range {
            if settings.max_running_functions < min || settings.max_running_functions > max {
                errors.push(format!(
                    "max_running_functions must be between {} and {}",
                    min, max
                ));
            }
        }

        if let Some((min, max)) = schema.output.dmx_port.valid_range {
            if settings.dmx_port < min || settings.dmx_port > max {
                errors.push(format!("dmx_port must be between {} and {}", min, max));
            }
        }

        if let Some((min, max)) = schema.output.dmx_output_fps.valid_range {
            if !(min..=max).contains(&settings.dmx_output_fps) {
                errors.push(format!("dmx_output_fps must be between {} and {}", min, max));
            }
        }

        if settings.dmx_enabled {
            if settings.dmx_source_ip.parse::<IpAddr>().is_err() {
                errors.push(format!(
                    "dmx_source_ip '{}' is not an IP address",
                    settings.dmx_source_ip
                ));
            }
            if !settings.dmx_broadcast && settings.dmx_dest_ip.parse::<IpAddr>().is_err() {
                errors.push(format!(
                    "dmx_dest_ip '{}' is not an IP address",
                    settings.dmx_dest_ip
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    ReadError(String),
    WriteError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "Failed to read config file: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "Failed to write config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config file: {}", msg),
            ConfigError::SerializeError(msg) => write!(f, "Failed to serialize config: {}", msg),
            ConfigError::ValidationError(errors) => {
                write!(f, "Config validation errors: {}", errors.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_load_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("lumen.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));
        assert_eq!(manager.config_path(), config_path);

        let settings = manager.load().unwrap();
        assert_eq!(settings, Settings::default());
        assert!(config_path.exists());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("lumen.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));
        let settings = Settings {
            tick_rate_hz: 40,
            grand_master_mode: GrandMasterMode::Limit,
            grand_master_scope: GrandMasterScope::All,
            ..Settings::default()
        };
        manager.update_settings(settings.clone()).unwrap();

        let mut manager2 = ConfigManager::new(Some(config_path));
        let loaded = manager2.load().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_created_at_survives_resave() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("lumen.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));
        manager.load().unwrap();
        let first: ConfigFile =
            serde_json::from_str(&fs::read_to_string(&config_path).unwrap()).unwrap();

        let mut manager2 = ConfigManager::new(Some(config_path.clone()));
        manager2.load().unwrap();
        manager2.reset_to_defaults().unwrap();
        let second: ConfigFile =
            serde_json::from_str(&fs::read_to_string(&config_path).unwrap()).unwrap();

        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("lumen.json");
        fs::write(&config_path, "{ not json").unwrap();

        let mut manager = ConfigManager::new(Some(config_path));
        assert!(matches!(manager.load(), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        assert!(ConfigManager::validate_settings(&settings).is_ok());

        settings.tick_rate_hz = 0;
        settings.dmx_port = 80;
        let errors = ConfigManager::validate_settings(&settings).unwrap_err();
        assert_eq!(errors.len(), 2);

        let mut settings = Settings::default();
        settings.dmx_dest_ip = "not-an-ip".to_string();
        assert!(ConfigManager::validate_settings(&settings).is_err());
        settings.dmx_broadcast = true;
        assert!(ConfigManager::validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_update_rejects_invalid_settings() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = ConfigManager::new(Some(temp_dir.path().join("lumen.json")));
        let settings = Settings {
            max_running_functions: 0,
            ..Settings::default()
        };
        assert!(matches!(
            manager.update_settings(settings),
            Err(ConfigError::ValidationError(_))
        ));
        assert_eq!(manager.settings(), &Settings::default());
    }

    #[test]
    fn test_schema_matches_defaults() {
        let schema = ConfigManager::schema();
        let defaults = Settings::default();
        assert_eq!(schema.engine.tick_rate_hz.default, defaults.tick_rate_hz);
        assert!(schema.engine.grand_master_mode.valid_choices.is_some());
        assert!(schema.output.dmx_port.valid_range.is_some());
        assert!(!schema.output.dmx_enabled.description.is_empty());
    }
}
