use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = "telcare";
const CONFIG_FILE_NAME: &str = "config.toml";
const CURRENT_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_API_GROUP: &str = "/api/v1";
pub const DEFAULT_USER_HOST: &str = "http://localhost:8081";
pub const DEFAULT_BILL_HOST: &str = "http://localhost:8081";
pub const DEFAULT_PRODUCT_HOST: &str = "http://localhost:8081";
pub const DEFAULT_KOS_MOCK_HOST: &str = "http://localhost:8081";

/// Result returned by [`load_config`], capturing the source and any non-fatal issues.
#[derive(Debug, Clone)]
pub struct ConfigLoadResult {
    pub config: FileConfig,
    pub warnings: Vec<String>,
    pub source: ConfigSource,
}

/// Indicates where the configuration was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// No persisted configuration was found or usable; defaults were synthesized.
    Default,
    /// Configuration was read from `config.toml`.
    File,
}

/// Errors that can occur when persisting configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Ser(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {err}"),
            ConfigError::Ser(err) => write!(f, "TOML serialization error: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Ser(value)
    }
}

/// Disk-backed configuration schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "FileConfig::schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub portal: PortalConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            portal: PortalConfig::default(),
        }
    }
}

impl FileConfig {
    const fn schema_version() -> u32 {
        CURRENT_SCHEMA_VERSION
    }
}

/// Backend endpoint layout. Each functional area can point at a different
/// host; all of them share the same API group prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "PortalConfig::default_api_group")]
    pub api_group: String,
    #[serde(default = "PortalConfig::default_user_host")]
    pub user_host: String,
    #[serde(default = "PortalConfig::default_bill_host")]
    pub bill_host: String,
    #[serde(default = "PortalConfig::default_product_host")]
    pub product_host: String,
    #[serde(default = "PortalConfig::default_kos_mock_host")]
    pub kos_mock_host: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_group: Self::default_api_group(),
            user_host: Self::default_user_host(),
            bill_host: Self::default_bill_host(),
            product_host: Self::default_product_host(),
            kos_mock_host: Self::default_kos_mock_host(),
        }
    }
}

impl PortalConfig {
    fn default_api_group() -> String {
        DEFAULT_API_GROUP.to_string()
    }

    fn default_user_host() -> String {
        DEFAULT_USER_HOST.to_string()
    }

    fn default_bill_host() -> String {
        DEFAULT_BILL_HOST.to_string()
    }

    fn default_product_host() -> String {
        DEFAULT_PRODUCT_HOST.to_string()
    }

    fn default_kos_mock_host() -> String {
        DEFAULT_KOS_MOCK_HOST.to_string()
    }

    /// Base URL for a functional area: host plus the shared API group.
    pub fn user_base(&self) -> String {
        format!("{}{}", self.user_host, self.api_group)
    }

    pub fn bill_base(&self) -> String {
        format!("{}{}", self.bill_host, self.api_group)
    }

    pub fn product_base(&self) -> String {
        format!("{}{}", self.product_host, self.api_group)
    }

    pub fn kos_mock_base(&self) -> String {
        format!("{}{}", self.kos_mock_host, self.api_group)
    }
}

/// Path to the configuration directory.
pub fn config_directory() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path to `config.toml`.
pub fn config_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Load the configuration from the default path, falling back to defaults.
pub fn load_config() -> ConfigLoadResult {
    load_config_from(&config_path(), &|name| std::env::var(name).ok())
}

/// Load the configuration from an explicit path, with an injectable
/// environment lookup so tests can override without touching the process
/// environment.
pub fn load_config_from(
    path: &std::path::Path,
    env: &dyn Fn(&str) -> Option<String>,
) -> ConfigLoadResult {
    let mut warnings = Vec::new();

    let mut result = if path.exists() {
        match fs::read_to_string(path) {
            Ok(raw) => match toml::from_str::<FileConfig>(&raw) {
                Ok(cfg) => {
                    let (cfg, mut sanitize_warnings) = sanitize_config(cfg);
                    warnings.append(&mut sanitize_warnings);
                    ConfigLoadResult {
                        config: cfg,
                        warnings,
                        source: ConfigSource::File,
                    }
                }
                Err(err) => {
                    warnings.push(format!(
                        "Failed to parse {} as TOML: {}. Falling back to defaults.",
                        CONFIG_FILE_NAME, err
                    ));
                    ConfigLoadResult {
                        config: FileConfig::default(),
                        warnings,
                        source: ConfigSource::Default,
                    }
                }
            },
            Err(err) => {
                warnings.push(format!(
                    "Failed to read {}: {}. Falling back to defaults.",
                    CONFIG_FILE_NAME, err
                ));
                ConfigLoadResult {
                    config: FileConfig::default(),
                    warnings,
                    source: ConfigSource::Default,
                }
            }
        }
    } else {
        ConfigLoadResult {
            config: FileConfig::default(),
            warnings,
            source: ConfigSource::Default,
        }
    };

    apply_env_overrides(&mut result.config.portal, env);
    result
}

/// Persist the configuration to disk.
pub fn save_config(config: &FileConfig) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(config)?;
    fs::write(path, serialized)?;
    Ok(())
}

fn sanitize_config(mut config: FileConfig) -> (FileConfig, Vec<String>) {
    let mut warnings = Vec::new();

    if config.schema_version != CURRENT_SCHEMA_VERSION {
        warnings.push(format!(
            "Unknown config schema version {}. Resetting to {}.",
            config.schema_version, CURRENT_SCHEMA_VERSION
        ));
        return (FileConfig::default(), warnings);
    }

    let defaults = PortalConfig::default();
    let fields: [(&str, &mut String, &str); 5] = [
        ("api_group", &mut config.portal.api_group, &defaults.api_group),
        ("user_host", &mut config.portal.user_host, &defaults.user_host),
        ("bill_host", &mut config.portal.bill_host, &defaults.bill_host),
        (
            "product_host",
            &mut config.portal.product_host,
            &defaults.product_host,
        ),
        (
            "kos_mock_host",
            &mut config.portal.kos_mock_host,
            &defaults.kos_mock_host,
        ),
    ];
    for (name, value, default) in fields {
        if value.trim().is_empty() {
            warnings.push(format!(
                "Config field '{}' is empty. Resetting to '{}'.",
                name, default
            ));
            *value = default.to_string();
        } else {
            let trimmed = value.trim().trim_end_matches('/').to_string();
            *value = trimmed;
        }
    }

    (config, warnings)
}

fn apply_env_overrides(portal: &mut PortalConfig, env: &dyn Fn(&str) -> Option<String>) {
    let overrides: [(&str, &mut String); 5] = [
        ("TELCARE_API_GROUP", &mut portal.api_group),
        ("TELCARE_USER_HOST", &mut portal.user_host),
        ("TELCARE_BILL_HOST", &mut portal.bill_host),
        ("TELCARE_PRODUCT_HOST", &mut portal.product_host),
        ("TELCARE_KOS_MOCK_HOST", &mut portal.kos_mock_host),
    ];
    for (name, value) in overrides {
        if let Some(raw) = env(name) {
            let trimmed = raw.trim().trim_end_matches('/');
            if !trimmed.is_empty() {
                *value = trimmed.to_string();
            }
        }
    }
}
