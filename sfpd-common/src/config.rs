//! Configuration loading and data folder resolution
//!
//! Values resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing default config file is not an error: the ETL logs a warning and
//! runs on compiled defaults. An explicitly requested file must exist.

use crate::template::MissingVariablePolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_DATA_DIR: &str = "SFPD_DATA_DIR";
pub const ENV_WAREHOUSE_URL: &str = "SFPD_WAREHOUSE_URL";
pub const ENV_WAREHOUSE_USER: &str = "GD_GEM_USER";
pub const ENV_WAREHOUSE_PASSWORD: &str = "GD_GEM_PASSWORD";

pub const DEFAULT_BULK_URL: &str =
    "http://apps.sfgov.org/datafiles/view.php?file=Police/sfpd_incident_all_csv.zip";
pub const DEFAULT_LATEST_URL: &str =
    "http://apps.sfgov.org/datafiles/view.php?file=Police/incident_changes_from_previous_day.json";
pub const DEFAULT_GEOCODER_URL: &str = "http://www.datasciencetoolkit.org";
pub const DEFAULT_INSTANCE_ID: &str = "w9c4aec5c9944ac5789e8bcc7b352b23";
pub const DEFAULT_WAREHOUSE_HOST: &str = "secure.gooddata.com";

const CACHE_FILE: &str = "data.db";
const ARCHIVE_FILE: &str = "data.zip";
const IMPORT_FILE: &str = "locations_filtered_condensed.csv";
const EXTRACT_DIR: &str = "incidents";

/// Full ETL configuration as read from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EtlConfig {
    /// Working directory for the archive, extracted CSVs and the cache
    pub data_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub feed: FeedConfig,
    pub geocoder: GeocoderConfig,
    pub warehouse: WarehouseConfig,
    pub templates: TemplateConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    pub bulk_url: String,
    pub latest_url: String,
    /// Coordinate mapping CSV for `import`; defaults to a file in the data dir
    pub import_csv: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            bulk_url: DEFAULT_BULK_URL.to_string(),
            latest_url: DEFAULT_LATEST_URL.to_string(),
            import_csv: None,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Minimum spacing between requests; 0 disables pacing
    pub min_interval_ms: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEOCODER_URL.to_string(),
            timeout_secs: 30,
            min_interval_ms: 0,
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Full connection URL; overrides the host/instance default
    pub url: Option<String>,
    pub instance_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub locations_table: String,
    pub sfpd_table: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            url: None,
            instance_id: DEFAULT_INSTANCE_ID.to_string(),
            username: None,
            password: None,
            locations_table: "locations_tmp".to_string(),
            sfpd_table: "sfpd_tmp".to_string(),
        }
    }
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("url", &self.url)
            .field("instance_id", &self.instance_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("locations_table", &self.locations_table)
            .field("sfpd_table", &self.sfpd_table)
            .finish()
    }
}

/// Validated warehouse login
#[derive(Clone, PartialEq, Eq)]
pub struct WarehouseCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for WarehouseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl WarehouseConfig {
    /// Connection URL without credentials
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("postgres://{}/{}", DEFAULT_WAREHOUSE_HOST, self.instance_id),
        }
    }

    /// Validate that both username and password are present and non-empty
    pub fn credentials(&self) -> Result<WarehouseCredentials> {
        let username = non_empty(self.username.as_deref()).ok_or_else(|| {
            Error::Config(format!(
                "Warehouse username not configured (set {} or [warehouse] username)",
                ENV_WAREHOUSE_USER
            ))
        })?;
        let password = non_empty(self.password.as_deref()).ok_or_else(|| {
            Error::Config(format!(
                "Warehouse password not configured (set {} or [warehouse] password)",
                ENV_WAREHOUSE_PASSWORD
            ))
        })?;

        Ok(WarehouseCredentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Directory holding the `.sql` templates; None uses the shipped set
    pub sql_dir: Option<PathBuf>,
    pub missing_variable: MissingVariablePolicy,
}

impl EtlConfig {
    /// Resolve configuration from all tiers
    ///
    /// `config_path` and `data_dir` are the command-line overrides.
    pub fn resolve(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let mut config = Self::load(config_path)?;
        config.apply_env();

        if let Some(dir) = data_dir {
            config.data_dir = Some(dir.to_path_buf());
        }

        Ok(config)
    }

    /// Load the TOML tier only
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)
            }
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                Some(path) => {
                    warn!(
                        "No config file at {}, using compiled defaults",
                        path.display()
                    );
                    Ok(Self::default())
                }
                None => {
                    warn!("Could not determine config directory, using compiled defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Overlay environment variables on top of the TOML values
    pub fn apply_env(&mut self) {
        if let Some(dir) = env_value(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = env_value(ENV_WAREHOUSE_URL) {
            self.warehouse.url = Some(url);
        }
        if let Some(user) = env_value(ENV_WAREHOUSE_USER) {
            self.warehouse.username = Some(user);
        }
        if let Some(password) = env_value(ENV_WAREHOUSE_PASSWORD) {
            self.warehouse.password = Some(password);
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir().join(CACHE_FILE)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.data_dir().join(ARCHIVE_FILE)
    }

    /// Where the bulk archive is unpacked and scanned for CSV files
    pub fn extract_dir(&self) -> PathBuf {
        self.data_dir().join(EXTRACT_DIR)
    }

    pub fn import_csv_path(&self) -> PathBuf {
        self.feed
            .import_csv
            .clone()
            .unwrap_or_else(|| self.data_dir().join(IMPORT_FILE))
    }

    /// Create the data directory if it does not exist yet
    pub fn ensure_data_dir(&self) -> Result<PathBuf> {
        let dir = self.data_dir();
        if !dir.exists() {
            info!("Creating data directory {}", dir.display());
            std::fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }
}

/// Default config file location: `<config_dir>/sfpd-etl/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sfpd-etl").join("config.toml"))
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sfpd-etl"))
        .unwrap_or_else(|| PathBuf::from("./data/sfpd"))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
