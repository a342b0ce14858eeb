use routines_shared::auth::Role;
use serde::Deserialize;
use std::{env, fs, path::Path};

pub const DEFAULT_LISTEN_PORT: u16 = 5151;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub dev_cors_origin: Option<String>,
    pub listen_port: Option<u16>,
    /// Lets anyone create a new family through `/api/v1/auth/signup`.
    #[serde(default)]
    pub allow_signup: bool,
    /// IANA zone for families created without one.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub predefined_tasks: Vec<PredefinedTaskSeed>,
    #[serde(default)]
    pub families: Vec<FamilySeed>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Days after today that background expansion keeps materialized.
    pub horizon_days: u32,
    pub miss_grace_minutes: i64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            horizon_days: 7,
            miss_grace_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FamilySeed {
    pub id: String,
    pub name: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub accounts: Vec<AccountSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountSeed {
    pub username: String,
    pub password_hash: String, // bcrypt hash
    pub role: Role,
    /// Guardian accounts get a linked member row with this name.
    pub member_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredefinedTaskSeed {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_points")]
    pub default_points: i32,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_points() -> i32 {
    10
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        let cfg: AppConfig = serde_yaml::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("jwt_secret must not be empty".into()));
        }
        if self.jobs.interval_secs == 0 {
            return Err(ConfigError::Invalid("jobs.interval_secs must be positive".into()));
        }
        // The expansion window spans today plus `horizon_days`.
        let max_horizon = crate::engine::expand::MAX_WINDOW_DAYS - 1;
        if i64::from(self.jobs.horizon_days) > max_horizon {
            return Err(ConfigError::Invalid(format!(
                "jobs.horizon_days must be at most {max_horizon}"
            )));
        }
        if self.jobs.miss_grace_minutes < 0 {
            return Err(ConfigError::Invalid(
                "jobs.miss_grace_minutes must not be negative".into(),
            ));
        }
        let zones = std::iter::once(&self.default_timezone)
            .chain(self.families.iter().map(|f| &f.timezone));
        for tz in zones {
            if crate::engine::clock::parse_timezone(tz).is_none() {
                return Err(ConfigError::Invalid(format!("unknown time zone: {tz}")));
            }
        }
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.listen_port.unwrap_or(DEFAULT_LISTEN_PORT)
    }
}
