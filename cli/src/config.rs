//! Operator configuration: an optional `config.toml`, then `RELAY_BETA_*`
//! environment overrides, then validation.
//!
//! ```toml
//! signing_key = "…64 hex chars…"
//! public_key = "…64 hex chars…"
//! max_beta_users = 100
//! validity_days = 7
//! cohort = "beta-jan-2026"
//! max_activations = 2
//! database = "/var/lib/relay-beta/beta.db"
//! ```

use std::path::{Path, PathBuf};

use relay_beta_issuance::{
    DEFAULT_COHORT, DEFAULT_MAX_BETA_USERS, DEFAULT_VALIDITY_DAYS, IssuanceSettings,
};
use relay_beta_ledger::DEFAULT_MAX_ACTIVATIONS;
use relay_beta_license::{LicenseError, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub const ENV_SIGNING_KEY: &str = "RELAY_BETA_SIGNING_KEY";
pub const ENV_PUBLIC_KEY: &str = "RELAY_BETA_PUBLIC_KEY";
pub const ENV_MAX_USERS: &str = "RELAY_BETA_MAX_USERS";
pub const ENV_DAYS: &str = "RELAY_BETA_DAYS";
pub const ENV_COHORT: &str = "RELAY_BETA_COHORT";
pub const ENV_MAX_ACTIVATIONS: &str = "RELAY_BETA_MAX_ACTIVATIONS";
pub const ENV_DB: &str = "RELAY_BETA_DB";

const APP_DIR: &str = "relay-beta";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{name} is not a valid number: {value:?}")]
    NotANumber { name: &'static str, value: String },

    #[error("{0} must be positive")]
    NotPositive(&'static str),

    #[error("{name} is invalid: {source}")]
    Key {
        name: &'static str,
        source: LicenseError,
    },

    #[error("no public key configured (set {ENV_PUBLIC_KEY} or {ENV_SIGNING_KEY})")]
    MissingPublicKey,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Resolved operator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BetaConfig {
    /// Hex Ed25519 seed. Required only for issuance.
    pub signing_key: Option<String>,
    /// Hex Ed25519 public key. Derived from the signing key when absent.
    pub public_key: Option<String>,
    pub max_beta_users: u64,
    pub validity_days: u32,
    pub cohort: String,
    pub max_activations: u32,
    /// SQLite database holding issued tokens and activations.
    pub database: Option<PathBuf>,
}

impl Default for BetaConfig {
    fn default() -> Self {
        Self {
            signing_key: None,
            public_key: None,
            max_beta_users: DEFAULT_MAX_BETA_USERS,
            validity_days: DEFAULT_VALIDITY_DAYS,
            cohort: DEFAULT_COHORT.to_string(),
            max_activations: DEFAULT_MAX_ACTIVATIONS,
            database: None,
        }
    }
}

impl BetaConfig {
    /// Loads configuration from `path` (or the default config file if it
    /// exists), applies process environment overrides, and validates.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = default_config_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    debug!("No config file at {:?}, using defaults", default);
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a config file. Fields it omits keep their defaults.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Overrides fields from `RELAY_BETA_*` variables resolved by `lookup`.
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_SIGNING_KEY) {
            self.signing_key = Some(v);
        }
        if let Some(v) = get(ENV_PUBLIC_KEY) {
            self.public_key = Some(v);
        }
        if let Some(v) = get(ENV_MAX_USERS) {
            self.max_beta_users = parse_number(ENV_MAX_USERS, &v)?;
        }
        if let Some(v) = get(ENV_DAYS) {
            self.validity_days = parse_number(ENV_DAYS, &v)?;
        }
        if let Some(v) = get(ENV_COHORT) {
            self.cohort = v;
        }
        if let Some(v) = get(ENV_MAX_ACTIVATIONS) {
            self.max_activations = parse_number(ENV_MAX_ACTIVATIONS, &v)?;
        }
        if let Some(v) = get(ENV_DB) {
            self.database = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Rejects zero counts and unparseable keys.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_beta_users == 0 {
            return Err(ConfigError::NotPositive("max_beta_users"));
        }
        if self.validity_days == 0 {
            return Err(ConfigError::NotPositive("validity_days"));
        }
        if self.max_activations == 0 {
            return Err(ConfigError::NotPositive("max_activations"));
        }
        self.signing_key()?;
        if self.public_key.is_some() {
            self.verifying_key()?;
        }
        Ok(())
    }

    pub fn signing_key(&self) -> ConfigResult<Option<SigningKey>> {
        self.signing_key
            .as_deref()
            .map(|hex| {
                SigningKey::from_hex(hex.trim()).map_err(|source| ConfigError::Key {
                    name: "signing_key",
                    source,
                })
            })
            .transpose()
    }

    /// The verification key, falling back to the public half of the signing
    /// key.
    pub fn verifying_key(&self) -> ConfigResult<VerifyingKey> {
        if let Some(hex) = self.public_key.as_deref() {
            return VerifyingKey::from_hex(hex.trim()).map_err(|source| ConfigError::Key {
                name: "public_key",
                source,
            });
        }
        self.signing_key()?
            .map(|key| key.verifying_key())
            .ok_or(ConfigError::MissingPublicKey)
    }

    pub fn issuance_settings(&self) -> IssuanceSettings {
        IssuanceSettings {
            validity_days: self.validity_days,
            cohort: self.cohort.clone(),
            max_beta_users: self.max_beta_users,
        }
    }

    /// The configured database, or `beta.db` under the user data directory.
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(default_database_path)
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::NotANumber {
        name,
        value: value.to_string(),
    })
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("beta.db")
}
