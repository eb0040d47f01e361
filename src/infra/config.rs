//! Configuration management infrastructure.
//!
//! This module provides configuration file support: the trusted Apple public
//! keys used to build the [`TrustTable`] and output preferences for the CLI.

use crate::domain::constants::{RSA_DEFAULT_EXPONENT, RSA_KEY_SIZE};
use crate::domain::crypto::{TrustTable, TrustedKey};
use crate::infra::error::{VerifyError, VerifyResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Byte order of a configured modulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyByteOrder {
    /// As stored inside signed images
    #[default]
    Le,
    /// As printed by OpenSSL and most PEM tooling
    Be,
}

/// One trusted key entry of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedKeyConfig {
    /// Display name reported on successful verification
    pub name: String,

    /// Hex-encoded 2048-bit modulus
    pub modulus: String,

    #[serde(default)]
    pub byte_order: KeyByteOrder,

    #[serde(default = "default_exponent")]
    pub exponent: u32,
}

fn default_exponent() -> u32 {
    RSA_DEFAULT_EXPONENT
}

impl TrustedKeyConfig {
    /// Read a raw 256-byte little-endian modulus, as embedded in signed images.
    pub fn from_key_file<P: AsRef<Path>>(name: impl Into<String>, path: P) -> VerifyResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            VerifyError::IoError(format!("Failed to read key file {}: {e}", path.display()))
        })?;
        if bytes.len() != RSA_KEY_SIZE {
            return Err(VerifyError::ConfigurationError(format!(
                "Key file {} holds {} bytes, expected a raw {RSA_KEY_SIZE}-byte modulus",
                path.display(),
                bytes.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            modulus: hex::encode(bytes),
            byte_order: KeyByteOrder::Le,
            exponent: RSA_DEFAULT_EXPONENT,
        })
    }

    /// Decode and validate into a trust table entry.
    pub fn to_trusted_key(&self) -> VerifyResult<TrustedKey> {
        let modulus = hex::decode(self.modulus.trim()).map_err(|e| {
            VerifyError::ConfigurationError(format!(
                "Trusted key '{}' has an invalid hex modulus: {e}",
                self.name
            ))
        })?;
        match self.byte_order {
            KeyByteOrder::Le => TrustedKey::from_le_modulus(&self.name, &modulus, self.exponent),
            KeyByteOrder::Be => TrustedKey::from_be_modulus(&self.name, &modulus, self.exponent),
        }
        .map_err(|e| VerifyError::ConfigurationError(format!("Trusted key '{}': {e}", self.name)))
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifierConfiguration {
    /// Keys accepted as signers of EFI images
    #[serde(default)]
    pub trusted_keys: Vec<TrustedKeyConfig>,

    /// Whether to show verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Whether to print per-image digests after verification
    #[serde(default)]
    pub show_digests: bool,
}

impl VerifierConfiguration {
    /// Build the trust table from the configured keys, in file order.
    pub fn to_trust_table(&self) -> VerifyResult<TrustTable> {
        let keys = self
            .trusted_keys
            .iter()
            .map(TrustedKeyConfig::to_trusted_key)
            .collect::<VerifyResult<Vec<_>>>()?;
        Ok(TrustTable::new(keys))
    }

    /// Default `env_logger` filter: `debug` when either the command line or
    /// the configuration asks for verbose output.
    #[must_use]
    pub fn log_filter(&self, verbose_flag: bool) -> &'static str {
        if verbose_flag || self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> VerifyResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> VerifyResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("apple-efi-verifier").join("config.toml"))
        } else {
            Ok(PathBuf::from("apple-efi-verifier-config.toml"))
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> VerifyResult<VerifierConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = VerifierConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from file, or the default if there is none
    pub fn load_or_default(&self) -> VerifyResult<VerifierConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::debug!("No configuration at {}", self.config_path.display());
            Ok(VerifierConfiguration::default())
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> VerifyResult<VerifierConfiguration> {
        log::debug!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            VerifyError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: VerifierConfiguration = toml::from_str(&content).map_err(|e| {
            VerifyError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &VerifierConfiguration) -> VerifyResult<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                VerifyError::ConfigurationError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            VerifyError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            VerifyError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        log::info!("Configuration saved successfully");
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(config: &VerifierConfiguration) -> VerifyResult<()> {
        for (index, key) in config.trusted_keys.iter().enumerate() {
            if key.name.trim().is_empty() {
                return Err(VerifyError::ConfigurationError(format!(
                    "Trusted key #{index} has an empty name"
                )));
            }
            key.to_trusted_key()?;
        }
        Ok(())
    }

    /// Append a trusted key and save
    pub fn add_key(&self, key: TrustedKeyConfig) -> VerifyResult<()> {
        key.to_trusted_key()?;
        let mut config = self.load_or_default()?;
        if config.trusted_keys.iter().any(|k| k.name == key.name) {
            return Err(VerifyError::ConfigurationError(format!(
                "Trusted key '{}' already exists",
                key.name
            )));
        }
        config.trusted_keys.push(key);
        self.save(&config)
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> VerifyResult<()> {
        let mut config = self.load_or_default()?;
        let flag: bool = value.parse().map_err(|_| {
            VerifyError::ConfigurationError(format!("Invalid boolean value: {value}"))
        })?;

        match key {
            "verbose" => config.verbose = flag,
            "show_digests" => config.show_digests = flag,
            _ => {
                return Err(VerifyError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        self.save(&config)
    }

    /// Whether a configuration file is present
    #[must_use]
    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
