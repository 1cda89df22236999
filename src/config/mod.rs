// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the Modbus slave simulator
//!
//! This module loads, validates and applies the daemon configuration. The
//! configuration is backed by a YAML file and validated against an embedded
//! JSON schema before it is deserialized.
//!
//! ## Configuration Structure
//!
//! - `modbus`: Modbus TCP listener settings
//! - `management`: HTTP management API settings
//! - `points_file`: optional JSON point list imported at startup
//!
//! ## Usage
//!
//! ```no_run
//! use rust_modbus_slave::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some(8081),                  // Web port
//!     None,                        // Web address
//!     Some(true),                  // Enable Modbus
//!     Some("0.0.0.0".to_string()), // Modbus address
//!     Some(5020),                  // Modbus port
//!     None,                        // Points file
//! );
//!
//! println!("Modbus port: {}", config.modbus.port);
//! ```

pub mod management;
pub mod modbus;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use management::ManagementConfig;
pub use modbus::ModbusConfig;
pub use utils::{is_valid_ip_address, output_config_schema};

pub(crate) const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Root configuration of the simulator daemon.
///
/// Every section falls back to its defaults when missing from the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Modbus TCP listener settings
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// HTTP management API settings
    #[serde(default)]
    pub management: ManagementConfig,

    /// JSON point list imported when the daemon starts.
    ///
    /// Relative paths are resolved from the working directory.
    #[serde(default)]
    pub points_file: Option<String>,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// A missing file is created with the default configuration. When the
    /// file is invalid, a `<name>.sample.yaml` file with defaults is written
    /// next to it and an error is returned.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        match Self::from_yaml(&contents) {
            Ok(config) => Ok(config),
            Err(err) => {
                error!("Invalid configuration in {}: {:#}", path.display(), err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                Err(err.context(format!("Invalid configuration file {}", path.display())))
            }
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let yaml_value: serde_yml::Value =
            serde_yml::from_str(contents).context("Failed to parse YAML configuration")?;

        // An empty document is an empty mapping
        let json_value = match serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?
        {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            value => value,
        };

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating configuration against schema");
        if let Err(error) = validator.validate(&json_value) {
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        let config: Config = serde_json::from_value(json_value)
            .context("Failed to deserialize configuration")?;

        utils::validate_specific_rules(&config)?;
        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only arguments that were given override the loaded configuration.
    ///
    /// # Parameters
    ///
    /// * `web_port` - TCP port for the management API
    /// * `web_address` - Network address for the management API to bind to
    /// * `modbus_enabled` - Optional flag to enable/disable the Modbus server
    /// * `modbus_address` - Optional network address for the Modbus server
    /// * `modbus_port` - Optional TCP port for the Modbus server
    /// * `points_file` - Optional point list imported at startup
    pub fn apply_args(
        &mut self,
        web_port: Option<u16>,
        web_address: Option<String>,
        modbus_enabled: Option<bool>,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
        points_file: Option<PathBuf>,
    ) {
        if let Some(web_port) = web_port {
            debug!("Overriding management port from command line: {}", web_port);
            self.management.port = web_port;
        }
        if let Some(web_address) = web_address {
            debug!(
                "Overriding management address from command line: {}",
                web_address
            );
            self.management.address = web_address;
        }

        if let Some(enabled) = modbus_enabled {
            debug!("Overriding Modbus enabled from command line: {}", enabled);
            self.modbus.enabled = enabled;
        }
        if let Some(port) = modbus_port {
            debug!("Overriding Modbus port from command line: {}", port);
            self.modbus.port = port;
        }
        if let Some(address) = modbus_address {
            debug!("Overriding Modbus address from command line: {}", address);
            self.modbus.address = address;
        }

        if let Some(file) = points_file {
            debug!("Overriding points file from command line: {:?}", file);
            self.points_file = Some(file.to_string_lossy().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.modbus.port, 502);
        assert_eq!(config.modbus.max_clients, 10);
        assert_eq!(config.management.address, "127.0.0.1");
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_yaml("modbus:\n  port: 5020\npoints_file: points.json\n").unwrap();
        assert_eq!(config.modbus.port, 5020);
        assert!(config.modbus.enabled);
        assert_eq!(config.points_file.as_deref(), Some("points.json"));
    }

    #[test]
    fn test_schema_rejects_unknown_keys() {
        assert!(Config::from_yaml("modbus:\n  baud_rate: 9600\n").is_err());
        assert!(Config::from_yaml("modbus:\n  port: 0\n").is_err());
        assert!(Config::from_yaml("management:\n  port: \"http\"\n").is_err());
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(
            Some(9000),
            None,
            Some(false),
            Some("127.0.0.1".to_string()),
            None,
            Some(PathBuf::from("p.json")),
        );
        assert_eq!(config.management.port, 9000);
        assert_eq!(config.management.address, "127.0.0.1");
        assert!(!config.modbus.enabled);
        assert_eq!(config.modbus.address, "127.0.0.1");
        assert_eq!(config.modbus.port, 502);
        assert_eq!(config.points_file.as_deref(), Some("p.json"));
    }
}
