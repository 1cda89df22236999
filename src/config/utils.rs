// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! Schema output and the validation rules the JSON schema cannot express.

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};

use super::{Config, CONFIG_SCHEMA};

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_modbus_slave --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
///
/// # Arguments
///
/// * `addr` - The address string to validate
///
/// # Returns
///
/// `true` if the address is valid, `false` otherwise
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Bind addresses**: both listeners need an IP address or `localhost`
/// - **Port clash**: the Modbus server and the management API cannot share a port
///   on the same address
/// - **Points file**: a missing file only produces a warning, the daemon then
///   starts with an empty store
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if !is_valid_ip_address(&config.modbus.address) {
        anyhow::bail!("Invalid Modbus address: {}", config.modbus.address);
    }
    if !is_valid_ip_address(&config.management.address) {
        anyhow::bail!(
            "Invalid management API address: {}",
            config.management.address
        );
    }

    if config.modbus.enabled
        && config.management.enabled
        && config.modbus.port == config.management.port
        && (config.modbus.address == config.management.address
            || config.modbus.address == "0.0.0.0"
            || config.management.address == "0.0.0.0")
    {
        anyhow::bail!(
            "Modbus server and management API both use port {}",
            config.modbus.port
        );
    }

    if config.modbus.max_clients == 0 {
        anyhow::bail!("max_clients must be at least 1");
    }

    if let Some(points_file) = &config.points_file {
        if !Path::new(points_file).exists() {
            warn!("Points file {} does not exist", points_file);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_addresses() {
        assert!(is_valid_ip_address("192.168.1.10"));
        assert!(is_valid_ip_address("::1"));
        assert!(is_valid_ip_address("localhost"));
        assert!(!is_valid_ip_address("plc.local"));
    }

    #[test]
    fn test_port_clash() {
        let mut config = Config::default();
        config.management.port = config.modbus.port;
        assert!(validate_specific_rules(&config).is_err());

        config.modbus.enabled = false;
        assert!(validate_specific_rules(&config).is_ok());
    }

    #[test]
    fn test_invalid_address() {
        let mut config = Config::default();
        config.modbus.address = "not an address".to_string();
        assert!(validate_specific_rules(&config).is_err());
    }
}
