// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP server configuration

use serde::{Deserialize, Serialize};

use crate::modbus::modbus_server::DEFAULT_MAX_CLIENTS;

/// Configuration for the simulated Modbus TCP slave.
///
/// # Example
///
/// ```
/// use rust_modbus_slave::config::ModbusConfig;
///
/// let modbus_config = ModbusConfig {
///     enabled: true,
///     port: 5020,
///     address: "127.0.0.1".to_string(),
///     max_clients: 4,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    /// Start the Modbus server when the daemon launches
    pub enabled: bool,

    /// The TCP port the Modbus server will listen on.
    ///
    /// Default value is 502, which is the standard Modbus TCP port.
    pub port: u16,

    /// The network address the Modbus server will bind to.
    ///
    /// Default is "0.0.0.0", all IPv4 interfaces.
    pub address: String,

    /// Maximum number of clients served at the same time
    pub max_clients: usize,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 502,
            address: "0.0.0.0".to_string(),
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }
}
