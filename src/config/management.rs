// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HTTP management API configuration

use serde::{Deserialize, Serialize};

/// Settings of the management web server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementConfig {
    pub enabled: bool,

    /// The network address the API binds to, loopback by default
    pub address: String,

    pub port: u16,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
