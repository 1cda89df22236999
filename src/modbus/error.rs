// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error types for the register store, codec and server lifecycle

use thiserror::Error;
use tokio_modbus::ExceptionCode;

/// Errors raised by the simulator core
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Modbus server is already running")]
    AlreadyRunning,

    #[error("Invalid point configuration: {0}")]
    InvalidConfig(String),

    #[error("Illegal data address: register {address} is not served")]
    IllegalDataAddress { address: u16 },

    #[error("Illegal data value: {0}")]
    IllegalDataValue(String),

    #[error("Point '{0}' not found")]
    PointNotFound(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Point exchange format error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimulatorError {
    /// Modbus exception reported to the client for this error.
    ///
    /// Only protocol-level errors have a dedicated exception; anything else
    /// surfacing during a request is reported as a device failure.
    pub fn exception_code(&self) -> ExceptionCode {
        match self {
            SimulatorError::IllegalDataAddress { .. } => ExceptionCode::IllegalDataAddress,
            SimulatorError::IllegalDataValue(_) => ExceptionCode::IllegalDataValue,
            _ => ExceptionCode::ServerDeviceFailure,
        }
    }
}

/// Result alias used across the `modbus` module
pub type Result<T> = std::result::Result<T, SimulatorError>;
