// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP slave simulation
//!
//! This module provides a simulated Modbus TCP slave whose address space is
//! configured at runtime through named points.
//!
//! ## Key Components
//!
//! - [`RegisterStore`]: points and raw registers behind a single lock
//! - [`ModbusRequestHandler`]: `tokio_modbus` service answering client requests
//! - [`ModbusSlaveServer`]: listener lifecycle and connection limit
//! - [`codec`]: conversion between register words and application values
//! - [`exchange`]: JSON import and export of point lists
//!
//! ## Address space
//!
//! Coils, discrete inputs, holding registers and input registers are views of
//! one 16-bit register map. A coil is `true` when its register is nonzero and
//! is written as `0xFF00` or `0x0000`. Only addresses covered by an enabled
//! point are served; any other address yields `IllegalDataAddress`.
//!
//! ## Usage
//!
//! ```no_run
//! use rust_modbus_slave::modbus::{ModbusSlaveServer, Point, PointValue, RegisterStore, ValueType};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let server = ModbusSlaveServer::new(RegisterStore::shared());
//! let point = Point::new("pressure", 100, 2, ValueType::Float32).with_scaling(0.1, 0.0);
//! server.store().set_point(point)?;
//! server.store().write_value("pressure", &PointValue::Number(1013.2))?;
//! server.start(502).await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod exchange;
pub mod handler;
pub mod modbus_server;
pub mod point;
pub mod register_bank;
pub mod store;

pub use codec::PointValue;
pub use error::SimulatorError;
pub use handler::ModbusRequestHandler;
pub use modbus_server::ModbusSlaveServer;
pub use point::{ByteOrder, Point, ValueType};
pub use register_bank::RegisterBank;
pub use store::{RegisterStore, SharedRegisterStore};
