// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust Modbus slave simulator
//!
//! A Modbus TCP slave whose register map is described by named points and
//! edited at runtime through an HTTP management API.

pub mod config;
pub mod daemon;
pub mod management;
pub mod modbus;
