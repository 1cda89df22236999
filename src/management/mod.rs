// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HTTP management API
//!
//! A Rocket application exposing the simulator operations under `/api`:
//! server start/stop, point configuration, import/export and value access.
//! Failures are reported as JSON bodies of the form
//! `{"error": "point_not_found", "message": "..."}`.

pub mod api;
pub mod server;

pub use server::{build_rocket, management_figment};
