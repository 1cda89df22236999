// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Point list exchange format
//!
//! Point lists are stored as a pretty-printed JSON array of [`Point`]
//! records. Raw register values travel as base64 strings of `width * 2`
//! bytes, most significant byte first in every register.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, TimeZone};
use log::{debug, info};

use super::error::{Result, SimulatorError};
use super::point::Point;
use super::store::RegisterStore;

/// Parse a JSON point list
pub fn points_from_json(json: &str) -> Result<Vec<Point>> {
    Ok(serde_json::from_str(json)?)
}

/// Serialize a point list as pretty JSON
pub fn points_to_json(points: &[Point]) -> Result<String> {
    Ok(serde_json::to_string_pretty(points)?)
}

/// Read a point list from `path`
pub fn load_points(path: impl AsRef<Path>) -> Result<Vec<Point>> {
    let path = path.as_ref();
    debug!("Loading points from {}", path.display());
    let json = fs::read_to_string(path)?;
    points_from_json(&json)
}

/// Write a point list to `path`, replacing any existing file
pub fn save_points(path: impl AsRef<Path>, points: &[Point]) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, points_to_json(points)?)?;
    info!("Saved {} points to {}", points.len(), path.display());
    Ok(())
}

/// Replace the points of `store` with the list stored at `path`.
///
/// The store is left untouched if the file cannot be read or any point is
/// invalid.
pub fn import_file(store: &RegisterStore, path: impl AsRef<Path>) -> Result<usize> {
    let points = load_points(path)?;
    store.import_points(points)
}

/// Write every point of `store` to `path`
pub fn export_file(store: &RegisterStore, path: impl AsRef<Path>) -> Result<usize> {
    let points = store.list_points();
    save_points(path, &points)?;
    Ok(points.len())
}

/// Default file name for an export taken at `now`
pub fn export_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("modbus_points_{}.json", now.format("%Y%m%d_%H%M%S"))
}

/// Encode raw value bytes for transport
pub fn encode_raw_value(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a base64 raw value
pub fn decode_raw_value(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| SimulatorError::InvalidValue(format!("invalid base64 value: {e}")))
}
