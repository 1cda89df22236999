// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Conversion between register words and typed point values
//!
//! Registers are packed MSB first: each word becomes two bytes, high byte
//! first. The point's [`ByteOrder`](super::point::ByteOrder) then maps those
//! wire bytes to the canonical big-endian representation of the value.
//!
//! Numeric values are scaled with `application = raw * scale + offset`.
//! Encoding inverts the transform and rounds to the nearest integer for
//! integer value types.
//!
//! | Value type | Registers | Raw representation |
//! |------------|-----------|--------------------|
//! | bool       | 1         | `0xFF00` / `0x0000` in the point's byte order, any nonzero word decodes as `true` |
//! | uint16     | 1         | unsigned 16-bit |
//! | int16      | 1         | two's complement 16-bit |
//! | uint32     | 2         | unsigned 32-bit |
//! | int32      | 2         | two's complement 32-bit |
//! | float32    | 2         | IEEE-754 single |
//! | float64    | 4         | IEEE-754 double |
//! | binary     | width     | raw bytes, no scaling |

use serde::{Deserialize, Serialize};

use super::error::{Result, SimulatorError};
use super::point::{Point, ValueType};

/// Register word written for a `true` coil
pub const COIL_ON: u16 = 0xFF00;
/// Register word written for a `false` coil
pub const COIL_OFF: u16 = 0x0000;

/// Typed application value of a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    Bool(bool),
    Number(f64),
    Binary(Vec<u8>),
}

/// Split words into bytes, high byte first
pub fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Pack bytes into exactly `width` words, high byte first.
///
/// Missing bytes are zero; bytes beyond `width * 2` are ignored.
pub fn bytes_to_words(bytes: &[u8], width: usize) -> Vec<u16> {
    (0..width)
        .map(|i| {
            let high = bytes.get(i * 2).copied().unwrap_or(0);
            let low = bytes.get(i * 2 + 1).copied().unwrap_or(0);
            u16::from_be_bytes([high, low])
        })
        .collect()
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Interpret canonical big-endian bytes as the raw numeric value
fn raw_from_be(value_type: ValueType, bytes: &[u8]) -> f64 {
    match value_type {
        ValueType::Uint16 => f64::from(u16::from_be_bytes(array(bytes))),
        ValueType::Int16 => f64::from(i16::from_be_bytes(array(bytes))),
        ValueType::Uint32 => f64::from(u32::from_be_bytes(array(bytes))),
        ValueType::Int32 => f64::from(i32::from_be_bytes(array(bytes))),
        ValueType::Float32 => f64::from(f32::from_be_bytes(array(bytes))),
        ValueType::Float64 => f64::from_be_bytes(array(bytes)),
        ValueType::Bool | ValueType::Binary => 0.0,
    }
}

fn rounded_in_range(raw: f64, min: f64, max: f64, value_type: ValueType) -> Result<f64> {
    let rounded = raw.round();
    if rounded < min || rounded > max {
        return Err(SimulatorError::InvalidValue(format!(
            "raw value {raw} does not fit {value_type:?}"
        )));
    }
    Ok(rounded)
}

/// Canonical big-endian bytes of a raw numeric value
fn raw_to_be(value_type: ValueType, raw: f64) -> Result<Vec<u8>> {
    let bytes = match value_type {
        ValueType::Uint16 => {
            let r = rounded_in_range(raw, 0.0, f64::from(u16::MAX), value_type)?;
            (r as u16).to_be_bytes().to_vec()
        }
        ValueType::Int16 => {
            let r = rounded_in_range(raw, f64::from(i16::MIN), f64::from(i16::MAX), value_type)?;
            (r as i16).to_be_bytes().to_vec()
        }
        ValueType::Uint32 => {
            let r = rounded_in_range(raw, 0.0, f64::from(u32::MAX), value_type)?;
            (r as u32).to_be_bytes().to_vec()
        }
        ValueType::Int32 => {
            let r = rounded_in_range(raw, f64::from(i32::MIN), f64::from(i32::MAX), value_type)?;
            (r as i32).to_be_bytes().to_vec()
        }
        ValueType::Float32 => {
            let f = raw as f32;
            if !f.is_finite() {
                return Err(SimulatorError::InvalidValue(format!(
                    "raw value {raw} overflows float32"
                )));
            }
            f.to_be_bytes().to_vec()
        }
        ValueType::Float64 => {
            if !raw.is_finite() {
                return Err(SimulatorError::InvalidValue(format!(
                    "raw value {raw} overflows float64"
                )));
            }
            raw.to_be_bytes().to_vec()
        }
        ValueType::Bool | ValueType::Binary => {
            return Err(SimulatorError::InvalidValue(format!(
                "{value_type:?} is not a numeric type"
            )))
        }
    };
    Ok(bytes)
}

/// Decode the typed application value of `point` from its register words.
///
/// `words` must hold at least `point.width` registers, starting at the
/// point's first address.
pub fn decode(point: &Point, words: &[u16]) -> Result<PointValue> {
    let width = usize::from(point.width);
    if words.len() < width {
        return Err(SimulatorError::InvalidValue(format!(
            "point '{}' needs {} registers, got {}",
            point.id,
            width,
            words.len()
        )));
    }

    match point.value_type {
        ValueType::Bool => Ok(PointValue::Bool(words.first().is_some_and(|w| *w != 0))),
        ValueType::Binary => Ok(PointValue::Binary(words_to_bytes(&words[..width]))),
        value_type => {
            let count = usize::from(value_type.register_count());
            let mut bytes = words_to_bytes(&words[..count]);
            point.byte_order.reorder(&mut bytes);
            let raw = raw_from_be(value_type, &bytes);
            Ok(PointValue::Number(raw * point.scale + point.offset))
        }
    }
}

/// Encode `value` into exactly `point.width` register words.
///
/// Registers after the value's own registers are zero.
pub fn encode(point: &Point, value: &PointValue) -> Result<Vec<u16>> {
    let width = usize::from(point.width);

    match (point.value_type, value) {
        (ValueType::Bool, PointValue::Bool(on)) => {
            let mut words = vec![0; width];
            if let Some(first) = words.first_mut() {
                let mut bytes = (if *on { COIL_ON } else { COIL_OFF }).to_be_bytes();
                point.byte_order.reorder(&mut bytes);
                *first = u16::from_be_bytes(bytes);
            }
            Ok(words)
        }
        (ValueType::Binary, PointValue::Binary(bytes)) => {
            if bytes.len() > width * 2 {
                return Err(SimulatorError::InvalidValue(format!(
                    "{} bytes do not fit the {} registers of point '{}'",
                    bytes.len(),
                    width,
                    point.id
                )));
            }
            Ok(bytes_to_words(bytes, width))
        }
        (value_type, PointValue::Number(v)) if value_type.is_numeric() => {
            if point.scale == 0.0 || !point.scale.is_finite() {
                return Err(SimulatorError::InvalidConfig(format!(
                    "point '{}' has invalid scale {}",
                    point.id, point.scale
                )));
            }
            if !v.is_finite() {
                return Err(SimulatorError::InvalidValue(format!(
                    "{v} is not a finite number"
                )));
            }
            let raw = (v - point.offset) / point.scale;
            let mut bytes = raw_to_be(value_type, raw)?;
            point.byte_order.reorder(&mut bytes);
            Ok(bytes_to_words(&bytes, width))
        }
        (value_type, value) => Err(SimulatorError::InvalidValue(format!(
            "{value:?} cannot be stored in {value_type:?} point '{}'",
            point.id
        ))),
    }
}
