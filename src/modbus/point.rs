// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Point model
//!
//! A point maps one application value onto a contiguous range of registers.
//! Points are exchanged as JSON with camelCase field names:
//!
//! ```json
//! {
//!   "id": "p1",
//!   "enabled": true,
//!   "description": "Boiler temperature",
//!   "startAddress": 100,
//!   "width": 2,
//!   "initialValue": [66, 72, 0, 0],
//!   "valueType": "float32",
//!   "byteOrder": "bigEndian",
//!   "scale": 1.0,
//!   "offset": 0.0,
//!   "delta": 0.1
//! }
//! ```

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::error::{Result, SimulatorError};

/// How the raw bytes of a point are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Any nonzero first register is `true`
    Bool,
    #[default]
    Uint16,
    Int16,
    Uint32,
    Int32,
    Float32,
    Float64,
    /// Raw bytes of the whole range, no scaling
    Binary,
}

impl ValueType {
    /// Number of registers the value itself occupies.
    ///
    /// `Binary` spans the whole range of its point and reports 1, the
    /// smallest valid width.
    pub fn register_count(self) -> u16 {
        match self {
            ValueType::Bool | ValueType::Uint16 | ValueType::Int16 | ValueType::Binary => 1,
            ValueType::Uint32 | ValueType::Int32 | ValueType::Float32 => 2,
            ValueType::Float64 => 4,
        }
    }

    /// Whether scale and offset apply to this type
    pub fn is_numeric(self) -> bool {
        !matches!(self, ValueType::Bool | ValueType::Binary)
    }
}

/// Byte ordering of multi-register values.
///
/// Names use the `ABCD` convention where `A` is the most significant byte of
/// the value and registers are read in ascending address order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ByteOrder {
    /// `ABCD`: most significant word first, most significant byte first
    #[default]
    BigEndian,
    /// `DCBA`: the whole value is byte-reversed
    LittleEndian,
    /// `CDAB`: word order reversed, bytes within each word big-endian
    WordSwap,
    /// `BADC`: word order kept, bytes within each word swapped
    ByteSwap,
}

impl ByteOrder {
    /// Reorder `bytes` between wire order and canonical big-endian order.
    ///
    /// Every ordering is its own inverse, so the same call is used for
    /// decoding and encoding. `bytes` must have an even length.
    pub fn reorder(self, bytes: &mut [u8]) {
        match self {
            ByteOrder::BigEndian => {}
            ByteOrder::LittleEndian => bytes.reverse(),
            ByteOrder::WordSwap => {
                let words = bytes.len() / 2;
                for i in 0..words / 2 {
                    let j = words - 1 - i;
                    bytes.swap(2 * i, 2 * j);
                    bytes.swap(2 * i + 1, 2 * j + 1);
                }
            }
            ByteOrder::ByteSwap => {
                for pair in bytes.chunks_exact_mut(2) {
                    pair.swap(0, 1);
                }
            }
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

fn default_delta() -> f64 {
    1.0
}

/// Operator-configured register mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    /// Stable identifier, unique within a store
    #[serde(default)]
    pub id: String,

    /// Disabled points keep their registers but are not served to clients
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub description: String,

    /// First register address
    pub start_address: u16,

    /// Number of consecutive registers
    pub width: u16,

    /// Bytes seeding newly allocated registers, MSB first per register
    #[serde(default)]
    pub initial_value: Vec<u8>,

    #[serde(default)]
    pub value_type: ValueType,

    #[serde(default)]
    pub byte_order: ByteOrder,

    #[serde(default = "default_scale")]
    pub scale: f64,

    #[serde(default)]
    pub offset: f64,

    /// Minimum meaningful change, for callers doing change detection
    #[serde(default = "default_delta")]
    pub delta: f64,
}

impl Point {
    /// Create an enabled point with unit scaling and no initial value
    pub fn new(
        id: impl Into<String>,
        start_address: u16,
        width: u16,
        value_type: ValueType,
    ) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            description: String::new(),
            start_address,
            width,
            initial_value: Vec::new(),
            value_type,
            byte_order: ByteOrder::BigEndian,
            scale: 1.0,
            offset: 0.0,
            delta: 1.0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_scaling(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    pub fn with_initial_value(mut self, initial_value: Vec<u8>) -> Self {
        self.initial_value = initial_value;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Addresses occupied by this point.
    ///
    /// Computed in `u32` so a range ending exactly at 0xFFFF is representable.
    pub fn address_range(&self) -> Range<u32> {
        let start = u32::from(self.start_address);
        start..start + u32::from(self.width)
    }

    /// Iterate over the register addresses of this point
    pub fn addresses(&self) -> impl Iterator<Item = u16> {
        // Validated points never exceed 0xFFFF
        self.address_range().filter_map(|a| u16::try_from(a).ok())
    }

    pub fn covers(&self, address: u16) -> bool {
        self.address_range().contains(&u32::from(address))
    }

    /// Word used to seed the `index`-th register of the point
    pub fn initial_word(&self, index: usize) -> u16 {
        let high = self.initial_value.get(index * 2).copied().unwrap_or(0);
        let low = self.initial_value.get(index * 2 + 1).copied().unwrap_or(0);
        u16::from_be_bytes([high, low])
    }

    /// Check the point before it touches any state
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(SimulatorError::InvalidConfig(format!(
                "point '{}' has zero width",
                self.id
            )));
        }
        if self.address_range().end > 0x1_0000 {
            return Err(SimulatorError::InvalidConfig(format!(
                "point '{}' ends past register 65535 (start {}, width {})",
                self.id, self.start_address, self.width
            )));
        }
        if self.width < self.value_type.register_count() {
            return Err(SimulatorError::InvalidConfig(format!(
                "point '{}' needs {} registers for {:?}, has {}",
                self.id,
                self.value_type.register_count(),
                self.value_type,
                self.width
            )));
        }
        if self.scale == 0.0 || !self.scale.is_finite() {
            return Err(SimulatorError::InvalidConfig(format!(
                "point '{}' has invalid scale {}",
                self.id, self.scale
            )));
        }
        if !self.offset.is_finite() {
            return Err(SimulatorError::InvalidConfig(format!(
                "point '{}' has invalid offset {}",
                self.id, self.offset
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_points() {
        assert!(Point::new("ok", 0, 1, ValueType::Uint16).validate().is_ok());
        assert!(Point::new("w0", 0, 0, ValueType::Uint16).validate().is_err());
        assert!(Point::new("f32", 0, 1, ValueType::Float32).validate().is_err());
        assert!(Point::new("f64", 10, 3, ValueType::Float64).validate().is_err());
        assert!(Point::new("end", 0xFFFF, 2, ValueType::Uint16).validate().is_err());
        assert!(Point::new("last", 0xFFFF, 1, ValueType::Uint16).validate().is_ok());
        let zero_scale = Point::new("s0", 0, 1, ValueType::Int16).with_scaling(0.0, 0.0);
        assert!(matches!(
            zero_scale.validate(),
            Err(SimulatorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_initial_word_padding() {
        let p = Point::new("p", 0, 3, ValueType::Binary).with_initial_value(vec![0x12, 0x34, 0x56]);
        assert_eq!(p.initial_word(0), 0x1234);
        assert_eq!(p.initial_word(1), 0x5600);
        assert_eq!(p.initial_word(2), 0);
    }

    #[test]
    fn test_byte_order_permutations() {
        let canonical = [0xA, 0xB, 0xC, 0xD];
        let cases = [
            (ByteOrder::BigEndian, [0xA, 0xB, 0xC, 0xD]),
            (ByteOrder::LittleEndian, [0xD, 0xC, 0xB, 0xA]),
            (ByteOrder::WordSwap, [0xC, 0xD, 0xA, 0xB]),
            (ByteOrder::ByteSwap, [0xB, 0xA, 0xD, 0xC]),
        ];
        for (order, expected) in cases {
            let mut bytes = canonical;
            order.reorder(&mut bytes);
            assert_eq!(bytes, expected, "{order:?}");
            order.reorder(&mut bytes);
            assert_eq!(bytes, canonical, "{order:?} is not an involution");
        }
    }

    #[test]
    fn test_json_field_names() {
        let json = r#"{"id":"p1","enabled":true,"startAddress":100,"width":2,
            "valueType":"float32","byteOrder":"wordSwap"}"#;
        let point: Point = serde_json::from_str(json).unwrap();
        assert_eq!(point.start_address, 100);
        assert_eq!(point.value_type, ValueType::Float32);
        assert_eq!(point.byte_order, ByteOrder::WordSwap);
        assert_eq!(point.scale, 1.0);
        assert!(point.initial_value.is_empty());

        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["startAddress"], 100);
        assert_eq!(value["valueType"], "float32");
    }
}
