// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register store shared by the protocol handler and the management API
//!
//! The store owns the configured points, the [`RegisterBank`] and the index
//! of served addresses. All three live behind a single `RwLock`:
//!
//! - Modbus reads and point listings take the shared lock
//! - Modbus writes and configuration changes take the exclusive lock for
//!   their whole address span
//!
//! A request therefore always observes a consistent snapshot: configuration
//! edits never interleave with a request that has already been admitted.
//!
//! ## Allocation rules
//!
//! - The bank holds exactly the union of the address ranges of all
//!   configured points, enabled or not.
//! - Newly introduced addresses are seeded from the point's initial value.
//!   Addresses that already exist keep their live value, so editing a point
//!   never resets it.
//! - An address is freed only when no configured point covers it anymore.
//! - Only addresses covered by an enabled point are served to Modbus clients.
//!
//! Multi-address protocol writes validate the whole span before mutating
//! anything: a request touching an unserved address fails without applying
//! any of its writes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info};
use uuid::Uuid;

use super::codec::{self, PointValue, COIL_OFF, COIL_ON};
use super::error::{Result, SimulatorError};
use super::point::Point;
use super::register_bank::RegisterBank;

/// Largest register count of a 0x03 / 0x04 request
pub const MAX_READ_REGISTERS: usize = 125;
/// Largest bit count of a 0x01 / 0x02 request
pub const MAX_READ_BITS: usize = 2000;
/// Largest register count of a 0x10 request
pub const MAX_WRITE_REGISTERS: usize = 123;
/// Largest coil count of a 0x0F request
pub const MAX_WRITE_BITS: usize = 1968;

/// Shared handle on a register store
pub type SharedRegisterStore = Arc<RegisterStore>;

#[derive(Debug, Default)]
struct StoreState {
    points: HashMap<String, Point>,
    bank: RegisterBank,
    served: HashSet<u16>,
}

impl StoreState {
    fn is_covered(&self, address: u16) -> bool {
        self.points.values().any(|p| p.covers(address))
    }

    /// Insert or replace a validated point and reconcile the bank
    fn apply_point(&mut self, point: Point) {
        let mut allocated = 0usize;
        for (index, address) in point.addresses().enumerate() {
            if self.bank.allocate(address, point.initial_word(index)) {
                allocated += 1;
            }
        }
        debug!(
            "Point '{}' covers registers {}..{} ({} newly allocated)",
            point.id,
            point.start_address,
            point.address_range().end,
            allocated
        );

        if let Some(previous) = self.points.insert(point.id.clone(), point) {
            for address in previous.addresses() {
                if !self.is_covered(address) {
                    self.bank.free(address);
                }
            }
        }
    }

    fn remove_point(&mut self, id: &str) -> Option<Point> {
        let removed = self.points.remove(id)?;
        for address in removed.addresses() {
            if !self.is_covered(address) {
                self.bank.free(address);
            }
        }
        Some(removed)
    }

    fn rebuild_served(&mut self) {
        self.served = self
            .points
            .values()
            .filter(|p| p.enabled)
            .flat_map(|p| p.addresses())
            .collect();
    }

    /// Check the request quantity, then that every address of the span is served
    fn check_span(&self, address: u16, quantity: usize, max_quantity: usize) -> Result<()> {
        if quantity == 0 {
            return Err(SimulatorError::IllegalDataValue(
                "request quantity must not be zero".to_string(),
            ));
        }
        if quantity > max_quantity {
            return Err(SimulatorError::IllegalDataValue(format!(
                "request quantity {quantity} exceeds the limit of {max_quantity}"
            )));
        }
        if u32::from(address) + quantity as u32 > 0x1_0000 {
            return Err(SimulatorError::IllegalDataAddress { address });
        }
        for offset in 0..quantity {
            let reg_addr = address + offset as u16;
            if !self.served.contains(&reg_addr) || !self.bank.contains(reg_addr) {
                return Err(SimulatorError::IllegalDataAddress { address: reg_addr });
            }
        }
        Ok(())
    }

    fn point_words(&self, point: &Point) -> Vec<u16> {
        point
            .addresses()
            .map(|a| self.bank.get(a).unwrap_or_default())
            .collect()
    }

    fn write_point_words(&mut self, point: &Point, words: &[u16]) {
        for (address, word) in point.addresses().zip(words) {
            self.bank.set(address, *word);
        }
    }

    fn point(&self, id: &str) -> Result<Point> {
        self.points
            .get(id)
            .cloned()
            .ok_or_else(|| SimulatorError::PointNotFound(id.to_string()))
    }
}

/// Points and registers of one simulated slave
#[derive(Debug, Default)]
pub struct RegisterStore {
    state: RwLock<StoreState>,
}

impl RegisterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store ready to be shared between handlers
    pub fn shared() -> SharedRegisterStore {
        Arc::new(Self::new())
    }

    // Every operation leaves the state consistent before it can panic,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a point or replace the point with the same id.
    ///
    /// An empty id is replaced with a generated UUID. The stored point is
    /// returned.
    ///
    /// ### Errors
    ///
    /// `InvalidConfig` if the point fails validation; the store is left
    /// untouched.
    pub fn set_point(&self, mut point: Point) -> Result<Point> {
        if point.id.is_empty() {
            point.id = Uuid::new_v4().to_string();
        }
        point.validate()?;

        let mut state = self.write();
        state.apply_point(point.clone());
        state.rebuild_served();
        info!(
            "Configured point '{}' at {} (width {}, {:?})",
            point.id, point.start_address, point.width, point.value_type
        );
        Ok(point)
    }

    /// Remove a point and free the registers no other point covers.
    ///
    /// Unknown ids are ignored and return `None`.
    pub fn remove_point(&self, id: &str) -> Option<Point> {
        let mut state = self.write();
        let removed = state.remove_point(id);
        if removed.is_some() {
            state.rebuild_served();
            info!("Removed point '{}'", id);
        } else {
            debug!("Remove ignored, point '{}' is not configured", id);
        }
        removed
    }

    /// Snapshot of all points ordered by start address
    pub fn list_points(&self) -> Vec<Point> {
        let state = self.read();
        let mut points: Vec<Point> = state.points.values().cloned().collect();
        points.sort_by(|a, b| {
            a.start_address
                .cmp(&b.start_address)
                .then_with(|| a.id.cmp(&b.id))
        });
        points
    }

    pub fn get_point(&self, id: &str) -> Option<Point> {
        self.read().points.get(id).cloned()
    }

    pub fn point_count(&self) -> usize {
        self.read().points.len()
    }

    /// Replace the whole configuration.
    ///
    /// The bank is rebuilt from scratch by applying the points in order, so
    /// for duplicate ids the later entry wins. All points are validated first:
    /// on error nothing changes.
    pub fn import_points(&self, points: Vec<Point>) -> Result<usize> {
        let mut points = points;
        for point in points.iter_mut() {
            if point.id.is_empty() {
                point.id = Uuid::new_v4().to_string();
            }
            point.validate()?;
        }

        let mut state = self.write();
        state.points.clear();
        state.bank.clear();
        for point in points {
            state.apply_point(point);
        }
        state.rebuild_served();

        let count = state.points.len();
        info!(
            "Imported {} points covering {} registers",
            count,
            state.bank.len()
        );
        Ok(count)
    }

    /// Raw bytes of every point, `width * 2` bytes MSB first per register
    pub fn get_all_values(&self) -> HashMap<String, Vec<u8>> {
        let state = self.read();
        state
            .points
            .values()
            .map(|p| (p.id.clone(), codec::words_to_bytes(&state.point_words(p))))
            .collect()
    }

    /// Overwrite the registers of a point with raw bytes.
    ///
    /// Missing bytes are written as zero, extra bytes are ignored.
    pub fn set_value(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let mut state = self.write();
        let point = state.point(id)?;
        let words = codec::bytes_to_words(bytes, usize::from(point.width));
        state.write_point_words(&point, &words);
        debug!("Set raw value of point '{}' to {:02X?}", id, bytes);
        Ok(())
    }

    /// Decode the current application value of a point
    pub fn read_value(&self, id: &str) -> Result<PointValue> {
        let state = self.read();
        let point = state.point(id)?;
        codec::decode(&point, &state.point_words(&point))
    }

    /// Encode an application value into the registers of a point
    pub fn write_value(&self, id: &str, value: &PointValue) -> Result<()> {
        let mut state = self.write();
        let point = state.point(id)?;
        let words = codec::encode(&point, value)?;
        state.write_point_words(&point, &words);
        debug!("Set value of point '{}' to {:?} ({:04X?})", id, value, words);
        Ok(())
    }

    /// Read a span of served registers
    pub fn read_registers(&self, address: u16, quantity: u16) -> Result<Vec<u16>> {
        self.read_span(address, quantity, MAX_READ_REGISTERS)
    }

    /// Write a span of served registers.
    ///
    /// Nothing is written unless every address of the span is served.
    pub fn write_registers(&self, address: u16, values: &[u16]) -> Result<()> {
        self.write_span(address, values, MAX_WRITE_REGISTERS)
    }

    /// Read a span of served registers as coils
    pub fn read_bits(&self, address: u16, quantity: u16) -> Result<Vec<bool>> {
        Ok(self
            .read_span(address, quantity, MAX_READ_BITS)?
            .into_iter()
            .map(|w| w != 0)
            .collect())
    }

    /// Write coils, stored as `0xFF00` / `0x0000` register words
    pub fn write_bits(&self, address: u16, values: &[bool]) -> Result<()> {
        let words: Vec<u16> = values
            .iter()
            .map(|on| if *on { COIL_ON } else { COIL_OFF })
            .collect();
        self.write_span(address, &words, MAX_WRITE_BITS)
    }

    fn read_span(&self, address: u16, quantity: u16, max_quantity: usize) -> Result<Vec<u16>> {
        let state = self.read();
        state.check_span(address, usize::from(quantity), max_quantity)?;
        Ok((0..quantity)
            .map(|i| state.bank.get(address + i).unwrap_or_default())
            .collect())
    }

    fn write_span(&self, address: u16, values: &[u16], max_quantity: usize) -> Result<()> {
        let mut state = self.write();
        state.check_span(address, values.len(), max_quantity)?;
        for (i, value) in values.iter().enumerate() {
            state.bank.set(address + i as u16, *value);
        }
        Ok(())
    }

    /// Whether a Modbus request may access `address`
    pub fn is_served(&self, address: u16) -> bool {
        self.read().served.contains(&address)
    }

    /// All allocated register addresses in ascending order
    pub fn addresses(&self) -> Vec<u16> {
        self.read().bank.addresses()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::point::{ByteOrder, ValueType};
    use std::collections::BTreeSet;
    use std::thread;

    fn expected_addresses(store: &RegisterStore) -> Vec<u16> {
        let set: BTreeSet<u16> = store
            .list_points()
            .iter()
            .flat_map(|p| p.addresses())
            .collect();
        set.into_iter().collect()
    }

    #[test]
    fn test_allocation_invariant() {
        let store = RegisterStore::new();
        store.set_point(Point::new("a", 0, 4, ValueType::Binary)).unwrap();
        store.set_point(Point::new("b", 2, 4, ValueType::Binary)).unwrap();
        store.set_point(Point::new("c", 100, 2, ValueType::Float32)).unwrap();
        assert_eq!(store.addresses(), expected_addresses(&store));

        // Shrink and move "a"; addresses still covered by "b" stay
        store.set_point(Point::new("a", 10, 1, ValueType::Uint16)).unwrap();
        assert_eq!(store.addresses(), expected_addresses(&store));
        assert_eq!(store.addresses(), vec![2, 3, 4, 5, 10, 100, 101]);

        store.remove_point("b");
        assert_eq!(store.addresses(), expected_addresses(&store));

        store
            .import_points(vec![Point::new("x", 7, 3, ValueType::Binary)])
            .unwrap();
        assert_eq!(store.addresses(), vec![7, 8, 9]);
        assert_eq!(store.addresses(), expected_addresses(&store));

        store.remove_point("x");
        assert!(store.addresses().is_empty());
    }

    #[test]
    fn test_initial_value_seeds_new_registers_only() {
        let store = RegisterStore::new();
        let point = Point::new("p", 10, 2, ValueType::Binary).with_initial_value(vec![0x12, 0x34]);
        store.set_point(point).unwrap();
        assert_eq!(store.read_registers(10, 2).unwrap(), vec![0x1234, 0x0000]);

        store.write_registers(10, &[0xAAAA, 0xBBBB]).unwrap();

        // Same range, new initial value: live values survive
        let edited = Point::new("p", 10, 3, ValueType::Binary)
            .with_initial_value(vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        store.set_point(edited).unwrap();
        assert_eq!(
            store.read_registers(10, 3).unwrap(),
            vec![0xAAAA, 0xBBBB, 0x0506]
        );
    }

    #[test]
    fn test_list_points_sorted_snapshot() {
        let store = RegisterStore::new();
        store.set_point(Point::new("late", 50, 1, ValueType::Uint16)).unwrap();
        store.set_point(Point::new("early", 5, 1, ValueType::Uint16)).unwrap();

        let mut listed = store.list_points();
        assert_eq!(listed[0].id, "early");
        assert_eq!(listed[1].id, "late");

        listed[0].start_address = 999;
        assert_eq!(store.get_point("early").unwrap().start_address, 5);
    }

    #[test]
    fn test_import_replaces_everything() {
        let store = RegisterStore::new();
        store.set_point(Point::new("old", 500, 4, ValueType::Binary)).unwrap();

        let pa = Point::new("pA", 20, 1, ValueType::Uint16);
        let pb = Point::new("pB", 10, 2, ValueType::Int32);
        store.import_points(vec![pa.clone(), pb.clone()]).unwrap();

        assert_eq!(store.list_points(), vec![pb, pa]);
        assert_eq!(store.addresses(), vec![10, 11, 20]);
        assert!(store.read_registers(500, 1).is_err());
    }

    #[test]
    fn test_import_duplicate_ids_last_wins() {
        let store = RegisterStore::new();
        store
            .import_points(vec![
                Point::new("dup", 0, 1, ValueType::Uint16),
                Point::new("dup", 30, 1, ValueType::Uint16),
            ])
            .unwrap();
        assert_eq!(store.point_count(), 1);
        assert_eq!(store.get_point("dup").unwrap().start_address, 30);
        assert_eq!(store.addresses(), vec![30]);
    }

    #[test]
    fn test_invalid_import_leaves_store_untouched() {
        let store = RegisterStore::new();
        store.set_point(Point::new("keep", 1, 1, ValueType::Uint16)).unwrap();
        let result = store.import_points(vec![
            Point::new("ok", 2, 1, ValueType::Uint16),
            Point::new("bad", 3, 0, ValueType::Uint16),
        ]);
        assert!(matches!(result, Err(SimulatorError::InvalidConfig(_))));
        assert_eq!(store.list_points().len(), 1);
        assert_eq!(store.addresses(), vec![1]);
    }

    #[test]
    fn test_set_point_rejects_invalid() {
        let store = RegisterStore::new();
        let bad = Point::new("s", 0, 1, ValueType::Uint16).with_scaling(0.0, 0.0);
        assert!(matches!(
            store.set_point(bad),
            Err(SimulatorError::InvalidConfig(_))
        ));
        assert!(store.addresses().is_empty());
    }

    #[test]
    fn test_empty_id_gets_generated() {
        let store = RegisterStore::new();
        let stored = store.set_point(Point::new("", 0, 1, ValueType::Uint16)).unwrap();
        assert!(!stored.id.is_empty());
        assert!(store.get_point(&stored.id).is_some());
    }

    #[test]
    fn test_disabled_point_is_not_served() {
        let store = RegisterStore::new();
        let point = Point::new("off", 40, 1, ValueType::Bool).with_enabled(false);
        store.set_point(point.clone()).unwrap();
        assert_eq!(store.addresses(), vec![40]);
        assert!(matches!(
            store.read_bits(40, 1),
            Err(SimulatorError::IllegalDataAddress { address: 40 })
        ));

        store.set_point(point.with_enabled(true)).unwrap();
        assert_eq!(store.read_bits(40, 1).unwrap(), vec![false]);
    }

    #[test]
    fn test_failed_write_applies_nothing() {
        let store = RegisterStore::new();
        store.set_point(Point::new("p", 0, 2, ValueType::Binary)).unwrap();
        let result = store.write_registers(0, &[1, 2, 3]);
        assert!(matches!(
            result,
            Err(SimulatorError::IllegalDataAddress { address: 2 })
        ));
        assert_eq!(store.read_registers(0, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_span_errors() {
        let store = RegisterStore::new();
        store.set_point(Point::new("top", 0xFFFF, 1, ValueType::Uint16)).unwrap();
        assert!(store.read_registers(0xFFFF, 1).is_ok());
        assert!(matches!(
            store.read_registers(0xFFFF, 2),
            Err(SimulatorError::IllegalDataAddress { .. })
        ));
        assert!(matches!(
            store.read_registers(0xFFFF, 0),
            Err(SimulatorError::IllegalDataValue(_))
        ));
        assert!(matches!(
            store.read_bits(50, 1),
            Err(SimulatorError::IllegalDataAddress { address: 50 })
        ));
    }

    #[test]
    fn test_quantity_limits() {
        let store = RegisterStore::new();
        store.set_point(Point::new("wide", 0, 2100, ValueType::Binary)).unwrap();

        assert_eq!(store.read_registers(0, 125).unwrap().len(), 125);
        assert!(matches!(
            store.read_registers(0, 126),
            Err(SimulatorError::IllegalDataValue(_))
        ));
        assert_eq!(store.read_bits(0, 2000).unwrap().len(), 2000);
        assert!(matches!(
            store.read_bits(0, 2001),
            Err(SimulatorError::IllegalDataValue(_))
        ));

        assert!(store.write_registers(0, &[7; 123]).is_ok());
        assert!(matches!(
            store.write_registers(0, &[9; 124]),
            Err(SimulatorError::IllegalDataValue(_))
        ));
        assert_eq!(store.read_registers(0, 1).unwrap(), vec![7]);
        assert!(store.write_bits(0, &[true; 1968]).is_ok());
        assert!(matches!(
            store.write_bits(0, &[false; 1969]),
            Err(SimulatorError::IllegalDataValue(_))
        ));
        assert_eq!(store.read_bits(1967, 1).unwrap(), vec![true]);
    }

    #[test]
    fn test_coil_words() {
        let store = RegisterStore::new();
        store.set_point(Point::new("c", 3, 2, ValueType::Binary)).unwrap();
        store.write_bits(3, &[true, false]).unwrap();
        assert_eq!(store.read_registers(3, 2).unwrap(), vec![0xFF00, 0x0000]);
        assert_eq!(store.read_bits(3, 2).unwrap(), vec![true, false]);
    }

    #[test]
    fn test_raw_values() {
        let store = RegisterStore::new();
        store.set_point(Point::new("r", 8, 2, ValueType::Binary)).unwrap();
        store.set_value("r", &[0xDE, 0xAD, 0xBE]).unwrap();
        assert_eq!(store.read_registers(8, 2).unwrap(), vec![0xDEAD, 0xBE00]);
        assert_eq!(
            store.get_all_values().get("r"),
            Some(&vec![0xDE, 0xAD, 0xBE, 0x00])
        );
        assert!(matches!(
            store.set_value("missing", &[1]),
            Err(SimulatorError::PointNotFound(_))
        ));
    }

    #[test]
    fn test_typed_float32_scenario() {
        let store = RegisterStore::new();
        store.set_point(Point::new("p1", 100, 2, ValueType::Float32)).unwrap();
        store.write_value("p1", &PointValue::Number(3.5)).unwrap();
        let bits = 3.5f32.to_bits();
        assert_eq!(
            store.read_registers(100, 2).unwrap(),
            vec![(bits >> 16) as u16, bits as u16]
        );
        assert_eq!(store.read_value("p1").unwrap(), PointValue::Number(3.5));
    }

    #[test]
    fn test_typed_value_little_endian() {
        let store = RegisterStore::new();
        let point = Point::new("le", 0, 2, ValueType::Uint32).with_byte_order(ByteOrder::LittleEndian);
        store.set_point(point).unwrap();
        store.write_value("le", &PointValue::Number(1.0)).unwrap();
        assert_eq!(store.read_registers(0, 2).unwrap(), vec![0x0100, 0x0000]);
    }

    #[test]
    fn test_concurrent_reads_are_never_torn() {
        let store = RegisterStore::shared();
        store.set_point(Point::new("pair", 0, 2, ValueType::Uint32)).unwrap();
        store.set_point(Point::new("other", 10, 2, ValueType::Uint32)).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 0..2000u16 {
                    store.write_registers(0, &[n, n]).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let base = if i % 2 == 0 { 0 } else { 10 };
                    for _ in 0..2000 {
                        let words = store.read_registers(base, 2).unwrap();
                        assert_eq!(words[0], words[1]);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
