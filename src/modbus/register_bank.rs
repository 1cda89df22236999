// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Flat 16-bit register address space
//!
//! The bank maps a register address to its current 16-bit word. It knows
//! nothing about points: the [`RegisterStore`](super::store::RegisterStore)
//! decides which addresses exist and guards every access with its lock.

use std::collections::HashMap;

/// Mapping from register address to register word.
///
/// An address is either present (allocated by some configured point) or
/// absent. Absence is reported with `None`, never with a zero sentinel.
#[derive(Debug, Default, Clone)]
pub struct RegisterBank {
    registers: HashMap<u16, u16>,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current word at `address`, or `None` if the address is not allocated.
    pub fn get(&self, address: u16) -> Option<u16> {
        self.registers.get(&address).copied()
    }

    /// Overwrite an allocated register.
    ///
    /// Returns `false` and leaves the bank unchanged when `address` is absent;
    /// writes never create addresses.
    pub fn set(&mut self, address: u16, word: u16) -> bool {
        match self.registers.get_mut(&address) {
            Some(r) => {
                *r = word;
                true
            }
            None => false,
        }
    }

    /// Create `address` holding `word` if it does not exist yet.
    ///
    /// Existing values are preserved. Returns `true` if the address was newly
    /// allocated.
    pub fn allocate(&mut self, address: u16, word: u16) -> bool {
        if self.registers.contains_key(&address) {
            return false;
        }
        self.registers.insert(address, word);
        true
    }

    /// Delete `address`, returning its last value.
    pub fn free(&mut self, address: u16) -> Option<u16> {
        self.registers.remove(&address)
    }

    pub fn contains(&self, address: u16) -> bool {
        self.registers.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn clear(&mut self) {
        self.registers.clear();
    }

    /// All allocated addresses in ascending order
    pub fn addresses(&self) -> Vec<u16> {
        let mut addresses: Vec<u16> = self.registers.keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }
}
