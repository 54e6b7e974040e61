use crate::{next_prime, TABLE_LOG_SIZE};

/// A fixed size hash map from position keys to small non-zero values
///
/// Each key maps to a single slot, `key % size`, and a new entry always
/// replaces the previous one. Full keys are stored, so a lookup never
/// returns a value written for a different position. A value of 0 marks
/// an empty slot.
#[derive(Clone)]
pub struct TranspositionTable {
    keys: Vec<u64>,
    values: Vec<u8>,
}

impl TranspositionTable {
    /// Creates a table with `next_prime(2^TABLE_LOG_SIZE)` slots
    pub fn new() -> Self {
        Self::with_log_size(TABLE_LOG_SIZE)
    }

    /// Creates a table with `next_prime(2^log_size)` slots
    pub fn with_log_size(log_size: u32) -> Self {
        let size = next_prime(1 << log_size) as usize;
        Self {
            keys: vec![0; size],
            values: vec![0; size],
        }
    }

    /// Number of slots in the table
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn index(&self, key: u64) -> usize {
        (key % self.keys.len() as u64) as usize
    }

    /// Stores a value for `key`, evicting whatever used the same slot
    pub fn put(&mut self, key: u64, value: u8) {
        let i = self.index(key);
        self.keys[i] = key;
        self.values[i] = value;
    }

    /// Returns the value stored for `key`, or 0 if there is none
    pub fn get(&self, key: u64) -> u8 {
        let i = self.index(key);
        if self.keys[i] == key {
            self.values[i]
        } else {
            0
        }
    }

    /// Empties every slot
    pub fn reset(&mut self) {
        for key in self.keys.iter_mut() {
            *key = 0;
        }
        for value in self.values.iter_mut() {
            *value = 0;
        }
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new()
    }
}
