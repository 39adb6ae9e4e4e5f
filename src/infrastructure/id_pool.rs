use crate::error::{BankError, Result};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Default)]
struct PoolState {
    available: Vec<u32>,
    held: HashSet<u32>,
}

/// A bounded set of reusable identifiers in `[0, capacity)`.
///
/// `acquire` hands out a uniformly random free id, so callers must not rely on
/// allocation order. An id is never handed out twice until it is released.
#[derive(Debug)]
pub struct IdentifierPool {
    name: &'static str,
    capacity: u32,
    state: Mutex<PoolState>,
}

impl IdentifierPool {
    /// Creates a new pool holding every id in `[0, capacity)`.
    pub fn new(name: &'static str, capacity: u32) -> Self {
        Self {
            name,
            capacity,
            state: Mutex::new(PoolState {
                available: (0..capacity).collect(),
                held: HashSet::new(),
            }),
        }
    }

    /// Takes a random free id out of the pool.
    pub fn acquire(&self) -> Result<u32> {
        let mut state = self.state.lock();
        if state.available.is_empty() {
            return Err(BankError::PoolExhausted(self.name));
        }
        let index = rand::thread_rng().gen_range(0..state.available.len());
        let id = state.available.swap_remove(index);
        state.held.insert(id);
        Ok(id)
    }

    /// Returns `id` to the pool. Ids that are not currently held are ignored,
    /// so a stale release can never put an id into the pool twice.
    pub fn release(&self, id: u32) -> bool {
        let mut state = self.state.lock();
        if !state.held.remove(&id) {
            warn!(pool = self.name, id, "Ignoring release of an id that is not held");
            return false;
        }
        state.available.push(id);
        true
    }

    /// Number of ids currently handed out.
    pub fn held(&self) -> usize {
        self.state.lock().held.len()
    }

    /// Makes every id available again.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.held.clear();
        state.available.clear();
        state.available.extend(0..self.capacity);
    }
}
