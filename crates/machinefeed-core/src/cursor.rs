//! Per-machine cyclic replay cursors.

use std::collections::HashMap;

use crate::store::{MachineId, RecordStore};

#[derive(Debug, Clone, Copy)]
struct Cursor {
    position: usize,
    len: usize,
}

/// One replay position per machine.
///
/// Invariant: `0 <= position < len` for every cursor. Lengths come from the
/// store, which rejects empty sequences, so the modulo below never divides
/// by zero.
#[derive(Debug, Clone)]
pub struct CursorTable {
    cursors: HashMap<MachineId, Cursor>,
}

impl CursorTable {
    /// A cursor at position 0 for every machine in the store.
    pub fn new(store: &RecordStore) -> Self {
        let cursors = store
            .iter()
            .map(|m| {
                (
                    m.id().clone(),
                    Cursor {
                        position: 0,
                        len: m.len(),
                    },
                )
            })
            .collect();
        Self { cursors }
    }

    /// Return the index to replay this tick, then step the cursor forward,
    /// wrapping to 0 at the end of the sequence.
    ///
    /// Call at most once per machine per tick.
    pub fn advance(&mut self, id: &str) -> Option<usize> {
        let cursor = self.cursors.get_mut(id)?;
        let current = cursor.position;
        cursor.position = (current + 1) % cursor.len;
        Some(current)
    }

    /// Index the next `advance` will return.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.cursors.get(id).map(|c| c.position)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
