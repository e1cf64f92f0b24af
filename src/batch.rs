//! Row batching.
//!
//! Rows are written to the store in bounded batches rather than one at a
//! time. [`BatchAccumulator`] buffers rows up to a fixed capacity, handing a
//! full batch back to the caller each time the buffer fills; the final
//! partial batch comes out of [`BatchAccumulator::flush`] at end-of-stream.
//! A batch is never empty, and concatenating all yielded batches reproduces
//! the pushed rows in order.

use crate::types::Row;

/// Default number of rows per store insert.
pub const BATCH_SIZE: usize = 1000;

pub struct BatchAccumulator {
    buffer: Vec<Row>,
    capacity: usize,
}

impl BatchAccumulator {
    /// Create an accumulator yielding batches of at most `capacity` rows.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "batch capacity must be positive");
        BatchAccumulator {
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a row, returning a completed batch once the buffer fills.
    pub fn push(&mut self, row: Row) -> Option<Vec<Row>> {
        self.buffer.push(row);
        if self.buffer.len() >= self.capacity {
            Some(std::mem::replace(
                &mut self.buffer,
                Vec::with_capacity(self.capacity),
            ))
        } else {
            None
        }
    }

    /// Yield any buffered rows as a final batch. Returns `None` when the
    /// buffer is empty so no empty batch is ever emitted.
    pub fn flush(&mut self) -> Option<Vec<Row>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}
