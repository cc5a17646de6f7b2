//! Capped, time-ordered reading history.
//!
//! The buffer is owned by whoever drives the pipeline. Appending past
//! `capacity` evicts the oldest reading. The pipeline only ever annotates the
//! readings it is handed; it never changes how many there are.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::Reading;

/// Default history length, matching the dashboard's 1000-sample window.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Error, PartialEq)]
pub enum BufferError {
    #[error("buffer capacity must be at least 1")]
    ZeroCapacity,
    #[error("reading at {new} is not after the latest buffered reading at {last}")]
    OutOfOrder {
        last: DateTime<Utc>,
        new: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct ReadingBuffer {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl Default for ReadingBuffer {
    fn default() -> Self {
        Self {
            readings: VecDeque::with_capacity(DEFAULT_CAPACITY),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ReadingBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        Ok(Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append a reading, returning the evicted oldest reading if the buffer
    /// was full.
    pub fn push(&mut self, reading: Reading) -> Result<Option<Reading>, BufferError> {
        if let Some(last) = self.readings.back() {
            if reading.timestamp <= last.timestamp {
                return Err(BufferError::OutOfOrder {
                    last: last.timestamp,
                    new: reading.timestamp,
                });
            }
        }
        self.readings.push_back(reading);
        if self.readings.len() > self.capacity {
            return Ok(self.readings.pop_front());
        }
        Ok(None)
    }

    /// Push readings in order. Stops at the first out-of-order reading.
    /// Returns how many readings were evicted along the way.
    pub fn extend<I>(&mut self, readings: I) -> Result<usize, BufferError>
    where
        I: IntoIterator<Item = Reading>,
    {
        let mut evicted = 0;
        for r in readings {
            if self.push(r)?.is_some() {
                evicted += 1;
            }
        }
        Ok(evicted)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&Reading> {
        self.readings.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    /// The newest `n` readings, oldest first.
    pub fn latest(&self, n: usize) -> impl Iterator<Item = &Reading> {
        self.readings.iter().skip(self.readings.len().saturating_sub(n))
    }

    /// Contiguous view for the scoring pipeline.
    pub fn as_mut_slice(&mut self) -> &mut [Reading] {
        self.readings.make_contiguous()
    }

    pub fn to_vec(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }
}
