// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bounded, ordered history of feature vectors.

use crate::FeatureVector;
use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// The lookback window inference conditions on.
///
/// Oldest-first FIFO with a fixed capacity; pushing onto a full history
/// evicts the oldest vector.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    capacity: NonZeroUsize,
    entries: VecDeque<FeatureVector>,
}

impl History {
    /// Creates an empty history holding at most `capacity` vectors.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.get()),
        }
    }

    /// Appends the newest vector, returning the evicted oldest one if full.
    pub fn push(&mut self, vector: FeatureVector) -> Option<FeatureVector> {
        let evicted = if self.entries.len() == self.capacity.get() {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(vector);
        evicted
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity.get()
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &FeatureVector> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&FeatureVector> {
        self.entries.back()
    }

    pub fn oldest(&self) -> Option<&FeatureVector> {
        self.entries.front()
    }

    /// Returns the vector `lookback` steps before the newest (0 = newest).
    pub fn from_newest(&self, lookback: usize) -> Option<&FeatureVector> {
        let index = self.entries.len().checked_sub(lookback + 1)?;
        self.entries.get(index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
