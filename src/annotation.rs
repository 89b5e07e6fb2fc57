// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Symbol-boundary bookkeeping for one channel

use chrono::Utc;
use tracing::debug;

use crate::sigmf::{format_datetime, Annotation};

/// Default symbol length in samples (256 chips x 13 x 4)
pub const DEFAULT_SYMBOL_LENGTH: u64 = 256 * 13 * 4;

/// Tracks whether the next appended chunk starts a new symbol
///
/// Boundary signals arrive from outside; several signals before the next
/// append collapse into one annotation.
#[derive(Debug, Clone)]
pub struct AnnotationTracker {
    pending: bool,
    symbol_count: u64,
    symbol_length: u64,
    frequency: f64,
}

impl AnnotationTracker {
    pub fn new(symbol_length: u64, frequency: f64) -> Self {
        Self {
            pending: true,
            symbol_count: 0,
            symbol_length,
            frequency,
        }
    }

    pub fn on_symbol_boundary_signal(&mut self) {
        self.pending = true;
    }

    /// Emit the annotation for a new symbol starting at `sample_offset`, if one is pending
    pub fn maybe_emit(&mut self, sample_offset: u64) -> Option<Annotation> {
        if !self.pending {
            return None;
        }

        self.pending = false;
        self.symbol_count += 1;
        debug!(
            "Symbol {} starts at sample {}",
            self.symbol_count, sample_offset
        );

        Some(Annotation {
            sample_start: sample_offset,
            sample_count: self.symbol_length,
            frequency: self.frequency,
            datetime: format_datetime(Utc::now()),
            comment: format!("LoRa Symbol {}", self.symbol_count),
        })
    }

    pub fn reset(&mut self) {
        self.pending = true;
        self.symbol_count = 0;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn symbol_count(&self) -> u64 {
        self.symbol_count
    }
}
