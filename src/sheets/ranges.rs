// Copyright 2025 Webmobix Solutions AG
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUTHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A1 addressing and chunked read planning.

use crate::sheets::columns::{count_to_letters, index_to_letters};
use crate::utils::{SyncError, SyncResult};
use std::fmt;
use std::num::NonZeroUsize;

/// Inclusive span of zero-based sheet rows fetched by one read call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBatch {
    pub start: usize,
    pub end: usize,
}

impl RowBatch {
    pub fn height(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Splits zero-based rows `start..total_rows` into batches of at most `cap`
/// rows each.
///
/// Batch `i` covers `start + i*cap ..= min(start + (i+1)*cap - 1, total_rows - 1)`.
/// Returns no batches when `total_rows <= start`.
pub fn plan_batches(total_rows: usize, start: usize, cap: NonZeroUsize) -> Vec<RowBatch> {
    let cap = cap.get();
    let pending = total_rows.saturating_sub(start);
    let count = pending.div_ceil(cap);

    (0..count)
        .map(|i| RowBatch {
            start: start + i * cap,
            end: (start + (i + 1) * cap - 1).min(total_rows - 1),
        })
        .collect()
}

/// A single cell in A1 terms: zero-based column, one-based row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub col: usize,
    pub row: usize,
}

impl CellAddress {
    pub fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", index_to_letters(self.col), self.row)
    }
}

/// Rectangle between two cell addresses, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    start: CellAddress,
    end: CellAddress,
}

impl CellRange {
    pub fn new(start: CellAddress, end: CellAddress) -> SyncResult<Self> {
        if start.row == 0 || end.row == 0 {
            return Err(SyncError::MalformedRange(format!(
                "row numbers are one-based, got {}..{}",
                start.row, end.row
            )));
        }
        if end.row < start.row || end.col < start.col {
            return Err(SyncError::MalformedRange(format!(
                "range end {} precedes start {}",
                end, start
            )));
        }

        Ok(Self { start, end })
    }

    pub fn single(address: CellAddress) -> SyncResult<Self> {
        Self::new(address, address)
    }

    /// Full-width rows `first_row..=last_row` (one-based) across
    /// `column_count` columns starting at column A.
    pub fn rows(first_row: usize, last_row: usize, column_count: usize) -> SyncResult<Self> {
        if column_count == 0 {
            return Err(SyncError::MalformedRange(format!(
                "rows {}..={} have zero width",
                first_row, last_row
            )));
        }

        Self::new(
            CellAddress::new(0, first_row),
            CellAddress::new(column_count - 1, last_row),
        )
    }

    pub fn start(&self) -> CellAddress {
        self.start
    }

    pub fn end(&self) -> CellAddress {
        self.end
    }

    pub fn height(&self) -> usize {
        self.end.row - self.start.row + 1
    }

    pub fn width(&self) -> usize {
        self.end.col - self.start.col + 1
    }

    /// Renders `Sheet!A1:C5`, quoting the worksheet title.
    pub fn to_a1(&self, worksheet: &str) -> String {
        format!("'{}'!{}", worksheet.replace('\'', "''"), self)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The end column is sized from a column count so a width of N ends on
        // the Nth letter.
        write!(
            f,
            "{}:{}{}",
            self.start,
            count_to_letters(self.end.col + 1),
            self.end.row
        )
    }
}
