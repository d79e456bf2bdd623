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

//! In-memory worksheet used by the synchronizer tests.

use crate::sheets::grid::{MergeRegion, is_blank};
use crate::sheets::ranges::{CellAddress, CellRange};
use crate::sheets::records::{FileUpload, value_text};
use crate::sheets::transport::{Dimension, RangeRead, SheetDimensions, SheetTransport};
use crate::sheets::upsert::WriteOperation;
use crate::utils::{SyncError, SyncResult};
use serde_json::{Value, json};
use std::collections::HashSet;

/// A dense grid that answers reads the way the Sheets API does: trailing
/// blank cells and rows are left out of every response.
#[derive(Debug, Default)]
pub struct MemorySheet {
    cells: Vec<Vec<Value>>,
    column_count: usize,
    merges: Vec<MergeRegion>,
    pub fail_writes: bool,
    pub fail_growth: bool,
    pub failing_uploads: HashSet<String>,
    pub reads: Vec<CellRange>,
    pub write_calls: Vec<Vec<WriteOperation>>,
    pub growths: Vec<(Dimension, usize)>,
    pub uploads: Vec<(String, CellAddress)>,
    /// Mutating calls in the order they arrived: "grow", "write", "upload".
    pub call_log: Vec<&'static str>,
}

impl MemorySheet {
    pub fn new(row_count: usize, column_count: usize) -> Self {
        Self {
            cells: vec![vec![Value::Null; column_count]; row_count],
            column_count,
            ..Default::default()
        }
    }

    /// Fills one-based `row` from column A. `None` cells stay blank.
    pub fn with_row(mut self, row: usize, values: &[Option<&str>]) -> Self {
        for (col, value) in values.iter().enumerate() {
            if let Some(text) = value {
                self.set(row, col, json!(text));
            }
        }
        self
    }

    pub fn with_merge(mut self, region: MergeRegion) -> Self {
        self.merges.push(region);
        self
    }

    pub fn row_count(&self) -> usize {
        self.cells.len()
    }

    /// Value at one-based `row`, zero-based `col`.
    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        self.cells
            .get(row.checked_sub(1)?)
            .and_then(|cells| cells.get(col))
            .filter(|value| !is_blank(value))
    }

    pub fn text(&self, row: usize, col: usize) -> Option<String> {
        self.get(row, col).and_then(|value| value.as_str().map(str::to_string))
    }

    /// Stores the formatted text of `value`, as a read would return it.
    fn set(&mut self, row: usize, col: usize, value: Value) {
        self.cells[row - 1][col] = value_text(&value).map_or(Value::Null, Value::String);
    }
}

impl SheetTransport for MemorySheet {
    async fn sheet_dimensions(&mut self) -> SyncResult<SheetDimensions> {
        Ok(SheetDimensions {
            row_count: self.row_count(),
            column_count: self.column_count,
        })
    }

    async fn read_range(&mut self, range: &CellRange) -> SyncResult<RangeRead> {
        self.reads.push(*range);

        let first = range.start().row - 1;
        let last = (range.end().row - 1).min(self.row_count().saturating_sub(1));
        let left = range.start().col;
        let right = range.end().col.min(self.column_count.saturating_sub(1));

        let mut rows: Vec<Vec<Value>> = Vec::new();
        if first < self.row_count() {
            for cells in &self.cells[first..=last] {
                let mut row: Vec<Value> = cells[left..=right].to_vec();
                while row.last().is_some_and(is_blank) {
                    row.pop();
                }
                rows.push(row);
            }
        }
        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }

        let merges = self
            .merges
            .iter()
            .filter(|m| m.start_row <= last && m.end_row >= first)
            .copied()
            .collect();

        Ok(RangeRead { rows, merges })
    }

    async fn write_cells(&mut self, writes: &[WriteOperation]) -> SyncResult<()> {
        self.call_log.push("write");
        if self.fail_writes {
            return Err(SyncError::Transport("write rejected".to_string()));
        }

        for write in writes {
            let row = write.range.start().row;
            if row > self.row_count() || write.range.end().col >= self.column_count {
                return Err(SyncError::Transport(format!(
                    "range {} exceeds grid limits",
                    write.range
                )));
            }
        }

        self.write_calls.push(writes.to_vec());
        for write in writes {
            let row = write.range.start().row;
            for (offset, value) in write.values.iter().enumerate() {
                self.set(row, write.range.start().col + offset, value.clone());
            }
        }
        Ok(())
    }

    async fn grow_dimension(&mut self, dimension: Dimension, count: usize) -> SyncResult<()> {
        self.call_log.push("grow");
        if self.fail_growth {
            return Err(SyncError::Transport("grid limit exceeded".to_string()));
        }
        self.growths.push((dimension, count));
        match dimension {
            Dimension::Rows => {
                let width = self.column_count;
                self.cells
                    .extend(std::iter::repeat_with(|| vec![Value::Null; width]).take(count));
            }
            Dimension::Columns => {
                self.column_count += count;
                for row in &mut self.cells {
                    row.resize(self.column_count, Value::Null);
                }
            }
        }
        Ok(())
    }

    async fn upload_file(&mut self, file: &FileUpload, address: &CellAddress) -> SyncResult<()> {
        self.call_log.push("upload");
        if self.failing_uploads.contains(&file.file_name) {
            return Err(SyncError::Upload(format!("{} refused", file.file_name)));
        }
        self.uploads.push((file.file_name.clone(), *address));
        Ok(())
    }
}
