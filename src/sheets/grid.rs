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

//! Merge-aware reconstruction of a logical grid from raw cell rows.
//!
//! Raw rows come straight from the transport: ragged, with merged cells only
//! carrying a value in their top-left corner. [`reconstruct`] pads them into a
//! dense grid, fills every merged rectangle from its top-left cell, and drops
//! rows that end up completely blank while keeping the original row index on
//! every surviving row.

use crate::sheets::columns::{index_to_letters, letters_to_index};
use crate::utils::{SyncError, SyncResult};
use serde_json::Value;
use tracing::debug;

/// Rectangle of merged cells, inclusive on both ends, in zero-based sheet
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeRegion {
    pub start_row: usize,
    pub end_row: usize,
    pub start_col: usize,
    pub end_col: usize,
}

impl MergeRegion {
    pub fn new(
        start_row: usize,
        end_row: usize,
        start_col: usize,
        end_col: usize,
    ) -> SyncResult<Self> {
        if end_row < start_row || end_col < start_col {
            return Err(SyncError::MalformedRange(format!(
                "merge region rows {}..={} cols {}..={} ends before it starts",
                start_row, end_row, start_col, end_col
            )));
        }

        Ok(Self {
            start_row,
            end_row,
            start_col,
            end_col,
        })
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.start_row..=self.end_row).contains(&row)
            && (self.start_col..=self.end_col).contains(&col)
    }
}

/// A single grid cell after merge fill.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Zero-based sheet row.
    pub row: usize,
    /// Zero-based column.
    pub col: usize,
    pub value: Option<Value>,
    pub merge: Option<MergeRegion>,
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        self.value.as_ref().is_none_or(is_blank)
    }
}

/// A non-blank row of the reconstructed grid.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalRow {
    row_index: usize,
    cells: Vec<Cell>,
}

impl LogicalRow {
    /// Zero-based sheet row this row was read from. Never renumbered.
    pub fn row_index(&self) -> usize {
        self.row_index
    }

    /// One-based sheet row number.
    pub fn row_number(&self) -> usize {
        self.row_index + 1
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn value_at(&self, col: usize) -> Option<&Value> {
        self.cells.get(col).and_then(|cell| cell.value.as_ref())
    }

    pub fn value(&self, letters: &str) -> Option<&Value> {
        letters_to_index(letters).and_then(|col| self.value_at(col))
    }

    /// Column letters paired with cell values, in column order.
    pub fn columns(&self) -> impl Iterator<Item = (String, Option<&Value>)> + '_ {
        self.cells
            .iter()
            .map(|cell| (index_to_letters(cell.col), cell.value.as_ref()))
    }
}

/// Null and empty strings both count as an empty cell.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Builds logical rows from raw rows whose first entry sits on zero-based
/// sheet row `row_offset`.
///
/// Merge regions use absolute sheet coordinates. A region whose top-left
/// corner lies outside the rows and columns present in this grid is ignored;
/// one that starts inside but extends past the grid is clipped.
pub fn reconstruct(
    raw_rows: Vec<Vec<Value>>,
    merges: &[MergeRegion],
    row_offset: usize,
) -> Vec<LogicalRow> {
    let height = raw_rows.len();
    let width = raw_rows.iter().map(Vec::len).max().unwrap_or(0);

    let mut grid: Vec<Vec<Cell>> = raw_rows
        .into_iter()
        .enumerate()
        .map(|(r, row)| {
            let mut cells: Vec<Cell> = row
                .into_iter()
                .enumerate()
                .map(|(c, value)| Cell {
                    row: row_offset + r,
                    col: c,
                    value: match value {
                        Value::Null => None,
                        other => Some(other),
                    },
                    merge: None,
                })
                .collect();

            while cells.len() < width {
                cells.push(Cell {
                    row: row_offset + r,
                    col: cells.len(),
                    value: None,
                    merge: None,
                });
            }

            cells
        })
        .collect();

    for region in merges {
        if region.start_row < row_offset
            || region.start_row - row_offset >= height
            || region.start_col >= width
            || region.end_row < region.start_row
            || region.end_col < region.start_col
        {
            debug!(
                "Ignoring merge region {:?} outside grid rows {}..{}",
                region,
                row_offset,
                row_offset + height
            );
            continue;
        }

        let top = region.start_row - row_offset;
        let left = region.start_col;
        let bottom = region.end_row.saturating_sub(row_offset).min(height - 1);
        let right = region.end_col.min(width - 1);

        let anchor = grid[top][left].value.clone();

        for (r, row) in grid.iter_mut().enumerate().take(bottom + 1).skip(top) {
            for (c, cell) in row.iter_mut().enumerate().take(right + 1).skip(left) {
                cell.merge = Some(*region);
                if (r, c) != (top, left) {
                    cell.value = anchor.clone();
                }
            }
        }
    }

    grid.into_iter()
        .enumerate()
        .filter_map(|(r, cells)| {
            if cells.iter().all(Cell::is_blank) {
                None
            } else {
                Some(LogicalRow {
                    row_index: row_offset + r,
                    cells,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(values: &[Value]) -> Vec<Value> {
        values.to_vec()
    }

    #[test]
    fn test_merge_fills_whole_rectangle_from_top_left() {
        let raw = vec![
            row(&[json!("Group"), Value::Null, json!("x")]),
            row(&[Value::Null, Value::Null, json!("y")]),
        ];
        let merge = MergeRegion::new(0, 1, 0, 1).unwrap();

        let rows = reconstruct(raw, &[merge], 0);

        assert_eq!(rows.len(), 2);
        for logical in &rows {
            assert_eq!(logical.value("A"), Some(&json!("Group")));
            assert_eq!(logical.value("B"), Some(&json!("Group")));
            assert_eq!(logical.cells()[0].merge, Some(merge));
            assert_eq!(logical.cells()[2].merge, None);
        }
    }

    #[test]
    fn test_null_anchor_blanks_the_rest_of_the_merge() {
        let raw = vec![
            row(&[Value::Null, json!("stale"), json!("keep")]),
            row(&[json!("stale"), json!("stale"), json!("keep")]),
        ];
        let merge = MergeRegion::new(0, 1, 0, 1).unwrap();

        let rows = reconstruct(raw, &[merge], 0);

        for logical in &rows {
            assert_eq!(logical.value("A"), None);
            assert_eq!(logical.value("B"), None);
            assert_eq!(logical.value("C"), Some(&json!("keep")));
        }
    }

    #[test]
    fn test_blank_rows_are_removed_without_renumbering() {
        let raw = vec![
            row(&[json!("Alice"), json!("30")]),
            row(&[Value::Null, Value::Null]),
            row(&[json!("Bob"), json!("25")]),
        ];

        let rows = reconstruct(raw, &[], 1);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_index(), 1);
        assert_eq!(rows[0].row_number(), 2);
        assert_eq!(rows[1].row_index(), 3);
        assert_eq!(rows[1].row_number(), 4);
        assert_eq!(rows[1].value("A"), Some(&json!("Bob")));
    }

    #[test]
    fn test_empty_strings_count_as_blank() {
        let raw = vec![row(&[json!(""), json!("")]), row(&[json!("x")])];

        let rows = reconstruct(raw, &[], 0);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_index(), 1);
    }

    #[test]
    fn test_short_rows_are_padded_before_merge_fill() {
        let raw = vec![
            row(&[json!("a"), json!("b"), json!("merged")]),
            row(&[json!("c")]),
        ];
        let merge = MergeRegion::new(0, 1, 2, 2).unwrap();

        let rows = reconstruct(raw, &[merge], 0);

        assert_eq!(rows[1].cells().len(), 3);
        assert_eq!(rows[1].value("B"), None);
        assert_eq!(rows[1].value("C"), Some(&json!("merged")));
    }

    #[test]
    fn test_regions_outside_the_grid_are_ignored_and_overhangs_clipped() {
        let raw = vec![
            row(&[json!("a"), json!("b")]),
            row(&[json!("c"), Value::Null]),
        ];
        let above = MergeRegion::new(3, 5, 0, 1).unwrap();
        let right = MergeRegion::new(10, 10, 4, 6).unwrap();
        let overhang = MergeRegion::new(11, 40, 1, 9).unwrap();

        let rows = reconstruct(raw, &[above, right, overhang], 10);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value("A"), Some(&json!("a")));
        assert_eq!(rows[1].value("B"), None);
        assert_eq!(rows[1].cells()[1].merge, Some(overhang));
        assert_eq!(rows[0].cells()[1].merge, None);
    }

    #[test]
    fn test_columns_are_keyed_by_letters_in_order() {
        let mut values = vec![Value::Null; 28];
        values[0] = json!("first");
        values[27] = json!("last");

        let rows = reconstruct(vec![values], &[], 0);
        let columns: Vec<(String, Option<&Value>)> = rows[0].columns().collect();

        assert_eq!(columns.len(), 28);
        assert_eq!(columns[0], ("A".to_string(), Some(&json!("first"))));
        assert_eq!(columns[27], ("AB".to_string(), Some(&json!("last"))));
    }

    #[test]
    fn test_inverted_merge_region_is_rejected() {
        let result = MergeRegion::new(4, 2, 0, 0);
        assert!(matches!(result, Err(SyncError::MalformedRange(_))));
    }

    #[test]
    fn test_hand_built_inverted_region_is_ignored() {
        let raw = vec![row(&[json!("a")]), row(&[json!("b")])];
        let inverted = MergeRegion {
            start_row: 10,
            end_row: 2,
            start_col: 0,
            end_col: 0,
        };

        let rows = reconstruct(raw, &[inverted], 10);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].value("A"), Some(&json!("b")));
        assert_eq!(rows[0].cells()[0].merge, None);
    }
}
