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

//! Update-or-append planning.
//!
//! Turns candidate records into cell writes without touching the sheet.
//! Matched records overwrite their existing row; unmatched ones are appended
//! on consecutive rows after the last existing row.

use crate::config::TableConfig;
use crate::sheets::grid::is_blank;
use crate::sheets::identity::{IdentityIndex, IdentityRule};
use crate::sheets::positions::FieldPositionMap;
use crate::sheets::ranges::{CellAddress, CellRange};
use crate::sheets::records::{FieldMap, FieldValue, FileUpload};
use crate::utils::SyncResult;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Values for one horizontal run of adjacent cells.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOperation {
    pub range: CellRange,
    pub values: Vec<Value>,
}

/// A file queued for its cell once the scalar write has gone through.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
    pub field: String,
    pub address: CellAddress,
    pub file: FileUpload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Update,
    Append,
    Skip,
}

/// Decision taken for one candidate record, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRow {
    pub action: RowAction,
    /// One-based target row; `None` for skipped records.
    pub row_number: Option<usize>,
    pub identity: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertPlan {
    pub rows: Vec<PlannedRow>,
    pub writes: Vec<WriteOperation>,
    pub uploads: Vec<PendingUpload>,
    /// Rows the sheet must grow by before writing.
    pub rows_to_add: usize,
    pub highest_row_number: Option<usize>,
}

impl UpsertPlan {
    fn count(&self, action: RowAction) -> usize {
        self.rows.iter().filter(|row| row.action == action).count()
    }

    pub fn updated_count(&self) -> usize {
        self.count(RowAction::Update)
    }

    pub fn appended_count(&self) -> usize {
        self.count(RowAction::Append)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(RowAction::Skip)
    }

    pub fn is_noop(&self) -> bool {
        self.writes.is_empty() && self.uploads.is_empty() && self.rows_to_add == 0
    }
}

/// Plans the writes for `records` against the rows already in `index`.
///
/// `physical_row_count` is the sheet's current row count; any target row past
/// it becomes [`UpsertPlan::rows_to_add`].
pub fn plan_upsert(
    config: &TableConfig,
    positions: &FieldPositionMap,
    index: &IdentityIndex,
    records: &[FieldMap],
    physical_row_count: usize,
) -> SyncResult<UpsertPlan> {
    let rule = IdentityRule::from_config(config);
    let mut plan = UpsertPlan::default();

    let mut next_append_row = index
        .last_row_index()
        .map_or(config.data_start_row_number, |last| last + 2)
        .max(config.data_start_row_number);
    let mut appended: HashMap<String, usize> = HashMap::new();

    for record in records {
        // Stored rows only ever hash their mapped columns.
        let hash = rule.hash(
            record
                .iter()
                .filter(|(field, _)| positions.column_for_field(field).is_some())
                .map(|(field, value)| (field.as_str(), value.as_scalar())),
        );

        let (action, row_number) = if let Some(row_index) = index.row_index(&hash) {
            (RowAction::Update, row_index + 1)
        } else if let Some(row_number) = appended.get(&hash) {
            // Same identity appended earlier in this call.
            (RowAction::Update, *row_number)
        } else if config.skip_unmatched {
            debug!(
                "⏭️  Skipping unmatched record {}",
                &hash[..hash.len().min(12)]
            );
            plan.rows.push(PlannedRow {
                action: RowAction::Skip,
                row_number: None,
                identity: hash,
            });
            continue;
        } else {
            let row_number = next_append_row;
            next_append_row += 1;
            appended.insert(hash.clone(), row_number);
            (RowAction::Append, row_number)
        };

        plan.highest_row_number = Some(
            plan.highest_row_number
                .map_or(row_number, |highest| highest.max(row_number)),
        );

        emit_row(config, positions, record, row_number, &mut plan)?;

        plan.rows.push(PlannedRow {
            action,
            row_number: Some(row_number),
            identity: hash,
        });
    }

    plan.rows_to_add = plan
        .highest_row_number
        .map_or(0, |highest| highest.saturating_sub(physical_row_count));

    Ok(plan)
}

fn emit_row(
    config: &TableConfig,
    positions: &FieldPositionMap,
    record: &FieldMap,
    row_number: usize,
    plan: &mut UpsertPlan,
) -> SyncResult<()> {
    let mut cells: Vec<(usize, Value)> = Vec::new();

    for (field, value) in record {
        let Some(col) = positions.column_for_field(field) else {
            debug!("Field '{}' has no column, skipping", field);
            continue;
        };

        match value {
            FieldValue::File(file) => plan.uploads.push(PendingUpload {
                field: field.clone(),
                address: CellAddress::new(col, row_number),
                file: file.clone(),
            }),
            FieldValue::Scalar(scalar) if is_blank(scalar) => {
                if config.overwrite_existing {
                    // The values API leaves a cell untouched for null; an
                    // empty string clears it.
                    cells.push((col, Value::String(String::new())));
                }
            }
            FieldValue::Scalar(scalar) => cells.push((col, scalar.clone())),
        }
    }

    cells.sort_by_key(|(col, _)| *col);

    let mut run: Vec<(usize, Value)> = Vec::new();
    for cell in cells {
        if let Some((last_col, _)) = run.last()
            && cell.0 != last_col + 1
        {
            plan.writes.push(run_to_write(std::mem::take(&mut run), row_number)?);
        }
        run.push(cell);
    }
    if !run.is_empty() {
        plan.writes.push(run_to_write(run, row_number)?);
    }

    Ok(())
}

fn run_to_write(run: Vec<(usize, Value)>, row_number: usize) -> SyncResult<WriteOperation> {
    let first_col = run.first().map_or(0, |(col, _)| *col);
    let last_col = run.last().map_or(first_col, |(col, _)| *col);

    Ok(WriteOperation {
        range: CellRange::new(
            CellAddress::new(first_col, row_number),
            CellAddress::new(last_col, row_number),
        )?,
        values: run.into_iter().map(|(_, value)| value).collect(),
    })
}
