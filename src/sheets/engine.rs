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

//! Reads worksheet tables as records and upserts records into them.
//!
//! Every call rebuilds the table state from the sheet: dimensions, header
//! rows, chunked data reads, merge-aware reconstruction and the identity
//! index. Nothing is cached between calls.

use crate::config::TableConfig;
use crate::sheets::grid::{LogicalRow, MergeRegion, reconstruct};
use crate::sheets::identity::{IdentityIndex, IdentityRule};
use crate::sheets::positions::FieldPositionMap;
use crate::sheets::ranges::{CellAddress, CellRange, plan_batches};
use crate::sheets::records::{FieldMap, Record};
use crate::sheets::transport::{Dimension, SheetDimensions, SheetTransport};
use crate::sheets::upsert::{UpsertPlan, plan_upsert};
use crate::utils::SyncResult;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Outcome of an upsert. Scalar writes either all happened or the call
/// returned an error; uploads are best-effort and reported here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteResult {
    pub updated_count: usize,
    pub appended_count: usize,
    pub skipped_count: usize,
    pub upload_failures: Vec<UploadFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadFailure {
    pub field: String,
    pub file_name: String,
    pub address: CellAddress,
    pub reason: String,
}

/// State of a table as read in one pass.
struct TableSnapshot {
    dimensions: SheetDimensions,
    positions: FieldPositionMap,
    index: IdentityIndex,
    records: Vec<Record>,
}

pub struct TableSynchronizer<T: SheetTransport> {
    transport: T,
}

impl<T: SheetTransport> TableSynchronizer<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Reads every non-blank data row as a record.
    pub async fn read_records(&mut self, config: &TableConfig) -> SyncResult<Vec<Record>> {
        let snapshot = self.load_table(config).await?;
        info!(
            "📖 Read {} records from '{}'",
            snapshot.records.len(),
            config.worksheet
        );
        Ok(snapshot.records)
    }

    /// Plans an upsert without writing anything.
    pub async fn preview_upsert(
        &mut self,
        config: &TableConfig,
        records: &[FieldMap],
    ) -> SyncResult<UpsertPlan> {
        let snapshot = self.load_table(config).await?;
        if snapshot.positions.is_empty() && !records.is_empty() {
            warn!(
                "⚠️  Title row {} of '{}' is empty; no field can be written",
                config.title_row_number, config.worksheet
            );
        }

        plan_upsert(
            config,
            &snapshot.positions,
            &snapshot.index,
            records,
            snapshot.dimensions.row_count,
        )
    }

    /// Updates rows matching the records' identity and appends the rest.
    ///
    /// The sheet is grown first when appended rows run past its end, then
    /// all scalar cells go out in one write. Either failing fails the call.
    /// File uploads follow, one at a time; their failures are collected in
    /// the result.
    pub async fn upsert(
        &mut self,
        config: &TableConfig,
        records: &[FieldMap],
    ) -> SyncResult<WriteResult> {
        let plan = self.preview_upsert(config, records).await?;

        if plan.rows_to_add > 0 {
            info!(
                "➕ Growing '{}' by {} rows",
                config.worksheet, plan.rows_to_add
            );
            self.transport
                .grow_dimension(Dimension::Rows, plan.rows_to_add)
                .await?;
        }

        if !plan.writes.is_empty() {
            debug!("💾 Writing {} ranges", plan.writes.len());
            self.transport.write_cells(&plan.writes).await?;
        }

        let mut upload_failures = Vec::new();
        for upload in &plan.uploads {
            if let Err(err) = self
                .transport
                .upload_file(&upload.file, &upload.address)
                .await
            {
                warn!(
                    "⚠️  Upload of '{}' to {} failed: {}",
                    upload.file.file_name, upload.address, err
                );
                upload_failures.push(UploadFailure {
                    field: upload.field.clone(),
                    file_name: upload.file.file_name.clone(),
                    address: upload.address,
                    reason: err.to_string(),
                });
            }
        }

        let result = WriteResult {
            updated_count: plan.updated_count(),
            appended_count: plan.appended_count(),
            skipped_count: plan.skipped_count(),
            upload_failures,
        };

        info!(
            "✅ Upsert into '{}': {} updated, {} appended, {} skipped",
            config.worksheet, result.updated_count, result.appended_count, result.skipped_count
        );
        Ok(result)
    }

    async fn load_table(&mut self, config: &TableConfig) -> SyncResult<TableSnapshot> {
        config.validate()?;

        let dimensions = self.transport.sheet_dimensions().await?;
        debug!(
            "📐 '{}' is {} rows x {} columns",
            config.worksheet, dimensions.row_count, dimensions.column_count
        );

        let mut snapshot = TableSnapshot {
            dimensions,
            positions: FieldPositionMap::default(),
            index: IdentityIndex::new(),
            records: Vec::new(),
        };

        if dimensions.column_count == 0 || dimensions.row_count < config.title_row_number {
            return Ok(snapshot);
        }

        snapshot.positions = self.read_positions(config, dimensions).await?;

        let rule = IdentityRule::from_config(config);
        for row in self.read_data_rows(config, dimensions).await? {
            let fields = snapshot.positions.record_fields(&row);
            let identity = rule.identify(
                fields.iter().map(|(name, value)| (name.as_str(), Some(value))),
                row.row_number(),
            );
            snapshot.index.insert(&identity);
            snapshot.records.push(Record {
                fields,
                row_number: identity.source_row_number,
                identity: identity.hash,
            });
        }

        Ok(snapshot)
    }

    async fn read_positions(
        &mut self,
        config: &TableConfig,
        dimensions: SheetDimensions,
    ) -> SyncResult<FieldPositionMap> {
        let first_row = config.header_start_row_number();
        let range = CellRange::rows(first_row, config.title_row_number, dimensions.column_count)?;
        let read = self.transport.read_range(&range).await?;

        let raw = pad_rows(read.rows, range.height());
        let header = reconstruct(raw, &read.merges, first_row - 1);

        let title_index = config.title_row_number - 1;
        let positions = FieldPositionMap::from_titles(&header_cells(&header, title_index));
        if config.grouped_header {
            Ok(positions.with_categories(&header_cells(&header, title_index - 1)))
        } else {
            Ok(positions)
        }
    }

    async fn read_data_rows(
        &mut self,
        config: &TableConfig,
        dimensions: SheetDimensions,
    ) -> SyncResult<Vec<LogicalRow>> {
        let data_start = config.data_start_row_number - 1;
        let batches = plan_batches(dimensions.row_count, data_start, config.batch_cap()?);
        debug!(
            "📋 Reading rows {}..{} of '{}' in {} batches",
            config.data_start_row_number,
            dimensions.row_count,
            config.worksheet,
            batches.len()
        );

        let mut raw: Vec<Vec<Value>> = Vec::new();
        let mut merges: Vec<MergeRegion> = Vec::new();
        let mut seen: HashSet<MergeRegion> = HashSet::new();

        for batch in batches {
            let range =
                CellRange::rows(batch.start + 1, batch.end + 1, dimensions.column_count)?;
            let read = self.transport.read_range(&range).await?;
            raw.extend(pad_rows(read.rows, batch.height()));
            merges.extend(read.merges.into_iter().filter(|region| seen.insert(*region)));
        }

        Ok(reconstruct(raw, &merges, data_start))
    }
}

/// Brings a read up to `height` rows; the transport leaves out trailing
/// blank rows.
fn pad_rows(mut rows: Vec<Vec<Value>>, height: usize) -> Vec<Vec<Value>> {
    rows.resize_with(height, Vec::new);
    rows
}

fn header_cells(header: &[LogicalRow], row_index: usize) -> Vec<Option<Value>> {
    header
        .iter()
        .find(|row| row.row_index() == row_index)
        .map(|row| row.cells().iter().map(|cell| cell.value.clone()).collect())
        .unwrap_or_default()
}
