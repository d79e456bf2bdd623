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

//! Remote operations the synchronizer consumes.

use crate::sheets::grid::MergeRegion;
use crate::sheets::ranges::{CellAddress, CellRange};
use crate::sheets::records::FileUpload;
use crate::sheets::upsert::WriteOperation;
use crate::utils::SyncResult;
use serde_json::Value;

/// Physical size of the worksheet grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetDimensions {
    pub row_count: usize,
    pub column_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Rows,
    Columns,
}

/// Raw result of reading one range.
///
/// `rows[0]` is the first row of the requested range. Trailing blank rows
/// and trailing blank cells may be omitted. Merge regions use absolute,
/// zero-based sheet coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeRead {
    pub rows: Vec<Vec<Value>>,
    pub merges: Vec<MergeRegion>,
}

/// A worksheet the synchronizer can read from and write to.
///
/// Every call addresses the worksheet the transport was opened on.
#[allow(async_fn_in_trait)]
pub trait SheetTransport {
    async fn sheet_dimensions(&mut self) -> SyncResult<SheetDimensions>;

    async fn read_range(&mut self, range: &CellRange) -> SyncResult<RangeRead>;

    /// Writes every operation in a single request.
    async fn write_cells(&mut self, writes: &[WriteOperation]) -> SyncResult<()>;

    /// Appends `count` empty rows or columns at the end of the sheet.
    async fn grow_dimension(&mut self, dimension: Dimension, count: usize) -> SyncResult<()>;

    async fn upload_file(&mut self, file: &FileUpload, address: &CellAddress) -> SyncResult<()>;
}
