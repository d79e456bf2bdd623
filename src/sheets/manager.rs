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

//! Google Sheets implementation of [`SheetTransport`].

use crate::auth::credentials::CredentialCache;
use crate::auth::oauth::{self, AuthManager};
use crate::sheets::grid::MergeRegion;
use crate::sheets::ranges::{CellAddress, CellRange};
use crate::sheets::records::{FileContent, FileUpload};
use crate::sheets::transport::{Dimension, RangeRead, SheetDimensions, SheetTransport};
use crate::sheets::upsert::WriteOperation;
use crate::utils::{SyncError, SyncResult};
use google_sheets4::{
    Sheets,
    api::{
        AppendDimensionRequest, BatchUpdateSpreadsheetRequest, BatchUpdateValuesRequest, GridRange,
        Request, Sheet, ValueRange,
    },
    hyper_rustls,
};
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

const RATE_LIMIT_MAX_RETRIES: usize = 3;

const METADATA_FIELDS: &str = "sheets.properties(sheetId,title,gridProperties(rowCount,columnCount))";
const GRID_FIELDS: &str =
    "sheets(merges,data(startRow,startColumn,rowData(values(formattedValue))))";

/// Numeric id and size of the target worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WorksheetInfo {
    sheet_id: i32,
    dimensions: SheetDimensions,
}

pub struct SheetsManager {
    spreadsheet_id: String,
    worksheet: String,
    auth_manager: AuthManager,
    hub: Option<Sheets<oauth::HttpsConnector>>,
    worksheet_info: Option<WorksheetInfo>,
}

impl SheetsManager {
    fn is_rate_limit_error(error: &google_sheets4::Error) -> bool {
        let message = error.to_string().to_lowercase();
        message.contains("rate")
            || message.contains("quota")
            || message.contains("too many requests")
            || message.contains("429")
    }

    fn rate_limit_delay(attempt: usize) -> Duration {
        let base_ms: u64 = 500;
        let exponent = attempt.saturating_sub(1) as u32;
        let multiplier = 2_u64.saturating_pow(exponent).min(16);
        Duration::from_millis(base_ms * multiplier)
    }

    async fn call_with_rate_limit_retry<T, F, Fut>(
        description: &str,
        mut operation: F,
    ) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, google_sheets4::Error>>,
    {
        let mut attempt = 0usize;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err)
                    if attempt < RATE_LIMIT_MAX_RETRIES
                        && SheetsManager::is_rate_limit_error(&err) =>
                {
                    attempt += 1;
                    let delay = SheetsManager::rate_limit_delay(attempt);
                    warn!(
                        "🔁 {} hit Google rate limit (attempt {}/{}), retrying in {:?}",
                        description, attempt, RATE_LIMIT_MAX_RETRIES, delay
                    );
                    sleep(delay).await;
                }
                Err(err) => {
                    return Err(SyncError::Transport(format!("{} failed: {}", description, err)));
                }
            }
        }
    }

    /// Creates a manager for one worksheet of a spreadsheet. No request is
    /// made until the first operation.
    pub fn new(spreadsheet_id: String, worksheet: String, auth_manager: AuthManager) -> Self {
        Self {
            spreadsheet_id,
            worksheet,
            auth_manager,
            hub: None,
            worksheet_info: None,
        }
    }

    pub fn worksheet(&self) -> &str {
        &self.worksheet
    }

    async fn init_hub(&mut self) -> SyncResult<()> {
        if self.hub.is_some() {
            return Ok(());
        }

        info!("🔑 Initializing Google Sheets API connection...");

        let authenticator = self
            .auth_manager
            .authenticator()
            .await
            .map_err(|err| SyncError::Auth(format!("{:#}", err)))?;
        let credentials = CredentialCache::new(authenticator);

        // Fail here, before any sheet call, when the stored tokens are unusable.
        credentials.credential().await.map_err(|err| {
            SyncError::Auth(format!(
                "{}\nThe stored tokens are invalid or expired; run `sheets-table-sync auth` again.",
                err
            ))
        })?;

        let client = hyper_util::client::legacy::Client::builder(TokioExecutor::new()).build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()?
                .https_or_http()
                .enable_http1()
                .build(),
        );

        self.hub = Some(Sheets::new(client, credentials));

        info!("✅ Google Sheets API connection established");
        Ok(())
    }

    async fn get_hub(&mut self) -> SyncResult<&Sheets<oauth::HttpsConnector>> {
        self.init_hub().await?;
        self.hub
            .as_ref()
            .ok_or_else(|| SyncError::Transport("Failed to initialize Google Sheets hub".to_string()))
    }

    /// Fetches the worksheet's id and grid size.
    ///
    /// # Errors
    ///
    /// * If the spreadsheet cannot be read with the current credentials
    /// * If no worksheet carries the configured title
    async fn fetch_worksheet_info(&mut self) -> SyncResult<WorksheetInfo> {
        let spreadsheet_id = self.spreadsheet_id.clone();
        let worksheet = self.worksheet.clone();
        let hub = self.get_hub().await?;

        let (_, spreadsheet) =
            Self::call_with_rate_limit_retry("fetch spreadsheet metadata", || {
                let hub = hub;
                let spreadsheet_id = spreadsheet_id.clone();
                async move {
                    hub.spreadsheets()
                        .get(&spreadsheet_id)
                        .param("fields", METADATA_FIELDS)
                        .doit()
                        .await
                }
            })
            .await
            .map_err(|err| {
                SyncError::Transport(format!(
                    "Failed to access spreadsheet '{}'. Check the ID and your access to it.\n{}",
                    spreadsheet_id, err
                ))
            })?;

        for sheet in spreadsheet.sheets.unwrap_or_default() {
            if let Some(properties) = sheet.properties
                && properties.title.as_deref() == Some(worksheet.as_str())
                && let Some(sheet_id) = properties.sheet_id
            {
                let grid = properties.grid_properties.unwrap_or_default();
                let info = WorksheetInfo {
                    sheet_id,
                    dimensions: SheetDimensions {
                        row_count: to_index(grid.row_count),
                        column_count: to_index(grid.column_count),
                    },
                };
                debug!("✅ Found worksheet '{}' with ID: {}", worksheet, sheet_id);
                self.worksheet_info = Some(info);
                return Ok(info);
            }
        }

        Err(SyncError::Config(format!(
            "Worksheet '{}' not found in spreadsheet '{}'",
            worksheet, spreadsheet_id
        )))
    }

    async fn sheet_id(&mut self) -> SyncResult<i32> {
        match self.worksheet_info {
            Some(info) => Ok(info.sheet_id),
            None => Ok(self.fetch_worksheet_info().await?.sheet_id),
        }
    }
}

impl SheetTransport for SheetsManager {
    async fn sheet_dimensions(&mut self) -> SyncResult<SheetDimensions> {
        Ok(self.fetch_worksheet_info().await?.dimensions)
    }

    async fn read_range(&mut self, range: &CellRange) -> SyncResult<RangeRead> {
        let spreadsheet_id = self.spreadsheet_id.clone();
        let a1 = range.to_a1(&self.worksheet);
        debug!("📖 Reading {}", a1);
        let hub = self.get_hub().await?;

        let (_, spreadsheet) = Self::call_with_rate_limit_retry("read worksheet range", || {
            let hub = hub;
            let spreadsheet_id = spreadsheet_id.clone();
            let a1 = a1.clone();
            async move {
                hub.spreadsheets()
                    .get(&spreadsheet_id)
                    .add_ranges(&a1)
                    .include_grid_data(true)
                    .param("fields", GRID_FIELDS)
                    .doit()
                    .await
            }
        })
        .await?;

        let sheet = spreadsheet
            .sheets
            .and_then(|sheets| sheets.into_iter().next())
            .unwrap_or_default();

        Ok(range_read_from_sheet(sheet, range))
    }

    async fn write_cells(&mut self, writes: &[WriteOperation]) -> SyncResult<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let spreadsheet_id = self.spreadsheet_id.clone();
        let data: Vec<ValueRange> = writes
            .iter()
            .map(|write| ValueRange {
                range: Some(write.range.to_a1(&self.worksheet)),
                values: Some(vec![write.values.clone()]),
                major_dimension: Some("ROWS".to_string()),
                ..Default::default()
            })
            .collect();

        let request = BatchUpdateValuesRequest {
            value_input_option: Some("USER_ENTERED".to_string()),
            data: Some(data),
            ..Default::default()
        };

        info!(
            "🚀 Writing {} ranges to '{}'",
            writes.len(),
            self.worksheet
        );

        let hub = self.get_hub().await?;
        let (_, response) = Self::call_with_rate_limit_retry("batch update worksheet values", || {
            let hub = hub;
            let spreadsheet_id = spreadsheet_id.clone();
            let request = request.clone();
            async move {
                hub.spreadsheets()
                    .values_batch_update(request, &spreadsheet_id)
                    .doit()
                    .await
            }
        })
        .await?;

        debug!(
            "✅ Updated {} cells",
            response.total_updated_cells.unwrap_or(0)
        );
        Ok(())
    }

    async fn grow_dimension(&mut self, dimension: Dimension, count: usize) -> SyncResult<()> {
        if count == 0 {
            return Ok(());
        }

        let spreadsheet_id = self.spreadsheet_id.clone();
        let sheet_id = self.sheet_id().await?;
        let length = i32::try_from(count).map_err(|_| {
            SyncError::MalformedRange(format!("cannot grow by {} {:?}", count, dimension))
        })?;

        let request = BatchUpdateSpreadsheetRequest {
            requests: Some(vec![Request {
                append_dimension: Some(AppendDimensionRequest {
                    sheet_id: Some(sheet_id),
                    dimension: Some(dimension_name(dimension).to_string()),
                    length: Some(length),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        };

        let hub = self.get_hub().await?;
        Self::call_with_rate_limit_retry("append worksheet dimension", || {
            let hub = hub;
            let spreadsheet_id = spreadsheet_id.clone();
            let request = request.clone();
            async move {
                hub.spreadsheets()
                    .batch_update(request, &spreadsheet_id)
                    .doit()
                    .await
            }
        })
        .await?;

        if let Some(info) = self.worksheet_info.as_mut() {
            match dimension {
                Dimension::Rows => info.dimensions.row_count += count,
                Dimension::Columns => info.dimensions.column_count += count,
            }
        }
        Ok(())
    }

    async fn upload_file(&mut self, file: &FileUpload, address: &CellAddress) -> SyncResult<()> {
        let FileContent::Url(url) = &file.content else {
            return Err(SyncError::Upload(format!(
                "'{}' has raw bytes; Google Sheets only accepts images by URL",
                file.file_name
            )));
        };

        let spreadsheet_id = self.spreadsheet_id.clone();
        let target = CellRange::single(*address)?.to_a1(&self.worksheet);
        let value_range = ValueRange {
            range: Some(target.clone()),
            values: Some(vec![vec![Value::String(image_formula(url))]]),
            major_dimension: Some("ROWS".to_string()),
            ..Default::default()
        };

        let hub = self.get_hub().await?;
        Self::call_with_rate_limit_retry("place image", || {
            let hub = hub;
            let spreadsheet_id = spreadsheet_id.clone();
            let target = target.clone();
            let values = value_range.clone();
            async move {
                hub.spreadsheets()
                    .values_update(values, &spreadsheet_id, &target)
                    .value_input_option("USER_ENTERED")
                    .doit()
                    .await
            }
        })
        .await
        .map_err(|err| SyncError::Upload(format!("{}: {}", file.file_name, err)))?;

        debug!("🖼️  Placed '{}' at {}", file.file_name, address);
        Ok(())
    }
}

fn dimension_name(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Rows => "ROWS",
        Dimension::Columns => "COLUMNS",
    }
}

fn to_index(value: Option<i32>) -> usize {
    value.map_or(0, |v| v.max(0) as usize)
}

fn image_formula(url: &str) -> String {
    format!("=IMAGE(\"{}\")", url.replace('"', "\"\""))
}

/// Converts a `spreadsheets.get` grid response into rows relative to
/// `range` plus absolute merge regions.
fn range_read_from_sheet(sheet: Sheet, range: &CellRange) -> RangeRead {
    let range_top = range.start().row - 1;
    let mut rows: Vec<Vec<Value>> = Vec::new();

    for grid in sheet.data.unwrap_or_default() {
        let leading_rows = to_index(grid.start_row).saturating_sub(range_top);
        let leading_cols = to_index(grid.start_column).saturating_sub(range.start().col);
        rows.resize_with(leading_rows, Vec::new);

        for row_data in grid.row_data.unwrap_or_default() {
            let mut row = vec![Value::Null; leading_cols];
            row.extend(row_data.values.unwrap_or_default().into_iter().map(|cell| {
                cell.formatted_value
                    .filter(|text| !text.is_empty())
                    .map_or(Value::Null, Value::String)
            }));
            rows.push(row);
        }
    }

    let merges = sheet
        .merges
        .unwrap_or_default()
        .iter()
        .filter_map(|grid_range| merge_from_grid_range(grid_range, range))
        .collect();

    RangeRead { rows, merges }
}

/// Grid ranges are half-open; missing bounds mean "to the edge", which is
/// clipped to the requested range.
fn merge_from_grid_range(grid_range: &GridRange, range: &CellRange) -> Option<MergeRegion> {
    let start_row = to_index(grid_range.start_row_index);
    let start_col = to_index(grid_range.start_column_index);
    let end_row = grid_range
        .end_row_index
        .map_or(range.end().row, |v| v.max(0) as usize);
    let end_col = grid_range
        .end_column_index
        .map_or(range.end().col + 1, |v| v.max(0) as usize);

    if end_row <= start_row || end_col <= start_col {
        return None;
    }

    MergeRegion::new(start_row, end_row - 1, start_col, end_col - 1).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_sheets4::api::{CellData, GridData, RowData};
    use serde_json::json;

    fn cell(text: Option<&str>) -> CellData {
        CellData {
            formatted_value: text.map(str::to_string),
            ..Default::default()
        }
    }

    fn row(cells: &[Option<&str>]) -> RowData {
        RowData {
            values: Some(cells.iter().map(|c| cell(*c)).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_rate_limit_delay_backs_off_and_caps() {
        assert_eq!(SheetsManager::rate_limit_delay(1), Duration::from_millis(500));
        assert_eq!(SheetsManager::rate_limit_delay(2), Duration::from_millis(1000));
        assert_eq!(SheetsManager::rate_limit_delay(3), Duration::from_millis(2000));
        assert_eq!(SheetsManager::rate_limit_delay(10), Duration::from_millis(8000));
    }

    #[test]
    fn test_grid_data_becomes_rows_relative_to_the_range() {
        let range = CellRange::rows(11, 14, 3).unwrap();
        let sheet = Sheet {
            data: Some(vec![GridData {
                start_row: Some(11),
                start_column: Some(0),
                row_data: Some(vec![
                    row(&[Some("Alice"), Some(""), Some("30")]),
                    row(&[]),
                    row(&[Some("Bob")]),
                ]),
                ..Default::default()
            }]),
            merges: Some(vec![GridRange {
                sheet_id: Some(0),
                start_row_index: Some(11),
                end_row_index: Some(13),
                start_column_index: Some(0),
                end_column_index: Some(1),
                ..Default::default()
            }]),
            ..Default::default()
        };

        let read = range_read_from_sheet(sheet, &range);

        assert_eq!(
            read.rows,
            vec![
                vec![],
                vec![json!("Alice"), Value::Null, json!("30")],
                vec![],
                vec![json!("Bob")],
            ]
        );
        assert_eq!(read.merges, vec![MergeRegion::new(11, 12, 0, 0).unwrap()]);
    }

    #[test]
    fn test_unbounded_merges_are_clipped_to_the_range() {
        let range = CellRange::rows(2, 5, 4).unwrap();
        let open = GridRange {
            start_row_index: Some(3),
            start_column_index: Some(2),
            ..Default::default()
        };
        let empty = GridRange {
            start_row_index: Some(3),
            end_row_index: Some(3),
            ..Default::default()
        };

        assert_eq!(
            merge_from_grid_range(&open, &range),
            Some(MergeRegion::new(3, 4, 2, 3).unwrap())
        );
        assert_eq!(merge_from_grid_range(&empty, &range), None);
    }

    #[test]
    fn test_image_urls_become_quoted_formulas() {
        assert_eq!(
            image_formula("https://example.com/a.png"),
            "=IMAGE(\"https://example.com/a.png\")"
        );
        assert_eq!(image_formula("x\"y"), "=IMAGE(\"x\"\"y\")");
    }

    #[test]
    fn test_dimensions_map_to_api_names() {
        assert_eq!(dimension_name(Dimension::Rows), "ROWS");
        assert_eq!(dimension_name(Dimension::Columns), "COLUMNS");
        assert_eq!(to_index(Some(-1)), 0);
        assert_eq!(to_index(None), 0);
    }
}
