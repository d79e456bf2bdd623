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

//! Configuration management for sheets-table-sync.
//!
//! [`TableConfig`] describes the layout and upsert policy of one worksheet
//! table and is passed by reference into every engine call. [`Config`] holds
//! the runtime settings of a CLI invocation.

use crate::utils::{SyncError, SyncResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_ROW_LIMIT: usize = 100;

/// Layout and write policy of a worksheet table.
///
/// Read-only for the duration of an operation; the engine never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableConfig {
    /// Worksheet (tab) title holding the table
    pub worksheet: String,
    /// One-based row whose cells name the fields
    pub title_row_number: usize,
    /// One-based row of the first record
    pub data_start_row_number: usize,
    /// Fields that identify a row; empty means the whole record
    pub unique_key_field_names: BTreeSet<String>,
    /// Fields left out of whole-record identity hashing
    pub ignored_field_names: BTreeSet<String>,
    /// Write nulls over existing cell content
    pub overwrite_existing: bool,
    /// Drop records that match no existing row instead of appending them
    pub skip_unmatched: bool,
    /// A category row sits directly above the title row
    pub grouped_header: bool,
    /// Maximum rows fetched per read call
    pub batch_row_limit: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            worksheet: "Sheet1".to_string(),
            title_row_number: 1,
            data_start_row_number: 2,
            unique_key_field_names: BTreeSet::new(),
            ignored_field_names: BTreeSet::new(),
            overwrite_existing: false,
            skip_unmatched: false,
            grouped_header: false,
            batch_row_limit: DEFAULT_BATCH_ROW_LIMIT,
        }
    }
}

impl TableConfig {
    pub fn new(worksheet: impl Into<String>) -> Self {
        Self {
            worksheet: worksheet.into(),
            ..Default::default()
        }
    }

    pub fn with_title_row(mut self, title_row_number: usize) -> Self {
        self.title_row_number = title_row_number;
        self
    }

    pub fn with_data_start_row(mut self, data_start_row_number: usize) -> Self {
        self.data_start_row_number = data_start_row_number;
        self
    }

    pub fn with_unique_keys<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_key_field_names = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ignored_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_field_names = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_overwrite_existing(mut self, overwrite_existing: bool) -> Self {
        self.overwrite_existing = overwrite_existing;
        self
    }

    pub fn with_skip_unmatched(mut self, skip_unmatched: bool) -> Self {
        self.skip_unmatched = skip_unmatched;
        self
    }

    pub fn with_grouped_header(mut self, grouped_header: bool) -> Self {
        self.grouped_header = grouped_header;
        self
    }

    pub fn with_batch_row_limit(mut self, batch_row_limit: usize) -> Self {
        self.batch_row_limit = batch_row_limit;
        self
    }

    /// Loads a table configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read table config: {:?}", path))?;
        let config: TableConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse table config: {:?}", path))?;
        Ok(config)
    }

    /// One-based row of the first header line (the category row for grouped
    /// tables, otherwise the title row).
    pub fn header_start_row_number(&self) -> usize {
        if self.grouped_header {
            self.title_row_number - 1
        } else {
            self.title_row_number
        }
    }

    pub fn batch_cap(&self) -> SyncResult<NonZeroUsize> {
        NonZeroUsize::new(self.batch_row_limit)
            .ok_or_else(|| SyncError::Config("Batch row limit must be at least 1".to_string()))
    }

    /// Validates the table layout.
    ///
    /// # Errors
    ///
    /// * If the worksheet name is empty
    /// * If the title row is 0, or 1 for a grouped header
    /// * If data does not start below the title row
    /// * If the batch row limit is 0
    pub fn validate(&self) -> SyncResult<()> {
        if self.worksheet.trim().is_empty() {
            return Err(SyncError::Config("Worksheet name cannot be empty".to_string()));
        }

        if self.title_row_number == 0 {
            return Err(SyncError::Config(
                "Title row number is one-based and cannot be 0".to_string(),
            ));
        }

        if self.grouped_header && self.title_row_number < 2 {
            return Err(SyncError::Config(
                "Grouped headers need a category row above the title row".to_string(),
            ));
        }

        if self.data_start_row_number <= self.title_row_number {
            return Err(SyncError::Config(format!(
                "Data start row {} must be below title row {}",
                self.data_start_row_number, self.title_row_number
            )));
        }

        self.batch_cap()?;
        Ok(())
    }
}

/// Operation modes supported by the application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OperationMode {
    /// Read records from the sheet
    Read,
    /// Update matching rows and append the rest
    Upsert,
    /// Upsert, then read the table back
    FullSync,
}

/// Runtime settings of one CLI invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Google spreadsheet ID to synchronize with
    pub spreadsheet_id: String,
    /// Selected operation mode
    pub mode: OperationMode,
    /// JSON file with candidate records
    pub records_path: Option<PathBuf>,
    /// JSON file receiving the records read back
    pub output_path: Option<PathBuf>,
    /// Whether to run in dry-run mode (no actual changes)
    pub dry_run: bool,
    /// Add each record's sheet row and identity hash to the output file
    pub include_row_metadata: bool,
    pub table: TableConfig,
}

impl Config {
    pub fn new(spreadsheet_id: String, mode: OperationMode, table: TableConfig) -> Self {
        Self {
            spreadsheet_id,
            mode,
            records_path: None,
            output_path: None,
            dry_run: false,
            include_row_metadata: false,
            table,
        }
    }

    pub fn with_records_path(mut self, records_path: Option<PathBuf>) -> Self {
        self.records_path = records_path;
        self
    }

    pub fn with_output_path(mut self, output_path: Option<PathBuf>) -> Self {
        self.output_path = output_path;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_row_metadata(mut self, include_row_metadata: bool) -> Self {
        self.include_row_metadata = include_row_metadata;
        self
    }

    /// Validates the configuration settings.
    ///
    /// # Errors
    ///
    /// * If spreadsheet ID is empty
    /// * If the mode writes records and no readable records file is given
    /// * If the table layout is invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.spreadsheet_id.is_empty() {
            anyhow::bail!("Spreadsheet ID cannot be empty");
        }

        if self.mode != OperationMode::Read {
            let Some(records_path) = &self.records_path else {
                anyhow::bail!("A records file is required for {:?}", self.mode);
            };

            if !records_path.is_file() {
                anyhow::bail!("Records file does not exist: {:?}", records_path);
            }
        }

        self.table.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Helper function to create a temporary directory for testing
    fn create_temp_dir() -> TempDir {
        TempDir::new().expect("Failed to create temporary directory")
    }

    #[test]
    fn test_table_config_defaults() {
        let table = TableConfig::new("People");

        assert_eq!(table.worksheet, "People");
        assert_eq!(table.title_row_number, 1);
        assert_eq!(table.data_start_row_number, 2);
        assert_eq!(table.batch_row_limit, DEFAULT_BATCH_ROW_LIMIT);
        assert!(table.unique_key_field_names.is_empty());
        assert!(!table.overwrite_existing);
        assert!(!table.skip_unmatched);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_table_config_builder() {
        let table = TableConfig::new("People")
            .with_title_row(2)
            .with_data_start_row(3)
            .with_unique_keys(["Name", "Email"])
            .with_ignored_fields(["Updated"])
            .with_overwrite_existing(true)
            .with_skip_unmatched(true)
            .with_grouped_header(true)
            .with_batch_row_limit(50);

        assert_eq!(table.header_start_row_number(), 1);
        assert_eq!(
            table.unique_key_field_names.iter().collect::<Vec<_>>(),
            vec!["Email", "Name"]
        );
        assert_eq!(table.batch_cap().unwrap().get(), 50);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_table_config_rejects_bad_layouts() {
        let cases = [
            (TableConfig::new(" "), "Worksheet name"),
            (TableConfig::new("T").with_title_row(0), "cannot be 0"),
            (TableConfig::new("T").with_grouped_header(true), "category row"),
            (TableConfig::new("T").with_data_start_row(1), "must be below"),
            (TableConfig::new("T").with_batch_row_limit(0), "at least 1"),
        ];

        for (table, expected) in cases {
            let err = table.validate().unwrap_err();
            assert!(matches!(err, SyncError::Config(_)));
            assert!(err.to_string().contains(expected), "{err}");
        }
    }

    #[test]
    fn test_table_config_load_from_json() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("table.json");
        fs::write(
            &path,
            r#"{"worksheet": "People", "unique_key_field_names": ["Name"], "skip_unmatched": true}"#,
        )
        .unwrap();

        let table = TableConfig::load(&path).unwrap();

        assert_eq!(table.worksheet, "People");
        assert!(table.unique_key_field_names.contains("Name"));
        assert!(table.skip_unmatched);
        assert_eq!(table.data_start_row_number, 2);
    }

    #[test]
    fn test_table_config_load_rejects_unknown_keys() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("table.json");
        fs::write(&path, r#"{"worksheet": "People", "head_line": 3}"#).unwrap();

        let result = TableConfig::load(&path);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse table config")
        );
    }

    #[test]
    fn test_config_validation_success() {
        let temp_dir = create_temp_dir();
        let records = temp_dir.path().join("records.json");
        fs::write(&records, "[]").unwrap();

        let config = Config::new(
            "sheet".to_string(),
            OperationMode::Upsert,
            TableConfig::new("People"),
        )
        .with_records_path(Some(records))
        .with_dry_run(true);

        assert!(config.validate().is_ok());
        assert!(config.dry_run);
    }

    #[test]
    fn test_config_validation_empty_spreadsheet_id() {
        let config = Config::new(String::new(), OperationMode::Read, TableConfig::default());

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Spreadsheet ID cannot be empty")
        );
    }

    #[test]
    fn test_config_validation_missing_records() {
        let config = Config::new(
            "sheet".to_string(),
            OperationMode::FullSync,
            TableConfig::default(),
        );
        assert!(config.validate().is_err());

        let config = config.with_records_path(Some(PathBuf::from("/nonexistent/records.json")));
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_operation_mode_serialization() {
        let mode = OperationMode::Upsert;
        let serialized = serde_json::to_string(&mode).expect("Failed to serialize");
        let deserialized: OperationMode =
            serde_json::from_str(&serialized).expect("Failed to deserialize");
        assert_eq!(mode, deserialized);
    }
}
