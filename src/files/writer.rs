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

use crate::sheets::records::Record;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::info;

/// Member carrying the one-based sheet row of each written record.
pub const ROW_NUMBER_FIELD: &str = "_row";
/// Member carrying the identity hash of each written record.
pub const IDENTITY_FIELD: &str = "_identity";

#[derive(Debug, Default)]
pub struct RecordWriter {
    include_row_metadata: bool,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `_row` (one-based sheet row) and `_identity` (identity hash)
    /// members to every record.
    pub fn with_row_metadata(mut self, include_row_metadata: bool) -> Self {
        self.include_row_metadata = include_row_metadata;
        self
    }

    /// Write records to a JSON file as an array of objects.
    ///
    /// # Arguments
    ///
    /// * `file_path` - Path to the JSON file to write
    /// * `records` - Records in sheet order
    pub fn write_records<P: AsRef<Path>>(&self, file_path: P, records: &[Record]) -> Result<()> {
        let file_path = file_path.as_ref();
        info!(
            "✍️  Writing {} records to: {:?}",
            records.len(),
            file_path
        );

        if let Some(parent) = file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {:?}", parent))?;
        }

        let json_value = Value::Array(records.iter().map(|r| self.to_json(r)).collect());
        let json_string =
            serde_json::to_string_pretty(&json_value).context("Failed to serialize JSON")?;

        fs::write(file_path, json_string)
            .context(format!("Failed to write file: {:?}", file_path))?;

        info!("✅ Successfully wrote records to: {:?}", file_path);
        Ok(())
    }

    /// Create a backup copy of a file before overwriting it.
    ///
    /// `people.json` is copied to `people.json.backup`. Missing files are
    /// left alone.
    pub fn backup_file<P: AsRef<Path>>(&self, file_path: P) -> Result<()> {
        let file_path = file_path.as_ref();

        if !file_path.exists() {
            return Ok(());
        }

        let backup_path = file_path.with_extension(format!(
            "{}.backup",
            file_path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("json")
        ));

        fs::copy(file_path, &backup_path).context(format!(
            "Failed to create backup: {:?} -> {:?}",
            file_path, backup_path
        ))?;

        info!("📁 Created backup: {:?}", backup_path);
        Ok(())
    }

    fn to_json(&self, record: &Record) -> Value {
        let mut object: Map<String, Value> = record
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if self.include_row_metadata {
            object.insert(ROW_NUMBER_FIELD.to_string(), Value::from(record.row_number));
            object.insert(
                IDENTITY_FIELD.to_string(),
                Value::String(record.identity.clone()),
            );
        }
        Value::Object(object)
    }
}
