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

use crate::config::Config;
use crate::files::RecordWriter;
use crate::sheets::records::Record;
use crate::sheets::{SheetTransport, TableSynchronizer};
use crate::sync::connect;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct ReadMode;

impl ReadMode {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, config: &Config, token_path: PathBuf) -> Result<()> {
        info!("🔄 Executing Read mode");

        let mut synchronizer = connect(config, token_path);
        let records = self.run(&mut synchronizer, config).await?;

        if config.output_path.is_none() {
            for record in &records {
                let json = Value::Object(record.fields.clone().into_iter().collect());
                info!("  📄 Row {}: {}", record.row_number, json);
            }
        }

        Ok(())
    }

    /// Reads the table and writes it to the output file, if one is set.
    pub async fn run<T: SheetTransport>(
        &self,
        synchronizer: &mut TableSynchronizer<T>,
        config: &Config,
    ) -> Result<Vec<Record>> {
        let records = synchronizer
            .read_records(&config.table)
            .await
            .with_context(|| format!("Failed to read worksheet '{}'", config.table.worksheet))?;

        if let Some(output_path) = &config.output_path {
            self.write_output(output_path, &records, config)?;
        }

        Ok(records)
    }

    fn write_output(
        &self,
        output_path: &Path,
        records: &[Record],
        config: &Config,
    ) -> Result<()> {
        if config.dry_run {
            info!(
                "🔍 DRY RUN: Would write {} records to {:?}",
                records.len(),
                output_path
            );
            return Ok(());
        }

        let writer = RecordWriter::new().with_row_metadata(config.include_row_metadata);
        writer.backup_file(output_path)?;
        writer.write_records(output_path, records)
    }
}
