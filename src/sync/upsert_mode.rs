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
use crate::files::RecordReader;
use crate::sheets::upsert::{RowAction, UpsertPlan};
use crate::sheets::{SheetTransport, TableSynchronizer, WriteResult};
use crate::sync::connect;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

pub struct UpsertMode;

impl UpsertMode {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, config: &Config, token_path: PathBuf) -> Result<()> {
        info!("🔄 Executing Upsert mode");

        let mut synchronizer = connect(config, token_path);
        self.run(&mut synchronizer, config).await?;
        Ok(())
    }

    /// Loads the records file and upserts it. In dry-run mode the plan is
    /// logged and the returned counts are what would have been written.
    pub async fn run<T: SheetTransport>(
        &self,
        synchronizer: &mut TableSynchronizer<T>,
        config: &Config,
    ) -> Result<WriteResult> {
        let records_path = config
            .records_path
            .as_ref()
            .context("A records file is required for upsert")?;
        let records = RecordReader::new().read_records(records_path)?;
        let worksheet = &config.table.worksheet;

        if config.dry_run {
            let plan = synchronizer
                .preview_upsert(&config.table, &records)
                .await
                .with_context(|| format!("Failed to plan upsert into '{}'", worksheet))?;
            self.show_dry_run_preview(&plan);
            return Ok(WriteResult {
                updated_count: plan.updated_count(),
                appended_count: plan.appended_count(),
                skipped_count: plan.skipped_count(),
                upload_failures: Vec::new(),
            });
        }

        let result = synchronizer
            .upsert(&config.table, &records)
            .await
            .with_context(|| format!("Failed to upsert into '{}'", worksheet))?;

        for failure in &result.upload_failures {
            warn!(
                "⚠️  {} ({}) was not uploaded to {}: {}",
                failure.file_name, failure.field, failure.address, failure.reason
            );
        }

        info!(
            "✅ Upsert completed - {} updated, {} appended, {} skipped",
            result.updated_count, result.appended_count, result.skipped_count
        );
        Ok(result)
    }

    fn show_dry_run_preview(&self, plan: &UpsertPlan) {
        info!("🔍 DRY RUN PREVIEW - No sheet changes will be made");

        for (index, row) in plan.rows.iter().enumerate() {
            let identity = &row.identity[..row.identity.len().min(12)];
            match (row.action, row.row_number) {
                (RowAction::Update, Some(row_number)) => info!(
                    "  ✏️  Record #{} [{}] → update row {}",
                    index + 1,
                    identity,
                    row_number
                ),
                (RowAction::Append, Some(row_number)) => info!(
                    "  ➕ Record #{} [{}] → append at row {}",
                    index + 1,
                    identity,
                    row_number
                ),
                _ => info!("  ⏭️  Record #{} [{}] → skipped", index + 1, identity),
            }
        }

        if plan.rows_to_add > 0 {
            info!("  📏 Worksheet would grow by {} rows", plan.rows_to_add);
        }
        for upload in &plan.uploads {
            info!("  📎 {} → {}", upload.file.file_name, upload.address);
        }

        info!(
            "📊 Summary: {} updates, {} appends, {} skipped, {} ranges, {} uploads",
            plan.updated_count(),
            plan.appended_count(),
            plan.skipped_count(),
            plan.writes.len(),
            plan.uploads.len()
        );
        info!("🔍 Run without --dry-run to apply these changes");
    }
}
