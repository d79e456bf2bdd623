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
use crate::sheets::records::Record;
use crate::sheets::{SheetTransport, TableSynchronizer};
use crate::sync::{ReadMode, UpsertMode, connect};
use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

pub struct FullSyncMode;

impl FullSyncMode {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, config: &Config, token_path: PathBuf) -> Result<()> {
        info!("🔄 Executing Full Sync mode");

        let mut synchronizer = connect(config, token_path);
        self.run(&mut synchronizer, config).await?;
        Ok(())
    }

    /// Upserts the records file, then reads the whole table back.
    pub async fn run<T: SheetTransport>(
        &self,
        synchronizer: &mut TableSynchronizer<T>,
        config: &Config,
    ) -> Result<Vec<Record>> {
        info!("📤 Phase 1: Upserting records into sheet");
        UpsertMode::new().run(synchronizer, config).await?;

        info!("📥 Phase 2: Reading table back");
        let records = ReadMode::new().run(synchronizer, config).await?;

        if config.dry_run {
            info!("🔍 Full sync dry run completed - no changes were made");
        } else {
            info!(
                "✅ Full sync operation completed - {} records in '{}'",
                records.len(),
                config.table.worksheet
            );
        }

        Ok(records)
    }
}
