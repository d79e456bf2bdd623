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

pub mod full_sync;
pub mod read_mode;
pub mod upsert_mode;

pub use full_sync::FullSyncMode;
pub use read_mode::ReadMode;
pub use upsert_mode::UpsertMode;

use crate::auth::AuthManager;
use crate::config::Config;
use crate::sheets::{SheetsManager, TableSynchronizer};
use std::path::PathBuf;

/// Opens a synchronizer on the configured worksheet. Nothing is requested
/// from Google until the first read.
pub fn connect(config: &Config, token_path: PathBuf) -> TableSynchronizer<SheetsManager> {
    let auth_manager = AuthManager::new(Some(token_path));
    let sheets_manager = SheetsManager::new(
        config.spreadsheet_id.clone(),
        config.table.worksheet.clone(),
        auth_manager,
    );
    TableSynchronizer::new(sheets_manager)
}
