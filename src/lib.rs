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

//! Synchronizes typed records with a Google Sheets worksheet table.
//!
//! [`sheets::TableSynchronizer`] reads a worksheet as records and upserts
//! records into it over any [`sheets::SheetTransport`];
//! [`sheets::SheetsManager`] is the Google Sheets implementation.

pub mod auth;
pub mod config;
pub mod files;
pub mod sheets;
pub mod sync;
pub mod utils;
