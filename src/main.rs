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

use clap::{Args, Parser, Subcommand, ValueEnum};
use sheets_table_sync::auth::{AuthManager, oauth};
use sheets_table_sync::config::{Config, OperationMode, TableConfig};
use sheets_table_sync::sync;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_env_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Where the table sits in the worksheet and how rows are matched.
#[derive(Debug, Args)]
struct TableArgs {
    /// JSON file with a table layout; flags below override its values
    #[arg(long)]
    table_config: Option<PathBuf>,

    /// Worksheet (tab) holding the table
    #[arg(long)]
    worksheet: Option<String>,

    /// One-based row holding the field titles
    #[arg(long)]
    title_row: Option<usize>,

    /// One-based row of the first record
    #[arg(long)]
    data_start_row: Option<usize>,

    /// Field identifying a row (repeatable); defaults to the whole record
    #[arg(long = "unique-key")]
    unique_keys: Vec<String>,

    /// Field left out of whole-record matching (repeatable)
    #[arg(long = "ignore-field")]
    ignored_fields: Vec<String>,

    /// Write empty values over existing cell content
    #[arg(long)]
    overwrite_existing: bool,

    /// Only update existing rows, never append
    #[arg(long)]
    skip_unmatched: bool,

    /// A category row sits directly above the title row
    #[arg(long)]
    grouped_header: bool,

    /// Maximum rows fetched per read request
    #[arg(long)]
    batch_rows: Option<usize>,
}

impl TableArgs {
    fn into_table_config(self) -> anyhow::Result<TableConfig> {
        let mut table = match &self.table_config {
            Some(path) => TableConfig::load(path)?,
            None => TableConfig::default(),
        };

        if let Some(worksheet) = self.worksheet {
            table.worksheet = worksheet;
        }
        if let Some(row) = self.title_row {
            table = table.with_title_row(row);
        }
        if let Some(row) = self.data_start_row {
            table = table.with_data_start_row(row);
        } else if self.title_row.is_some() && self.table_config.is_none() {
            let next_row = table.title_row_number + 1;
            table = table.with_data_start_row(next_row);
        }
        if !self.unique_keys.is_empty() {
            table = table.with_unique_keys(self.unique_keys);
        }
        if !self.ignored_fields.is_empty() {
            table = table.with_ignored_fields(self.ignored_fields);
        }
        if let Some(limit) = self.batch_rows {
            table = table.with_batch_row_limit(limit);
        }

        table.overwrite_existing |= self.overwrite_existing;
        table.skip_unmatched |= self.skip_unmatched;
        table.grouped_header |= self.grouped_header;

        Ok(table)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Authenticate with Google and save tokens
    Auth {
        /// Custom path to store authentication tokens
        #[arg(long)]
        auth_cache: Option<PathBuf>,

        /// Store tokens in ./.sheets-table-sync/tokens.json
        #[arg(long)]
        local_cache: bool,
    },
    /// Read the table as JSON records
    Read {
        /// Google Sheet ID (required)
        #[arg(long)]
        sheet_id: String,

        #[command(flatten)]
        table: TableArgs,

        /// Write records to this JSON file instead of the log
        #[arg(long)]
        output: Option<PathBuf>,

        /// Add `_row` and `_identity` members to each output record
        #[arg(long)]
        row_metadata: bool,

        /// Custom path to read authentication tokens
        #[arg(long)]
        token_path: Option<PathBuf>,
    },
    /// Update matching rows and append new ones from a JSON records file
    Upsert {
        /// Google Sheet ID (required)
        #[arg(long)]
        sheet_id: String,

        #[command(flatten)]
        table: TableArgs,

        /// JSON array of records to write
        #[arg(long)]
        records: PathBuf,

        /// Preview changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Custom path to read authentication tokens
        #[arg(long)]
        token_path: Option<PathBuf>,
    },
    /// Upsert records, then read the whole table back
    Sync {
        /// Google Sheet ID (required)
        #[arg(long)]
        sheet_id: String,

        #[command(flatten)]
        table: TableArgs,

        /// JSON array of records to write
        #[arg(long)]
        records: PathBuf,

        /// Write the resulting table here
        #[arg(long)]
        output: Option<PathBuf>,

        /// Add `_row` and `_identity` members to each output record
        #[arg(long)]
        row_metadata: bool,

        /// Preview changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Custom path to read authentication tokens
        #[arg(long)]
        token_path: Option<PathBuf>,
    },
}

#[derive(Parser)]
#[command(name = "sheets-table-sync")]
#[command(about = "Synchronize JSON records with a Google Sheets table")]
#[command(version)]
struct Cli {
    /// Controls verbosity of log output (overrides RUST_LOG when provided)
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,
    #[command(subcommand)]
    command: Commands,
}

fn init_logging(level: &LogLevel) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level.as_env_filter()))?;

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize default crypto provider for rustls
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Auth {
            auth_cache,
            local_cache,
        } => handle_auth_command(auth_cache, local_cache).await,
        Commands::Read {
            sheet_id,
            table,
            output,
            row_metadata,
            token_path,
        } => {
            let config = Config::new(sheet_id, OperationMode::Read, table.into_table_config()?)
                .with_output_path(output)
                .with_row_metadata(row_metadata);
            handle_table_command(config, token_path).await
        }
        Commands::Upsert {
            sheet_id,
            table,
            records,
            dry_run,
            token_path,
        } => {
            let config = Config::new(sheet_id, OperationMode::Upsert, table.into_table_config()?)
                .with_records_path(Some(records))
                .with_dry_run(dry_run);
            handle_table_command(config, token_path).await
        }
        Commands::Sync {
            sheet_id,
            table,
            records,
            output,
            row_metadata,
            dry_run,
            token_path,
        } => {
            let config =
                Config::new(sheet_id, OperationMode::FullSync, table.into_table_config()?)
                    .with_records_path(Some(records))
                    .with_output_path(output)
                    .with_row_metadata(row_metadata)
                    .with_dry_run(dry_run);
            handle_table_command(config, token_path).await
        }
    }
}

async fn handle_auth_command(auth_cache: Option<PathBuf>, local_cache: bool) -> anyhow::Result<()> {
    info!("🔑 Starting authentication flow");

    let token_cache_path = if local_cache {
        let local_path = oauth::token_file_in(&oauth::local_config_dir());
        info!(
            "📁 Will save tokens to local directory: {}",
            local_path.display()
        );
        Some(local_path)
    } else if let Some(path) = auth_cache {
        info!("📁 Will save tokens to custom location: {}", path.display());
        Some(path)
    } else {
        let home_path = oauth::token_file_in(&oauth::home_config_dir()?);
        info!(
            "📁 Will save tokens to home directory: {}",
            home_path.display()
        );
        Some(home_path)
    };

    let auth_manager = AuthManager::new(token_cache_path);

    match auth_manager.authenticate().await {
        Ok(path) => {
            info!("✅ Authentication completed successfully");
            info!("💾 Tokens saved to: {}", path.display());
            info!("You can now run table commands:");
            info!("  sheets-table-sync read --sheet-id YOUR_SHEET_ID --worksheet Sheet1");
            info!("  sheets-table-sync upsert --sheet-id YOUR_SHEET_ID --records records.json");
            Ok(())
        }
        Err(err) => {
            anyhow::bail!(
                "❌ Authentication failed: {:#}\n\n\
                Troubleshooting tips:\n\
                • Make sure your browser can access Google authentication\n\
                • Check that Google Sheets API is enabled in your Google Cloud project\n\
                • Ensure you have permissions to the target Google Sheet\n\
                • Try using a custom client_secret.json file",
                err
            );
        }
    }
}

async fn handle_table_command(
    config: Config,
    token_override: Option<PathBuf>,
) -> anyhow::Result<()> {
    if config.dry_run {
        info!("🔍 Running in dry-run mode - no changes will be made");
    }

    info!("📊 Sheet ID: {}", config.spreadsheet_id);
    info!("📋 Worksheet: {}", config.table.worksheet);
    info!("⚙️ Mode: {:?}", config.mode);

    // Fail on bad input before touching credentials
    config.validate()?;

    let token_path = AuthManager::resolve_token_path(token_override)?;

    match config.mode {
        OperationMode::Read => sync::ReadMode::new().execute(&config, token_path).await,
        OperationMode::Upsert => sync::UpsertMode::new().execute(&config, token_path).await,
        OperationMode::FullSync => sync::FullSyncMode::new().execute(&config, token_path).await,
    }
}
