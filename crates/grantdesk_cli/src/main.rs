//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `grantdesk_core` wiring end to end: config, logging, storage.
//! - Print one `key=value` line per fact for quick local sanity checks.
//!
//! Usage: `grantdesk_cli [config.json]`. `GRANTDESK_*` variables override
//! values from the file.

use grantdesk_core::db::migrations::current_version;
use grantdesk_core::repo::common::highest_cursor;
use grantdesk_core::{init_from_config, open_db, open_db_in_memory, CoreConfig, Providers};
use log::info;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("grantdesk_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::from_file(Path::new(&path)),
        None => Ok(CoreConfig::default()),
    }
    .and_then(CoreConfig::with_env_overrides)
    .map_err(|err| err.to_string())?;

    let logging = init_from_config(&config).map_err(|err| err.to_string())?;

    let conn = match config.db_path.as_deref() {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
    .map_err(|err| err.to_string())?;
    let schema_version = current_version(&conn).map_err(|err| err.to_string())?;
    let last_cursor = highest_cursor(&conn).map_err(|err| err.to_string())?;
    let providers = Providers::system_resuming(config.cursor_policy, last_cursor);

    info!("event=cli_probe module=cli status=ok schema_version={schema_version}");
    println!("grantdesk_core version={}", grantdesk_core::core_version());
    println!("schema_version={schema_version}");
    println!("cursor_policy={:?}", config.cursor_policy);
    println!("highest_cursor={}", last_cursor.map_or("none".to_string(), |c| c.to_string()));
    println!("next_cursor={}", providers.cursors().allocate(providers.clock().now()));
    println!("file_logging={logging}");
    Ok(())
}
