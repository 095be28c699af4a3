use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::app_dirs::AppDirs;

/// Initializes diagnostic logging to the application log file. The TUI
/// owns the terminal, so nothing is ever logged to stderr.
pub fn init() -> io::Result<()> {
    match AppDirs::log_path() {
        Some(path) => init_at(&path),
        None => Ok(()),
    }
}

/// `RUST_LOG` controls the filter; defaults to `info`.
pub fn init_at(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}
