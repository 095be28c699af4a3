// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod fix;
pub mod format;
pub mod geo;
pub mod logging;
pub mod runtime;
pub mod session;
pub mod source;
pub mod tracker;
pub mod ui;
