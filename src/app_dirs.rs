use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("pacer"),
            )
        } else {
            ProjectDirs::from("", "", "pacer")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    /// CSV log of finished session summaries.
    pub fn session_log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("sessions.csv"))
    }

    /// Diagnostic log file; stderr belongs to the TUI.
    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("pacer.log"))
    }
}
