use chrono::Local;
use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join("nback"))
        } else {
            ProjectDirs::from("", "", "nback").map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("history.db"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("nback.log"))
    }

    /// Fresh per-session results file, named by participant and start time.
    pub fn results_path(participant: &str) -> PathBuf {
        let dir = Self::state_dir()
            .map(|dir| dir.join("results"))
            .unwrap_or_else(|| PathBuf::from("."));
        let safe: String = participant
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        dir.join(format!("{}-{}.json", safe, Local::now().format("%Y%m%d-%H%M%S")))
    }
}
