use std::path::PathBuf;

/// Base data directory: `~/.local/share/vmagent/`
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("vmagent")
}

/// Log directory for the main log and captured tool output.
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Path to the main tracing log file.
pub fn main_log_path() -> PathBuf {
    logs_dir().join("vmagent.log")
}
