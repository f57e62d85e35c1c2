use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

/// Logs kept per tool action (e.g. `packer-build`).
pub const KEEP_TOOL_LOGS: usize = 10;

/// Open the main log file for the tracing file layer.
///
/// `tracing_subscriber` implements `MakeWriter` for `Mutex<File>`, so the
/// returned value can be passed straight to `with_writer`.
pub fn open_main_log(path: &Path) -> std::io::Result<Mutex<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Mutex::new(file))
}

// ── ToolLogger ───────────────────────────────────────────

/// Captures one external tool invocation's output to a file.
///
/// Creates `<timestamp>_<action>_running.log`; `finish` renames it to
/// `_ok.log` or `_failed.log` depending on the exit status.
pub struct ToolLogger {
    file: File,
    path: PathBuf,
}

impl ToolLogger {
    pub fn new(logs_dir: &Path, action: &str) -> std::io::Result<Self> {
        fs::create_dir_all(logs_dir)?;
        let path = logs_dir.join(format!("{}_{action}_running.log", timestamp()));
        let file = File::create(&path)?;
        Ok(Self { file, path })
    }

    pub fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.file, "{line}");
    }

    /// Finalize the log and return its new path.
    pub fn finish(self, success: bool) -> PathBuf {
        let status = if success { "ok" } else { "failed" };
        let renamed = self
            .path
            .file_name()
            .and_then(|f| f.to_str())
            .map(|f| f.replace("_running.log", &format!("_{status}.log")))
            .map(|f| self.path.with_file_name(f));
        match renamed {
            Some(new_path) if fs::rename(&self.path, &new_path).is_ok() => new_path,
            _ => self.path,
        }
    }
}

/// Delete the oldest finished logs for `action`, keeping at most `keep`.
pub fn rotate_logs(logs_dir: &Path, action: &str, keep: usize) {
    let Ok(entries) = fs::read_dir(logs_dir) else {
        return;
    };

    let infix = format!("_{action}_");
    let mut finished: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name().and_then(|f| f.to_str()).is_some_and(|f| {
                f.contains(&infix) && (f.ends_with("_ok.log") || f.ends_with("_failed.log"))
            })
        })
        .collect();

    // zero-padded timestamp prefix sorts chronologically
    finished.sort();

    if finished.len() > keep {
        let excess = finished.len() - keep;
        for old in &finished[..excess] {
            let _ = fs::remove_file(old);
        }
    }
}

/// Milliseconds since the Unix epoch, zero-padded so names sort in order.
fn timestamp() -> String {
    let millis = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{millis:015}")
}
