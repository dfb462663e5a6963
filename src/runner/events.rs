use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Append-only JSONL log, one event per line, flushed on every write so
/// the tail survives a crash.
pub struct EventLog {
    file: std::fs::File,
}

impl EventLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn log(&mut self, event: serde_json::Value) -> Result<()> {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs_f64();

        let mut entry = event;
        entry["timestamp"] = serde_json::json!(timestamp);

        writeln!(self.file, "{}", serde_json::to_string(&entry)?)?;
        self.file.flush()?;
        Ok(())
    }
}
