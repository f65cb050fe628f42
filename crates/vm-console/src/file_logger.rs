//! The production `Logger`: a truncate-on-open text file, one record per
//! call, timestamped `YYYY-MM-DD HH:MM:SS [LEVEL] message`. `INTERRUPT` and
//! `ERROR` records are additionally mirrored to stdout, per the external
//! interfaces section.

use std::fs::File;
use std::io::Write;
use std::sync::Mutex;

use chrono::Local;
use vm_core::Logger;

#[derive(Debug, thiserror::Error)]
pub enum LogSinkError {
    #[error("could not open log file {path:?}: {source}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes every record to `system.log` (or wherever `path` points),
/// truncating it on construction. Cheap to share: the inner handle is
/// behind a mutex since the CPU, memory, DMA worker, and console all log
/// through the same instance.
pub struct FileLogger {
    file: Mutex<File>,
}

impl FileLogger {
    /// Open (truncating) the log file at `path`. The only fallible entry
    /// point in the console binary's startup path; its exit code-1 case
    /// per the external interfaces section is this call failing.
    pub fn open(path: &std::path::Path) -> Result<Self, LogSinkError> {
        let file = File::create(path).map_err(|source| LogSinkError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn write_record(&self, level: &str, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("{timestamp} [{level}] {message}\n");
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
        if level == "ERROR" || level == "INTERRUPT" {
            print!("{line}");
        }
    }
}

impl Logger for FileLogger {
    fn info(&self, message: &str) {
        self.write_record("INFO", message);
    }

    fn warning(&self, message: &str) {
        self.write_record("WARNING", message);
    }

    fn error(&self, message: &str) {
        self.write_record("ERROR", message);
    }

    fn interrupt(&self, message: &str) {
        self.write_record("INTERRUPT", message);
    }

    fn debug(&self, message: &str) {
        self.write_record("DEBUG", message);
    }
}
