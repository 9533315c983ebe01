//! Logging setup with a SIGHUP-reopenable file sink.
//!
//! In daemon mode all output goes to the configured `logfile` through a
//! writer whose underlying file handle can be swapped after an external
//! rotation (`logrotate` moves the file, SIGHUP makes us reopen the path).
//! In foreground mode, or without a `logfile`, output goes to stdout.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::DaemonError;

/// A log sink whose file handle can be reopened at the original path.
#[derive(Debug, Clone)]
pub struct ReopenableLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl ReopenableLog {
    /// Open (or create) the log file in append mode.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            file: Arc::new(Mutex::new(append_handle(path)?)),
        })
    }

    /// Reopen the path and swap the handle; in-flight writers finish on the
    /// old handle.
    pub fn reopen(&self) -> io::Result<()> {
        let fresh = append_handle(&self.path)?;
        let mut guard = self.file.lock().expect("log handle poisoned");
        *guard = fresh;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn append_handle(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Writer handed to the subscriber for each log line.
pub struct LogWriter(Arc<Mutex<File>>);

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log handle poisoned").write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().expect("log handle poisoned").flush()
    }
}

impl<'a> MakeWriter<'a> for ReopenableLog {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(Arc::clone(&self.file))
    }
}

/// Initialize tracing from the configured level and optional log file.
///
/// Returns the reopen handle when a file sink is active, for the SIGHUP
/// handler.
pub fn init(loglevel: &str, logfile: Option<&Path>) -> Result<Option<ReopenableLog>, DaemonError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(loglevel));

    match logfile {
        Some(path) => {
            let log = ReopenableLog::open(path)
                .map_err(|e| DaemonError::Logging(format!("open {}: {e}", path.display())))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(log.clone())
                .with_ansi(false)
                .with_target(false)
                .try_init()
                .map_err(|e| DaemonError::Logging(e.to_string()))?;
            Ok(Some(log))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .try_init()
                .map_err(|e| DaemonError::Logging(e.to_string()))?;
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_survive_a_reopen_after_external_rotation() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("anysyncd.log");
        let log = ReopenableLog::open(&path).expect("open");

        let mut writer = log.make_writer();
        writer.write_all(b"before\n").expect("write");
        writer.flush().expect("flush");

        // External rotation: the live file is moved away.
        let rotated = dir.path().join("anysyncd.log.1");
        std::fs::rename(&path, &rotated).expect("rotate");
        log.reopen().expect("reopen");

        let mut writer = log.make_writer();
        writer.write_all(b"after\n").expect("write");
        writer.flush().expect("flush");

        assert_eq!(std::fs::read_to_string(&rotated).expect("rotated"), "before\n");
        assert_eq!(std::fs::read_to_string(&path).expect("fresh"), "after\n");
    }
}
