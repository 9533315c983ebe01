//! Pid-file based daemon control: stop, status, reload.

use std::path::Path;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// How long `stop` waits for the daemon to exit after SIGTERM.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

#[derive(Debug, PartialEq, Eq)]
pub enum StatusOutcome {
    Running(i32),
    DeadWithPidFile(i32),
    NotRunning,
}

/// Read the daemon pid, if the pid file exists and is well-formed.
pub fn read_pid(pid_file: &Path) -> Option<Pid> {
    let contents = std::fs::read_to_string(pid_file).ok()?;
    let raw: i32 = contents.trim().parse().ok()?;
    Some(Pid::from_raw(raw))
}

/// Signal 0 probe: is the process alive (or at least signalable)?
fn alive(pid: Pid) -> bool {
    kill(pid, None).is_ok()
}

/// Send SIGTERM and wait for the process to exit.
pub fn stop(pid_file: &Path) -> Result<StopOutcome> {
    let Some(pid) = read_pid(pid_file) else {
        return Ok(StopOutcome::NotRunning);
    };
    if !alive(pid) {
        // Stale pid file from an unclean shutdown.
        let _ = std::fs::remove_file(pid_file);
        return Ok(StopOutcome::NotRunning);
    }

    kill(pid, Some(Signal::SIGTERM)).with_context(|| format!("failed to signal pid {pid}"))?;

    let deadline = Instant::now() + STOP_TIMEOUT;
    while Instant::now() < deadline {
        if !alive(pid) {
            return Ok(StopOutcome::Stopped);
        }
        sleep(Duration::from_millis(100));
    }
    bail!("daemon (pid {pid}) did not exit within {}s", STOP_TIMEOUT.as_secs());
}

/// Report liveness per init-script conventions.
pub fn status(pid_file: &Path) -> StatusOutcome {
    match read_pid(pid_file) {
        Some(pid) if alive(pid) => StatusOutcome::Running(pid.as_raw()),
        Some(pid) => StatusOutcome::DeadWithPidFile(pid.as_raw()),
        None => StatusOutcome::NotRunning,
    }
}

/// Send SIGHUP to the running daemon.
pub fn reload(pid_file: &Path) -> Result<()> {
    let Some(pid) = read_pid(pid_file) else {
        bail!("anysyncd is not running (no pid file at {})", pid_file.display());
    };
    if !alive(pid) {
        bail!("anysyncd is not running (stale pid file at {})", pid_file.display());
    }
    kill(pid, Some(Signal::SIGHUP)).with_context(|| format!("failed to signal pid {pid}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_pid_file_reads_as_not_running() {
        let dir = TempDir::new().expect("tempdir");
        let pid_file = dir.path().join("anysyncd.pid");
        assert!(read_pid(&pid_file).is_none());
        assert_eq!(status(&pid_file), StatusOutcome::NotRunning);
        assert_eq!(stop(&pid_file).expect("stop"), StopOutcome::NotRunning);
    }

    #[test]
    fn garbage_pid_file_reads_as_not_running() {
        let dir = TempDir::new().expect("tempdir");
        let pid_file = dir.path().join("anysyncd.pid");
        std::fs::write(&pid_file, "not-a-pid\n").expect("write");
        assert!(read_pid(&pid_file).is_none());
    }

    #[test]
    fn own_pid_reports_running() {
        let dir = TempDir::new().expect("tempdir");
        let pid_file = dir.path().join("anysyncd.pid");
        std::fs::write(&pid_file, format!("{}\n", std::process::id())).expect("write");
        assert_eq!(
            status(&pid_file),
            StatusOutcome::Running(std::process::id() as i32)
        );
    }
}
