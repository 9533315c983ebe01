//! Remote helper client.
//!
//! Invokes `anysyncd-helper` on peer hosts over the configured remote shell
//! and interprets the results. Two operations exist: `stamps` (freshness
//! probe) and `commit` (atomic live-tree swap on the peer).

use std::process::Output;
use std::sync::OnceLock;

use regex::Regex;
use tokio::process::Command;

use anysyncd_core::types::SyncerName;

use crate::error::SyncError;
use crate::mirror::{render_status, split_command};

/// Acceptance pattern for the stamps response line. Each field is up to ten
/// decimal digits and may be empty.
const STAMPS_PATTERN: &str = r"^([0-9]{0,10}):([0-9]{0,10})$";

fn stamps_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(STAMPS_PATTERN).expect("valid stamps pattern"))
}

/// A peer's `"<success>:<lastchange>"` stamp pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerStamps {
    pub success: Option<u64>,
    pub lastchange: Option<u64>,
}

impl PeerStamps {
    /// Parse one response line. Returns `None` if the line does not match
    /// the acceptance pattern.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = stamps_regex().captures(line.trim())?;
        let field = |i: usize| -> Option<u64> {
            let text = caps.get(i).map(|m| m.as_str()).unwrap_or("");
            if text.is_empty() {
                None
            } else {
                text.parse().ok()
            }
        };
        Some(Self {
            success: field(1),
            lastchange: field(2),
        })
    }

    /// Whether the peer has locally observed changes not yet reconciled with
    /// the last successful sync from this node. Either field empty means no
    /// veto.
    pub fn is_stale(&self) -> bool {
        match (self.success, self.lastchange) {
            (Some(success), Some(lastchange)) => lastchange > success,
            _ => false,
        }
    }
}

/// Client for helper invocations on peer hosts.
#[derive(Debug, Clone)]
pub struct RemoteRunner {
    shell: String,
    shell_args: Vec<String>,
    prefix_command: Option<String>,
    helper: String,
}

impl RemoteRunner {
    pub fn new(remote_shell: &str, prefix_command: Option<String>, helper: &str) -> Self {
        let (shell, shell_args) = split_command(remote_shell);
        Self {
            shell,
            shell_args,
            prefix_command,
            helper: helper.to_string(),
        }
    }

    /// Probe a peer's stamps for `name`.
    pub async fn stamps(&self, host: &str, name: &SyncerName) -> Result<PeerStamps, SyncError> {
        let output = self.invoke(host, "stamps", name).await?;
        if !output.status.success() {
            return Err(SyncError::PeerTransport {
                host: host.to_string(),
                message: format!(
                    "stamps query failed ({}): {}",
                    render_status(&output),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        let line = String::from_utf8_lossy(&output.stdout).trim().to_string();
        PeerStamps::parse(&line).ok_or_else(|| SyncError::StampsParse {
            host: host.to_string(),
            line,
        })
    }

    /// Run the commit operation for `name` on a peer.
    pub async fn commit(&self, host: &str, name: &SyncerName) -> Result<(), SyncError> {
        let output = self.invoke(host, "commit", name).await?;
        if !output.status.success() {
            return Err(SyncError::PeerTransport {
                host: host.to_string(),
                message: format!(
                    "commit failed ({}): {}",
                    render_status(&output),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }

    async fn invoke(
        &self,
        host: &str,
        action: &str,
        name: &SyncerName,
    ) -> Result<Output, SyncError> {
        // The remote side gets one command string so that the optional
        // prefix (privilege elevation etc.) wraps the helper invocation.
        let mut remote_cmd = String::new();
        if let Some(prefix) = &self.prefix_command {
            remote_cmd.push_str(prefix);
            remote_cmd.push(' ');
        }
        remote_cmd.push_str(&format!("{} {} {}", self.helper, action, name));

        Command::new(&self.shell)
            .args(&self.shell_args)
            .arg(host)
            .arg(&remote_cmd)
            .output()
            .await
            .map_err(|e| SyncError::PeerTransport {
                host: host.to_string(),
                message: format!("failed to launch '{}': {e}", self.shell),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_stamp_pair() {
        let stamps = PeerStamps::parse("1700000005:1700000000").expect("parse");
        assert_eq!(stamps.success, Some(1_700_000_005));
        assert_eq!(stamps.lastchange, Some(1_700_000_000));
        assert!(!stamps.is_stale());
    }

    #[test]
    fn detects_stale_peer() {
        let stamps = PeerStamps::parse("100:200").expect("parse");
        assert!(stamps.is_stale());
    }

    #[test]
    fn empty_fields_never_veto() {
        for line in [":", "100:", ":200", ""] {
            if line.is_empty() {
                continue;
            }
            let stamps = PeerStamps::parse(line).expect("parse");
            assert!(!stamps.is_stale(), "line {line:?} must not veto");
        }
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(PeerStamps::parse("12345678901:2").is_none(), "11 digits");
        assert!(PeerStamps::parse("100").is_none());
        assert!(PeerStamps::parse("a:b").is_none());
        assert!(PeerStamps::parse("1:2:3").is_none());
    }

    #[test]
    fn trailing_newline_is_tolerated() {
        let stamps = PeerStamps::parse("42:41\n").expect("parse");
        assert_eq!(stamps.success, Some(42));
    }
}
