//! Error reporter: log always, mail when both admin addresses are set.
//!
//! Reporter errors never propagate; a broken mail setup must not take the
//! sync path down with it.

use lettre::{Message, SendmailTransport, Transport};

use anysyncd_core::types::{SyncerConfig, SyncerName};
use anysyncd_sync::SyncError;

/// Per-syncer failure reporter.
#[derive(Debug, Clone)]
pub struct Reporter {
    syncer: SyncerName,
    admin_from: Option<String>,
    admin_to: Option<String>,
}

impl Reporter {
    pub fn new(cfg: &SyncerConfig) -> Self {
        Self {
            syncer: cfg.name.clone(),
            admin_from: cfg.admin_from.clone(),
            admin_to: cfg.admin_to.clone(),
        }
    }

    /// Whether mail dispatch is configured.
    pub fn mail_enabled(&self) -> bool {
        self.admin_from.is_some() && self.admin_to.is_some()
    }

    /// Record a pipeline failure.
    pub fn report(&self, error: &SyncError) {
        tracing::error!(syncer = %self.syncer, error = %error, "sync failed");

        let (Some(from), Some(to)) = (self.admin_from.clone(), self.admin_to.clone()) else {
            return;
        };
        let subject = format!("anysyncd failed to sync {}", self.syncer);
        let body = error.to_string();
        let syncer = self.syncer.clone();

        // Sendmail is a blocking subprocess; keep it off the actor.
        tokio::task::spawn_blocking(move || {
            if let Err(message) = send_mail(&from, &to, &subject, body) {
                tracing::warn!(syncer = %syncer, error = %message, "failure mail not sent");
            }
        });
    }
}

fn send_mail(from: &str, to: &str, subject: &str, body: String) -> Result<(), String> {
    let message = Message::builder()
        .from(from.parse().map_err(|e| format!("from address: {e}"))?)
        .to(to.parse().map_err(|e| format!("to address: {e}"))?)
        .subject(subject)
        .body(body)
        .map_err(|e| e.to_string())?;
    SendmailTransport::new()
        .send(&message)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use anysyncd_core::types::{Handler, DEFAULT_FILTER};
    use regex::Regex;

    fn config(admin_from: Option<&str>, admin_to: Option<&str>) -> SyncerConfig {
        SyncerConfig {
            name: SyncerName::from("data"),
            handler: Handler::Mirror {
                from: PathBuf::from("/srv/a"),
                to: PathBuf::from("/srv/b"),
            },
            watcher: PathBuf::from("/srv/a"),
            filter: Regex::new(DEFAULT_FILTER).expect("filter"),
            waiting_time: Duration::from_secs(5),
            retry_interval: Duration::from_secs(2),
            cron: None,
            noop_file: None,
            admin_from: admin_from.map(str::to_string),
            admin_to: admin_to.map(str::to_string),
        }
    }

    #[test]
    fn mail_requires_both_addresses() {
        assert!(!Reporter::new(&config(None, None)).mail_enabled());
        assert!(!Reporter::new(&config(Some("a@b"), None)).mail_enabled());
        assert!(!Reporter::new(&config(None, Some("c@d"))).mail_enabled());
        assert!(Reporter::new(&config(Some("a@b"), Some("c@d"))).mail_enabled());
    }

    #[tokio::test]
    async fn report_without_mail_config_only_logs() {
        let reporter = Reporter::new(&config(None, None));
        // Must not panic or spawn anything.
        reporter.report(&SyncError::RetriesExceeded);
    }
}
