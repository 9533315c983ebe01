//! Configuration load and validation.
//!
//! The on-disk format is an INI file: one `[global]` section plus one section
//! per syncer. Any per-syncer key may appear in `[global]` as a default.
//! Handler strings are mapped to the closed [`Handler`] variant set here, at
//! load time; a section that fails validation is recorded in
//! [`DaemonConfig::rejected`] and skipped — the daemon continues with the
//! remaining syncers.
//!
//! **Core API** (`load_at` / `load_from_str`): accept an explicit path or
//! string — used in tests with `TempDir` so that no test ever touches the
//! real `/etc/anysyncd`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::{Ini, ParseOption, Properties};
use regex::Regex;

use crate::error::{io_err, ConfigError};
use crate::types::{
    Handler, HandlerKind, SyncerConfig, SyncerName, DEFAULT_FILTER, DEFAULT_RETRY_INTERVAL,
    DEFAULT_WAITING_TIME,
};

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/anysyncd/anysyncd.conf";

/// Default state directory holding stamp and pid files.
pub const DEFAULT_STATEDIR: &str = "/var/lib/anysyncd";

const GLOBAL_SECTION: &str = "global";

/// A syncer section that failed validation and was skipped.
#[derive(Debug, Clone)]
pub struct RejectedSyncer {
    pub section: String,
    pub reason: String,
}

/// The fully loaded daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Directory for stamp files and the pid file.
    pub statedir: PathBuf,
    /// Log destination in daemon mode; stdout when unset.
    pub logfile: Option<PathBuf>,
    /// Log level filter (trace, debug, info, warn, error).
    pub loglevel: String,
    /// Mirror primitive (archive + delete + checksum semantics).
    pub rsync_command: String,
    /// Group replication primitive.
    pub csync_command: String,
    /// Remote command transport.
    pub remote_shell: String,
    /// Helper executable name on the peers.
    pub remote_helper: String,
    /// Validated syncers, in section order.
    pub syncers: Vec<SyncerConfig>,
    /// Sections that failed validation, for startup error logging.
    pub rejected: Vec<RejectedSyncer>,
}

impl DaemonConfig {
    /// Load and validate the configuration file at `path`.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Self::parse(&contents, path)
    }

    /// Load and validate configuration from an INI string.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        Self::parse(contents, Path::new("<inline>"))
    }

    /// Look up a validated syncer by name.
    pub fn syncer(&self, name: &str) -> Option<&SyncerConfig> {
        self.syncers.iter().find(|s| s.name.0 == name)
    }

    /// Pid file path under the state directory.
    pub fn pid_file(&self) -> PathBuf {
        self.statedir.join("anysyncd.pid")
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        // Escape processing stays off: filter values are regexes and must
        // keep their backslashes verbatim.
        let options = ParseOption {
            enabled_escape: false,
            ..Default::default()
        };
        let ini = Ini::load_from_str_opt(contents, options).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let global = ini.section(Some(GLOBAL_SECTION));

        let statedir = global
            .and_then(|g| g.get("statedir"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATEDIR));
        let logfile = global.and_then(|g| g.get("logfile")).map(PathBuf::from);
        let loglevel = global
            .and_then(|g| g.get("loglevel"))
            .unwrap_or("info")
            .to_string();
        let rsync_command = global
            .and_then(|g| g.get("rsync_command"))
            .unwrap_or("rsync")
            .to_string();
        let csync_command = global
            .and_then(|g| g.get("csync_command"))
            .unwrap_or("csync2")
            .to_string();
        let remote_shell = global
            .and_then(|g| g.get("remote_shell"))
            .unwrap_or("ssh")
            .to_string();
        let remote_helper = global
            .and_then(|g| g.get("remote_helper"))
            .unwrap_or("anysyncd-helper")
            .to_string();

        let mut syncers = Vec::new();
        let mut rejected = Vec::new();

        for (section, props) in ini.iter() {
            let Some(section) = section else {
                // Keys outside any section have no meaning here.
                continue;
            };
            if section == GLOBAL_SECTION {
                continue;
            }
            match build_syncer(section, props, global) {
                Ok(syncer) => syncers.push(syncer),
                Err(err) => rejected.push(RejectedSyncer {
                    section: section.to_string(),
                    reason: err.to_string(),
                }),
            }
        }

        Ok(Self {
            statedir,
            logfile,
            loglevel,
            rsync_command,
            csync_command,
            remote_shell,
            remote_helper,
            syncers,
            rejected,
        })
    }
}

// ---------------------------------------------------------------------------
// Per-section validation
// ---------------------------------------------------------------------------

fn build_syncer(
    section: &str,
    props: &Properties,
    global: Option<&Properties>,
) -> Result<SyncerConfig, ConfigError> {
    let get = |key: &str| -> Option<&str> {
        props.get(key).or_else(|| global.and_then(|g| g.get(key)))
    };
    let require = |key: &str| -> Result<&str, ConfigError> {
        get(key).ok_or_else(|| ConfigError::MissingKey {
            section: section.to_string(),
            key: key.to_string(),
        })
    };

    let handler_raw = require("handler")?;
    let kind: HandlerKind = handler_raw
        .parse()
        .map_err(|_| ConfigError::UnknownHandler {
            section: section.to_string(),
            value: handler_raw.to_string(),
        })?;

    let handler = match kind {
        HandlerKind::Mirror => Handler::Mirror {
            from: PathBuf::from(require("from")?),
            to: PathBuf::from(require("to")?),
        },
        HandlerKind::Csync2 => {
            let remote_hosts: Vec<String> = require("remote_hosts")?
                .split_whitespace()
                .map(str::to_string)
                .collect();
            if remote_hosts.is_empty() {
                return Err(ConfigError::InvalidValue {
                    section: section.to_string(),
                    key: "remote_hosts".to_string(),
                    message: "at least one peer host is required".to_string(),
                });
            }
            Handler::Csync2 {
                prod_dir: PathBuf::from(require("prod_dir")?),
                csync_dir: PathBuf::from(require("csync_dir")?),
                remote_hosts,
                remote_prefix_command: get("remote_prefix_command").map(str::to_string),
                csync_group: get("csync_group").unwrap_or(section).to_string(),
            }
        }
    };

    let filter_pattern = get("filter").unwrap_or(DEFAULT_FILTER);
    let filter = Regex::new(filter_pattern).map_err(|e| ConfigError::InvalidValue {
        section: section.to_string(),
        key: "filter".to_string(),
        message: e.to_string(),
    })?;

    Ok(SyncerConfig {
        name: SyncerName::from(section),
        handler,
        watcher: PathBuf::from(require("watcher")?),
        filter,
        waiting_time: get("waiting_time")
            .map(|v| parse_seconds(section, "waiting_time", v))
            .transpose()?
            .unwrap_or(DEFAULT_WAITING_TIME),
        retry_interval: get("retry_interval")
            .map(|v| parse_seconds(section, "retry_interval", v))
            .transpose()?
            .unwrap_or(DEFAULT_RETRY_INTERVAL),
        cron: get("cron").map(str::to_string),
        noop_file: get("noop_file").map(PathBuf::from),
        admin_from: get("admin_from").map(str::to_string),
        admin_to: get("admin_to").map(str::to_string),
    })
}

fn parse_seconds(section: &str, key: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            message: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_csync2_section() {
        let config = DaemonConfig::load_from_str(
            r#"
[data]
handler = csync2
watcher = /srv/data
prod_dir = /srv/data
csync_dir = /var/lib/csync2/data
remote_hosts = peer1 peer2
"#,
        )
        .expect("load");

        assert_eq!(config.syncers.len(), 1);
        let syncer = &config.syncers[0];
        assert_eq!(syncer.name, SyncerName::from("data"));
        assert_eq!(syncer.waiting_time, DEFAULT_WAITING_TIME);
        assert_eq!(syncer.retry_interval, DEFAULT_RETRY_INTERVAL);
        match &syncer.handler {
            Handler::Csync2 {
                remote_hosts,
                csync_group,
                ..
            } => {
                assert_eq!(remote_hosts, &["peer1", "peer2"]);
                assert_eq!(csync_group, "data");
            }
            other => panic!("expected csync2 handler, got {other:?}"),
        }
    }

    #[test]
    fn global_keys_are_section_defaults() {
        let config = DaemonConfig::load_from_str(
            r#"
[global]
waiting_time = 9
admin_from = root@source
admin_to = ops@example.org

[www]
handler = mirror
watcher = /srv/www
from = /srv/www
to = /backup/www
"#,
        )
        .expect("load");

        let syncer = &config.syncers[0];
        assert_eq!(syncer.waiting_time, Duration::from_secs(9));
        assert!(syncer.mail_enabled());
    }

    #[test]
    fn unknown_handler_is_rejected_not_fatal() {
        let config = DaemonConfig::load_from_str(
            r#"
[bad]
handler = plugin
watcher = /srv/bad

[good]
handler = mirror
watcher = /srv/good
from = /srv/good
to = /backup/good
"#,
        )
        .expect("load");

        assert_eq!(config.syncers.len(), 1);
        assert_eq!(config.rejected.len(), 1);
        assert_eq!(config.rejected[0].section, "bad");
        assert!(config.rejected[0].reason.contains("unknown handler"));
    }

    #[test]
    fn missing_required_key_is_rejected() {
        let config = DaemonConfig::load_from_str(
            r#"
[data]
handler = csync2
watcher = /srv/data
prod_dir = /srv/data
csync_dir = /var/lib/csync2/data
"#,
        )
        .expect("load");

        assert!(config.syncers.is_empty());
        assert!(config.rejected[0].reason.contains("remote_hosts"));
    }

    #[test]
    fn global_command_overrides() {
        let config = DaemonConfig::load_from_str(
            r#"
[global]
statedir = /tmp/anysyncd-state
rsync_command = /opt/bin/rsync
remote_shell = ssh -o BatchMode=yes
loglevel = debug
"#,
        )
        .expect("load");

        assert_eq!(config.statedir, PathBuf::from("/tmp/anysyncd-state"));
        assert_eq!(config.rsync_command, "/opt/bin/rsync");
        assert_eq!(config.remote_shell, "ssh -o BatchMode=yes");
        assert_eq!(config.loglevel, "debug");
        assert_eq!(config.pid_file(), PathBuf::from("/tmp/anysyncd-state/anysyncd.pid"));
    }

    #[test]
    fn filter_regex_backslashes_survive_parsing() {
        let config = DaemonConfig::load_from_str(
            r#"
[data]
handler = mirror
watcher = /srv/data
from = /srv/data
to = /backup/data
filter = \.(bak|orig)$
"#,
        )
        .expect("load");

        let filter = &config.syncers[0].filter;
        assert!(filter.is_match("/srv/data/file.bak"));
        assert!(!filter.is_match("/srv/data/file.txt"));
    }

    #[test]
    fn invalid_filter_regex_is_rejected() {
        let config = DaemonConfig::load_from_str(
            r#"
[data]
handler = mirror
watcher = /srv/data
from = /srv/data
to = /backup/data
filter = ([unclosed
"#,
        )
        .expect("load");

        assert!(config.syncers.is_empty());
        assert!(config.rejected[0].reason.contains("filter"));
    }

    #[test]
    fn missing_config_file_errors() {
        let err = DaemonConfig::load_at(Path::new("/nonexistent/anysyncd.conf")).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigNotFound { .. }));
    }
}
