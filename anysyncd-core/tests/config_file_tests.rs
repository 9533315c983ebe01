//! Configuration loading from real files.

use std::path::PathBuf;

use tempfile::TempDir;

use anysyncd_core::types::Handler;
use anysyncd_core::{ConfigError, DaemonConfig};

#[test]
fn loads_a_mixed_configuration_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("anysyncd.conf");
    std::fs::write(
        &path,
        r#"
[global]
statedir = /var/lib/anysyncd
loglevel = debug
waiting_time = 3

[www]
handler = csync2
watcher = /srv/www
prod_dir = /srv/www
csync_dir = /var/lib/csync2/www
remote_hosts = web1.example.org web2.example.org
remote_prefix_command = sudo
cron = */15 * * * *
noop_file = /etc/anysyncd/active

[backup]
handler = mirror
watcher = /srv/data
from = /srv/data
to = /backup/data
waiting_time = 30
"#,
    )
    .expect("write config");

    let config = DaemonConfig::load_at(&path).expect("load");
    assert_eq!(config.loglevel, "debug");
    assert_eq!(config.syncers.len(), 2);
    assert!(config.rejected.is_empty());

    let www = config.syncer("www").expect("www syncer");
    assert_eq!(www.waiting_time.as_secs(), 3, "global default applies");
    assert_eq!(www.cron.as_deref(), Some("*/15 * * * *"));
    assert_eq!(www.noop_file, Some(PathBuf::from("/etc/anysyncd/active")));
    match &www.handler {
        Handler::Csync2 {
            remote_hosts,
            remote_prefix_command,
            ..
        } => {
            assert_eq!(remote_hosts.len(), 2);
            assert_eq!(remote_prefix_command.as_deref(), Some("sudo"));
        }
        other => panic!("expected csync2 handler, got {other:?}"),
    }

    let backup = config.syncer("backup").expect("backup syncer");
    assert_eq!(backup.waiting_time.as_secs(), 30, "section overrides global");
    assert!(matches!(backup.handler, Handler::Mirror { .. }));
}

#[test]
fn missing_file_is_a_config_not_found_error() {
    let dir = TempDir::new().expect("tempdir");
    let err = DaemonConfig::load_at(&dir.path().join("absent.conf")).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound { .. }));
    assert!(err.to_string().contains("not found"));
}

#[test]
fn malformed_ini_is_a_parse_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("anysyncd.conf");
    std::fs::write(&path, "[unterminated\nhandler mirror\n").expect("write");
    let err = DaemonConfig::load_at(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}
