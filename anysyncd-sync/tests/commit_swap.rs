//! Two-phase commit rotation on real directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use anysyncd_sync::commit::{backup_dir, commit_swap, staging_dir};
use anysyncd_sync::MirrorRunner;

/// Stub mirror that records its arguments before copying.
fn fake_mirror(dir: &Path, args_log: &Path) -> MirrorRunner {
    let path = dir.join("fake-rsync");
    std::fs::write(
        &path,
        format!(
            r#"#!/bin/sh
echo "$@" >> {log}
for arg in "$@"; do
  if [ "$arg" = "--dry-run" ]; then exit 0; fi
done
while [ $# -gt 2 ]; do shift; done
src="${{1%/}}"
dst="$2"
rm -rf "$dst"
mkdir -p "$dst"
cp -R "$src/." "$dst/"
exit 0
"#,
            log = args_log.display()
        ),
    )
    .expect("write stub");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod stub");
    }
    MirrorRunner::new(&path.display().to_string())
}

fn setup() -> (TempDir, MirrorRunner, PathBuf, PathBuf, PathBuf) {
    let tmp = TempDir::new().expect("tempdir");
    let prod = tmp.path().join("www");
    let csync = tmp.path().join("csync");
    std::fs::create_dir_all(&csync).expect("mkdir csync");
    let args_log = tmp.path().join("mirror-args");
    let mirror = fake_mirror(tmp.path(), &args_log);
    (tmp, mirror, prod, csync, args_log)
}

#[tokio::test]
async fn first_commit_creates_the_live_tree() {
    let (_tmp, mirror, prod, csync, args_log) = setup();
    std::fs::write(csync.join("index.html"), "v1").expect("write");

    commit_swap(&mirror, &prod, &csync).await.expect("commit");

    assert_eq!(
        std::fs::read_to_string(prod.join("index.html")).expect("live file"),
        "v1"
    );
    assert!(
        !staging_dir(&prod).exists(),
        "no previous live tree means nothing to recycle into staging"
    );
    assert!(!backup_dir(&prod).exists(), "backup must not linger");

    // The staging mirror is archive + delete only.
    let args = std::fs::read_to_string(&args_log).expect("args log");
    assert!(
        !args.contains("--checksum"),
        "commit must not pay for checksum comparison: {args}"
    );
    assert!(args.contains("--delete"));
}

#[tokio::test]
async fn steady_state_swap_recycles_the_old_tree_as_staging() {
    let (_tmp, mirror, prod, csync, _args_log) = setup();
    std::fs::create_dir_all(&prod).expect("mkdir prod");
    std::fs::write(prod.join("index.html"), "old").expect("write old");
    std::fs::write(csync.join("index.html"), "new").expect("write new");

    commit_swap(&mirror, &prod, &csync).await.expect("commit");

    assert_eq!(
        std::fs::read_to_string(prod.join("index.html")).expect("live file"),
        "new"
    );
    let staging = staging_dir(&prod);
    assert!(staging.exists(), "old live tree becomes the next staging area");
    assert_eq!(
        std::fs::read_to_string(staging.join("index.html")).expect("recycled file"),
        "old"
    );
    assert!(!backup_dir(&prod).exists(), "backup must be renamed away");
}

#[tokio::test]
async fn consecutive_commits_converge_on_latest_content() {
    let (_tmp, mirror, prod, csync, _args_log) = setup();

    for round in 1..=3u32 {
        std::fs::write(csync.join("index.html"), format!("v{round}")).expect("write");
        commit_swap(&mirror, &prod, &csync).await.expect("commit");
    }

    assert_eq!(
        std::fs::read_to_string(prod.join("index.html")).expect("live file"),
        "v3"
    );
}
