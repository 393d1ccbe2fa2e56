//! Exit-status tests for the `convert-worker` binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn worker(workspaces: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("convert-worker").unwrap();
    cmd.env_remove("input")
        .env_remove("output")
        .env_remove("RUST_LOG")
        .env("WORKER_WORKSPACE_ROOT", workspaces.path())
        .env("TMPDIR", workspaces.path());
    cmd
}

#[test]
fn missing_destination_fails_before_any_workspace() {
    let workspaces = TempDir::new().unwrap();
    worker(&workspaces)
        .env("input", "file:///in/doc.xml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("'output'"));

    assert_eq!(fs::read_dir(workspaces.path()).unwrap().count(), 0);
}

#[test]
fn unparsable_source_fails_before_any_workspace() {
    let workspaces = TempDir::new().unwrap();
    worker(&workspaces)
        .env("input", "relative/doc.xml")
        .env("output", "file:///out/")
        .assert()
        .failure()
        .stderr(predicate::str::contains("'input'"));

    assert_eq!(fs::read_dir(workspaces.path()).unwrap().count(), 0);
}

#[test]
fn missing_toolchain_fails_and_cleans_up() {
    let workspaces = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("doc.xml"), "<topic/>").unwrap();
    let dest = src.path().join("dest");

    worker(&workspaces)
        .env("input", src.path().join("doc.xml"))
        .env("output", &dest)
        .env("TOOLCHAIN_HOME", src.path().join("no-toolchain"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("convert stage failed"));

    assert!(!dest.exists());
    assert_eq!(fs::read_dir(workspaces.path()).unwrap().count(), 0);
}

#[test]
fn help_lists_worker_flags() {
    let workspaces = TempDir::new().unwrap();
    worker(&workspaces)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--toolchain-home"))
        .stdout(predicate::str::contains("--report"));
}

#[test]
fn short_help_and_version_flags_belong_to_the_engine() {
    // `-h`/`-V` are engine arguments; only the long forms are the worker's.
    for flag in ["-h", "-V"] {
        let workspaces = TempDir::new().unwrap();
        worker(&workspaces)
            .env("input", "file:///in/doc.xml")
            .arg(flag)
            .assert()
            .failure()
            .stderr(predicate::str::contains("'output'"));
    }
}

#[test]
fn long_version_flag_prints_version() {
    let workspaces = TempDir::new().unwrap();
    worker(&workspaces)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
