use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

const POSTS: &str = r#"[
    {"timestamp": 1600000000, "data": [{"post": "first post"}]},
    {"timestamp": 1600000100, "data": [{"post": "second post"}]},
    {"timestamp": 1600000200, "data": []}
]"#;

/// Temp workspace with a config pointing every path inside it.
fn workspace(posts: &str) -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("data")).unwrap();
    fs::write(root.join("data").join("group.json"), posts).unwrap();
    fs::write(
        root.join("config.yaml"),
        format!(
            "data_dir: {data}\nstorage:\n  path: {db}\nlog:\n  file: {log}\nsources:\n  Group:\n    name: group\n    data_file: group.json\n    mapper: facebook_group\n",
            data = root.join("data").display(),
            db = root.join("state.db").display(),
            log = root.join("roulette.log").display(),
        ),
    )
    .unwrap();
    dir
}

fn roulette(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("post-roulette").unwrap();
    cmd.arg("--config").arg(root.join("config.yaml"));
    cmd
}

#[test]
fn prints_version() {
    Command::cargo_bin("post-roulette")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    Command::cargo_bin("post-roulette")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--debug"))
        .stdout(predicate::str::contains("--saved"));
}

#[test]
fn debug_prints_first_post_for_new_source() {
    let dir = workspace(POSTS);
    roulette(dir.path())
        .args(["group", "--debug"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("DEBUG MODE – CURRENT POST AT INDEX:"))
        .stdout(predicate::str::contains("\"content\": \"first post\""))
        .stdout(predicate::str::contains("\"index\": 0"));
    assert!(dir.path().join("state.db").exists());
}

#[test]
fn saved_listing_starts_empty() {
    let dir = workspace(POSTS);
    roulette(dir.path())
        .args(["GROUP", "--saved"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn unknown_source_fails() {
    let dir = workspace(POSTS);
    roulette(dir.path())
        .args(["twitter", "--debug"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("Group"));
}

#[test]
fn empty_data_file_fails() {
    let dir = workspace("[]");
    roulette(dir.path())
        .args(["group", "--debug"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("contains no posts"));
}

#[test]
fn missing_config_file_fails() {
    let dir = tempdir().unwrap();
    roulette(dir.path())
        .args(["group", "--debug"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config"));
}
