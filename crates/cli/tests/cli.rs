//! Smoke tests for the skiff binary

use assert_cmd::Command;
use predicates::prelude::*;

fn skiff() -> Command {
    Command::cargo_bin("skiff").unwrap()
}

#[test]
fn help_lists_subcommands() {
    skiff()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("objects"))
        .stdout(predicate::str::contains("urls"))
        .stdout(predicate::str::contains("post"))
        .stdout(predicate::str::contains("doctor"));
}

#[test]
fn urls_sign_help_shows_method_flag() {
    skiff()
        .args(["urls", "sign", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--method"))
        .stdout(predicate::str::contains("--expires"));
}

#[test]
fn post_generate_help_shows_constraints() {
    skiff()
        .args(["post", "generate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--starts-with"))
        .stdout(predicate::str::contains("--max-size"));
}

#[test]
fn config_show_fails_without_config() {
    let home = tempfile::tempdir().unwrap();

    skiff()
        .env("HOME", home.path())
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn completion_generates_script() {
    skiff()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skiff"));
}

#[test]
fn completion_rejects_unknown_shell() {
    skiff()
        .args(["completion", "tcsh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported shell"));
}
