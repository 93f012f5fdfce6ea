//! End-to-end checks against the compiled binary, grounded on the same
//! `assert_cmd` idiom the teacher's command tests used.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_every_subcommand() {
    Command::cargo_bin("memory-cli")
        .expect("binary built")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("worker"))
        .stdout(predicate::str::contains("consolidate"))
        .stdout(predicate::str::contains("stats"));
}

#[test]
fn stats_against_an_empty_in_memory_database_reports_zeroes() {
    Command::cargo_bin("memory-cli")
        .expect("binary built")
        .env("MEMORY_DB_URL", ":memory:")
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_episodes\": 0"));
}

#[test]
fn consolidate_against_an_empty_in_memory_database_processes_nothing() {
    Command::cargo_bin("memory-cli")
        .expect("binary built")
        .env("MEMORY_DB_URL", ":memory:")
        .args(["consolidate", "--date", "2026-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"episodes_processed\": 0"));
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("memory-cli")
        .expect("binary built")
        .arg("bogus")
        .assert()
        .failure();
}
