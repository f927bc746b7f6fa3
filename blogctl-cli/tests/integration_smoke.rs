//! Smoke tests for the blogctl binary

use assert_cmd::Command;
use predicates::prelude::*;

fn blogctl() -> Command {
    let mut cmd = Command::cargo_bin("blogctl").unwrap();
    // keep a developer's .env or shell from leaking into the assertions
    cmd.env_remove("DATABASE_URL")
        .env_remove("APP_ENV")
        .env_remove("BLOGCTL_BIND")
        .current_dir(std::env::temp_dir());
    cmd
}

#[test]
fn test_help_lists_commands() {
    blogctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("migrate"));
}

#[test]
fn test_serve_help() {
    blogctl()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--skip-migrations"))
        .stdout(predicate::str::contains("--database-url"));
}

#[test]
fn test_migrate_requires_database_url() {
    blogctl()
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--database-url"));
}

#[test]
fn test_serve_without_database_url_fails() {
    blogctl()
        .arg("serve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL is required"));
}

#[test]
fn test_production_requires_admin_key() {
    blogctl()
        .args(["serve", "--database-url", "postgres://blog@127.0.0.1:1/blog"])
        .env("APP_ENV", "production")
        .env_remove("ADMIN_API_KEY")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ADMIN_API_KEY is required in production"));
}
