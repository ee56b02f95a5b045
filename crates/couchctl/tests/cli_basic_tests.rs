use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper to create a test command isolated from the caller's environment
fn couchctl() -> Command {
    let mut cmd = Command::cargo_bin("couchctl").unwrap();
    cmd.env_remove("COUCH_URL")
        .env_remove("COUCH_USER")
        .env_remove("COUCH_PASSWORD")
        .env_remove("COUCHCTL_PROFILE")
        .env_remove("COUCHCTL_CONFIG_FILE")
        .env_remove("RUST_LOG");
    cmd
}

/// Command bound to a config file inside `dir`
fn couchctl_with_config(dir: &TempDir) -> Command {
    let mut cmd = couchctl();
    cmd.arg("--config-file").arg(dir.path().join("config.toml"));
    cmd
}

#[test]
fn test_help_flag() {
    couchctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("CouchDB management CLI"))
        .stdout(predicate::str::contains("EXAMPLES:"));
}

#[test]
fn test_help_short_flag() {
    couchctl()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    couchctl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("couchctl"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_args_shows_help() {
    couchctl()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_invalid_subcommand() {
    couchctl()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_invalid_auth_mode_is_rejected() {
    couchctl()
        .args(["--auth", "kerberos", "info"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("kerberos"));
}

#[test]
fn test_db_help_lists_subcommands() {
    couchctl()
        .args(["db", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ensure-deleted"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_profile_list_empty() {
    let dir = TempDir::new().unwrap();
    couchctl_with_config(&dir)
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No profiles configured"));
}

#[test]
fn test_profile_path_uses_config_file() {
    let dir = TempDir::new().unwrap();
    couchctl_with_config(&dir)
        .args(["profile", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_profile_set_show_remove() {
    let dir = TempDir::new().unwrap();

    couchctl_with_config(&dir)
        .args([
            "profile",
            "set",
            "local",
            "--url",
            "http://localhost:5984",
            "--user",
            "admin",
            "--password",
            "secret",
            "--auth",
            "cookie",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Profile 'local' saved"));

    let written = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(written.contains(r#"default_profile = "local""#));
    assert!(written.contains(r#"auth = "cookie""#));

    couchctl_with_config(&dir)
        .args(["profile", "show", "local", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"url\": \"http://localhost:5984\""))
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("secret").not());

    couchctl_with_config(&dir)
        .args(["profile", "list", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"local\""));

    couchctl_with_config(&dir)
        .args(["profile", "remove", "local"])
        .assert()
        .success();

    couchctl_with_config(&dir)
        .args(["profile", "show", "local"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Profile 'local' not found"));
}

#[test]
fn test_profile_set_without_url_fails() {
    let dir = TempDir::new().unwrap();
    couchctl_with_config(&dir)
        .args(["profile", "set", "local"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--url is required"));
}

#[test]
fn test_unknown_profile_reports_suggestion() {
    let dir = TempDir::new().unwrap();
    couchctl_with_config(&dir)
        .args(["--profile", "missing", "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("couchctl profile list"));
}

#[test]
fn test_corrupt_config_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[[[broken").unwrap();

    couchctl_with_config(&dir)
        .args(["profile", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}
