use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("otpvault")
        .env("OTPVAULT_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(dir.path().to_str().unwrap()))
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    cargo_bin_cmd!("otpvault")
        .env("OTPVAULT_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("server_url ="));
    assert!(contents.contains("[ticker]"));
}

#[test]
fn test_config_init_refuses_overwrite() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "server_url = \"http://x\"\n").unwrap();

    cargo_bin_cmd!("otpvault")
        .env("OTPVAULT_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "server_url = [").unwrap();

    cargo_bin_cmd!("otpvault")
        .env("OTPVAULT_HOME", dir.path())
        .env_remove("OTPVAULT_SERVER_URL")
        .arg("status")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("load config"));
}

#[test]
fn test_bad_server_flag_is_rejected() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("otpvault")
        .env("OTPVAULT_HOME", dir.path())
        .env_remove("OTPVAULT_SERVER_URL")
        .args(["--server", "ftp://vault", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported scheme"));
}
