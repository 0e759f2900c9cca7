use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("otpvault")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("codes"))
        .stdout(predicate::str::contains("add-image"))
        .stdout(predicate::str::contains("remove"));
}

#[test]
fn test_add_help_shows_sources() {
    cargo_bin_cmd!("otpvault")
        .args(["add", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--uri"))
        .stdout(predicate::str::contains("--secret"))
        .stdout(predicate::str::contains("--algorithm"));
}

#[test]
fn test_password_value_is_hidden_in_help() {
    cargo_bin_cmd!("otpvault")
        .env("OTPVAULT_PASSWORD", "supersecret")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("supersecret").not());
}

#[test]
fn test_add_without_source_is_usage_error() {
    cargo_bin_cmd!("otpvault")
        .arg("add")
        .assert()
        .failure()
        .code(2);
}
