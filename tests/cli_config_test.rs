//! Integration tests for `kuzco config`: layered resolution and source reporting.

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_defaults_are_reported_as_default() {
    let env = TestEnv::new();
    env.kuzco()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("SAFE_MODE = true  (default)"))
        .stdout(predicate::str::contains("COMMAND_TIMEOUT = 30  (default)"))
        .stdout(predicate::str::contains("SUDO_PREFIXES = sudo,su  (default)"));
}

#[test]
fn test_config_does_not_need_a_runtime() {
    let env = TestEnv::new();
    env.kuzco()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("OLLAMA_HOST = http://127.0.0.1:9  (env:OLLAMA_HOST)"));
}

#[test]
fn test_dotfile_value_is_used() {
    let env = TestEnv::new();
    env.write_config("command_timeout = 5\nsudo_prefixes = [\"sudo\", \"doas\"]\n");

    env.kuzco()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("COMMAND_TIMEOUT = 5  (file:"))
        .stdout(predicate::str::contains("SUDO_PREFIXES = sudo,doas  (file:"));
}

#[test]
fn test_dotenv_beats_dotfile() {
    let env = TestEnv::new();
    env.write_config("command_timeout = 5\n");
    env.write(".env", "COMMAND_TIMEOUT=12\n");

    env.kuzco()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("COMMAND_TIMEOUT = 12  (dotenv:"));
}

#[test]
fn test_environment_beats_dotenv() {
    let env = TestEnv::new();
    env.write(".env", "SAFE_MODE=false\n");

    env.kuzco()
        .env("SAFE_MODE", "true")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("SAFE_MODE = true  (env:SAFE_MODE)"));
}

#[test]
fn test_flags_beat_environment() {
    let env = TestEnv::new();
    env.kuzco()
        .env("DEFAULT_MODEL", "mistral")
        .args(["--model", "llama3.2", "--host", "gpu-box:11434", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DEFAULT_MODEL = llama3.2  (cli)"))
        .stdout(predicate::str::contains("OLLAMA_HOST = http://gpu-box:11434  (cli)"));
}

#[test]
fn test_empty_environment_value_falls_through() {
    let env = TestEnv::new();
    env.write_config("max_preview_size = 500\n");

    env.kuzco()
        .env("MAX_PREVIEW_SIZE", "")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("MAX_PREVIEW_SIZE = 500  (file:"));
}

#[test]
fn test_invalid_value_names_key_and_source() {
    let env = TestEnv::new();
    env.write(".env", "COMMAND_TIMEOUT=soon\n");

    env.kuzco()
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("COMMAND_TIMEOUT"))
        .stderr(predicate::str::contains("dotenv:"));
}

#[test]
fn test_malformed_dotfile_is_reported() {
    let env = TestEnv::new();
    env.write_config("command_timeout = \"soon\"\n");

    env.kuzco()
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config.toml"));
}
