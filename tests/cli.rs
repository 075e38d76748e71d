// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn chainlock(home: &TempDir) -> Command {
    let mut command = Command::cargo_bin("chainlock").unwrap();
    command.env("CHAINLOCK_HOME", home.path());
    command
}

#[test]
fn test_plan_orders_tied_objects_behind_tie_break() {
    let home = TempDir::new().unwrap();
    let output = chainlock(&home)
        .args(["plan", "5", "3", "3"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();

    let tie = stdout.find("tie-break:Account").unwrap();
    let first = stdout.find("Account#3").unwrap();
    let last = stdout.find("Account#5").unwrap();
    assert!(tie < first);
    assert!(first < last);
}

#[test]
fn test_plan_without_objects_fails_with_usage_code() {
    let home = TempDir::new().unwrap();
    chainlock(&home)
        .arg("plan")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("at least one lock"));
}

#[test]
fn test_plan_rejects_unknown_class() {
    let home = TempDir::new().unwrap();
    chainlock(&home)
        .args(["plan", "vault:1"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("Unknown object class"));
}

#[test]
fn test_plan_mixed_classes_have_no_tie_break() {
    let home = TempDir::new().unwrap();
    chainlock(&home)
        .args(["plan", "7", "ledger:7"])
        .assert()
        .success()
        .stdout(contains("Account#7"))
        .stdout(contains("Ledger#7"))
        .stdout(contains("tie-break").not());
}

#[test]
fn test_stress_small_run_succeeds() {
    let home = TempDir::new().unwrap();
    chainlock(&home)
        .args([
            "stress",
            "--threads",
            "4",
            "--objects",
            "6",
            "--rounds",
            "20",
            "--set-size",
            "3",
            "--tie-modulo",
            "2",
        ])
        .assert()
        .success()
        .stdout(contains("Acquisitions"))
        .stdout(contains("80"));
}

#[test]
fn test_stress_rejects_oversized_set() {
    let home = TempDir::new().unwrap();
    chainlock(&home)
        .args(["stress", "--objects", "2", "--set-size", "3"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("--set-size"));
}

#[test]
fn test_invalid_config_file_is_reported() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("config.toml"),
        "[locking]\nretry_attempts = \"many\"\n",
    )
    .unwrap();
    chainlock(&home)
        .args(["plan", "1"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_verbose_flag_is_global() {
    let home = TempDir::new().unwrap();
    chainlock(&home)
        .args(["plan", "-vv", "1", "2"])
        .assert()
        .success();
}
