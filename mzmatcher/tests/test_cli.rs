use std::{error::Error, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

#[test]
fn test_file_missing() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzmatcher")?;

    cmd.arg("not_real.json").arg("-o").arg("-");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not_real.json"));
    Ok(())
}

#[test]
fn test_malformed_annotator() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzmatcher")?;

    cmd.arg("./tests/data/features.json")
        .args(["-a", "glycan:g=library.json"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unknown annotator kind `glycan`"));

    let mut cmd = Command::cargo_bin("mzmatcher")?;

    cmd.arg("./tests/data/features.json")
        .args(["-a", "library.json"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("does not name a library"));
    Ok(())
}

#[test]
fn test_run() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzmatcher")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/features.json").args([
        "-m",
        "./tests/data/ms1.json",
        "-a",
        "mass:msp=./tests/data/library.json",
        "-o",
        "-",
        "-t",
        "2",
    ]);
    let result = cmd.assert().success();
    result
        .stderr(predicate::str::contains("Reference matched: 2"))
        .stderr(predicate::str::contains("Suggested: 1"))
        .stderr(predicate::str::contains("Unknown: 1"))
        .stdout(predicate::str::contains("\"Caffeine\""));
    Ok(())
}
