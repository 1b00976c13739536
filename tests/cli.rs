use std::fs;
use std::process::Output;

use tempfile::TempDir;

fn keyroll(args: &[&str], cwd: &TempDir) -> Output {
    test_bin::get_test_bin("keyroll")
        .args(args)
        .current_dir(cwd.path())
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> &str {
    std::str::from_utf8(&output.stdout).unwrap()
}

fn stderr(output: &Output) -> &str {
    std::str::from_utf8(&output.stderr).unwrap()
}

#[test]
fn lists_scenarios() {
    let dir = TempDir::new().unwrap();
    let output = keyroll(&["scenarios"], &dir);
    assert!(output.status.success());
    assert!(stdout(&output).contains("csk-merge-algorithm"));
}

#[test]
fn simulates_keys_from_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("keys.json"),
        r#"{ "keys": [
            { "name": "ksk", "algorithm": "RSASHA256", "role": "KSK",
              "goal": "omnipresent", "state": "omnipresent" },
            { "name": "zsk-old", "algorithm": "RSASHA256", "role": "ZSK",
              "goal": "hidden", "state": "omnipresent" },
            { "name": "zsk-new", "algorithm": "RSASHA256", "role": "ZSK",
              "goal": "omnipresent", "state": "hidden" }
        ] }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("config.json"),
        r#"{ "policy": { "purge-delay": 0 }, "options": { "min-sig": true } }"#,
    )
    .unwrap();

    let output = keyroll(
        &["-v", "simulate", "--keys", "keys.json", "--config", "config.json"],
        &dir,
    );
    assert!(output.status.success(), "{}", stderr(&output));
    let last = stdout(&output).lines().last().unwrap();
    assert_eq!(last, "settled at 24300 after 6 steps");
    assert!(stderr(&output).contains("purged zsk-old (ZSK #1)"));
}

#[test]
fn rejects_unsafe_keys() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("keys.json"),
        r#"{ "keys": [
            { "name": "zsk", "algorithm": 13, "role": "ZSK",
              "goal": "omnipresent", "state": "omnipresent" }
        ] }"#,
    )
    .unwrap();

    let output = keyroll(&["simulate", "-k", "keys.json"], &dir);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "");
    assert!(stderr(&output).contains("ERROR: the initial key states are not safe"));
}

#[test]
fn rejects_bad_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("keys.json"), r#"{ "keys": [ { "name": 1 } ] }"#).unwrap();
    fs::write(
        dir.path().join("config.json"),
        r#"{ "policy": { "zone-ttl": "forever" } }"#,
    )
    .unwrap();

    let output = keyroll(&["simulate", "-k", "keys.json"], &dir);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error parsing"));
    assert!(stderr(&output).contains("... while loading keys from"));

    let output = keyroll(&["simulate", "-s", "zsk-rollover", "-c", "config.json"], &dir);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("... while loading config from"));

    let output = keyroll(&["simulate", "--max-steps", "many"], &dir);
    assert_eq!(output.status.code(), Some(2));
}
