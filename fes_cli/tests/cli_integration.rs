use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Defaults everywhere except a store inside the temp dir
fn write_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let store = dir.path().join("params.toml");
    let toml = format!(
        r#"
[store]
path = '{}'

[session]
# shorter stance and hold keep the simulation quick
transition_ms = 1000
hold_ms = 500

{extra}
"#,
        store.display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn fes(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("fes").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["simulate"], 0, "session complete", "stdout")]
#[case(&["simulate", "--body-weight", "90", "--mese-steps", "6"], 0, "MESE 30, MESE_max 36", "stdout")]
#[case(&["simulate", "--max-ms", "100"], 1, "did not finish", "stderr")]
#[case(&["simulate", "--body-weight", "5"], 2, "body-weight", "stderr")]
#[case(&["params"], 2, "Usage", "stderr")]
#[case(&["self-check"], 0, "OK", "stdout")]
#[case(&["run", "both", "--duration-ms", "50"], 0, "gateway:", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let mut cmd = fes(&cfg);
    for a in args {
        cmd.arg(a);
    }
    let assert = cmd.assert().code(exit_code);

    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

// Long enough for an undrained bus queue to fill several times over
#[rstest]
#[case("gateway")]
#[case("stimulator")]
fn lone_node_run_does_not_flood_the_log(#[case] node: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    fes(&cfg)
        .args(["run", node, "--duration-ms", "3000"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{node}:")))
        .stderr(predicate::str::contains("send failed").not());
}

#[rstest]
#[case("[pins]\npair_a = [17, 27]\npair_b = [17, 23]", "pins must be distinct")]
#[case("[gateway]\nceiling_percent = 90", "ceiling_percent must be >= 100")]
#[case("[stimulator]\npulse_rate_hz = 0", "pulse_rate_hz must be in 1..=1000")]
fn self_check_rejects_bad_config(#[case] extra: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, extra);

    fes(&cfg)
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid configuration"))
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn unparsable_config_is_a_config_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(&path, "[gateway\nbus_period_ms = ").unwrap();

    fes(&path)
        .arg("--json")
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("\"reason\":\"Config\""));
}

#[rstest]
fn simulate_json_reports_the_full_session() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let out = fes(&cfg)
        .arg("--json")
        .arg("simulate")
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();

    let phases: Vec<&str> = v["phases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert_eq!(phases.first(), Some(&"Disconnected"));
    assert!(phases.contains(&"OperationClosedLoop"));
    assert_eq!(phases.last(), Some(&"Disconnected"));
    assert_eq!(v["mese"], 15);
    assert_eq!(v["mese_max"], 18);
    let peak = v["peak_width_us"].as_u64().unwrap();
    assert!((15..=18).contains(&peak));
    assert_eq!(v["final_stimulator_state"], "OpenLoop");
}

#[rstest]
fn params_show_and_reset_use_the_store_file() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    fs::write(dir.path().join("params.toml"), "gain = 80\nbody_weight = 72\n").unwrap();

    fes(&cfg)
        .args(["params", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gain = 80 (stored)"))
        .stdout(predicate::str::contains("hold_ms = 500 (default)"))
        .stdout(predicate::str::contains("body_weight = 72 (stored)"));

    fes(&cfg)
        .args(["params", "reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cleared 2 stored values"));

    let out = fes(&cfg)
        .args(["--json", "params", "show"])
        .output()
        .unwrap();
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["stored"].as_object().unwrap().len(), 0);
    assert_eq!(v["effective"]["gain"], 50);
}

#[rstest]
fn broken_store_file_fails_self_check() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    fs::write(dir.path().join("params.toml"), "gain = \"high\"\n").unwrap();

    fes(&cfg)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("fes params reset"));
}
