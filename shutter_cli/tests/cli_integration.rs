use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use assert_cmd::Command;
use tempfile::tempdir;

// Minimal valid config; the state file lives next to it.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let state = dir.path().join("state.toml");
    let toml = format!(
        r#"
[pins]
# pins are unused by the simulated backends but must be present
pulse_counter = 4
motor_up = 17
motor_down = 27
button_up = 22
button_down = 23

[persistence]
path = "{}"
"#,
        state.display().to_string().replace('\\', "/")
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn shutter(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("shutter").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
#[case(&["diagnostics"], 0, "calibrated: no", "stdout")]
#[case(&["simulate", "--move", "50"], 0, "move: rejected_not_calibrated", "stdout")]
#[case(&["simulate", "--travel", "1000", "--calibrate"], 0, "calibration complete", "stdout")]
#[case(&["simulate", "--move", "half"], 2, "invalid value", "stderr")]
#[case(&["frobnicate"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = shutter(&cfg);
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

#[test]
fn missing_config_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("absent.toml");
    shutter(&cfg)
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("could not be read"))
        .stderr(predicate::str::contains("How to fix"));
}

#[test]
fn duplicate_pins_are_rejected() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(
        &cfg,
        "[pins]\npulse_counter = 4\nmotor_up = 4\nmotor_down = 27\nbutton_up = 22\nbutton_down = 23\n",
    )
    .unwrap();
    shutter(&cfg)
        .arg("diagnostics")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("pins must be distinct"));
}

#[test]
fn missing_pins_section_points_at_pins() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, "[timing]\nbutton_press_ms = 300\n").unwrap();
    shutter(&cfg)
        .arg("diagnostics")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("[pins]"));
}

#[cfg(not(feature = "hardware"))]
#[test]
fn run_without_gpio_support_asks_for_sim() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    shutter(&cfg)
        .arg("run")
        .write_stdin("")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--sim"));
}

#[test]
fn simulated_run_stops_after_max_ticks() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    shutter(&cfg)
        .args(["run", "--sim", "--max-ticks", "5"])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("stopped after 5 ticks"));
}
