use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &Path) -> PathBuf {
    let toml = format!(
        "[pins]\npulse_counter = 4\nmotor_up = 17\nmotor_down = 27\nbutton_up = 22\nbutton_down = 23\n\n[persistence]\npath = \"{}\"\n",
        dir.join("state.toml").display()
    );
    let path = dir.join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

/// Run `shutter --json <args>` and parse every stdout line.
fn events(cfg: &Path, args: &[&str]) -> Vec<Value> {
    let out = Command::cargo_bin("shutter")
        .unwrap()
        .arg("--config")
        .arg(cfg)
        .arg("--json")
        .args(args)
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("not JSON ({e}): {l}")))
        .collect()
}

fn of_kind<'a>(events: &'a [Value], kind: &str) -> Vec<&'a Value> {
    events.iter().filter(|e| e["event"] == kind).collect()
}

#[test]
fn every_line_names_its_event() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let evs = events(&cfg, &["simulate", "--travel", "1000", "--calibrate", "--move", "50"]);
    for e in &evs {
        let kind = e["event"].as_str().expect("event field");
        assert!(
            ["command", "report", "calibration", "step", "diagnostics"].contains(&kind),
            "{e}"
        );
    }
}

#[test]
fn calibrated_half_open_move_reports_fifty() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let evs = events(&cfg, &["simulate", "--travel", "1000", "--calibrate", "--move", "50"]);

    let cal = of_kind(&evs, "calibration");
    assert_eq!(cal.len(), 1);
    assert_eq!(cal[0]["success"], true);

    let commands = of_kind(&evs, "command");
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[1]["command"], "move");
    assert_eq!(commands[1]["arg"], 50);
    assert_eq!(commands[1]["result"], "started");

    let steps = of_kind(&evs, "step");
    let last = steps.last().unwrap();
    // Percentages truncate; an opening move may stop a pulse or two past 50 %.
    let pct = last["percent"].as_u64().unwrap();
    assert!((49..=50).contains(&pct), "at {pct} %");
    let sim = last["sim_percent"].as_f64().unwrap();
    assert!((sim - 50.0).abs() <= 1.0, "shutter at {sim} %");

    let reports = of_kind(&evs, "report");
    assert_eq!(reports.last().unwrap()["percent"].as_u64(), Some(pct));
    assert!(reports.iter().all(|r| r["t_ms"].is_u64()));

    let diag = of_kind(&evs, "diagnostics");
    assert_eq!(diag.len(), 1);
    assert_eq!(diag[0]["state"], "stopped");
    assert!(diag[0]["pulses"]["accepted"].as_u64().unwrap() > 2000);
}

#[test]
fn open_window_blocks_closing() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let evs = events(
        &cfg,
        &[
            "simulate", "--travel", "1000", "--calibrate", "--window-open", "--move", "0",
            "--move", "100",
        ],
    );
    let results: Vec<&str> = of_kind(&evs, "command")
        .iter()
        .filter(|c| c["command"] == "move")
        .map(|c| c["result"].as_str().unwrap())
        .collect();
    assert_eq!(results, ["started", "rejected_window_open"]);
    assert_eq!(of_kind(&evs, "step").last().unwrap()["percent"], 0);
}

#[test]
fn persisted_state_survives_between_invocations() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    events(
        &cfg,
        &["simulate", "--persist", "--travel", "1000", "--calibrate", "--move", "25"],
    );

    let diag = events(&cfg, &["diagnostics"]);
    assert_eq!(diag.len(), 1);
    let d = &diag[0];
    assert_eq!(d["event"], "diagnostics");
    assert_eq!(d["calibrated"], true);
    let max = d["max_pulses"].as_i64().unwrap();
    assert!((998..=1002).contains(&max), "max {max}");
    let pct = d["percent"].as_u64().unwrap();
    assert!((24..=25).contains(&pct), "at {pct} %");
    assert!(d["state"].is_null());

    // The second session resumes at 25 % and can open fully.
    let evs = events(&cfg, &["simulate", "--persist", "--travel", "1000", "--move", "0"]);
    let step = of_kind(&evs, "step");
    assert_eq!(step.last().unwrap()["percent"], 0);
    assert_eq!(step.last().unwrap()["sim_percent"], 0.0);
}

#[test]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let out = Command::cargo_bin("shutter")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("--json")
        .arg("diagnostics")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let line = stderr.lines().last().unwrap();
    let v: Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["event"], "error");
    assert_eq!(v["reason"], "Config");
    assert!(v["message"].as_str().unwrap().starts_with("What happened:"));
}
