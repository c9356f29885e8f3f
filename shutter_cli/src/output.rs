//! Event lines on stdout: JSON objects with `--json`, short text otherwise.

use serde_json::{Value, json};
use shutter_core::{CalibrationRequest, Command, CommandResult, Diagnostics, MoveOutcome};

#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn emit(self, event: &str, fields: Value, text: impl FnOnce() -> String) {
        if self.json {
            let mut obj = json!({ "event": event });
            if let (Some(dst), Value::Object(src)) = (obj.as_object_mut(), fields) {
                dst.extend(src);
            }
            println!("{obj}");
        } else {
            println!("{}", text());
        }
    }

    pub fn report(self, percent: u8, t_ms: u64) {
        self.emit("report", json!({ "percent": percent, "t_ms": t_ms }), || {
            format!("position {percent} %")
        });
    }

    pub fn calibration(self, success: bool) {
        self.emit("calibration", json!({ "success": success }), || {
            if success {
                "calibration complete".to_string()
            } else {
                "calibration failed".to_string()
            }
        });
    }

    pub fn command(self, command: Command, result: CommandResult) {
        let name = command_name(command);
        let outcome = result_name(result);
        self.emit(
            "command",
            json!({ "command": name, "arg": command_arg(command), "result": outcome }),
            || format!("{name}: {outcome}"),
        );
    }

    pub fn step(self, fields: Value, text: impl FnOnce() -> String) {
        self.emit("step", fields, text);
    }

    pub fn summary(self, fields: Value, text: impl FnOnce() -> String) {
        self.emit("summary", fields, text);
    }

    pub fn diagnostics(self, d: &Diagnostics) {
        self.emit("diagnostics", diagnostics_json(d), || diagnostics_text(d));
    }
}

pub fn command_name(command: Command) -> &'static str {
    match command {
        Command::MoveTo(_) => "move",
        Command::Open => "open",
        Command::Close => "close",
        Command::Stop => "stop",
        Command::StartCalibration => "calibrate",
        Command::SetWindowOpen(_) => "window",
        Command::SetWindowLogic(_) => "logic",
        Command::SetDirectionInverted(_) => "invert",
        Command::ToggleDirection => "toggle",
    }
}

fn command_arg(command: Command) -> Value {
    match command {
        Command::MoveTo(p) => json!(p),
        Command::SetWindowOpen(open) | Command::SetDirectionInverted(open) => json!(open),
        Command::SetWindowLogic(logic) => json!(logic.as_str()),
        _ => Value::Null,
    }
}

pub fn result_name(result: CommandResult) -> &'static str {
    match result {
        CommandResult::Move(MoveOutcome::Started { .. }) => "started",
        CommandResult::Move(MoveOutcome::AlreadyAtTarget) => "already_at_target",
        CommandResult::Move(MoveOutcome::Rejected(r)) => match r {
            shutter_core::MoveRejection::NotCalibrated => "rejected_not_calibrated",
            shutter_core::MoveRejection::WindowOpen => "rejected_window_open",
        },
        CommandResult::Calibration(CalibrationRequest::Started) => "started",
        CommandResult::Calibration(CalibrationRequest::Busy(_)) => "busy",
        CommandResult::Done => "done",
    }
}

pub fn diagnostics_json(d: &Diagnostics) -> Value {
    json!({
        "calibrated": d.calibrated,
        "max_pulses": d.max_pulses,
        "current_pulses": d.current_pulses,
        "percent": d.percent,
        "state": d.state.map(|s| s.as_str()),
        "full_cycles": d.full_cycles,
        "measured_average": d.measured_average,
        "drift_percent": d.drift_percent,
        "drift_pulses": d.drift_pulses,
        "top_history": d.top_history,
        "bottom_history": d.bottom_history,
        "pulses": d.pulses.map(|p| json!({ "accepted": p.accepted, "rejected": p.rejected })),
    })
}

fn diagnostics_text(d: &Diagnostics) -> String {
    let mut out = if d.calibrated {
        format!(
            "calibrated: {} pulses full travel\nposition: {} % ({} pulses)",
            d.max_pulses, d.percent, d.current_pulses
        )
    } else {
        "calibrated: no".to_string()
    };
    if let Some(state) = d.state {
        out.push_str(&format!("\nstate: {state}"));
    }
    out.push_str(&format!(
        "\nfull cycles since last correction: {}\nlimit samples: {} top, {} bottom",
        d.full_cycles,
        d.top_history.len(),
        d.bottom_history.len()
    ));
    if let (Some(avg), Some(pct)) = (d.measured_average, d.drift_percent) {
        out.push_str(&format!("\nmeasured travel: {avg:.1} pulses ({pct:.2} % drift)"));
    }
    out
}
