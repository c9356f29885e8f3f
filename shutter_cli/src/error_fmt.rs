//! Human-readable error descriptions and structured JSON error formatting.

use shutter_core::error::{BuildError, ShutterError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(BuildError::InvalidConfig(msg)) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: Invalid controller settings ({msg}).\nLikely causes: Out-of-range values in [timing], [calibration], [drift] or [window].\nHow to fix: Edit the config file, then rerun."
        );
    }

    if let Some(se) = err.downcast_ref::<ShutterError>() {
        return match se {
            ShutterError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("read config") {
                    format!(
                        "What happened: The config file could not be read ({msg}).\nLikely causes: Wrong --config path or missing read permission.\nHow to fix: Pass --config <FILE> pointing at a readable TOML file."
                    )
                } else if lower.contains("parse config") {
                    format!(
                        "What happened: The config file is not valid TOML for this controller ({msg}).\nLikely causes: A syntax error, a misspelled key or value, or a missing [pins] section.\nHow to fix: Fix the reported line; [pins] needs pulse_counter, motor_up, motor_down, button_up and button_down."
                    )
                } else {
                    format!(
                        "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
                    )
                }
            }
            ShutterError::Hardware(msg) => format!(
                "What happened: The motor controller lines could not be used ({msg}).\nLikely causes: Built without GPIO support, wrong [pins] numbers, or no permission to access GPIO.\nHow to fix: Check [pins] and the wiring; use `run --sim` to try the controller without hardware."
            ),
            ShutterError::HardwareFault(msg) => format!(
                "What happened: A GPIO line failed while the shutter was controlled ({msg}).\nLikely causes: Loose wiring, a pin claimed by another process, or a driver fault.\nHow to fix: Check the wiring and that no other service owns the pins, then restart."
            ),
            ShutterError::Storage(msg) => format!(
                "What happened: The state file could not be read or written ({msg}).\nLikely causes: Missing directory, no write permission, or a corrupted file.\nHow to fix: Check persistence.path; a corrupted file can be deleted, which forces a new calibration."
            ),
            ShutterError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: The shutter did not reach a limit, or the configured travel does not match the installation.\nHow to fix: Recalibrate, or re-run with --log-level=debug to follow the state machine."
            ),
        };
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    match err.downcast_ref::<ShutterError>() {
        Some(ShutterError::Config(_)) => "Config",
        Some(ShutterError::Hardware(_)) => "Hardware",
        Some(ShutterError::HardwareFault(_)) => "HardwareFault",
        Some(ShutterError::Storage(_)) => "Storage",
        Some(ShutterError::State(_)) => "State",
        None => "Error",
    }
}

/// Stable exit codes per error class; anything untyped returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Config" => 2,
        "Hardware" | "HardwareFault" => 3,
        "Storage" => 4,
        "State" => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "event": "error",
        "reason": reason_name(err),
        "error": format!("{err:#}"),
        "message": humanize(err),
    })
    .to_string()
}
