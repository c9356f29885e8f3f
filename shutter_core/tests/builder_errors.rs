use std::sync::Arc;

use rstest::rstest;
use shutter_core::{BuildError, MotionController, ShutterCfg};
use shutter_traits::{BoxError, Button, ManualClock, MotorLines, ShutterIo};

struct Idle;

impl ShutterIo for Idle {
    fn motor_lines(&mut self) -> Result<MotorLines, BoxError> {
        Ok(MotorLines::default())
    }
    fn set_button(&mut self, _: Button, _: bool) -> Result<(), BoxError> {
        Ok(())
    }
}

#[rstest]
#[case::zero_press(|c: &mut ShutterCfg| c.timing.button_press_ms = 0, "button_press_ms")]
#[case::zero_debounce(|c: &mut ShutterCfg| c.timing.direction_stable_ticks = 0, "direction_stable_ticks")]
#[case::zero_timeout(|c: &mut ShutterCfg| c.calibration.timeout_ms = 0, "timeout_ms")]
#[case::wide_tolerance(|c: &mut ShutterCfg| c.calibration.tolerance_pct = 80.0, "tolerance_pct")]
#[case::warning_above_correction(|c: &mut ShutterCfg| c.drift.warning_pct = 12.0, "warning_pct")]
#[case::narrow_plausibility(|c: &mut ShutterCfg| c.drift.plausibility_pct = 5.0, "plausibility_pct")]
#[case::oversized_sample_window(|c: &mut ShutterCfg| c.drift.min_samples = 11, "min_samples")]
#[case::zero_cycles(|c: &mut ShutterCfg| c.drift.min_cycles = 0, "min_cycles")]
#[case::ventilation_out_of_range(|c: &mut ShutterCfg| c.window.ventilation_percent = 101, "ventilation_percent")]
fn invalid_configuration_is_rejected(#[case] tweak: fn(&mut ShutterCfg), #[case] field: &str) {
    let mut cfg = ShutterCfg::default();
    tweak(&mut cfg);
    let err = MotionController::builder()
        .with_config(cfg)
        .with_clock(Arc::new(ManualClock::new()))
        .with_io(Idle)
        .build()
        .unwrap_err();
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(msg)) => assert!(msg.contains(field), "{msg}"),
        None => panic!("unexpected error: {err:?}"),
    }
}

#[test]
fn defaults_build_uncalibrated() {
    let ctl = MotionController::builder()
        .with_clock(Arc::new(ManualClock::new()))
        .with_io(Idle)
        .build()
        .unwrap();
    assert!(!ctl.is_calibrated());
    assert_eq!(ctl.current_percent(), 0);
    assert!(ctl.pulse_stats().accepted == 0);
}

#[test]
fn config_file_values_reach_the_controller() {
    let toml = r#"
        [pins]
        pulse_counter = 4
        motor_up = 17
        motor_down = 27
        button_up = 22
        button_down = 23

        [timing]
        button_press_ms = 250

        [window]
        logic = "ventilation_position"
        ventilation_percent = 20
    "#;
    let file = shutter_config::load_toml(toml).unwrap();
    file.validate().unwrap();
    let cfg = ShutterCfg::from(&file);
    assert_eq!(cfg.timing.button_press_ms, 250);
    assert_eq!(cfg.window.ventilation_percent, 20);

    let ctl = MotionController::builder()
        .with_config(cfg)
        .with_clock(Arc::new(ManualClock::new()))
        .with_io(Idle)
        .build()
        .unwrap();
    assert_eq!(
        ctl.window_open_logic(),
        shutter_core::WindowOpenLogic::VentilationPosition
    );
}
