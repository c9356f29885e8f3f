#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Roller-shutter position engine (hardware-agnostic).
//!
//! The motor controller only exposes two status lines and two emulated wall
//! buttons; the belt emits one pulse per fixed increment of travel. This
//! crate reconstructs the 0–100 % position from those pulses and drives the
//! buttons to reach requested positions. All hardware interaction goes
//! through `shutter_traits::ShutterIo` and `shutter_traits::KeyValueStore`.
//!
//! ## Architecture
//!
//! - **Pulses**: lock-free interrupt accumulator, drained per tick (`pulse`)
//! - **Direction**: debounced status lines (`direction`)
//! - **Buttons**: press/hold/release/cooldown with stop priority (`button`)
//! - **Calibration**: up/down traversal validation (`calibration`)
//! - **Drift**: limit-sample ring buffers and travel correction (`drift`)
//! - **Throttle**: upstream report suppression (`throttle`)
//! - **Control**: the state machine tying it together (`MotionController`)
//!
//! Positions are pulse counts from fully open: 0 % is open, 100 % is closed,
//! and moving down adds pulses.

pub mod builder;
pub mod button;
pub mod calibration;
pub mod command;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod diagnostics;
pub mod direction;
pub mod drift;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod persist;
pub mod pulse;
pub mod runner;
pub mod status;
pub mod throttle;
pub mod util;

pub use builder::{Missing, ShutterBuilder};
pub use command::{Command, CommandResult};
pub use config::{
    CalibrationCfg, DriftCfg, MotionCfg, PersistCfg, ShutterCfg, ThrottleCfg, TimingCfg,
    WindowCfg, WindowOpenLogic,
};
pub use controller::MotionController;
pub use diagnostics::Diagnostics;
pub use direction::Direction;
pub use error::{BuildError, Result, ShutterError};
pub use pulse::{PulseCounter, PulseHandle, PulseStats};
pub use runner::{RunSummary, Runner};
pub use status::{CalibrationRequest, MotionState, MoveOutcome, MoveRejection};
