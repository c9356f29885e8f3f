//! Backends for the shutter line I/O and state storage.
//!
//! `SimulatedShutter` models the whole installation for tests and the
//! `simulate` command; `GpioShutter` drives real lines on a Raspberry Pi
//! when the `hardware` feature is enabled.

pub mod error;
pub mod sim;
pub mod store;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use error::HwError;
pub use sim::{SimMotion, SimParams, SimulatedIo, SimulatedShutter};
pub use store::{FileStore, MemoryStore};

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio::{GpioPins, GpioShutter};
