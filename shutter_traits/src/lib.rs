pub mod clock;

pub use clock::{Clock, MonotonicClock};

#[cfg(any(test, feature = "test-util"))]
pub use clock::manual::ManualClock;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One of the two simulated wall-switch outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
}

/// Snapshot of the two motor-driver status lines, already normalized so that
/// `true` means "the driver is powering the motor in this direction".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorLines {
    pub driving_up: bool,
    pub driving_down: bool,
}

/// Line I/O towards the existing motor controller.
///
/// Implementations translate electrical levels (active-low etc.) so the
/// engine only deals with logical "driving" and "pressed" states.
pub trait ShutterIo {
    fn motor_lines(&mut self) -> Result<MotorLines, BoxError>;
    fn set_button(&mut self, button: Button, pressed: bool) -> Result<(), BoxError>;
}

/// Minimal key-value persistence contract.
pub trait KeyValueStore {
    /// `Ok(None)` when the key has never been written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError>;
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), BoxError>;
}

impl<T: ShutterIo + ?Sized> ShutterIo for Box<T> {
    fn motor_lines(&mut self) -> Result<MotorLines, BoxError> {
        (**self).motor_lines()
    }
    fn set_button(&mut self, button: Button, pressed: bool) -> Result<(), BoxError> {
        (**self).set_button(button, pressed)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        (**self).get(key)
    }
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), BoxError> {
        (**self).put(key, value)
    }
}
