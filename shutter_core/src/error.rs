use thiserror::Error;

/// Failures that leave the control loop. Domain rejections (uncalibrated,
/// window open, busy) are outcome values instead.
#[derive(Debug, Error, Clone)]
pub enum ShutterError {
    #[error("hardware error: {0}")]
    Hardware(String),
    /// A line failed while in use; the motor state is unknown.
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    /// Only surfaced by the CLI; the controller logs and defaults instead.
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
