//! Maps `Box<dyn Error>` from trait boundaries to typed `ShutterError`.
//!
//! The traits in `shutter_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `shutter_hardware::HwError` downcasting.

use crate::error::ShutterError;

/// Map a line I/O error to a typed `ShutterError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ShutterError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<shutter_hardware::error::HwError>() {
            return match hw {
                shutter_hardware::error::HwError::Gpio(msg) => {
                    ShutterError::HardwareFault(format!("gpio: {msg}"))
                }
                other => ShutterError::HardwareFault(other.to_string()),
            };
        }
    }

    ShutterError::Hardware(e.to_string())
}

/// Map a key-value store error to a typed `ShutterError`.
pub fn map_store_error(e: &(dyn std::error::Error + 'static)) -> ShutterError {
    ShutterError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_errors_stay_generic() {
        let e = std::io::Error::other("line stuck");
        assert!(matches!(map_hw_error(&e), ShutterError::Hardware(s) if s.contains("line stuck")));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hardware_errors_are_faults() {
        let e = shutter_hardware::error::HwError::Gpio("pin 4 busy".into());
        assert!(matches!(map_hw_error(&e), ShutterError::HardwareFault(s) if s.contains("pin 4")));
    }
}
