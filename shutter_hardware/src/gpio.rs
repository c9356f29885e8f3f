//! Raspberry Pi GPIO backend (rppal).

use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use shutter_traits::{BoxError, Button, MotorLines, ShutterIo};

use crate::error::{HwError, Result};

/// BCM pin numbers of the five wired lines.
#[derive(Debug, Clone, Copy)]
pub struct GpioPins {
    pub pulse_counter: u8,
    pub motor_up: u8,
    pub motor_down: u8,
    pub button_up: u8,
    pub button_down: u8,
}

pub struct GpioShutter {
    pulse: InputPin,
    motor_up: InputPin,
    motor_down: InputPin,
    button_up: OutputPin,
    button_down: OutputPin,
    status_active_low: bool,
    button_active_low: bool,
}

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

impl GpioShutter {
    pub fn new(pins: GpioPins, status_active_low: bool, button_active_low: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let input = |pin: u8| -> Result<InputPin> {
            let p = gpio.get(pin).map_err(gpio_err)?;
            Ok(if status_active_low {
                p.into_input_pullup()
            } else {
                p.into_input_pulldown()
            })
        };
        let pulse = gpio
            .get(pins.pulse_counter)
            .map_err(gpio_err)?
            .into_input_pullup();
        let motor_up = input(pins.motor_up)?;
        let motor_down = input(pins.motor_down)?;

        // Outputs start released.
        let output = |pin: u8| -> Result<OutputPin> {
            let p = gpio.get(pin).map_err(gpio_err)?;
            Ok(if button_active_low {
                p.into_output_high()
            } else {
                p.into_output_low()
            })
        };
        let button_up = output(pins.button_up)?;
        let button_down = output(pins.button_down)?;

        tracing::info!(
            pulse = pins.pulse_counter,
            motor_up = pins.motor_up,
            motor_down = pins.motor_down,
            button_up = pins.button_up,
            button_down = pins.button_down,
            "gpio lines claimed"
        );
        Ok(Self {
            pulse,
            motor_up,
            motor_down,
            button_up,
            button_down,
            status_active_low,
            button_active_low,
        })
    }

    /// Route falling edges of the pulse line to `on_edge`.
    ///
    /// The callback runs on rppal's interrupt thread; it must not block.
    pub fn attach_pulse_interrupt(&mut self, mut on_edge: impl FnMut() + Send + 'static) -> Result<()> {
        self.pulse
            .set_async_interrupt(Trigger::FallingEdge, move |_level: Level| on_edge())
            .map_err(gpio_err)
    }

    fn active(&self, pin: &InputPin) -> bool {
        let level = pin.read();
        if self.status_active_low {
            level == Level::Low
        } else {
            level == Level::High
        }
    }
}

impl ShutterIo for GpioShutter {
    fn motor_lines(&mut self) -> std::result::Result<MotorLines, BoxError> {
        Ok(MotorLines {
            driving_up: self.active(&self.motor_up),
            driving_down: self.active(&self.motor_down),
        })
    }

    fn set_button(&mut self, button: Button, pressed: bool) -> std::result::Result<(), BoxError> {
        let drive_low = pressed == self.button_active_low;
        let pin = match button {
            Button::Up => &mut self.button_up,
            Button::Down => &mut self.button_down,
        };
        if drive_low {
            pin.set_low();
        } else {
            pin.set_high();
        }
        Ok(())
    }
}
