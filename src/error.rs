use std::fmt;

/// Failure taxonomy for the watering rig and its collaborators.
///
/// Range errors (`InvalidChannel`, `DegenerateRange`) are configuration
/// mistakes and are validated away at startup; the I/O variants are expected
/// at runtime and must never terminate the control loop.
#[derive(Debug)]
pub enum HwError {
    /// ADC channel outside the 0..=7 range supported by the ADS7830.
    InvalidChannel(u8),
    /// Scale mapping requested over an empty input range.
    DegenerateRange(f64),
    /// I2C bus transaction with the ADC failed.
    SensorIo(String),
    /// Camera capture, image processing, or snapshot copy failed.
    ImageIo(String),
    /// GPIO access for the pump relay failed.
    ActuatorIo(String),
}

impl fmt::Display for HwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HwError::InvalidChannel(channel) => {
                write!(f, "ADC channel {} out of range 0-7", channel)
            }
            HwError::DegenerateRange(bound) => {
                write!(f, "degenerate input range: in_min == in_max == {}", bound)
            }
            HwError::SensorIo(msg) => write!(f, "sensor bus error: {}", msg),
            HwError::ImageIo(msg) => write!(f, "image capture error: {}", msg),
            HwError::ActuatorIo(msg) => write!(f, "pump output error: {}", msg),
        }
    }
}

impl std::error::Error for HwError {}
