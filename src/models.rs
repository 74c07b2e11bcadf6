use std::fmt;

/// Tag attached to a pump state transition, rendered into image filenames
/// and logs as "ON"/"OFF".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEvent {
    On,
    Off,
}

impl PumpEvent {
    pub fn from_state(on: bool) -> Self {
        if on {
            PumpEvent::On
        } else {
            PumpEvent::Off
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PumpEvent::On => "ON",
            PumpEvent::Off => "OFF",
        }
    }
}

impl fmt::Display for PumpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One processed moisture poll: the raw ADC code and its percentage mapping.
/// Recomputed every cycle, never persisted.
#[derive(Debug, Clone, Copy)]
pub struct MoistureReading {
    pub raw: u8,
    pub percent: f64,
}
