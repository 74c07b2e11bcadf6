/// Pump relay state machine with capture-on-transition
use std::path::PathBuf;

use log::{info, warn};

use super::PumpPin;
use crate::camera::Camera;
use crate::error::HwError;
use crate::models::PumpEvent;

/// Owns the relay line and the single durable piece of process state: the
/// logical pump state. After every successful write the physical line is the
/// active-low image of that state.
pub struct PumpActuator<P: PumpPin, C: Camera> {
    pin: P,
    camera: C,
    state: bool,
}

impl<P: PumpPin, C: Camera> PumpActuator<P, C> {
    /// Take ownership of the relay line and start in the OFF state.
    pub fn new(mut pin: P, camera: C) -> Result<Self, HwError> {
        // Active-low wiring: a high line keeps the pump off
        pin.set_level(true)?;
        Ok(PumpActuator {
            pin,
            camera,
            state: false,
        })
    }

    pub fn state(&self) -> bool {
        self.state
    }

    /// Drive the pump to `desired`.
    ///
    /// The line is re-asserted on every call, but a photo is captured only on
    /// a real state transition, so repeated calls with the same value are
    /// idempotent and produce no duplicate captures. A capture failure is
    /// logged and swallowed: the state change stands, since watering
    /// correctness must never depend on camera health.
    ///
    /// # Returns
    /// The captured snapshot path when a transition produced one
    pub async fn set_state(&mut self, desired: bool) -> Result<Option<PathBuf>, HwError> {
        // Logic LOW switches the pump on
        self.pin.set_level(!desired)?;
        if desired == self.state {
            return Ok(None);
        }

        self.state = desired;
        let event = PumpEvent::from_state(desired);
        info!("Pump turned {}", event.as_str().to_lowercase());

        match self.camera.capture(event).await {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                warn!("Image capture after pump transition failed: {}", e);
                Ok(None)
            }
        }
    }

    /// Force the relay to the safe OFF level. Called on every shutdown path,
    /// regardless of the logical state; deliberately capture-free.
    pub fn release(&mut self) {
        if let Err(e) = self.pin.set_level(true) {
            warn!("Failed to release pump relay: {}", e);
        }
        self.state = false;
    }
}
