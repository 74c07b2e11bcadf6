/// The sensor-to-actuator control loop with manual-override arbitration
use std::time::Duration;

use log::{info, warn};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::camera::Camera;
use crate::dashboard::Dashboard;
use crate::error::HwError;
use crate::hardware::adc::AnalogReader;
use crate::hardware::pump::PumpActuator;
use crate::hardware::{AdcBus, PumpPin};
use crate::models::MoistureReading;
use crate::utils::map_to_scale;

// Raw ADC and percentage scales for the moisture mapping. The pair of
// ranges is probed once at configuration time, so a degenerate range can
// never reach a running tick.
pub const ADC_RAW_MIN: f64 = 0.0;
pub const ADC_RAW_MAX: f64 = 255.0;
pub const PERCENT_MIN: f64 = 0.0;
pub const PERCENT_MAX: f64 = 100.0;

/// Policy knobs for one control loop instance, resolved from configuration.
pub struct ControlPolicy {
    /// ADC channel the moisture sensor is wired to.
    pub channel: u8,
    /// Samples averaged per poll.
    pub samples: u32,
    /// Delay between consecutive samples of one poll.
    pub sample_delay: Duration,
    /// Tick period.
    pub period: Duration,
    /// Moisture percentage below which watering is needed.
    pub threshold: f64,
    /// Externally visible URL of the canonical snapshot, pushed to the
    /// dashboard after each capture.
    pub image_url: String,
}

/// Owns the sensor, the actuator, and the manual-override flag; everything
/// the two concurrent collaborators may influence flows in through the
/// single-slot override channel, so no further locking is needed.
pub struct ControlLoop<B: AdcBus, P: PumpPin, C: Camera, D: Dashboard> {
    reader: AnalogReader<B>,
    pump: PumpActuator<P, C>,
    dashboard: D,
    overrides: watch::Receiver<Option<bool>>,
    policy: ControlPolicy,
    manual_override: bool,
}

impl<B: AdcBus, P: PumpPin, C: Camera, D: Dashboard> ControlLoop<B, P, C, D> {
    pub fn new(
        reader: AnalogReader<B>,
        pump: PumpActuator<P, C>,
        dashboard: D,
        overrides: watch::Receiver<Option<bool>>,
        policy: ControlPolicy,
    ) -> Self {
        ControlLoop {
            reader,
            pump,
            dashboard,
            overrides,
            policy,
            manual_override: false,
        }
    }

    pub fn pump_state(&self) -> bool {
        self.pump.state()
    }

    pub fn manual_override(&self) -> bool {
        self.manual_override
    }

    /// Run one tick.
    ///
    /// Order matters: pending override commands are applied first (at most
    /// the latest one, earlier unprocessed commands are superseded), then the
    /// automatic moisture decision runs only when no override is active. A
    /// failed poll skips the cycle and retains the previous pump state; the
    /// next period is the retry.
    pub async fn tick(&mut self) {
        // 1) Manual override commands, last-write-wins
        if self.overrides.has_changed().unwrap_or(false) {
            let command = *self.overrides.borrow_and_update();
            if let Some(on) = command {
                self.manual_override = on;
                self.apply_pump(on).await;
            }
        }

        // 2) Automatic decisions are suppressed entirely while overridden
        if self.manual_override {
            return;
        }

        // 3) Poll, map, publish, decide
        let raw = match self
            .reader
            .read_averaged(self.policy.channel, self.policy.samples, self.policy.sample_delay)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Moisture poll failed, retaining pump state: {}", e);
                return;
            }
        };

        let reading = match self.process_raw(raw) {
            Ok(reading) => reading,
            Err(e) => {
                // Unreachable with validated constants; skip the tick anyway
                warn!("Moisture mapping failed: {}", e);
                return;
            }
        };

        info!("Raw moisture: {}", reading.raw);
        info!("Moisture level: {:.2} / 100", reading.percent);
        self.dashboard.publish_moisture(reading.percent).await;

        self.apply_pump(reading.percent < self.policy.threshold).await;
    }

    /// Map one averaged raw sample onto the moisture percentage scale.
    fn process_raw(&self, raw: u8) -> Result<MoistureReading, HwError> {
        let percent = map_to_scale(raw as f64, ADC_RAW_MIN, ADC_RAW_MAX, PERCENT_MIN, PERCENT_MAX)?;
        Ok(MoistureReading { raw, percent })
    }

    /// Drive the pump; when a transition produced a snapshot, push the
    /// canonical image URL to the dashboard. Actuation failures are logged
    /// and retried implicitly on the next tick.
    async fn apply_pump(&mut self, on: bool) {
        match self.pump.set_state(on).await {
            Ok(Some(_path)) => self.dashboard.publish_pump_image(&self.policy.image_url).await,
            Ok(None) => {}
            Err(e) => warn!("Pump actuation failed: {}", e),
        }
    }

    /// Tick on the fixed period forever; cancellation comes from the
    /// process-wide shutdown signal selecting this future away.
    pub async fn run(&mut self) {
        info!(
            "Control loop started (period {:?}, threshold {:.1}%)",
            self.policy.period, self.policy.threshold
        );
        loop {
            self.tick().await;
            sleep(self.policy.period).await;
        }
    }

    /// Mandatory cleanup: force the relay to the safe OFF level. Runs on
    /// every exit path.
    pub fn release(&mut self) {
        self.pump.release();
        info!("Control loop stopped, pump released");
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::models::PumpEvent;

    /// Scripted bus replaying a queue of raw samples; errors once the queue
    /// runs dry or when poisoned.
    struct ScriptedBus {
        samples: Vec<u8>,
        poisoned: bool,
    }

    impl AdcBus for ScriptedBus {
        fn write_byte(&mut self, _byte: u8) -> Result<(), HwError> {
            if self.poisoned {
                return Err(HwError::SensorIo("bus stuck".into()));
            }
            Ok(())
        }

        fn read_byte(&mut self) -> Result<u8, HwError> {
            self.samples
                .pop()
                .ok_or_else(|| HwError::SensorIo("no sample queued".into()))
        }
    }

    struct QuietPin;

    impl PumpPin for QuietPin {
        fn set_level(&mut self, _high: bool) -> Result<(), HwError> {
            Ok(())
        }
    }

    struct FakeCamera {
        events: Arc<Mutex<Vec<PumpEvent>>>,
    }

    impl Camera for FakeCamera {
        async fn capture(&mut self, event: PumpEvent) -> Result<PathBuf, HwError> {
            self.events.lock().unwrap().push(event);
            Ok(PathBuf::from("recent.jpg"))
        }
    }

    /// Dashboard double recording everything published.
    #[derive(Clone, Default)]
    struct FakeDashboard {
        moisture: Arc<Mutex<Vec<f64>>>,
        images: Arc<Mutex<Vec<String>>>,
    }

    impl Dashboard for FakeDashboard {
        async fn publish_moisture(&self, percent: f64) {
            self.moisture.lock().unwrap().push(percent);
        }

        async fn publish_pump_image(&self, url: &str) {
            self.images.lock().unwrap().push(url.to_string());
        }
    }

    struct Rig {
        ctrl: ControlLoop<ScriptedBus, QuietPin, FakeCamera, FakeDashboard>,
        dashboard: FakeDashboard,
        captures: Arc<Mutex<Vec<PumpEvent>>>,
        commands: watch::Sender<Option<bool>>,
    }

    /// Build a loop over scripted samples; samples are consumed newest-last,
    /// `samples_per_poll` at a time.
    fn rig(samples: &[u8], samples_per_poll: u32) -> Rig {
        let mut queued = samples.to_vec();
        queued.reverse();
        let bus = ScriptedBus {
            samples: queued,
            poisoned: false,
        };

        let captures = Arc::new(Mutex::new(Vec::new()));
        let camera = FakeCamera {
            events: Arc::clone(&captures),
        };
        let pump = PumpActuator::new(QuietPin, camera).unwrap();

        let dashboard = FakeDashboard::default();
        let (commands, overrides) = watch::channel(None);

        let policy = ControlPolicy {
            channel: 0,
            samples: samples_per_poll,
            sample_delay: Duration::ZERO,
            period: Duration::from_secs(2),
            threshold: 30.0,
            image_url: "http://rig.local:8000/recent.jpg".to_string(),
        };

        Rig {
            ctrl: ControlLoop::new(AnalogReader::new(bus), pump, dashboard.clone(), overrides, policy),
            dashboard,
            captures,
            commands,
        }
    }

    #[tokio::test]
    async fn dry_reading_turns_the_pump_on_with_one_capture() {
        // Averaged: 112 / 10 = 11 raw, about 4.3%, well below the 30% threshold
        let mut rig = rig(&[10, 12, 11, 13, 9, 10, 14, 11, 12, 10], 10);

        rig.ctrl.tick().await;

        assert!(rig.ctrl.pump_state());
        assert_eq!(*rig.captures.lock().unwrap(), vec![PumpEvent::On]);
        assert_eq!(rig.dashboard.images.lock().unwrap().len(), 1);

        let published = rig.dashboard.moisture.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert!((published[0] - 4.31).abs() < 0.01);
    }

    #[tokio::test]
    async fn wet_reading_turns_the_pump_off_exactly_once() {
        // Tick 1: raw 11 -> ON. Ticks 2 and 3: raw 115 (~45%) -> OFF, then steady.
        let mut rig = rig(&[11, 115, 115], 1);

        rig.ctrl.tick().await;
        assert!(rig.ctrl.pump_state());

        rig.ctrl.tick().await;
        assert!(!rig.ctrl.pump_state());

        rig.ctrl.tick().await;
        assert!(!rig.ctrl.pump_state());

        // ON once, OFF once, nothing for the steady tick
        assert_eq!(
            *rig.captures.lock().unwrap(),
            vec![PumpEvent::On, PumpEvent::Off]
        );
        assert_eq!(rig.dashboard.images.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn override_suppresses_automatic_decisions_until_cleared() {
        // Every poll would read soaking wet (raw 204 ~ 80%)
        let mut rig = rig(&[204; 8], 1);

        // Manual ON arrives before the tick
        rig.commands.send(Some(true)).unwrap();
        rig.ctrl.tick().await;

        assert!(rig.ctrl.manual_override());
        assert!(rig.ctrl.pump_state(), "override ON beats the wet reading");
        assert_eq!(*rig.captures.lock().unwrap(), vec![PumpEvent::On]);

        // Further ticks: no polls, no publishes, pump untouched
        rig.ctrl.tick().await;
        rig.ctrl.tick().await;
        assert!(rig.ctrl.pump_state());
        assert!(rig.dashboard.moisture.lock().unwrap().is_empty());
        assert_eq!(rig.captures.lock().unwrap().len(), 1);

        // Clearing the override forces the pump off and resumes polling
        rig.commands.send(Some(false)).unwrap();
        rig.ctrl.tick().await;

        assert!(!rig.ctrl.manual_override());
        assert!(!rig.ctrl.pump_state());
        assert_eq!(
            *rig.captures.lock().unwrap(),
            vec![PumpEvent::On, PumpEvent::Off]
        );
        // Automatic polling resumed on the same tick; wet reading keeps it off
        assert_eq!(rig.dashboard.moisture.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_the_latest_pending_command_is_applied() {
        let mut rig = rig(&[204; 4], 1);

        // Two commands land between ticks; the first is superseded
        rig.commands.send(Some(true)).unwrap();
        rig.commands.send(Some(false)).unwrap();
        rig.ctrl.tick().await;

        assert!(!rig.ctrl.manual_override());
        assert!(!rig.ctrl.pump_state());
        // OFF while already off: no transition, no capture
        assert!(rig.captures.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_poll_skips_the_cycle_and_retains_pump_state() {
        let mut rig = rig(&[11], 1);

        rig.ctrl.tick().await;
        assert!(rig.ctrl.pump_state());

        // Poison the bus: the next tick must not publish or flip the pump
        rig.ctrl.reader = AnalogReader::new(ScriptedBus {
            samples: Vec::new(),
            poisoned: true,
        });
        rig.ctrl.tick().await;

        assert!(rig.ctrl.pump_state(), "previous pump state retained");
        assert_eq!(rig.dashboard.moisture.lock().unwrap().len(), 1);
        assert_eq!(rig.captures.lock().unwrap().len(), 1);
    }
}
