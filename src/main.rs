mod camera;
mod config;
mod control;
mod dashboard;
mod error;
mod gallery;
mod hardware;
mod models;
mod utils;

use log::{error, info};
use tokio::signal::unix::{signal, SignalKind};

use camera::WebcamCamera;
use config::Config;
use control::{ControlLoop, ControlPolicy};
use hardware::adc::AnalogReader;
use hardware::pump::PumpActuator;
use hardware::{PiI2cBus, PiRelayPin};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match Config::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    info!("Starting plant watering controller");

    // The camera and the gallery both expect the image directory to exist
    std::fs::create_dir_all(&config.image_dir)?;

    // Hardware: I2C ADC for the moisture sensor, one GPIO line for the pump
    let bus = PiI2cBus::open(config.i2c_bus, config.adc_address)?;
    let reader = AnalogReader::new(bus);
    let pin = PiRelayPin::claim(config.pump_pin)?;
    let camera = WebcamCamera::new(config.image_dir.clone());
    let pump = PumpActuator::new(pin, camera)?;

    // Image gallery on its own task, so HTTP traffic never delays a poll
    let gallery_dir = config.image_dir.clone();
    let gallery_port = config.http_port;
    tokio::spawn(async move {
        if let Err(e) = gallery::serve(gallery_dir, gallery_port).await {
            error!("Gallery server failed: {}", e);
        }
    });

    // Cloud dashboard: telemetry out, override commands in
    let link = dashboard::connect(&config);

    let policy = ControlPolicy {
        channel: config.adc_channel,
        samples: config.sample_count,
        sample_delay: config.sample_delay,
        period: config.poll_period,
        threshold: config.moisture_threshold,
        image_url: config.image_url(),
    };
    let mut ctrl = ControlLoop::new(
        reader,
        pump,
        link.dashboard.clone(),
        link.overrides,
        policy,
    );

    // Run until SIGINT or SIGTERM
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = ctrl.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
        }
        _ = sigterm.recv() => {
            info!("Termination requested, shutting down");
        }
    }

    // Mandatory cleanup on every exit path: pump relay to the safe level,
    // dashboard told we are gone
    ctrl.release();
    link.dashboard.announce_offline().await;
    link.task.abort();

    info!("Shutdown complete");
    Ok(())
}
