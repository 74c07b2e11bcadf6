use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::control::{ADC_RAW_MAX, ADC_RAW_MIN, PERCENT_MAX, PERCENT_MIN};
use crate::utils::map_to_scale;

/// Runtime configuration, loaded from environment variables (optionally via
/// a .env file) so no credential, address, or path lives in the source.
#[derive(Debug, Clone)]
pub struct Config {
    /// MQTT broker of the cloud dashboard.
    pub mqtt_host: String,
    pub mqtt_port: u16,
    /// Device identity at the dashboard; also the MQTT client id.
    pub device_id: String,
    /// Device credential at the dashboard.
    pub device_token: String,
    /// I2C bus number the ADC hangs off.
    pub i2c_bus: u8,
    /// ADS7830 slave address.
    pub adc_address: u16,
    /// ADC channel of the moisture sensor.
    pub adc_channel: u8,
    /// BCM pin number of the pump relay.
    pub pump_pin: u8,
    /// Port of the local image gallery.
    pub http_port: u16,
    /// Directory holding recent.jpg and the timestamped history.
    pub image_dir: PathBuf,
    /// Host used to build the externally visible image URL.
    pub public_host: String,
    /// Moisture percentage below which watering is needed.
    pub moisture_threshold: f64,
    /// Control loop period.
    pub poll_period: Duration,
    /// Samples averaged per moisture poll.
    pub sample_count: u32,
    /// Delay between consecutive samples of one poll.
    pub sample_delay: Duration,
}

impl Config {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let config = Config {
            mqtt_host: required("MQTT_HOST")?,
            mqtt_port: parsed("MQTT_PORT", 1883)?,
            device_id: env::var("DEVICE_ID").unwrap_or_else(|_| "soilwatch".to_string()),
            device_token: required("DEVICE_TOKEN")?,
            i2c_bus: parsed("I2C_BUS", 1)?,
            adc_address: address("ADC_ADDRESS", 0x4b)?,
            adc_channel: parsed("ADC_CHANNEL", 0)?,
            pump_pin: parsed("PUMP_GPIO", 26)?,
            http_port: parsed("HTTP_PORT", 8000)?,
            image_dir: PathBuf::from(
                env::var("IMAGE_DIR").unwrap_or_else(|_| "/home/pi/images".to_string()),
            ),
            public_host: required("PUBLIC_HOST")?,
            moisture_threshold: parsed("MOISTURE_THRESHOLD", 30.0)?,
            poll_period: Duration::from_secs(parsed("POLL_PERIOD_SECS", 2)?),
            sample_count: parsed("SAMPLE_COUNT", 10)?,
            sample_delay: Duration::from_millis(parsed("SAMPLE_DELAY_MS", 50)?),
        };

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on range mistakes so they can never surface mid-loop.
    fn validate(&self) -> Result<(), String> {
        if self.adc_channel > 7 {
            return Err(format!(
                "ADC_CHANNEL must be 0-7, got {}",
                self.adc_channel
            ));
        }
        if self.sample_count == 0 {
            return Err("SAMPLE_COUNT must be at least 1".to_string());
        }
        if !(PERCENT_MIN..=PERCENT_MAX).contains(&self.moisture_threshold) {
            return Err(format!(
                "MOISTURE_THRESHOLD must be within {}-{}, got {}",
                PERCENT_MIN, PERCENT_MAX, self.moisture_threshold
            ));
        }
        // Probe the scale mapping once so a degenerate range is a startup
        // error, not a runtime one
        map_to_scale(ADC_RAW_MIN, ADC_RAW_MIN, ADC_RAW_MAX, PERCENT_MIN, PERCENT_MAX)
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Externally visible URL of the canonical snapshot, as published to the
    /// dashboard after each capture.
    pub fn image_url(&self) -> String {
        format!("http://{}:{}/recent.jpg", self.public_host, self.http_port)
    }
}

fn required(key: &str) -> Result<String, String> {
    env::var(key).map_err(|_| format!("{} environment variable not set", key))
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: '{}'", key, value)),
        Err(_) => Ok(default),
    }
}

/// Parse a bus address, accepting both decimal and 0x-prefixed hex.
fn address(key: &str, default: u16) -> Result<u16, String> {
    match env::var(key) {
        Ok(value) => parse_address(&value).ok_or_else(|| {
            format!("{} has an invalid value: '{}'", key, value)
        }),
        Err(_) => Ok(default),
    }
}

fn parse_address(value: &str) -> Option<u16> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}
