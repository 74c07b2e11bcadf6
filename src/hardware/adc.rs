/// ADS7830 analog-to-digital converter access
use std::time::Duration;
use tokio::time::sleep;

use super::AdcBus;
use crate::error::HwError;

// ADS7830 command byte: single-ended conversion, channel index in bits 4-6.
const SINGLE_ENDED_CMD: u8 = 0x84;
const MAX_CHANNEL: u8 = 7;

/// Reads raw moisture samples from the ADS7830 over an I2C bus.
pub struct AnalogReader<B: AdcBus> {
    bus: B,
}

impl<B: AdcBus> AnalogReader<B> {
    pub fn new(bus: B) -> Self {
        AnalogReader { bus }
    }

    /// Read one raw sample from an ADC channel.
    ///
    /// The channel is validated before any bus traffic: an out-of-range
    /// channel is a configuration mistake, not something to clamp or encode
    /// as a sentinel sample value. Bus transaction failures surface as
    /// `SensorIo`.
    ///
    /// # Arguments
    /// * `channel` - ADC input channel, 0..=7
    ///
    /// # Returns
    /// The raw 8-bit conversion result
    pub fn read_channel(&mut self, channel: u8) -> Result<u8, HwError> {
        if channel > MAX_CHANNEL {
            return Err(HwError::InvalidChannel(channel));
        }
        self.bus.write_byte(SINGLE_ENDED_CMD | (channel << 4))?;
        self.bus.read_byte()
    }

    /// Average several sequential reads of one channel to suppress noise.
    ///
    /// Takes `samples` single reads separated by `delay` and returns the
    /// truncating integer average, matching the device-native 8-bit
    /// resolution of the result. A failed read aborts the whole poll; the
    /// caller treats that as "skip this cycle".
    pub async fn read_averaged(
        &mut self,
        channel: u8,
        samples: u32,
        delay: Duration,
    ) -> Result<u8, HwError> {
        // Zero samples is rejected at configuration time; clamp anyway so a
        // bad caller cannot divide by zero.
        let samples = samples.max(1);
        let mut total: u32 = 0;
        for _ in 0..samples {
            total += self.read_channel(channel)? as u32;
            sleep(delay).await;
        }
        Ok((total / samples) as u8)
    }
}
