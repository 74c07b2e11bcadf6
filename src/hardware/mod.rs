pub mod adc;
pub mod pump;

use rppal::gpio::Gpio;
use rppal::i2c::I2c;

use crate::error::HwError;

/// Bus transaction primitives for the ADC: one command byte out, one sample
/// byte back. Abstracted so the reader can run against a mock off-target.
pub trait AdcBus {
    fn write_byte(&mut self, byte: u8) -> Result<(), HwError>;
    fn read_byte(&mut self) -> Result<u8, HwError>;
}

/// Digital output line driving the pump relay.
pub trait PumpPin {
    /// Drive the line high or low. Active-low wiring: LOW switches the
    /// pump on.
    fn set_level(&mut self, high: bool) -> Result<(), HwError>;
}

/// Production ADC bus over the Raspberry Pi I2C peripheral, with the slave
/// address latched at open time.
pub struct PiI2cBus {
    i2c: I2c,
}

impl PiI2cBus {
    pub fn open(bus: u8, address: u16) -> Result<Self, HwError> {
        let mut i2c = I2c::with_bus(bus)
            .map_err(|e| HwError::SensorIo(format!("failed to open I2C bus {}: {}", bus, e)))?;
        i2c.set_slave_address(address).map_err(|e| {
            HwError::SensorIo(format!("failed to address ADC at {:#04x}: {}", address, e))
        })?;
        Ok(PiI2cBus { i2c })
    }
}

impl AdcBus for PiI2cBus {
    fn write_byte(&mut self, byte: u8) -> Result<(), HwError> {
        self.i2c
            .write(&[byte])
            .map(|_| ())
            .map_err(|e| HwError::SensorIo(format!("I2C write failed: {}", e)))
    }

    fn read_byte(&mut self) -> Result<u8, HwError> {
        let mut buffer = [0u8; 1];
        self.i2c
            .read(&mut buffer)
            .map_err(|e| HwError::SensorIo(format!("I2C read failed: {}", e)))?;
        Ok(buffer[0])
    }
}

/// Production relay line over the Raspberry Pi GPIO peripheral.
pub struct PiRelayPin {
    pin: rppal::gpio::OutputPin,
}

impl PiRelayPin {
    /// Claim the pump GPIO line, starting at the high (pump off) level.
    pub fn claim(pin_number: u8) -> Result<Self, HwError> {
        let gpio = Gpio::new()
            .map_err(|e| HwError::ActuatorIo(format!("failed to open GPIO: {}", e)))?;
        let pin = gpio
            .get(pin_number)
            .map_err(|e| {
                HwError::ActuatorIo(format!("failed to claim GPIO {}: {}", pin_number, e))
            })?
            .into_output_high();
        Ok(PiRelayPin { pin })
    }
}

impl PumpPin for PiRelayPin {
    fn set_level(&mut self, high: bool) -> Result<(), HwError> {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}
