// Licensed under the Apache-2.0 license

//! Common types and constants for the I2C engine.

/// Bus clock rate in Hz.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
}

/// Engine configuration.
///
/// `poll_limit` bounds every busy-wait on a hardware flag; when the
/// peripheral never signals completion the engine reports a bus timeout
/// instead of hanging.
pub struct I2cConfig {
    pub speed: I2cSpeed,
    pub internal_pullups: bool,
    pub poll_limit: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfigBuilder::new().build()
    }
}

pub struct I2cConfigBuilder {
    speed: I2cSpeed,
    internal_pullups: bool,
    poll_limit: u32,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: I2cSpeed::Standard,
            internal_pullups: false,
            poll_limit: 100_000,
        }
    }

    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub fn internal_pullups(mut self, enabled: bool) -> Self {
        self.internal_pullups = enabled;
        self
    }

    #[must_use]
    pub fn poll_limit(mut self, limit: u32) -> Self {
        self.poll_limit = limit;
        self
    }

    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            speed: self.speed,
            internal_pullups: self.internal_pullups,
            poll_limit: self.poll_limit,
        }
    }
}
