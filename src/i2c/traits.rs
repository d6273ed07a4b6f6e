// Licensed under the Apache-2.0 license

//! Hardware abstraction seam for the I2C master engine.
//!
//! The engine owns the protocol state machine (start, address, ACK/NACK
//! handshaking, stop); a platform crate implements [`I2cHardware`] over its
//! memory-mapped register block. The trait is deliberately at the
//! register-cell level so the same engine drives AVR TWI-style and
//! STM32-style controllers, and so host tests can substitute a simulated
//! bus.

use crate::i2c::common::I2cConfig;

/// Transfer direction carried in the address frame's R/W bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

/// What the peripheral reports once a transfer-complete flag is raised.
///
/// This is the decoded form of the controller's raw status register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusEvent {
    /// Start condition has been driven onto the bus.
    StartSent,
    /// Repeated start condition has been driven onto the bus.
    RepeatedStartSent,
    /// Address frame transmitted, slave pulled SDA low.
    AddressAcked,
    /// Address frame transmitted, no slave responded.
    AddressNacked,
    /// Data byte transmitted and acknowledged.
    DataAcked,
    /// Data byte transmitted, slave did not acknowledge.
    DataNacked,
    /// Byte received; controller answered with ACK.
    ByteReceivedAcked,
    /// Byte received; controller answered with NACK.
    ByteReceivedNacked,
    /// Lost arbitration to another master.
    ArbitrationLost,
    /// Illegal start/stop or other electrical fault.
    Fault,
}

/// Register-level access to one I2C peripheral.
pub trait I2cHardware {
    /// Program clock rate and pull-up configuration.
    fn configure(&mut self, config: &I2cConfig);

    /// Enable the peripheral.
    fn enable(&mut self);

    /// Disable the peripheral and release the bus lines.
    fn disable(&mut self);

    /// Begin driving a (repeated) start condition.
    fn trigger_start(&mut self);

    /// Begin driving a stop condition.
    fn trigger_stop(&mut self);

    /// Load `byte` into the data register and start shifting it out.
    fn write_data(&mut self, byte: u8);

    /// Begin receiving one byte; answer with ACK or NACK on completion.
    fn start_receive(&mut self, ack: bool);

    /// Read the data register after a completed reception.
    fn read_data(&self) -> u8;

    /// Transfer-complete flag. Set by hardware when the last triggered
    /// action finished and [`I2cHardware::bus_event`] is valid.
    fn transfer_complete(&self) -> bool;

    /// True while a stop condition is still being driven out.
    fn stop_pending(&self) -> bool;

    /// Decoded status of the last completed action.
    fn bus_event(&self) -> BusEvent;
}
