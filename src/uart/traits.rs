// Licensed under the Apache-2.0 license

//! Hardware abstraction seam for the UART engine.

use crate::uart::common::{Config, ErrorFlags};

/// Register-level access to one UART peripheral.
///
/// The engine drives everything through this trait; platform crates
/// implement it over their baud-rate, control and data registers. Getter
/// methods take `&self` so the interrupt entry points can mix reads and
/// writes freely.
pub trait UartHardware {
    /// Program baud-rate divisor and frame format registers.
    fn configure(&mut self, config: &Config);

    fn set_rx_enabled(&mut self, enabled: bool);

    fn set_tx_enabled(&mut self, enabled: bool);

    /// Receive-complete interrupt enable bit.
    fn set_rx_interrupt(&mut self, enabled: bool);

    /// Transmit-data-register-empty interrupt enable bit.
    fn set_tx_empty_interrupt(&mut self, enabled: bool);

    fn tx_empty_interrupt_enabled(&self) -> bool;

    /// Read the receive data register. Clears the receive-complete
    /// condition on hardware that latches it.
    fn read_data(&mut self) -> u8;

    /// Write the transmit data register, starting transmission.
    fn write_data(&mut self, byte: u8);

    /// Transmit data register empty and ready for the next byte.
    fn data_register_empty(&self) -> bool;

    /// Transmit shifter idle; every queued byte has left the wire.
    fn transmit_complete(&self) -> bool;

    /// Error flags latched by hardware for the byte currently in the
    /// receive data register.
    fn rx_errors(&self) -> ErrorFlags;

    /// Global interrupt-enable flag at the call site. When clear, the
    /// engine must pump the transmit handler itself because the hardware
    /// interrupt cannot fire.
    fn interrupts_enabled(&self) -> bool;
}
