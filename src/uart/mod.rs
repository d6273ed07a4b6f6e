// Licensed under the Apache-2.0 license

//! Interrupt-driven, ring-buffered UART engine.
//!
//! [`ring`] holds the lock-free circular buffer shared between the
//! interrupt handler and mainline code; [`controller`] layers the
//! blocking/non-blocking send and receive operations over it through the
//! [`traits::UartHardware`] register seam.

pub mod common;
pub mod controller;
pub mod ring;
pub mod traits;

pub use common::{
    baud_divisor, Config, Direction, Error, ErrorFlags, Parity, RecvStatus, StopBits, WordLength,
};
pub use controller::UartController;
pub use ring::RingBuffer;
pub use traits::UartHardware;
