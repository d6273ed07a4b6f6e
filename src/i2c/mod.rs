// Licensed under the Apache-2.0 license

//! I2C master engine.
//!
//! The protocol state machine lives in [`controller`]; it drives platform
//! register access through the [`traits::I2cHardware`] seam.

pub mod common;
pub mod controller;
pub mod traits;

pub use common::{I2cConfig, I2cConfigBuilder, I2cSpeed};
pub use controller::{Error, I2cController};
pub use traits::{BusEvent, Direction, I2cHardware};
