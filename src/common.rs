// Licensed under the Apache-2.0 license

//! Shared infrastructure used by both engine modules.

/// Minimal logging seam for driver diagnostics.
///
/// Engines take a logger as a type parameter so that production builds can
/// route messages to a console UART while host tests and size-constrained
/// targets plug in [`NoOpLogger`] at zero cost.
pub trait Logger {
    fn log(&self, msg: &str);
}

/// Logger that discards everything. The default for all engines.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _msg: &str) {}
}
