// Licensed under the Apache-2.0 license

//! 32-bit status word shared by the I2C engine's composite operations.
//!
//! Bits `[31:16]` carry the classification, bits `[15:0]` an
//! operation-specific payload: bytes transferred for read/write, responder
//! count for scan. The encoding exists so callers that shuttle results over
//! narrow channels (telemetry registers, wire protocols) get a single word;
//! in-crate code works with `Result` and converts at the boundary.

/// Classification half of a [`StatusCode`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum StatusKind {
    Ok = 0,
    NotAcknowledged = 1,
    BusTimeout = 2,
    BusError = 3,
    ArbitrationLost = 4,
    OperationTimeout = 5,
}

/// Packed status/payload word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusCode(u32);

impl StatusCode {
    #[must_use]
    pub const fn ok(payload: u16) -> Self {
        Self(payload as u32)
    }

    #[must_use]
    pub const fn err(kind: StatusKind) -> Self {
        Self((kind as u32) << 16)
    }

    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Classification from the upper half. Words built outside this crate
    /// with an unknown classification collapse to `BusError`.
    #[must_use]
    pub fn kind(&self) -> StatusKind {
        match self.0 >> 16 {
            0 => StatusKind::Ok,
            1 => StatusKind::NotAcknowledged,
            2 => StatusKind::BusTimeout,
            4 => StatusKind::ArbitrationLost,
            5 => StatusKind::OperationTimeout,
            _ => StatusKind::BusError,
        }
    }

    #[must_use]
    pub const fn payload(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.kind() == StatusKind::Ok
    }
}
