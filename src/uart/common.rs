// Licensed under the Apache-2.0 license

//! Common types and constants for the UART engine.

/// Frame word length in bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WordLength {
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

/// Port configuration applied at open.
///
/// `clock` is the peripheral input clock in Hz used for divisor
/// computation; `double_speed` selects the 2x oversampling divisor where
/// the hardware supports it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub baud_rate: u32,
    pub word_length: WordLength,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub clock: u32,
    pub double_speed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            word_length: WordLength::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            clock: 16_000_000,
            double_speed: false,
        }
    }
}

/// Baud-rate divisor for the given peripheral clock, rounded to nearest.
#[must_use]
pub const fn baud_divisor(clock: u32, baud: u32, double_speed: bool) -> u16 {
    let divisor = if double_speed {
        (clock + 4 * baud) / (8 * baud) - 1
    } else {
        (clock + 8 * baud) / (16 * baud) - 1
    };
    divisor as u16
}

/// Queue selector for [`crate::uart::UartController::flush`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    Both,
}

/// Latched receive error flags, merged into [`RecvStatus`] words.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct ErrorFlags(u8);

impl ErrorFlags {
    pub const FRAMING: Self = Self(1 << 0);
    pub const OVERRUN: Self = Self(1 << 1);
    pub const PARITY: Self = Self(1 << 2);
    /// Receive ring was full and a byte was dropped.
    pub const OVERFLOW: Self = Self(1 << 3);
    /// Bounded wait in a multi-byte receive expired.
    pub const TIMEOUT: Self = Self(1 << 4);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Result word of a non-blocking receive: bits `[15:8]` carry the latched
/// error flags, bits `[7:0]` the received byte. An all-ones high byte is
/// the "no data" sentinel; it cannot collide with a real result because
/// the flag bits never fill the byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecvStatus(u16);

impl RecvStatus {
    const NO_DATA: u16 = 0xFF00;

    #[must_use]
    pub const fn new(byte: u8, flags: ErrorFlags) -> Self {
        Self(((flags.bits() as u16) << 8) | byte as u16)
    }

    #[must_use]
    pub const fn no_data() -> Self {
        Self(Self::NO_DATA)
    }

    #[must_use]
    pub const fn is_no_data(self) -> bool {
        self.0 & Self::NO_DATA == Self::NO_DATA
    }

    #[must_use]
    pub const fn byte(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    #[must_use]
    pub const fn errors(self) -> ErrorFlags {
        ErrorFlags::from_bits((self.0 >> 8) as u8)
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// Failures of the blocking operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Bounded wait for transmit-ring space expired.
    Timeout,
    /// Operation attempted on a port that is not open.
    NotOpen,
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Error::Timeout => embedded_io::ErrorKind::TimedOut,
            Error::NotOpen => embedded_io::ErrorKind::NotConnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recv_status_packs_byte_and_flags() {
        let status = RecvStatus::new(0x41, ErrorFlags::FRAMING.union(ErrorFlags::OVERRUN));
        assert!(!status.is_no_data());
        assert_eq!(status.byte(), 0x41);
        assert!(status.errors().contains(ErrorFlags::FRAMING));
        assert!(status.errors().contains(ErrorFlags::OVERRUN));
        assert_eq!(status.raw(), 0x0341);
    }

    #[test]
    fn no_data_sentinel_is_distinct() {
        assert!(RecvStatus::no_data().is_no_data());
        // A byte of 0xFF with every real flag set still is not the
        // sentinel.
        let all_flags = ErrorFlags::FRAMING
            .union(ErrorFlags::OVERRUN)
            .union(ErrorFlags::PARITY)
            .union(ErrorFlags::OVERFLOW)
            .union(ErrorFlags::TIMEOUT);
        assert!(!RecvStatus::new(0xFF, all_flags).is_no_data());
    }

    #[test]
    fn divisor_matches_16mhz_reference_values() {
        // Classic 16 MHz AVR table entries.
        assert_eq!(baud_divisor(16_000_000, 9_600, false), 103);
        assert_eq!(baud_divisor(16_000_000, 115_200, false), 8);
        assert_eq!(baud_divisor(16_000_000, 115_200, true), 16);
    }
}
