// Licensed under the Apache-2.0 license

//! Fixed-width integer codec.
//!
//! Converts integers of 1/2/4/8 bytes between host order and big-endian wire
//! order against caller-supplied byte slices. The I2C engine's typed
//! register operations stage values through this module so byte swapping
//! lives in exactly one place.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Destination or source slice is shorter than the encoded width.
    BufferTooSmall,
}

mod sealed {
    pub trait Sealed {}
}

/// Fixed-width integer encodable to and from big-endian bytes.
///
/// Implemented for the 1/2/4/8-byte signed and unsigned types; sealed so the
/// width set stays closed.
pub trait FixedInt: sealed::Sealed + Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Encode into the front of `buf` in big-endian order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooSmall`] if `buf` is shorter than
    /// [`Self::SIZE`].
    fn put_be(self, buf: &mut [u8]) -> Result<(), Error>;

    /// Decode from the front of `buf`, big-endian.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooSmall`] if `buf` is shorter than
    /// [`Self::SIZE`].
    fn from_be(buf: &[u8]) -> Result<Self, Error>;
}

macro_rules! impl_fixed_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl FixedInt for $ty {
                const SIZE: usize = core::mem::size_of::<$ty>();

                fn put_be(self, buf: &mut [u8]) -> Result<(), Error> {
                    let dst = buf
                        .get_mut(..Self::SIZE)
                        .ok_or(Error::BufferTooSmall)?;
                    dst.copy_from_slice(&self.to_be_bytes());
                    Ok(())
                }

                fn from_be(buf: &[u8]) -> Result<Self, Error> {
                    let src = buf.get(..Self::SIZE).ok_or(Error::BufferTooSmall)?;
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    raw.copy_from_slice(src);
                    Ok(<$ty>::from_be_bytes(raw))
                }
            }
        )*
    };
}

impl_fixed_int!(u8, i8, u16, i16, u32, i32, u64, i64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u16_wire_order_is_big_endian() {
        let mut buf = [0u8; 2];
        0x1234u16.put_be(&mut buf).unwrap();
        assert_eq!(buf, [0x12, 0x34]);
        assert_eq!(<u16 as FixedInt>::from_be(&buf).unwrap(), 0x1234);
    }

    #[test]
    fn signed_round_trip() {
        let mut buf = [0u8; 8];
        (-40_000i32).put_be(&mut buf).unwrap();
        assert_eq!(<i32 as FixedInt>::from_be(&buf).unwrap(), -40_000);
    }

    #[test]
    fn u64_uses_leading_bytes_only() {
        let mut buf = [0xAAu8; 9];
        0x0102_0304_0506_0708u64.put_be(&mut buf).unwrap();
        assert_eq!(buf[..8], [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(buf[8], 0xAA);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let mut buf = [0u8; 3];
        assert_eq!(0u32.put_be(&mut buf), Err(Error::BufferTooSmall));
        assert_eq!(<u32 as FixedInt>::from_be(&buf), Err(Error::BufferTooSmall));
    }

    #[test]
    fn single_byte_width() {
        let mut buf = [0u8; 1];
        0xA5u8.put_be(&mut buf).unwrap();
        assert_eq!(<u8 as FixedInt>::from_be(&buf).unwrap(), 0xA5);
    }
}
