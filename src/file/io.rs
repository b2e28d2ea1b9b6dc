//! Low-level little-endian reading and writing utilities for PE and metadata structures.
//!
//! Everything in a .NET PE image is stored little-endian, so this module only provides the
//! little-endian half of the usual byte order helpers. All operations are bounds checked and
//! report [`crate::Error::OutOfBounds`] instead of panicking.
//!
//! # Key Components
//!
//! - [`crate::file::io::CilIO`] - Trait implemented by the primitive types that can be read/written
//! - [`crate::file::io::read_le`] / [`crate::file::io::read_le_at`] - Fixed size reads
//! - [`crate::file::io::read_le_at_dyn`] - 2 or 4 byte reads, used for heap and table indexes
//! - [`crate::file::io::write_le_at`] / [`crate::file::io::write_le_at_dyn`] - The writing counterparts
//!
//! # Examples
//!
//! ```rust
//! use publicizer::file::io::{read_le_at, read_le_at_dyn};
//!
//! let data = [0x01, 0x00, 0x00, 0x00, 0x02, 0x00];
//! let mut offset = 0;
//! assert_eq!(read_le_at::<u32>(&data, &mut offset)?, 1);
//! assert_eq!(read_le_at_dyn(&data, &mut offset, false)?, 2);
//! assert_eq!(offset, 6);
//! # Ok::<(), publicizer::Error>(())
//! ```

use crate::Result;

/// Trait for primitive types which can be converted from and into little-endian bytes.
///
/// This mirrors the inherent `from_le_bytes` / `to_le_bytes` functions of the primitive
/// types, so the generic readers below can work on any of them.
pub trait CilIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cil_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_cil_io!(
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
);

/// Reads a value of type `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is too short.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Reads a value of type `T` at `offset` and advances `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit into `data`.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Reads either a 2-byte or 4-byte value, promoting the small form to `u32`.
///
/// Heap indexes, table indexes and coded indexes all switch between the two widths based on
/// the sizes of the heaps and tables they point into.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit into `data`.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    if is_large {
        read_le_at::<u32>(data, offset)
    } else {
        Ok(u32::from(read_le_at::<u16>(data, offset)?))
    }
}

/// Writes `value` at `offset` and advances `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit into `data`.
pub fn write_le_at<T: CilIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    let bytes = bytes.as_ref();
    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;

    Ok(())
}

/// Writes either a 2-byte or 4-byte value.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit into `data`, and
/// [`crate::Error::Malformed`] if a small write is requested for a value above `u16::MAX`.
pub fn write_le_at_dyn(data: &mut [u8], offset: &mut usize, value: u32, is_large: bool) -> Result<()> {
    if is_large {
        write_le_at::<u32>(data, offset, value)
    } else {
        let small = u16::try_from(value)
            .map_err(|_| malformed_error!("Value {} does not fit into a small index", value))?;
        write_le_at::<u16>(data, offset, small)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u8() {
        let result = read_le::<u8>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x01);
    }

    #[test]
    fn read_le_u16() {
        let result = read_le::<u16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0201);
    }

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0403_0201);
    }

    #[test]
    fn read_le_u64() {
        let result = read_le::<u64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0807_0605_0403_0201);
    }

    #[test]
    fn read_le_from() {
        let mut offset = 2_usize;
        let result = read_le_at::<u16>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(result, 0x403);
        assert_eq!(offset, 4);
    }

    #[test]
    fn read_le_dyn() {
        let mut offset = 0;
        let res_1 = read_le_at_dyn(&TEST_BUFFER, &mut offset, true).unwrap();
        assert_eq!(res_1, 0x0403_0201);

        let res_2 = read_le_at_dyn(&TEST_BUFFER, &mut offset, false).unwrap();
        assert_eq!(res_2, 0x0605);
        assert_eq!(offset, 6);
    }

    #[test]
    fn errors() {
        let buffer = [0xFF, 0xFF, 0xFF, 0xFF];

        let result = read_le::<u64>(&buffer);
        assert!(matches!(result, Err(crate::Error::OutOfBounds { .. })));

        let mut offset = usize::MAX;
        let result = read_le_at::<u8>(&buffer, &mut offset);
        assert!(result.is_err());
    }

    #[test]
    fn write_roundtrip() {
        let mut buffer = [0u8; 8];
        let mut offset = 0;
        write_le_at::<u16>(&mut buffer, &mut offset, 0x1234).unwrap();
        write_le_at_dyn(&mut buffer, &mut offset, 0xAABB_CCDD, true).unwrap();
        assert_eq!(offset, 6);
        assert_eq!(buffer[..6], [0x34, 0x12, 0xDD, 0xCC, 0xBB, 0xAA]);

        let mut offset = 6;
        assert!(write_le_at::<u32>(&mut buffer, &mut offset, 1).is_err());
        assert_eq!(offset, 6);
    }

    #[test]
    fn write_small_overflow() {
        let mut buffer = [0u8; 4];
        let mut offset = 0;
        assert!(write_le_at_dyn(&mut buffer, &mut offset, 0x1_0000, false).is_err());
    }
}
