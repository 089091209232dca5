use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt::Debug;
use std::io::{self, Read};

/// A native integer sample as stored by the acquisition hardware.
///
/// Analog chunks and spike waveforms keep this type until they are rescaled,
/// so a reader never widens or converts samples it has not been asked for.
pub trait RawSample: Copy + Default + Debug + PartialEq + Send + Sync + 'static {
    /// Width of one sample on disk, in bytes
    const BYTES: usize;

    /// Widens the sample for the linear rescale
    fn to_f64(self) -> f64;

    /// Decodes one little-endian sample
    fn read_le<R: Read>(reader: &mut R) -> io::Result<Self>;
}

macro_rules! impl_raw_sample {
    ($($ty:ty => $read:ident),* $(,)?) => {
        $(
            impl RawSample for $ty {
                const BYTES: usize = std::mem::size_of::<$ty>();

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn read_le<R: Read>(reader: &mut R) -> io::Result<Self> {
                    reader.$read::<LittleEndian>()
                }
            }
        )*
    };
}

impl_raw_sample!(
    i16 => read_i16,
    u16 => read_u16,
    i32 => read_i32,
    u32 => read_u32,
    i64 => read_i64,
);

/// Target numeric type of a rescale (physical units or seconds).
pub trait FloatSample: Copy + Default + Debug + PartialEq + Send + Sync + 'static {
    fn from_f64(value: f64) -> Self;
}

impl FloatSample for f32 {
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl FloatSample for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decodes_little_endian_samples() {
        let mut cursor = Cursor::new(vec![0xFF, 0x7F, 0x00, 0x80]);
        assert_eq!(i16::read_le(&mut cursor).unwrap(), i16::MAX);
        assert_eq!(i16::read_le(&mut cursor).unwrap(), i16::MIN);
        assert!(i16::read_le(&mut cursor).is_err());
    }

    #[test]
    fn unsigned_samples_widen_without_sign() {
        let mut cursor = Cursor::new(vec![0x00, 0x80]);
        let value = u16::read_le(&mut cursor).unwrap();
        assert_eq!(value.to_f64(), 32768.0);
        assert_eq!(<u16 as RawSample>::BYTES, 2);
        assert_eq!(<i64 as RawSample>::BYTES, 8);
    }
}
