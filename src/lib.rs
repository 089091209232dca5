//! Uniform raw access to electrophysiology recordings.
//!
//! Every file format implements the small set of hooks in [`RawIo`]; the
//! generic [`RawReader`] built on top of them adds block/segment/channel
//! addressing with range checks, windowed reads, and the rescale from raw
//! integers to physical units and seconds.

pub mod error;
pub mod example;
pub mod rawbinary;
pub mod rawio;
mod reader;
pub mod sample;
pub mod types;

pub use error::{ErrorKind, RawIoError, Result};
pub use example::ExampleRawIo;
pub use rawbinary::{RawBinaryConfig, RawBinarySignalRawIo};
pub use rawio::RawIo;
pub use reader::RawReader;
pub use sample::{FloatSample, RawSample};
pub use types::*;

/// Wraps a format reader and parses its header.
///
/// # Examples
///
/// ```no_run
/// use ephys_rawio::{open, RawBinaryConfig, RawBinarySignalRawIo};
///
/// let config = RawBinaryConfig::default().with_nb_channel(32).with_sampling_rate(30000.0);
/// let result = open(RawBinarySignalRawIo::<i16>::new("path/to/recording.bin", config));
/// match result {
///     Ok(reader) => println!("Sample rate: {} Hz", reader.sampling_rate().unwrap()),
///     Err(e) => println!("Error opening file: {}", e),
/// }
/// ```
pub fn open<R: RawIo>(io: R) -> Result<RawReader<R>> {
    let mut reader = RawReader::new(io);
    reader.parse_header()?;
    Ok(reader)
}
