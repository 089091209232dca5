use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::error::{RawIoError, Result};
use crate::rawio::RawIo;
use crate::sample::RawSample;
use crate::types::{Header, SignalChannel};

const READ_BUFFER_CAPACITY: usize = 65536; // 64KB

/// Layout of a headerless binary signal file.
///
/// The file holds `bytes_offset` bytes of ignored preamble followed by frames
/// of `nb_channel` little-endian samples, one frame per sampling instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBinaryConfig {
    /// Sampling rate (Hz)
    pub sampling_rate: f64,
    /// Number of interleaved channels per frame
    pub nb_channel: usize,
    /// Bytes to skip before the first frame
    pub bytes_offset: u64,
    /// Physical units shared by every channel
    pub units: String,
    /// Gain shared by every channel
    pub gain: f64,
    /// Offset shared by every channel
    pub offset: f64,
    /// Start time of the single segment (s)
    pub t_start: f64,
}

impl Default for RawBinaryConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 10000.0,
            nb_channel: 2,
            bytes_offset: 0,
            units: String::new(),
            gain: 1.0,
            offset: 0.0,
            t_start: 0.0,
        }
    }
}

impl RawBinaryConfig {
    pub fn with_sampling_rate(mut self, sampling_rate: f64) -> Self {
        self.sampling_rate = sampling_rate;
        self
    }

    pub fn with_nb_channel(mut self, nb_channel: usize) -> Self {
        self.nb_channel = nb_channel;
        self
    }

    pub fn with_bytes_offset(mut self, bytes_offset: u64) -> Self {
        self.bytes_offset = bytes_offset;
        self
    }

    pub fn with_scaling(mut self, units: impl Into<String>, gain: f64, offset: f64) -> Self {
        self.units = units.into();
        self.gain = gain;
        self.offset = offset;
        self
    }

    pub fn with_t_start(mut self, t_start: f64) -> Self {
        self.t_start = t_start;
        self
    }
}

/// Reader for raw interleaved signal files (one block, one segment).
///
/// The file is opened by `parse_header` and kept open until the reader is
/// closed or dropped. Chunks are read on demand by seeking straight to the
/// first requested frame, so only the requested window is ever decoded.
/// There are no spike or event channels.
#[derive(Debug)]
pub struct RawBinarySignalRawIo<S: RawSample = i16> {
    path: PathBuf,
    config: RawBinaryConfig,
    file: Option<File>,
    num_samples: usize,
    _sample: PhantomData<S>,
}

impl<S: RawSample> RawBinarySignalRawIo<S> {
    pub fn new<P: AsRef<Path>>(path: P, config: RawBinaryConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config,
            file: None,
            num_samples: 0,
            _sample: PhantomData,
        }
    }

    pub fn config(&self) -> &RawBinaryConfig {
        &self.config
    }

    fn frame_bytes(&self) -> usize {
        self.config.nb_channel * S::BYTES
    }

    fn check_config(&self) -> Result<()> {
        let config = &self.config;
        let reason = if config.nb_channel == 0 {
            "nb_channel must be at least 1"
        } else if !(config.sampling_rate.is_finite() && config.sampling_rate > 0.0) {
            "sampling_rate must be a positive number"
        } else if !config.t_start.is_finite() {
            "t_start must be finite"
        } else {
            return Ok(());
        };
        Err(RawIoError::source_format(self.source_name(), reason))
    }
}

impl<S: RawSample> RawIo for RawBinarySignalRawIo<S> {
    type Sample = S;

    fn source_name(&self) -> String {
        self.path.display().to_string()
    }

    fn parse_header(&mut self) -> Result<Header> {
        self.check_config()?;

        let file = File::open(&self.path)?;
        let file_size = file.metadata()?.len();
        if file_size < self.config.bytes_offset {
            return Err(RawIoError::source_format(
                self.source_name(),
                format!(
                    "file is {} bytes, shorter than its {}-byte offset",
                    file_size, self.config.bytes_offset
                ),
            ));
        }

        // The payload must hold a whole number of frames
        let payload = file_size - self.config.bytes_offset;
        let frame_bytes = self.frame_bytes() as u64;
        if payload % frame_bytes != 0 {
            return Err(RawIoError::source_format(
                self.source_name(),
                format!(
                    "{} payload bytes is not a whole number of {}-byte frames",
                    payload, frame_bytes
                ),
            ));
        }

        self.num_samples = (payload / frame_bytes) as usize;
        if self.num_samples == 0 {
            warn!(source = %self.source_name(), "raw binary file contains no samples");
        }
        debug!(
            source = %self.source_name(),
            num_samples = self.num_samples,
            nb_channel = self.config.nb_channel,
            "file contains {:.3} seconds of data",
            self.num_samples as f64 / self.config.sampling_rate
        );
        self.file = Some(file);

        let signal_channels = (0..self.config.nb_channel)
            .map(|c| {
                SignalChannel::new(
                    format!("ch{}", c),
                    c.to_string(),
                    self.config.units.clone(),
                    self.config.gain,
                    self.config.offset,
                )
            })
            .collect();

        Ok(Header::new(vec![1], signal_channels, Vec::new(), Vec::new()))
    }

    fn sampling_rate(&self) -> f64 {
        self.config.sampling_rate
    }

    fn segment_t_start(&self, _block_index: usize, _seg_index: usize) -> f64 {
        self.config.t_start
    }

    fn analog_chunk_shape(&self, _block_index: usize, _seg_index: usize) -> (usize, usize) {
        (self.num_samples, self.config.nb_channel)
    }

    fn get_analog_chunk(
        &self,
        _block_index: usize,
        _seg_index: usize,
        i_start: usize,
        i_stop: usize,
        channel_indexes: &[usize],
    ) -> Result<Array2<S>> {
        let file = self.file.as_ref().ok_or_else(|| RawIoError::Closed {
            operation: "get_analog_chunk",
            source_name: self.source_name(),
        })?;

        let mut reader = BufReader::with_capacity(READ_BUFFER_CAPACITY, file);
        let position = self.config.bytes_offset + (i_start * self.frame_bytes()) as u64;
        reader.seek(SeekFrom::Start(position))?;
        trace!(position, frames = i_stop - i_start, "reading raw binary frames");

        let mut chunk = Array2::<S>::default((i_stop - i_start, channel_indexes.len()));
        let mut frame = vec![S::default(); self.config.nb_channel];
        for mut row in chunk.rows_mut() {
            for value in frame.iter_mut() {
                *value = S::read_le(&mut reader)?;
            }
            for (out, &c) in row.iter_mut().zip(channel_indexes) {
                *out = frame[c];
            }
        }

        Ok(chunk)
    }

    fn close(&mut self) {
        self.file = None;
    }
}
