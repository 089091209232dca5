//! The primitive hooks a file format implements.
//!
//! A format supplies a [`RawIo`] implementation and wraps it in
//! [`RawReader`](crate::RawReader), which owns the header, validates every
//! index and window, and provides the derived operations (rescaling, lookups,
//! segment timing). Hooks are only ever called with arguments that have
//! already been checked against the header, so an implementation never needs
//! to re-validate them.

use ndarray::{Array1, Array2, Array3, ArrayView1};

use crate::error::{RawIoError, Result};
use crate::sample::RawSample;
use crate::types::{EventSet, Header, TimeRange};

/// Format-specific access to one recording source.
pub trait RawIo {
    /// Native integer type of analog samples and spike waveforms
    type Sample: RawSample;

    /// Human-readable origin of the data, typically a file path.
    fn source_name(&self) -> String;

    /// Reads the structural metadata of the source.
    ///
    /// Called exactly once, before any other hook. This is the only hook
    /// allowed to do structural I/O; payload hooks may still stream samples
    /// lazily afterwards.
    fn parse_header(&mut self) -> Result<Header>;

    /// Sampling rate of the analog signals, in Hz.
    fn sampling_rate(&self) -> f64;

    /// Start time of a segment, in seconds.
    fn segment_t_start(&self, block_index: usize, seg_index: usize) -> f64;

    /// `(num_samples, num_channels)` of the full-length chunk of a segment.
    fn analog_chunk_shape(&self, block_index: usize, seg_index: usize) -> (usize, usize);

    /// Raw samples `[i_start, i_stop)` of the given channels, one column per
    /// entry of `channel_indexes` in the same order.
    fn get_analog_chunk(
        &self,
        block_index: usize,
        seg_index: usize,
        i_start: usize,
        i_stop: usize,
        channel_indexes: &[usize],
    ) -> Result<Array2<Self::Sample>>;

    fn spike_count(&self, _block_index: usize, _seg_index: usize, _unit_index: usize) -> usize {
        0
    }

    /// Ordered native-tick timestamps of the spikes of a unit inside `range`.
    fn spike_timestamps(
        &self,
        _block_index: usize,
        _seg_index: usize,
        _unit_index: usize,
        _range: TimeRange,
    ) -> Result<Array1<i64>> {
        Err(self.unsupported("spike_timestamps"))
    }

    /// Converts native ticks to seconds.
    ///
    /// Must stay linear. The default divides by [`sampling_rate`](Self::sampling_rate);
    /// a format with a separate spike clock overrides this with its own divisor.
    fn rescale_spike_timestamps(&self, raw_timestamps: ArrayView1<i64>) -> Array1<f64> {
        let rate = self.sampling_rate();
        raw_timestamps.mapv(|t| t as f64 / rate)
    }

    /// Raw waveforms of the spikes inside `range`, shaped
    /// `(spike_count, channels_per_spike, samples_per_waveform)`.
    fn spike_raw_waveforms(
        &self,
        _block_index: usize,
        _seg_index: usize,
        _unit_index: usize,
        _range: TimeRange,
    ) -> Result<Array3<Self::Sample>> {
        Err(self.unsupported("spike_raw_waveforms"))
    }

    fn event_count(&self, _block_index: usize, _seg_index: usize, _event_channel_index: usize) -> usize {
        0
    }

    /// Entries of an event channel inside `range`.
    ///
    /// `durations` must be present iff the channel is an epoch channel.
    fn event_timestamps(
        &self,
        _block_index: usize,
        _seg_index: usize,
        _event_channel_index: usize,
        _range: TimeRange,
    ) -> Result<EventSet> {
        Err(self.unsupported("event_timestamps"))
    }

    /// Converts raw event timestamps to seconds. Identity by default.
    fn rescale_event_timestamps(&self, raw_timestamps: ArrayView1<f64>) -> Array1<f64> {
        raw_timestamps.to_owned()
    }

    /// Releases any resource held by the reader. Called at most once.
    fn close(&mut self) {}

    #[doc(hidden)]
    fn unsupported(&self, operation: &'static str) -> RawIoError {
        RawIoError::Unsupported {
            operation,
            reader: self.source_name(),
        }
    }
}
