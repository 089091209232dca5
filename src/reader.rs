use ndarray::{Array1, Array2, Array3};
use std::fmt;
use tracing::{debug, trace, warn};

use crate::error::{RawIoError, Result};
use crate::rawio::RawIo;
use crate::sample::{FloatSample, RawSample};
use crate::types::{EventChannelKind, EventSet, Header, TimeRange};

enum State {
    Constructed,
    HeaderParsed(Header),
    // parse_header hook or header validation failed; the instance is spent
    Failed,
    Closed,
}

/// Generic front end over a format's [`RawIo`] hooks.
///
/// A reader starts out `Constructed`; [`parse_header`](Self::parse_header)
/// moves it to `HeaderParsed`, after which every query is available. A
/// failed parse is final: the reader refuses every later call, including
/// another `parse_header`.
///
/// Each query checks the state, then the block/segment/channel indexes and
/// the sample or time window, and only then calls the hook. Nothing is
/// clamped: an out-of-range request is an error naming the valid range.
///
/// # Examples
///
/// ```
/// use ephys_rawio::{ExampleRawIo, RawReader};
///
/// let mut reader = RawReader::new(ExampleRawIo::new("itisafake.nof"));
/// reader.parse_header().unwrap();
///
/// let raw = reader.get_analog_chunk(0, 0, Some(0), Some(1024), Some(&[0, 3, 6])).unwrap();
/// let uv = reader.rescale_signal_to_physical::<f64>(&raw, Some(&[0, 3, 6])).unwrap();
/// assert_eq!(uv.shape(), &[1024, 3]);
/// ```
pub struct RawReader<R: RawIo> {
    io: R,
    state: State,
}

impl<R: RawIo> RawReader<R> {
    /// Wraps a format reader. No I/O happens until `parse_header`.
    pub fn new(io: R) -> Self {
        Self {
            io,
            state: State::Constructed,
        }
    }

    /// Parses the source's structural metadata.
    ///
    /// Only valid once: a second call fails with a state error and leaves the
    /// already parsed header untouched. If the hook or the header validation
    /// fails, the reader moves to a failed state and stays there.
    pub fn parse_header(&mut self) -> Result<()> {
        match self.state {
            State::Constructed => {}
            State::HeaderParsed(_) => {
                return Err(RawIoError::HeaderAlreadyParsed(self.io.source_name()))
            }
            State::Failed => {
                return Err(RawIoError::HeaderParseFailed {
                    operation: "parse_header",
                    source_name: self.io.source_name(),
                })
            }
            State::Closed => {
                return Err(RawIoError::Closed {
                    operation: "parse_header",
                    source_name: self.io.source_name(),
                })
            }
        }

        let source_name = self.io.source_name();
        let header = match self
            .io
            .parse_header()
            .and_then(|header| header.validate(&source_name).map(|()| header))
        {
            Ok(header) => header,
            Err(err) => {
                warn!(source = %source_name, error = %err, "header parse failed");
                self.state = State::Failed;
                return Err(err);
            }
        };

        debug!(
            source = %source_name,
            blocks = header.block_count,
            signal_channels = header.signal_channels.len(),
            unit_channels = header.unit_channels.len(),
            event_channels = header.event_channels.len(),
            "parsed header"
        );

        self.state = State::HeaderParsed(header);
        Ok(())
    }

    /// Whether the header is parsed and the reader is open.
    pub fn is_header_parsed(&self) -> bool {
        matches!(self.state, State::HeaderParsed(_))
    }

    /// Releases the format reader's resources. Later queries fail with a
    /// state error. Closing twice is a no-op.
    pub fn close(&mut self) {
        if !matches!(self.state, State::Closed) {
            debug!(source = %self.io.source_name(), "closing reader");
            self.io.close();
            self.state = State::Closed;
        }
    }

    /// The format reader behind this front end.
    pub fn inner(&self) -> &R {
        &self.io
    }

    /// Name of the underlying source, usually a file path.
    pub fn source_name(&self) -> String {
        self.io.source_name()
    }

    /// The parsed header, with its three channel tables.
    pub fn header(&self) -> Result<&Header> {
        self.parsed("header")
    }

    fn parsed(&self, operation: &'static str) -> Result<&Header> {
        match &self.state {
            State::HeaderParsed(header) => Ok(header),
            State::Constructed => Err(RawIoError::HeaderNotParsed {
                operation,
                source_name: self.io.source_name(),
            }),
            State::Failed => Err(RawIoError::HeaderParseFailed {
                operation,
                source_name: self.io.source_name(),
            }),
            State::Closed => Err(RawIoError::Closed {
                operation,
                source_name: self.io.source_name(),
            }),
        }
    }

    /// Shape reported by the hook, checked against the signal channel table.
    fn chunk_shape(&self, header: &Header, block_index: usize, seg_index: usize) -> Result<(usize, usize)> {
        let shape = self.io.analog_chunk_shape(block_index, seg_index);
        if shape.1 != header.signal_channels.len() {
            return Err(RawIoError::source_format(
                self.io.source_name(),
                format!(
                    "segment ({}, {}) has {} signal column(s) but the header declares {} signal channel(s)",
                    block_index,
                    seg_index,
                    shape.1,
                    header.signal_channels.len()
                ),
            ));
        }
        Ok(shape)
    }

    // Topology

    /// Number of blocks in the recording.
    pub fn block_count(&self) -> Result<usize> {
        Ok(self.parsed("block_count")?.block_count)
    }

    /// Number of segments in a block.
    pub fn segment_count(&self, block_index: usize) -> Result<usize> {
        let header = self.parsed("segment_count")?;
        check_block(header, block_index)?;
        Ok(header.segment_count[block_index])
    }

    /// Start of a segment, in seconds.
    pub fn segment_t_start(&self, block_index: usize, seg_index: usize) -> Result<f64> {
        let header = self.parsed("segment_t_start")?;
        check_segment(header, block_index, seg_index)?;
        Ok(self.io.segment_t_start(block_index, seg_index))
    }

    /// Length of a segment's analog signals, in seconds.
    pub fn segment_duration(&self, block_index: usize, seg_index: usize) -> Result<f64> {
        let header = self.parsed("segment_duration")?;
        check_segment(header, block_index, seg_index)?;
        let (num_samples, _) = self.chunk_shape(header, block_index, seg_index)?;
        Ok(num_samples as f64 / self.io.sampling_rate())
    }

    /// End of a segment, in seconds.
    pub fn segment_t_stop(&self, block_index: usize, seg_index: usize) -> Result<f64> {
        let t_start = self.segment_t_start(block_index, seg_index)?;
        Ok(t_start + self.segment_duration(block_index, seg_index)?)
    }

    // Channel tables

    /// Number of analog signal channels.
    pub fn signal_channel_count(&self) -> Result<usize> {
        Ok(self.parsed("signal_channel_count")?.signal_channels.len())
    }

    /// Number of spike sources. Zero means the reader has no spikes.
    pub fn unit_channel_count(&self) -> Result<usize> {
        Ok(self.parsed("unit_channel_count")?.unit_channels.len())
    }

    /// Number of event and epoch channels.
    pub fn event_channel_count(&self) -> Result<usize> {
        Ok(self.parsed("event_channel_count")?.event_channels.len())
    }

    /// Signal channel indexes for the given names, in the order given.
    pub fn signal_channel_indexes_by_name(&self, names: &[&str]) -> Result<Vec<usize>> {
        let header = self.parsed("signal_channel_indexes_by_name")?;
        names
            .iter()
            .map(|name| {
                header
                    .signal_channels
                    .iter()
                    .position(|c| c.name == *name)
                    .ok_or_else(|| RawIoError::ChannelNotFound {
                        table: "signal",
                        key: name.to_string(),
                    })
            })
            .collect()
    }

    /// Signal channel indexes for the given ids, in the order given.
    pub fn signal_channel_indexes_by_id(&self, ids: &[&str]) -> Result<Vec<usize>> {
        let header = self.parsed("signal_channel_indexes_by_id")?;
        ids.iter()
            .map(|id| {
                header
                    .signal_channels
                    .iter()
                    .position(|c| c.id == *id)
                    .ok_or_else(|| RawIoError::ChannelNotFound {
                        table: "signal",
                        key: id.to_string(),
                    })
            })
            .collect()
    }

    // Analog signals

    /// Sampling rate of the analog signals, in Hz.
    ///
    /// One rate for every signal channel: multi-rate sources must currently
    /// be exposed as separate readers.
    pub fn sampling_rate(&self) -> Result<f64> {
        self.parsed("sampling_rate")?;
        Ok(self.io.sampling_rate())
    }

    /// `(num_samples, num_channels)` of a segment's full analog chunk.
    pub fn analog_chunk_shape(&self, block_index: usize, seg_index: usize) -> Result<(usize, usize)> {
        let header = self.parsed("analog_chunk_shape")?;
        check_segment(header, block_index, seg_index)?;
        self.chunk_shape(header, block_index, seg_index)
    }

    /// Raw samples of a segment, shaped `(i_stop - i_start, channels)`.
    ///
    /// `i_start` defaults to 0 and `i_stop` to the segment length. `None`
    /// for `channel_indexes` selects every signal channel.
    pub fn get_analog_chunk(
        &self,
        block_index: usize,
        seg_index: usize,
        i_start: Option<usize>,
        i_stop: Option<usize>,
        channel_indexes: Option<&[usize]>,
    ) -> Result<Array2<R::Sample>> {
        let header = self.parsed("get_analog_chunk")?;
        check_segment(header, block_index, seg_index)?;
        let channels = resolve_signal_channels(header, channel_indexes)?;

        let (num_samples, _) = self.chunk_shape(header, block_index, seg_index)?;
        let i_start = i_start.unwrap_or(0);
        let i_stop = i_stop.unwrap_or(num_samples);
        if i_start > i_stop || i_stop > num_samples {
            return Err(RawIoError::SampleWindow {
                i_start,
                i_stop,
                num_samples,
            });
        }

        trace!(block_index, seg_index, i_start, i_stop, channels = channels.len(), "get_analog_chunk");
        self.io
            .get_analog_chunk(block_index, seg_index, i_start, i_stop, &channels)
    }

    /// Applies `raw * gain + offset` column by column.
    ///
    /// `channel_indexes` names the signal channel behind each column of
    /// `raw_chunk`, exactly as passed to [`get_analog_chunk`](Self::get_analog_chunk).
    pub fn rescale_signal_to_physical<F: FloatSample>(
        &self,
        raw_chunk: &Array2<R::Sample>,
        channel_indexes: Option<&[usize]>,
    ) -> Result<Array2<F>> {
        let header = self.parsed("rescale_signal_to_physical")?;
        let channels = resolve_signal_channels(header, channel_indexes)?;
        if channels.len() != raw_chunk.ncols() {
            return Err(RawIoError::ShapeMismatch {
                expected: channels.len(),
                actual: raw_chunk.ncols(),
            });
        }

        let mut physical = Array2::<F>::default(raw_chunk.raw_dim());
        for (column, &c) in channels.iter().enumerate() {
            let channel = &header.signal_channels[c];
            physical
                .column_mut(column)
                .zip_mut_with(&raw_chunk.column(column), |out, &raw| {
                    *out = F::from_f64(channel.to_physical(raw.to_f64()))
                });
        }

        Ok(physical)
    }

    // Spikes

    /// Number of spikes of a unit in a segment.
    pub fn spike_count(&self, block_index: usize, seg_index: usize, unit_index: usize) -> Result<usize> {
        self.check_unit("spike_count", block_index, seg_index, unit_index)?;
        Ok(self.io.spike_count(block_index, seg_index, unit_index))
    }

    /// Native-tick spike times of a unit, restricted to `[t_start, t_stop]`
    /// seconds when bounds are given.
    pub fn spike_timestamps(
        &self,
        block_index: usize,
        seg_index: usize,
        unit_index: usize,
        t_start: Option<f64>,
        t_stop: Option<f64>,
    ) -> Result<Array1<i64>> {
        self.check_unit("spike_timestamps", block_index, seg_index, unit_index)?;
        let range = TimeRange::resolve(t_start, t_stop)?;
        self.io
            .spike_timestamps(block_index, seg_index, unit_index, range)
    }

    /// Native ticks to seconds, in the requested float type.
    pub fn rescale_spike_timestamps<F: FloatSample>(&self, raw_timestamps: &Array1<i64>) -> Result<Array1<F>> {
        let header = self.parsed("rescale_spike_timestamps")?;
        if header.unit_channels.is_empty() {
            return Err(self.io.unsupported("rescale_spike_timestamps"));
        }
        Ok(self
            .io
            .rescale_spike_timestamps(raw_timestamps.view())
            .mapv(F::from_f64))
    }

    /// Raw waveforms of the spikes `spike_timestamps` selects for the same
    /// window, shaped `(spikes, channels, samples)`.
    pub fn spike_raw_waveforms(
        &self,
        block_index: usize,
        seg_index: usize,
        unit_index: usize,
        t_start: Option<f64>,
        t_stop: Option<f64>,
    ) -> Result<Array3<R::Sample>> {
        self.check_unit("spike_raw_waveforms", block_index, seg_index, unit_index)?;
        let range = TimeRange::resolve(t_start, t_stop)?;
        self.io
            .spike_raw_waveforms(block_index, seg_index, unit_index, range)
    }

    /// Applies the unit channel's gain and offset to every waveform sample.
    pub fn rescale_waveforms_to_physical<F: FloatSample>(
        &self,
        raw_waveforms: &Array3<R::Sample>,
        unit_index: usize,
    ) -> Result<Array3<F>> {
        let header = self.parsed("rescale_waveforms_to_physical")?;
        if header.unit_channels.is_empty() {
            return Err(self.io.unsupported("rescale_waveforms_to_physical"));
        }
        check_channel("unit", unit_index, header.unit_channels.len())?;

        let unit = &header.unit_channels[unit_index];
        Ok(raw_waveforms.mapv(|raw| F::from_f64(unit.to_physical(raw.to_f64()))))
    }

    // Events

    /// Number of entries of an event channel in a segment.
    pub fn event_count(&self, block_index: usize, seg_index: usize, event_channel_index: usize) -> Result<usize> {
        self.check_event_channel("event_count", block_index, seg_index, event_channel_index)?;
        Ok(self
            .io
            .event_count(block_index, seg_index, event_channel_index))
    }

    /// Entries of an event channel, restricted to `[t_start, t_stop]` when
    /// bounds are given. Durations are present iff the channel is an epoch
    /// channel.
    pub fn event_timestamps(
        &self,
        block_index: usize,
        seg_index: usize,
        event_channel_index: usize,
        t_start: Option<f64>,
        t_stop: Option<f64>,
    ) -> Result<EventSet> {
        let header =
            self.check_event_channel("event_timestamps", block_index, seg_index, event_channel_index)?;
        let range = TimeRange::resolve(t_start, t_stop)?;
        let events = self
            .io
            .event_timestamps(block_index, seg_index, event_channel_index, range)?;

        let kind = header.event_channels[event_channel_index].kind;
        let consistent = match kind {
            EventChannelKind::Event => events.durations.is_none(),
            EventChannelKind::Epoch => events
                .durations
                .as_ref()
                .is_some_and(|d| d.len() == events.len()),
        };
        if !consistent || events.labels.len() != events.len() {
            return Err(RawIoError::source_format(
                self.io.source_name(),
                format!(
                    "event channel {} ({}) returned entries inconsistent with its kind",
                    event_channel_index, kind
                ),
            ));
        }

        Ok(events)
    }

    /// Raw event timestamps to seconds, in the requested float type.
    pub fn rescale_event_timestamps<F: FloatSample>(&self, raw_timestamps: &Array1<f64>) -> Result<Array1<F>> {
        let header = self.parsed("rescale_event_timestamps")?;
        if header.event_channels.is_empty() {
            return Err(self.io.unsupported("rescale_event_timestamps"));
        }
        Ok(self
            .io
            .rescale_event_timestamps(raw_timestamps.view())
            .mapv(F::from_f64))
    }

    fn check_unit(
        &self,
        operation: &'static str,
        block_index: usize,
        seg_index: usize,
        unit_index: usize,
    ) -> Result<&Header> {
        let header = self.parsed(operation)?;
        if header.unit_channels.is_empty() {
            return Err(self.io.unsupported(operation));
        }
        check_segment(header, block_index, seg_index)?;
        check_channel("unit", unit_index, header.unit_channels.len())?;
        Ok(header)
    }

    fn check_event_channel(
        &self,
        operation: &'static str,
        block_index: usize,
        seg_index: usize,
        event_channel_index: usize,
    ) -> Result<&Header> {
        let header = self.parsed(operation)?;
        if header.event_channels.is_empty() {
            return Err(self.io.unsupported(operation));
        }
        check_segment(header, block_index, seg_index)?;
        check_channel("event", event_channel_index, header.event_channels.len())?;
        Ok(header)
    }
}

fn check_block(header: &Header, block_index: usize) -> Result<()> {
    if block_index >= header.block_count {
        return Err(RawIoError::BlockIndex {
            index: block_index,
            count: header.block_count,
        });
    }
    Ok(())
}

fn check_segment(header: &Header, block_index: usize, seg_index: usize) -> Result<()> {
    check_block(header, block_index)?;
    let count = header.segment_count[block_index];
    if seg_index >= count {
        return Err(RawIoError::SegmentIndex {
            block_index,
            index: seg_index,
            count,
        });
    }
    Ok(())
}

fn check_channel(table: &'static str, index: usize, count: usize) -> Result<()> {
    if index >= count {
        return Err(RawIoError::ChannelIndex { table, index, count });
    }
    Ok(())
}

fn resolve_signal_channels(header: &Header, channel_indexes: Option<&[usize]>) -> Result<Vec<usize>> {
    let count = header.signal_channels.len();
    match channel_indexes {
        None => Ok((0..count).collect()),
        Some(indexes) => {
            for &index in indexes {
                check_channel("signal", index, count)?;
            }
            Ok(indexes.to_vec())
        }
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

impl<R: RawIo> fmt::Display for RawReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let type_name = std::any::type_name::<R>();
        let short_name = type_name.rsplit("::").next().unwrap_or(type_name);
        writeln!(f, "{}: {}", short_name, self.io.source_name())?;

        let header = match &self.state {
            State::HeaderParsed(header) => header,
            State::Constructed => return writeln!(f, "header not parsed"),
            State::Failed => return writeln!(f, "header parse failed"),
            State::Closed => return writeln!(f, "closed"),
        };

        writeln!(f, "nb_block: {}", header.block_count)?;
        writeln!(f, "nb_segment: {:?}", header.segment_count)?;
        writeln!(
            f,
            "signal_channels: [{}]",
            join_names(header.signal_channels.iter().map(|c| c.name.as_str()))
        )?;
        writeln!(
            f,
            "unit_channels: [{}]",
            join_names(header.unit_channels.iter().map(|c| c.name.as_str()))
        )?;
        writeln!(
            f,
            "event_channels: [{}]",
            join_names(header.event_channels.iter().map(|c| c.name.as_str()))
        )
    }
}
