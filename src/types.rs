use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RawIoError, Result};

/// Descriptor of one analog signal channel.
///
/// Raw samples of the channel convert to physical units with
/// `physical = raw * gain + offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalChannel {
    /// Human-readable channel name (e.g., "ch3")
    pub name: String,
    /// Identifier unique within the source (e.g., "id#3")
    pub id: String,
    /// Physical units after rescale (e.g., "uV")
    pub units: String,
    /// Multiplicative coefficient of the rescale
    pub gain: f64,
    /// Additive coefficient of the rescale
    pub offset: f64,
}

impl SignalChannel {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        units: impl Into<String>,
        gain: f64,
        offset: f64,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            units: units.into(),
            gain,
            offset,
        }
    }

    /// Converts one raw sample to physical units.
    pub fn to_physical(&self, raw: f64) -> f64 {
        raw * self.gain + self.offset
    }
}

/// Descriptor of one spike source ("unit").
///
/// The gain/offset pair applies to waveform samples. Spike timestamps are
/// rescaled by the sampling rate, never by these coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitChannel {
    /// Human-readable unit name
    pub name: String,
    /// Identifier unique within the source
    pub id: String,
    /// Physical units of the waveforms after rescale
    pub waveform_units: String,
    /// Multiplicative coefficient of the waveform rescale
    pub gain: f64,
    /// Additive coefficient of the waveform rescale
    pub offset: f64,
}

impl UnitChannel {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        waveform_units: impl Into<String>,
        gain: f64,
        offset: f64,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            waveform_units: waveform_units.into(),
            gain,
            offset,
        }
    }

    /// Converts one raw waveform sample to physical units.
    pub fn to_physical(&self, raw: f64) -> f64 {
        raw * self.gain + self.offset
    }
}

/// Whether an event channel carries durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventChannelKind {
    /// Timestamps only
    Event,
    /// Timestamps plus durations
    Epoch,
}

impl fmt::Display for EventChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventChannelKind::Event => write!(f, "event"),
            EventChannelKind::Epoch => write!(f, "epoch"),
        }
    }
}

/// Descriptor of one event or epoch channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventChannel {
    /// Human-readable channel name
    pub name: String,
    /// Identifier unique within the source
    pub id: String,
    /// Event or epoch
    pub kind: EventChannelKind,
}

impl EventChannel {
    pub fn new(name: impl Into<String>, id: impl Into<String>, kind: EventChannelKind) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            kind,
        }
    }
}

/// Structural snapshot of a recording.
///
/// Built once by a reader's `parse_header` hook and never mutated afterwards.
/// The hierarchy is block -> segment, and the three channel tables are shared
/// by every segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Number of blocks in the recording
    pub block_count: usize,
    /// Number of segments, indexed by block
    pub segment_count: Vec<usize>,
    /// Analog signal channels
    pub signal_channels: Vec<SignalChannel>,
    /// Spike source channels
    pub unit_channels: Vec<UnitChannel>,
    /// Event and epoch channels
    pub event_channels: Vec<EventChannel>,
}

impl Header {
    pub fn new(
        segment_count: Vec<usize>,
        signal_channels: Vec<SignalChannel>,
        unit_channels: Vec<UnitChannel>,
        event_channels: Vec<EventChannel>,
    ) -> Self {
        Self {
            block_count: segment_count.len(),
            segment_count,
            signal_channels,
            unit_channels,
            event_channels,
        }
    }

    /// Checks the header's internal consistency.
    ///
    /// Readers are free to build a `Header` by hand, so this runs once after
    /// every `parse_header` before the header is exposed.
    pub fn validate(&self, source_name: &str) -> Result<()> {
        if self.segment_count.len() != self.block_count {
            return Err(RawIoError::source_format(
                source_name,
                format!(
                    "block_count is {} but segment counts are given for {} block(s)",
                    self.block_count,
                    self.segment_count.len()
                ),
            ));
        }

        for (i, channel) in self.signal_channels.iter().enumerate() {
            if !channel.gain.is_finite() || !channel.offset.is_finite() {
                return Err(RawIoError::source_format(
                    source_name,
                    format!("signal channel {} ({}) has a non-finite gain or offset", i, channel.name),
                ));
            }
        }

        for (i, channel) in self.unit_channels.iter().enumerate() {
            if !channel.gain.is_finite() || !channel.offset.is_finite() {
                return Err(RawIoError::source_format(
                    source_name,
                    format!("unit channel {} ({}) has a non-finite gain or offset", i, channel.name),
                ));
            }
        }

        Ok(())
    }

    /// Groups signal channels that share units, gain and offset.
    ///
    /// Groups are returned in order of first appearance, each holding
    /// ascending channel indexes.
    pub fn signal_channel_groups(&self) -> Vec<Vec<usize>> {
        let mut keys: Vec<(&str, u64, u64)> = Vec::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();

        for (index, channel) in self.signal_channels.iter().enumerate() {
            let key = (
                channel.units.as_str(),
                channel.gain.to_bits(),
                channel.offset.to_bits(),
            );
            match keys.iter().position(|k| *k == key) {
                Some(g) => groups[g].push(index),
                None => {
                    keys.push(key);
                    groups.push(vec![index]);
                }
            }
        }

        groups
    }
}

/// Entries of one event channel for one segment.
///
/// `timestamps`, `labels` and (for epochs) `durations` are parallel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSet {
    /// Raw timestamps in the reader's event time base
    pub timestamps: Array1<f64>,
    /// Durations, present iff the channel is an epoch channel
    pub durations: Option<Array1<f64>>,
    /// One label per entry
    pub labels: Vec<String>,
}

impl EventSet {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Keeps the entries whose timestamp falls inside `range`.
    ///
    /// Fails with a SourceFormat error naming `source_name` when `labels` or
    /// `durations` do not run parallel to `timestamps`.
    pub fn restrict_to(self, range: &TimeRange, source_name: &str) -> Result<EventSet> {
        let durations_len = self.durations.as_ref().map(|d| d.len());
        if self.labels.len() != self.len() || durations_len.is_some_and(|n| n != self.len()) {
            return Err(RawIoError::source_format(
                source_name,
                format!(
                    "event set has {} timestamp(s) but {} label(s) and {} duration(s)",
                    self.len(),
                    self.labels.len(),
                    durations_len.map_or_else(|| "no".to_string(), |n| n.to_string())
                ),
            ));
        }

        if range.is_unbounded() {
            return Ok(self);
        }

        let keep: Vec<usize> = self
            .timestamps
            .iter()
            .enumerate()
            .filter(|(_, t)| range.contains(**t))
            .map(|(i, _)| i)
            .collect();

        Ok(EventSet {
            timestamps: keep.iter().map(|&i| self.timestamps[i]).collect(),
            durations: self
                .durations
                .as_ref()
                .map(|d| keep.iter().map(|&i| d[i]).collect()),
            labels: keep.iter().map(|&i| self.labels[i].clone()).collect(),
        })
    }
}

/// Closed time window in seconds.
///
/// An absent bound is stored as an infinity, so an unrestricted query is the
/// window `[-inf, +inf]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub t_start: f64,
    pub t_stop: f64,
}

impl TimeRange {
    /// Fills absent bounds and rejects NaN or reversed windows.
    pub fn resolve(t_start: Option<f64>, t_stop: Option<f64>) -> Result<Self> {
        let t_start = t_start.unwrap_or(f64::NEG_INFINITY);
        let t_stop = t_stop.unwrap_or(f64::INFINITY);

        if t_start.is_nan() || t_stop.is_nan() || t_start > t_stop {
            return Err(RawIoError::TimeWindow { t_start, t_stop });
        }

        Ok(Self { t_start, t_stop })
    }

    pub fn is_unbounded(&self) -> bool {
        self.t_start == f64::NEG_INFINITY && self.t_stop == f64::INFINITY
    }

    pub fn contains(&self, t: f64) -> bool {
        self.t_start <= t && t <= self.t_stop
    }

    /// Tests a native tick against the window scaled to ticks at `rate` Hz.
    pub fn contains_tick(&self, tick: i64, rate: f64) -> bool {
        let tick = tick as f64;
        self.t_start * rate <= tick && tick <= self.t_stop * rate
    }
}
