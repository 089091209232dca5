//! A reader for an imaginary file, synthesized in memory.
//!
//! `ExampleRawIo` implements every hook with reproducible values and serves
//! as the template for new formats:
//!
//! * 2 blocks, with 2 and 3 segments
//! * 16 int16 signal channels at 10 kHz, 102400 samples (10.24 s) per segment
//! * 3 units with 20 spikes each, one waveform channel of 50 samples (5 ms)
//! * 2 event channels: one `event` channel with 6 entries and one `epoch`
//!   channel with 10 entries of 0.25 s
//!
//! ```
//! use ephys_rawio::{open, ExampleRawIo};
//!
//! let reader = open(ExampleRawIo::new("itisafake.nof")).unwrap();
//! let ticks = reader.spike_timestamps(0, 0, 0, None, None).unwrap();
//! let seconds = reader.rescale_spike_timestamps::<f64>(&ticks).unwrap();
//! assert_eq!(seconds[1], 0.05);
//! ```

use ndarray::{Array1, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::Result;
use crate::rawio::RawIo;
use crate::types::{
    EventChannel, EventChannelKind, EventSet, Header, SignalChannel, TimeRange, UnitChannel,
};

const SAMPLING_RATE: f64 = 10000.0;
const NUM_SAMPLES: usize = 102400;
const NUM_SIGNAL_CHANNELS: usize = 16;
const NUM_UNITS: usize = 3;
const SPIKES_PER_UNIT: usize = 20;
const SPIKE_INTERVAL: i64 = 500; // ticks
const WAVEFORM_SAMPLES: usize = 50;
const SAWTOOTH_PERIOD: usize = 2048;
const DEFAULT_WAVEFORM_SEED: u64 = 2205;

// Segment start times in seconds, indexed by [block][segment]
const SEGMENT_T_STARTS: [&[f64]; 2] = [&[0.0, 15.0], &[0.0, 20.0, 60.0]];

/// Deterministic in-memory reader. The "file" is a label only.
#[derive(Debug, Clone)]
pub struct ExampleRawIo {
    filename: String,
    waveform_seed: u64,
}

impl ExampleRawIo {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            waveform_seed: DEFAULT_WAVEFORM_SEED,
        }
    }

    /// Seeds the waveform noise generator of this instance.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.waveform_seed = seed;
        self
    }

    /// Raw value of channel `channel` at absolute sample `i`.
    ///
    /// A sawtooth of period 2048 centred on zero, shifted by 128 samples per
    /// channel so columns are distinguishable.
    pub fn sample_value(i: usize, channel: usize) -> i16 {
        ((i + 128 * channel) % SAWTOOTH_PERIOD) as i16 - (SAWTOOTH_PERIOD / 2) as i16
    }

    fn all_spike_timestamps() -> Array1<i64> {
        Array1::from_iter((0..SPIKES_PER_UNIT as i64).map(|k| k * SPIKE_INTERVAL))
    }
}

impl RawIo for ExampleRawIo {
    type Sample = i16;

    fn source_name(&self) -> String {
        self.filename.clone()
    }

    fn parse_header(&mut self) -> Result<Header> {
        let signal_channels = (0..NUM_SIGNAL_CHANNELS)
            .map(|c| {
                SignalChannel::new(
                    format!("ch{}", c),
                    format!("id#{}", c),
                    "uV",
                    1000.0 / 65536.0,
                    0.0,
                )
            })
            .collect();

        let unit_channels = (0..NUM_UNITS)
            .map(|c| UnitChannel::new(format!("unit{}", c), format!("#{}", c), "uV", 1000.0 / 65536.0, 0.0))
            .collect();

        let event_channels = vec![
            EventChannel::new("Some events", "ev_0", EventChannelKind::Event),
            EventChannel::new("Some epochs", "ep_1", EventChannelKind::Epoch),
        ];

        let segment_count = SEGMENT_T_STARTS.iter().map(|starts| starts.len()).collect();

        debug!(source = %self.filename, "synthesizing example header");
        Ok(Header::new(segment_count, signal_channels, unit_channels, event_channels))
    }

    fn sampling_rate(&self) -> f64 {
        SAMPLING_RATE
    }

    fn segment_t_start(&self, block_index: usize, seg_index: usize) -> f64 {
        SEGMENT_T_STARTS[block_index][seg_index]
    }

    fn analog_chunk_shape(&self, _block_index: usize, _seg_index: usize) -> (usize, usize) {
        // Every segment happens to have the same shape; real files rarely do
        (NUM_SAMPLES, NUM_SIGNAL_CHANNELS)
    }

    fn get_analog_chunk(
        &self,
        _block_index: usize,
        _seg_index: usize,
        i_start: usize,
        i_stop: usize,
        channel_indexes: &[usize],
    ) -> Result<Array2<i16>> {
        Ok(Array2::from_shape_fn(
            (i_stop - i_start, channel_indexes.len()),
            |(i, column)| Self::sample_value(i_start + i, channel_indexes[column]),
        ))
    }

    fn spike_count(&self, _block_index: usize, _seg_index: usize, _unit_index: usize) -> usize {
        SPIKES_PER_UNIT
    }

    fn spike_timestamps(
        &self,
        _block_index: usize,
        _seg_index: usize,
        _unit_index: usize,
        range: TimeRange,
    ) -> Result<Array1<i64>> {
        // Ticks of the 10 kHz signal clock; every unit fires the same train
        Ok(Self::all_spike_timestamps()
            .iter()
            .copied()
            .filter(|&t| range.contains_tick(t, SAMPLING_RATE))
            .collect())
    }

    fn spike_raw_waveforms(
        &self,
        _block_index: usize,
        _seg_index: usize,
        _unit_index: usize,
        range: TimeRange,
    ) -> Result<Array3<i16>> {
        // Pure noise, regenerated from the instance seed on every call
        let mut rng = StdRng::seed_from_u64(self.waveform_seed);
        let waveforms = Array3::from_shape_fn((SPIKES_PER_UNIT, 1, WAVEFORM_SAMPLES), |_| {
            rng.gen_range(-16i16..16)
        });

        let selected: Vec<usize> = Self::all_spike_timestamps()
            .iter()
            .enumerate()
            .filter(|(_, t)| range.contains_tick(**t, SAMPLING_RATE))
            .map(|(i, _)| i)
            .collect();

        Ok(waveforms.select(Axis(0), &selected))
    }

    fn event_count(&self, _block_index: usize, _seg_index: usize, event_channel_index: usize) -> usize {
        match event_channel_index {
            0 => 6,
            _ => 10,
        }
    }

    fn event_timestamps(
        &self,
        _block_index: usize,
        _seg_index: usize,
        event_channel_index: usize,
        range: TimeRange,
    ) -> Result<EventSet> {
        // Events of this imaginary format are stored directly in seconds
        let events = match event_channel_index {
            0 => EventSet {
                timestamps: Array1::range(0.0, 6.0, 1.0),
                durations: None,
                labels: ["trigger_a", "trigger_b"]
                    .iter()
                    .cycle()
                    .take(6)
                    .map(|s| s.to_string())
                    .collect(),
            },
            _ => EventSet {
                timestamps: Array1::range(0.0, 10.0, 1.0) + 0.5,
                durations: Some(Array1::from_elem(10, 0.25)),
                labels: (0..10)
                    .map(|i| (if i < 5 { "zoneX" } else { "zoneZ" }).to_string())
                    .collect(),
            },
        };

        events.restrict_to(&range, &self.filename)
    }
}
