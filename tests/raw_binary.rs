use byteorder::{LittleEndian, WriteBytesExt};
use ephys_rawio::{
    open, ErrorKind, RawBinaryConfig, RawBinarySignalRawIo, RawIo, RawReader, Result,
};
use ndarray::{Array1, Array3};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

const NB_CHANNEL: usize = 4;
const NUM_FRAMES: usize = 300;

fn sample(frame: usize, channel: usize) -> i16 {
    (frame as i16 - 150) * 10 + channel as i16
}

/// Writes `NUM_FRAMES` interleaved frames after `preamble` junk bytes.
fn write_recording(name: &str, preamble: usize) -> std::io::Result<PathBuf> {
    let path = std::env::temp_dir().join(name);
    if path.exists() {
        std::fs::remove_file(&path)?;
    }

    let mut file = File::create(&path)?;
    file.write_all(&vec![0xAB; preamble])?;
    for frame in 0..NUM_FRAMES {
        for channel in 0..NB_CHANNEL {
            file.write_i16::<LittleEndian>(sample(frame, channel))?;
        }
    }
    Ok(path)
}

fn config() -> RawBinaryConfig {
    RawBinaryConfig::default()
        .with_nb_channel(NB_CHANNEL)
        .with_sampling_rate(1000.0)
        .with_scaling("uV", 0.195, -6.4)
}

#[test]
fn header_describes_a_single_segment() -> Result<()> {
    let path = write_recording("rawio_header.bin", 0)?;
    let reader = open(RawBinarySignalRawIo::<i16>::new(&path, config().with_t_start(2.5)))?;

    assert_eq!(reader.block_count()?, 1);
    assert_eq!(reader.segment_count(0)?, 1);
    assert_eq!(reader.analog_chunk_shape(0, 0)?, (NUM_FRAMES, NB_CHANNEL));
    assert_eq!(reader.segment_t_start(0, 0)?, 2.5);
    assert!((reader.segment_t_stop(0, 0)? - 2.8).abs() < 1e-12);

    let header = reader.header()?;
    assert_eq!(header.signal_channels[3].name, "ch3");
    assert_eq!(header.signal_channels[3].id, "3");
    assert_eq!(header.signal_channels[3].units, "uV");
    assert_eq!(header.signal_channel_groups().len(), 1);

    std::fs::remove_file(path)?;
    Ok(())
}

#[test]
fn windowed_reads_decode_only_the_requested_frames() -> Result<()> {
    let path = write_recording("rawio_window.bin", 16)?;
    let reader = open(RawBinarySignalRawIo::<i16>::new(&path, config().with_bytes_offset(16)))?;

    let chunk = reader.get_analog_chunk(0, 0, Some(100), Some(110), Some(&[3, 0]))?;
    assert_eq!(chunk.shape(), &[10, 2]);
    for row in 0..10 {
        assert_eq!(chunk[[row, 0]], sample(100 + row, 3));
        assert_eq!(chunk[[row, 1]], sample(100 + row, 0));
    }

    let full = reader.get_analog_chunk(0, 0, None, None, None)?;
    assert_eq!(full.shape(), &[NUM_FRAMES, NB_CHANNEL]);
    assert_eq!(full[[NUM_FRAMES - 1, 2]], sample(NUM_FRAMES - 1, 2));
    assert_eq!(full, reader.get_analog_chunk(0, 0, Some(0), Some(NUM_FRAMES), None)?);

    let physical = reader.rescale_signal_to_physical::<f64>(&chunk, Some(&[3, 0]))?;
    assert!((physical[[0, 0]] - (sample(100, 3) as f64 * 0.195 - 6.4)).abs() < 1e-12);

    std::fs::remove_file(path)?;
    Ok(())
}

#[test]
fn unsigned_and_wide_samples() -> Result<()> {
    let path = std::env::temp_dir().join("rawio_u32.bin");
    let mut file = File::create(&path)?;
    for value in [1u32, 2, 3_000_000_000, 4] {
        file.write_u32::<LittleEndian>(value)?;
    }
    drop(file);

    let reader = open(RawBinarySignalRawIo::<u32>::new(&path, RawBinaryConfig::default()))?;
    let chunk = reader.get_analog_chunk(0, 0, Some(1), None, Some(&[0]))?;
    assert_eq!(chunk.column(0).to_vec(), vec![3_000_000_000]);

    std::fs::remove_file(path)?;
    Ok(())
}

#[test]
fn truncated_frame_is_a_format_error() -> Result<()> {
    let path = write_recording("rawio_truncated.bin", 0)?;
    let mut file = std::fs::OpenOptions::new().append(true).open(&path)?;
    file.write_all(&[0x01, 0x02])?;
    drop(file);

    let mut reader = RawReader::new(RawBinarySignalRawIo::<i16>::new(&path, config()));
    let err = reader.parse_header().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceFormat);
    assert!(err.to_string().contains("frames"));
    assert!(!reader.is_header_parsed());

    std::fs::remove_file(path)?;
    Ok(())
}

#[test]
fn missing_file_and_bad_config_fail_at_parse_time() {
    let path = std::env::temp_dir().join("rawio_does_not_exist.bin");
    let mut reader = RawReader::new(RawBinarySignalRawIo::<i16>::new(&path, config()));
    assert_eq!(reader.parse_header().unwrap_err().kind(), ErrorKind::SourceFormat);

    let mut reader = RawReader::new(RawBinarySignalRawIo::<i16>::new(
        &path,
        config().with_nb_channel(0),
    ));
    let err = reader.parse_header().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceFormat);
    assert!(err.to_string().contains("nb_channel"));
}

#[test]
fn file_appearing_after_a_failed_parse_is_not_picked_up() -> Result<()> {
    let path = std::env::temp_dir().join("rawio_late.bin");
    if path.exists() {
        std::fs::remove_file(&path)?;
    }

    let mut reader = RawReader::new(RawBinarySignalRawIo::<i16>::new(&path, config()));
    assert_eq!(reader.parse_header().unwrap_err().kind(), ErrorKind::SourceFormat);

    write_recording("rawio_late.bin", 0)?;
    assert_eq!(reader.parse_header().unwrap_err().kind(), ErrorKind::State);
    assert!(!reader.is_header_parsed());

    std::fs::remove_file(path)?;
    Ok(())
}

#[test]
fn construction_does_no_io() {
    let io = RawBinarySignalRawIo::<i16>::new("/nonexistent/dir/recording.bin", config());
    let reader = RawReader::new(io);
    assert!(reader.source_name().ends_with("recording.bin"));
    assert_eq!(reader.inner().config().nb_channel, NB_CHANNEL);
}

#[test]
fn spikes_and_events_are_unsupported() -> Result<()> {
    let path = write_recording("rawio_unsupported.bin", 0)?;
    let reader = open(RawBinarySignalRawIo::<i16>::new(&path, config()))?;

    assert_eq!(reader.unit_channel_count()?, 0);
    assert_eq!(
        reader.spike_timestamps(0, 0, 0, None, None).unwrap_err().kind(),
        ErrorKind::Unsupported
    );
    assert_eq!(
        reader.event_timestamps(0, 0, 0, None, None).unwrap_err().kind(),
        ErrorKind::Unsupported
    );

    // Rescales share the capability check of the queries they pair with
    assert_eq!(
        reader
            .rescale_spike_timestamps::<f64>(&Array1::from(vec![10]))
            .unwrap_err()
            .kind(),
        ErrorKind::Unsupported
    );
    assert_eq!(
        reader
            .rescale_event_timestamps::<f64>(&Array1::from(vec![1.0]))
            .unwrap_err()
            .kind(),
        ErrorKind::Unsupported
    );
    assert_eq!(
        reader
            .rescale_waveforms_to_physical::<f64>(&Array3::zeros((1, 1, 1)), 0)
            .unwrap_err()
            .kind(),
        ErrorKind::Unsupported
    );

    std::fs::remove_file(path)?;
    Ok(())
}

#[test]
fn close_releases_the_file() -> Result<()> {
    let path = write_recording("rawio_close.bin", 0)?;
    let mut io = RawBinarySignalRawIo::<i16>::new(&path, config());
    io.parse_header()?;
    io.close();
    assert_eq!(
        io.get_analog_chunk(0, 0, 0, 1, &[0]).unwrap_err().kind(),
        ErrorKind::State
    );

    let mut reader = open(RawBinarySignalRawIo::<i16>::new(&path, config()))?;
    reader.close();
    assert_eq!(
        reader.get_analog_chunk(0, 0, None, None, None).unwrap_err().kind(),
        ErrorKind::State
    );

    std::fs::remove_file(path)?;
    Ok(())
}

#[test]
fn config_loads_from_json_with_defaults() {
    let config: RawBinaryConfig =
        serde_json::from_str(r#"{"nb_channel": 32, "sampling_rate": 30000.0}"#).unwrap();
    assert_eq!(config.nb_channel, 32);
    assert_eq!(config.sampling_rate, 30000.0);
    assert_eq!(config.gain, 1.0);
    assert_eq!(config.bytes_offset, 0);
}
