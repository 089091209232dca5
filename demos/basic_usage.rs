use ephys_rawio::{open, ExampleRawIo};
use std::error::Error;
use tracing::Level;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    // "Open" the imaginary file
    let reader = open(ExampleRawIo::new("itisafake.nof"))?;
    println!("{}", reader);

    // Print topology
    for block in 0..reader.block_count()? {
        for seg in 0..reader.segment_count(block)? {
            println!(
                "Block {} segment {}: {:.2} to {:.2} seconds",
                block,
                seg,
                reader.segment_t_start(block, seg)?,
                reader.segment_t_stop(block, seg)?
            );
        }
    }

    // Read the first 1024 samples of three channels and rescale them
    let channels = reader.signal_channel_indexes_by_name(&["ch0", "ch3", "ch6"])?;
    let raw = reader.get_analog_chunk(0, 0, Some(0), Some(1024), Some(channels.as_slice()))?;
    let physical = reader.rescale_signal_to_physical::<f64>(&raw, Some(channels.as_slice()))?;
    println!(
        "\nAnalog chunk: {} samples x {} channels",
        physical.nrows(),
        physical.ncols()
    );
    let units = &reader.header()?.signal_channels[channels[0]].units;
    for i in 0..5 {
        println!("  {}: raw {} -> {:.4} {}", i, raw[[i, 0]], physical[[i, 0]], units);
    }

    // Spikes of the first unit in the first half second
    let ticks = reader.spike_timestamps(0, 0, 0, Some(0.0), Some(0.5))?;
    let times = reader.rescale_spike_timestamps::<f64>(&ticks)?;
    println!("\nUnit 0 spikes in [0, 0.5] s: {:?}", times.to_vec());

    let waveforms = reader.spike_raw_waveforms(0, 0, 0, Some(0.0), Some(0.5))?;
    let shape = waveforms.shape();
    println!(
        "Waveforms: {} spikes x {} channel x {} samples",
        shape[0], shape[1], shape[2]
    );

    // Events and epochs
    for channel in 0..reader.event_channel_count()? {
        let events = reader.event_timestamps(0, 0, channel, None, None)?;
        let seconds = reader.rescale_event_timestamps::<f64>(&events.timestamps)?;
        println!(
            "\nEvent channel {} ({}): {} entries",
            channel,
            reader.header()?.event_channels[channel].kind,
            events.len()
        );
        for (i, label) in events.labels.iter().enumerate().take(3) {
            match &events.durations {
                Some(durations) => println!("  {:.2} s +{:.2} s {}", seconds[i], durations[i], label),
                None => println!("  {:.2} s {}", seconds[i], label),
            }
        }
    }

    Ok(())
}
