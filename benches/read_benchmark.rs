use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ephys_rawio::{open, ExampleRawIo};

pub fn bench_analog_chunk(c: &mut Criterion) {
    let reader = open(ExampleRawIo::new("bench")).unwrap();

    c.bench_function("get_analog_chunk_1s_16ch", |b| {
        b.iter(|| {
            let chunk = reader
                .get_analog_chunk(0, 0, Some(0), Some(10000), None)
                .unwrap();
            black_box(chunk)
        });
    });
}

pub fn bench_rescale(c: &mut Criterion) {
    let reader = open(ExampleRawIo::new("bench")).unwrap();
    let raw = reader
        .get_analog_chunk(0, 0, Some(0), Some(10000), None)
        .unwrap();

    c.bench_function("rescale_signal_to_physical_f32", |b| {
        b.iter(|| black_box(reader.rescale_signal_to_physical::<f32>(&raw, None).unwrap()));
    });
}

pub fn bench_spikes(c: &mut Criterion) {
    let reader = open(ExampleRawIo::new("bench")).unwrap();

    c.bench_function("spike_waveforms_windowed", |b| {
        b.iter(|| {
            black_box(
                reader
                    .spike_raw_waveforms(0, 0, 0, Some(0.2), Some(0.6))
                    .unwrap(),
            )
        });
    });
}

criterion_group!(benches, bench_analog_chunk, bench_rescale, bench_spikes);
criterion_main!(benches);
