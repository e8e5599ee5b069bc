//! Compressor benchmarks

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tc_core::{OversamplingMode, Parameters};
use tc_dsp::{CompressorProcessor, LinkedCompressor};

fn bench_linked_compressor(c: &mut Criterion) {
    let mut comp = LinkedCompressor::new(48000.0);
    comp.set_parameters(&Parameters::default());

    let mut left: Vec<f64> = (0..1024).map(|i| (i as f64 * 0.01).sin() * 0.5).collect();
    let mut right: Vec<f64> = (0..1024).map(|i| (i as f64 * 0.01).cos() * 0.5).collect();

    c.bench_function("linked_compressor_1024", |b| {
        b.iter(|| {
            comp.process(black_box(&mut [left.as_mut_slice(), right.as_mut_slice()]));
        })
    });
}

fn bench_processor_oversampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("processor_block_512");

    for mode in OversamplingMode::ALL {
        let mut processor = CompressorProcessor::new();
        processor.update_parameters(
            &Parameters::default()
                .with_saturation(0.7, 0.5)
                .with_oversampling(mode)
                .with_mix(0.8),
        );
        processor.initialize(48000.0, 512).unwrap();

        let mut left: Vec<f64> = (0..512).map(|i| (i as f64 * 0.03).sin() * 0.8).collect();
        let mut right = left.clone();

        group.bench_with_input(BenchmarkId::from_parameter(mode.label()), &mode, |b, _| {
            b.iter(|| {
                processor.process_block(black_box(&mut [left.as_mut_slice(), right.as_mut_slice()]));
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_linked_compressor, bench_processor_oversampling);
criterion_main!(benches);
