use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use dev_utils::{get_example_config, get_example_scenario};
use raptor::{raptor_query, Raptor};

fn raptor_benchmark(c: &mut Criterion) {
    let (network, footpaths, start, start_time, end) = get_example_scenario();
    let config = get_example_config();
    c.bench_function("Raptor", |b| {
        b.iter(|| raptor_query(&network, &footpaths, config, black_box(start), black_box(start_time), black_box(end)))
    });

    // Reusing the engine skips allocating scratch buffers per query.
    let mut raptor = Raptor::new(&network, &footpaths, config);
    c.bench_function("Raptor (reused)", |b| {
        b.iter(|| raptor.earliest_arrival(black_box(start), black_box(start_time)).len())
    });
}

criterion_group!(benches, raptor_benchmark);
criterion_main!(benches);
