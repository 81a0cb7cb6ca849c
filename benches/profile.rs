use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use dev_utils::{get_example_config, get_example_scenario};
use raptor::{Profile, ProfileConfig};

fn profile_benchmark(c: &mut Criterion) {
    let (network, footpaths, start, start_time, end) = get_example_scenario();
    let reversed_network = network.reverse();
    let reversed_footpaths = footpaths.reverse();
    let window_end = start_time + 2 * 3600;

    let mut group = c.benchmark_group("Profile");
    group.sample_size(20);
    for pruning in [true, false] {
        let mut profile = Profile::new(
            &network,
            &footpaths,
            &reversed_network,
            &reversed_footpaths,
            get_example_config(),
            ProfileConfig { pruning },
        );
        let name = if pruning { "pruned" } else { "unpruned" };
        group.bench_function(name, |b| {
            b.iter(|| profile.profile(black_box(start), black_box(end), start_time, window_end))
        });
    }
    group.finish();
}

criterion_group!(benches, profile_benchmark);
criterion_main!(benches);
