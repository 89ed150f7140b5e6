use criterion::*;
use std::hint::black_box;

mod common;
use common::*;

fn iterate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    group.bench_function("for_matching_write_wealth_100k", |b| {
        b.iter_batched(
            || {
                let mut manager = make_manager(1);
                populate(&mut manager, ENTITIES_MED);
                manager
            },
            |mut manager| {
                manager.for_matching_signature::<(&mut Wealth,), _>(false, |_, (wealth,)| {
                    wealth.value *= 1.0001;
                });
                black_box(manager);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("for_matching_integrate_position_100k", |b| {
        b.iter_batched(
            || {
                let mut manager = make_manager(1);
                populate(&mut manager, ENTITIES_MED);
                manager
            },
            |mut manager| {
                manager.for_matching_signature::<(&mut Position, &Velocity), _>(
                    false,
                    |_, (position, velocity)| {
                        position.x += velocity.dx;
                        position.y += velocity.dy;
                    },
                );
                black_box(manager);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("for_matching_parallel_write_wealth_100k", |b| {
        b.iter_batched(
            || {
                let mut manager = make_manager(4);
                populate(&mut manager, ENTITIES_MED);
                manager
            },
            |mut manager| {
                manager.for_matching_signature::<(&mut Wealth,), _>(true, |_, (wealth,)| {
                    wealth.value *= 1.0001;
                });
                black_box(manager);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, iterate_benchmark);
criterion_main!(benches);
