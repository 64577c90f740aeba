use std::ffi::c_int;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn benchmark_guard_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("guard_overhead");

    for work in [1_u64, 64, 4096] {
        group.bench_with_input(BenchmarkId::new("direct", work), &work, |b, &work| {
            b.iter(|| black_box((0..black_box(work)).sum::<u64>()));
        });

        group.bench_with_input(BenchmarkId::new("guarded", work), &work, |b, &work| {
            b.iter(|| {
                black_box(churon_native::guard::guarded("bench", || {
                    (0..black_box(work)).sum::<u64>()
                }))
            });
        });
    }

    group.finish();
}

fn benchmark_routine_entry(c: &mut Criterion) {
    c.bench_function("churon_abi_version", |b| {
        b.iter(|| {
            let mut slot: c_int = 0;
            // SAFETY: Benchmark passes a valid pointer to one c_int.
            unsafe { churon_native::routines::churon_abi_version(&mut slot) };
            black_box(slot);
        });
    });

    c.bench_function("routine_table", |b| {
        b.iter(|| black_box(churon_native::routine_table()));
    });
}

criterion_group!(benches, benchmark_guard_overhead, benchmark_routine_entry);
criterion_main!(benches);
