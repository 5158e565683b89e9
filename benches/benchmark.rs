use criterion::measurement::WallTime;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkGroup, Criterion, Throughput};
use num_complex::Complex64;
use qtile::gate::{cache, nocache};
use qtile::{gate_with_config, Amplitudes, CacheConfig, ParallelPolicy, Qubit, Rayon, Sequential};
use std::f64::consts::FRAC_1_SQRT_2;

// custom criterion configuration for all benchmarks
fn custom_criterion_config() -> Criterion<WallTime> {
    Criterion::default()
        .sample_size(30) // gate passes over large states are slow, keep the sample small
        .measurement_time(std::time::Duration::from_secs(5))
        .warm_up_time(std::time::Duration::from_secs(1))
}

// initial quantum state vector (|0⟩)
fn initial_state(num_qubits: u32) -> Vec<Complex64> {
    let mut amps = vec![Complex64::new(0.0, 0.0); 1 << num_qubits];
    amps[0] = Complex64::new(1.0, 0.0);
    amps
}

fn hadamard(amplitudes: &mut Amplitudes<'_, Complex64>, _: usize) {
    let (a, b) = (amplitudes[0], amplitudes[1]);
    amplitudes[0] = (a + b) * FRAC_1_SQRT_2;
    amplitudes[1] = (a - b) * FRAC_1_SQRT_2;
}

fn swap_gate(amplitudes: &mut Amplitudes<'_, Complex64>, _: usize) {
    amplitudes.swap(0b01, 0b10);
}

// toffoli as a permutation of the two patterns with both controls set
fn toffoli(amplitudes: &mut Amplitudes<'_, Complex64>, _: usize) {
    amplitudes.swap(0b011, 0b111);
}

fn bench_engines<P: ParallelPolicy>(
    group: &mut BenchmarkGroup<WallTime>,
    label: &str,
    policy: &P,
    num_qubits: u32,
    num_on_cache_qubits: u32,
) {
    let top = num_qubits - 1;
    let cases: Vec<(&str, Vec<Qubit>, fn(&mut Amplitudes<'_, Complex64>, usize))> = vec![
        ("hadamard_low", vec![Qubit(0)], hadamard),
        ("hadamard_high", vec![Qubit(top)], hadamard),
        ("swap_mixed", vec![Qubit(1), Qubit(top)], swap_gate),
        ("toffoli_high", vec![Qubit(top - 2), Qubit(top - 1), Qubit(top)], toffoli),
    ];

    let config = CacheConfig::with_num_on_cache_qubits(num_on_cache_qubits);
    for (name, qubits, transform) in &cases {
        group.bench_function(format!("{}_nocache_{}_{}_qubits", label, name, num_qubits), |b| {
            let mut amps = initial_state(num_qubits);
            b.iter(|| nocache::gate(policy, black_box(&mut amps), transform, qubits));
        });

        group.bench_function(format!("{}_dispatch_{}_{}_qubits", label, name, num_qubits), |b| {
            let mut amps = initial_state(num_qubits);
            b.iter(|| gate_with_config(policy, &config, black_box(&mut amps), transform, qubits));
        });

        if qubits.len() <= num_on_cache_qubits as usize {
            group.bench_function(format!("{}_staged_{}_{}_qubits", label, name, num_qubits), |b| {
                let mut amps = initial_state(num_qubits);
                let mut staging = vec![Complex64::new(0.0, 0.0); 1 << num_on_cache_qubits];
                b.iter(|| cache::gate(policy, black_box(&mut amps), &mut staging, transform, qubits));
            });
        }
    }
}

// benchmarks for the gate engines
fn gate_engine_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("gate_engines");

    // for faster development runs (debug mode), use fewer qubits
    #[cfg(debug_assertions)]
    let qubit_counts = vec![8, 12];

    #[cfg(not(debug_assertions))]
    let qubit_counts = vec![12, 16, 20, 22];

    let rayon = Rayon::new();
    for &num_qubits in &qubit_counts {
        group.throughput(Throughput::Elements(1u64 << num_qubits));
        // a staging buffer well below the state so every case stages
        let num_on_cache_qubits = num_qubits - 4;
        bench_engines(&mut group, "sequential", &Sequential, num_qubits, num_on_cache_qubits);
        bench_engines(&mut group, "rayon", &rayon, num_qubits, num_on_cache_qubits);
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = custom_criterion_config();
    targets = gate_engine_benchmarks
}
criterion_main!(benches);
