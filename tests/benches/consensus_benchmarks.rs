//! # AEDPoS Consensus Benchmarks
//!
//! Performance validation for the per-block hot path:
//!
//! | Operation | Target |
//! |-----------|--------|
//! | Next-round order derivation | < 1ms at 1024 miners |
//! | LIB calculation | < 1ms at 1024 miners |
//! | UpdateValue validation | < 1ms |

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use aedpos_consensus::config::ConsensusConfig;
use aedpos_consensus::domain::{ConsensusBehaviour, MinerSlot, Round};
use aedpos_consensus::finality::LibCalculator;
use aedpos_consensus::ordering::OrderEngine;
use aedpos_consensus::validation::{ValidationContext, ValidationPipeline};
use shared_types::hash_bytes;

const INTERVAL: u64 = 4_000;
const START: u64 = 1_000_000;

fn pk(i: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[..4].copy_from_slice(&i.to_be_bytes());
    out
}

/// A round of `n` miners where everyone has published a value.
fn full_round(round_number: u64, n: u32) -> Round {
    let mut round = Round {
        round_number,
        term_number: 1,
        ..Round::default()
    };
    for i in 1..=n {
        let mut slot = MinerSlot::new(pk(i), i, START + (i as u64 - 1) * INTERVAL);
        slot.out_value = Some(hash_bytes(&i.to_be_bytes()));
        slot.signature = Some(hash_bytes(&(i ^ 0xDEAD).to_be_bytes()));
        slot.implied_irreversible_block_height = i as u64;
        slot.actual_mining_times.push(slot.expected_mining_time + 100);
        round.miners.insert(pk(i), slot);
    }
    round
}

// ============================================================================
// Order derivation: signature -> candidate order -> collision probe
// ============================================================================

fn bench_order_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordering");
    group.measurement_time(Duration::from_secs(10));

    let mut rng = rand::thread_rng();
    for n in [17u32, 101, 1024] {
        let round = full_round(1, n);
        let signature: [u8; 32] = rng.gen();
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("derive", n), &round, |b, round| {
            b.iter(|| black_box(OrderEngine::derive(round, &pk(1), signature).unwrap()))
        });
    }

    // Worst case: every other miner already claimed a final order, so the
    // probe walks the ring.
    let mut crowded = full_round(1, 1024);
    for (i, slot) in crowded.miners.values_mut().enumerate() {
        slot.final_order_of_next_round = i as u32 + 1;
    }
    crowded
        .miners
        .get_mut(&pk(1))
        .unwrap()
        .final_order_of_next_round = 0;
    let signature = hash_bytes(b"benchmark-signature");
    group.bench_function("derive_crowded_1024", |b| {
        b.iter(|| black_box(OrderEngine::derive(&crowded, &pk(1), signature).unwrap()))
    });

    group.finish();
}

// ============================================================================
// LIB calculation: sort the reports, pick index C - threshold(N)
// ============================================================================

fn bench_lib_calculation(c: &mut Criterion) {
    let mut group = c.benchmark_group("finality");
    group.measurement_time(Duration::from_secs(10));

    for n in [17u32, 101, 1024] {
        let previous = full_round(1, n);
        let current = full_round(2, n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(
            BenchmarkId::new("lib_calculate", n),
            &(previous, current),
            |b, (previous, current)| {
                b.iter(|| black_box(LibCalculator::calculate(previous, current, 0)))
            },
        );
    }

    group.finish();
}

// ============================================================================
// Validation: the common pipeline plus UpdateValue-specific checks
// ============================================================================

fn bench_update_value_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation");
    group.measurement_time(Duration::from_secs(10));

    for n in [17u32, 101] {
        let config = ConsensusConfig {
            mining_interval_ms: INTERVAL,
            ..ConsensusConfig::main_chain()
        };
        let mut trusted = full_round(1, n);
        // The sender has not published yet in the trusted view.
        {
            let slot = trusted.miners.get_mut(&pk(1)).unwrap();
            slot.out_value = None;
            slot.signature = None;
            slot.actual_mining_times.clear();
        }
        let mut proposed = trusted.clone();
        {
            let slot = proposed.miners.get_mut(&pk(1)).unwrap();
            let out = hash_bytes(b"commitment");
            slot.out_value = Some(out);
            slot.signature = Some(out);
            slot.implied_irreversible_block_height = 1;
        }

        group.bench_with_input(
            BenchmarkId::new("update_value", n),
            &(trusted, proposed, config),
            |b, (trusted, proposed, config)| {
                b.iter(|| {
                    let ctx = ValidationContext {
                        trusted,
                        previous: None,
                        proposed,
                        sender: &pk(1),
                        behaviour: ConsensusBehaviour::UpdateValue,
                        now: START + 100,
                        block_height: 10_000,
                        config,
                        blockchain_start_time: 0,
                        expected_victors: None,
                    };
                    black_box(ValidationPipeline::validate(&ctx))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_order_derivation,
    bench_lib_calculation,
    bench_update_value_validation
);
criterion_main!(benches);
