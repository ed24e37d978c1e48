use super::*;

const MIB: u64 = 1024 * 1024;

struct UnknownProbe;

impl MemoryProbe for UnknownProbe {
    fn available_bytes(&self) -> Option<u64> {
        None
    }
}

fn estimator(available: u64) -> MemoryBudgetEstimator {
    MemoryBudgetEstimator::new(
        MemoryBudgetOpts {
            clone_cost_multiplier: 1.0,
            reserve_fraction: 0.0,
        },
        Arc::new(FixedMemoryProbe(available)),
    )
}

#[test]
fn worker_count_is_bounded_by_memory_and_request() {
    let est = estimator(200 * MIB);
    assert_eq!(est.estimate_worker_count(100 * MIB, 4), 2);
    assert_eq!(est.estimate_worker_count(10 * MIB, 4), 4);
    assert_eq!(est.estimate_worker_count(10 * MIB, 1), 1);
}

#[test]
fn never_returns_zero_workers() {
    let est = estimator(MIB);
    assert_eq!(est.estimate_worker_count(100 * MIB, 8), 1);
    assert_eq!(est.estimate_worker_count(100 * MIB, 0), 1);
    assert_eq!(estimator(0).estimate_worker_count(1, 3), 1);
}

#[test]
fn worker_count_stays_in_range_for_many_inputs() {
    for available in [0, 1, MIB, 64 * MIB, u64::MAX] {
        for footprint in [0, 1, MIB, 512 * MIB, u64::MAX] {
            for max in 0..6usize {
                let n = estimator(available).estimate_worker_count(footprint, max);
                assert!(n >= 1, "available={available} footprint={footprint} max={max}");
                assert!(n <= max.max(1));
            }
        }
    }
}

#[test]
fn unknown_memory_grants_requested_max() {
    let est = MemoryBudgetEstimator::new(MemoryBudgetOpts::default(), Arc::new(UnknownProbe));
    assert_eq!(est.estimate_worker_count(100 * MIB, 6), 6);
}

#[test]
fn reserve_and_multiplier_shrink_the_budget() {
    let opts = MemoryBudgetOpts {
        clone_cost_multiplier: 2.0,
        reserve_fraction: 0.5,
    };
    // 400 MiB * 0.5 / (50 MiB * 2.0) = 2
    assert_eq!(affordable_copies(400 * MIB, 50 * MIB, &opts), 2);
}

#[test]
fn opts_validation_rejects_out_of_range_values() {
    assert!(MemoryBudgetOpts::default().validate().is_ok());
    let bad_mult = MemoryBudgetOpts {
        clone_cost_multiplier: 0.0,
        ..MemoryBudgetOpts::default()
    };
    assert!(bad_mult.validate().is_err());
    let bad_reserve = MemoryBudgetOpts {
        reserve_fraction: 1.0,
        ..MemoryBudgetOpts::default()
    };
    assert!(bad_reserve.validate().is_err());
}

#[test]
fn parses_mem_available_from_meminfo() {
    let text = concat!(
        "MemTotal:       16315620 kB\n",
        "MemFree:         1234567 kB\n",
        "MemAvailable:    8000000 kB\n",
    );
    assert_eq!(parse_mem_available(text), Some(8_000_000 * 1024));
    assert_eq!(parse_mem_available("MemTotal: 1 kB\n"), None);
}
