//! Stress tests for shared documents.
//!
//! These verify that one document and one context can serve many reader
//! threads at once.

use blittable_format::{BlittableObject, BlittableResult, BlittableValue};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;
use tracing::debug;

/// Lookup counts from a stress run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressTestResult {
    /// Lookups performed across all threads.
    pub total_ops: usize,
    /// Lookups whose check returned false.
    pub failed_ops: usize,
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Lookups performed by each thread.
    pub operations: usize,
    /// Number of concurrent reader threads.
    pub threads: usize,
    /// Seed for the per-thread lookup order.
    pub seed: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 100,
            seed: 0x5EED,
        }
    }
}

/// Looks up random names from `names` on `root` from many threads at once.
///
/// `check` receives each looked-up name and its result; a lookup counts as
/// successful when `check` returns true. Each thread draws names in its own
/// seeded order, so runs are reproducible.
pub fn stress_concurrent_lookups<F>(
    root: &BlittableObject<'_>,
    names: &[String],
    config: &StressConfig,
    check: F,
) -> StressTestResult
where
    F: Fn(&str, BlittableResult<Option<BlittableValue<'_>>>) -> bool + Sync,
{
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let successful = &successful;
            let failed = &failed;
            let check = &check;
            let seed = config.seed.wrapping_add(t as u64);
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for _ in 0..config.operations {
                    let name = &names[rng.gen_range(0..names.len())];
                    if check(name, root.try_get(name)) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    let failed_ops = failed.into_inner();
    let total_ops = successful.into_inner() + failed_ops;
    debug!(
        threads = config.threads,
        total_ops,
        failed_ops,
        elapsed = ?start.elapsed(),
        "concurrent lookups finished"
    );
    StressTestResult {
        total_ops,
        failed_ops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{flat_object_json, TestEnv};

    #[test]
    fn small_concurrent_run() {
        let mut env = TestEnv::new();
        let doc = env.encode(&flat_object_json(50));
        let root = doc.reader(env.context()).unwrap();
        let names: Vec<String> = (0..50).map(|i| format!("Field{i}")).collect();

        let config = StressConfig {
            operations: 50,
            threads: 8,
            ..StressConfig::default()
        };
        let result = stress_concurrent_lookups(&root, &names, &config, |name, value| {
            let expected = name.trim_start_matches("Field");
            matches!(value, Ok(Some(v)) if v.as_string().and_then(|s| s.as_str().ok()) == Some(expected))
        });

        assert_eq!(result.total_ops, 400);
        assert_eq!(result.failed_ops, 0);
    }
}
