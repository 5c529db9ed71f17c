//! Rate-limited batch scheduling for bulk feed loads.
//!
//! Stay within feed vendor limits; don't risk getting blacklisted or
//! throttled. Batching also keeps each store transaction short.

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::ValidationError;

/// Throttle window for one cache type: how many symbols ride in one batch
/// and how long to pause between batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPolicy {
    batch_size: usize,
    delay: Duration,
}

impl BatchPolicy {
    pub fn new(batch_size: usize, delay: Duration) -> Result<Self, ValidationError> {
        if batch_size == 0 {
            return Err(ValidationError::ZeroBatchSize);
        }
        Ok(Self { batch_size, delay })
    }

    /// Series lookups cost one vendor request per symbol; stay well inside
    /// the free-tier request budget.
    pub fn series_default() -> Self {
        Self {
            batch_size: 1,
            delay: Duration::from_secs(20),
        }
    }

    /// Index lookups share the series request budget.
    pub fn index_default() -> Self {
        Self {
            batch_size: 1,
            delay: Duration::from_secs(20),
        }
    }

    /// Price lookups tolerate wide batches; the short pause bounds the time
    /// any one transaction holds the trades table.
    pub fn trade_default() -> Self {
        Self {
            batch_size: 50,
            delay: Duration::from_secs(1),
        }
    }

    /// Directory refresh never talks to the vendor; batching only bounds
    /// transaction size.
    pub fn instrument_default() -> Self {
        Self {
            batch_size: 50,
            delay: Duration::from_secs(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn with_batch_size(self, batch_size: usize) -> Result<Self, ValidationError> {
        Self::new(batch_size, self.delay)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Totals reported after the last batch of a bulk pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchRun {
    pub received: usize,
    pub processed: usize,
    pub batches: usize,
    pub delays: usize,
}

/// Run `action` over contiguous batches of `items`, pausing `policy.delay()`
/// before every batch after the first.
///
/// Batches run strictly in order on the calling thread; the inter-batch
/// pause is a real sleep, not a deferred task. An `Err` from `action`
/// (infrastructure failure) stops the run and propagates.
pub fn run_batches<T, E>(
    items: &[T],
    policy: &BatchPolicy,
    mut action: impl FnMut(&[T]) -> Result<(), E>,
) -> Result<BatchRun, E> {
    let mut run = BatchRun {
        received: items.len(),
        ..BatchRun::default()
    };

    for batch in items.chunks(policy.batch_size()) {
        if run.processed > 0 {
            run.delays += 1;
            if !policy.delay().is_zero() {
                thread::sleep(policy.delay());
            }
        }
        run.processed += batch.len();
        run.batches += 1;
        action(batch)?;
    }

    debug!(
        received = run.received,
        processed = run.processed,
        batches = run.batches,
        "bulk pass complete"
    );
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_delay(batch_size: usize) -> BatchPolicy {
        BatchPolicy::new(batch_size, Duration::ZERO).expect("valid policy")
    }

    #[test]
    fn rejects_zero_batch_size() {
        let err = BatchPolicy::new(0, Duration::ZERO).expect_err("must fail");
        assert!(matches!(err, ValidationError::ZeroBatchSize));
    }

    #[test]
    fn batch_count_is_ceiling_of_len_over_size() {
        for (len, size, batches) in [(0, 1, 0), (1, 1, 1), (3, 1, 3), (5, 2, 3), (50, 50, 1), (51, 50, 2)] {
            let items: Vec<usize> = (0..len).collect();
            let run = run_batches(&items, &zero_delay(size), |_| Ok::<_, ()>(()))
                .expect("run should succeed");
            assert_eq!(run.batches, batches, "len={len} size={size}");
            assert_eq!(run.delays, batches.max(1) - 1, "len={len} size={size}");
            assert_eq!(run.received, len);
            assert_eq!(run.processed, len);
        }
    }

    #[test]
    fn batches_preserve_input_order() {
        let items = vec!["AAA", "BBB", "CCC"];
        let mut seen = Vec::new();
        run_batches(&items, &zero_delay(2), |batch| {
            seen.push(batch.to_vec());
            Ok::<_, ()>(())
        })
        .expect("run should succeed");
        assert_eq!(seen, vec![vec!["AAA", "BBB"], vec!["CCC"]]);
    }

    #[test]
    fn action_error_stops_the_run() {
        let items: Vec<usize> = (0..4).collect();
        let mut calls = 0;
        let err = run_batches(&items, &zero_delay(2), |_| {
            calls += 1;
            if calls == 1 {
                Ok(())
            } else {
                Err("store down")
            }
        })
        .expect_err("second batch must fail");
        assert_eq!(err, "store down");
        assert_eq!(calls, 2);
    }
}
