//! Progress notifier (C11) and cancellation token (spec §5).
//!
//! A [`CancellationToken`] is a plain atomic flag the caller can flip from
//! another thread; the reader polls it between records. [`ProgressReporter`]
//! fires a snapshot callback every `interval_rows` records, timed from a
//! monotonic clock started at the first record emitted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Cooperative cancellation: the reader checks this between records and
/// raises `ErrorKind::Cancelled` once it flips (spec §5).
#[derive(Debug, Default)]
pub struct CancellationToken {
    flag: AtomicBool,
}

impl CancellationToken {
    pub fn new() -> Arc<Self> {
        Arc::new(CancellationToken { flag: AtomicBool::new(false) })
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A point-in-time progress snapshot handed to the caller's callback.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot {
    pub records_read: u64,
    pub line_number: u64,
    pub bytes_consumed: u64,
    pub elapsed: std::time::Duration,
    pub records_per_second: f64,
}

pub type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Fires `callback` every `interval_rows` records (spec §4.9). The clock
/// starts lazily, at the first call to [`ProgressReporter::tick`], so an
/// idle reader sitting unread for a while doesn't inflate the first
/// records-per-second reading.
pub struct ProgressReporter {
    interval_rows: u64,
    callback: Option<ProgressCallback>,
    started_at: Option<Instant>,
}

impl ProgressReporter {
    pub fn new(interval_rows: u64, callback: Option<ProgressCallback>) -> Self {
        ProgressReporter { interval_rows, callback, started_at: None }
    }

    pub fn tick(&mut self, records_read: u64, line_number: u64, bytes_consumed: u64) {
        let Some(callback) = &self.callback else { return };
        if self.interval_rows == 0 || records_read % self.interval_rows != 0 {
            return;
        }
        let started_at = *self.started_at.get_or_insert_with(Instant::now);
        let elapsed = started_at.elapsed();
        let records_per_second = if elapsed.as_secs_f64() > 0.0 {
            records_read as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        callback(ProgressSnapshot { records_read, line_number, bytes_consumed, elapsed, records_per_second });
    }
}
