//! Per-call query benchmarks ("dev6" lines).
//!
//! Every executor call ends in one [`QueryBench`]: it is written as a JSON line to
//! [`DEV_TARGET`], finds are summarized on the metrics target, and a thread that
//! called [`capture`] keeps the typed records for inspection.

use serde::Serialize;
use std::cell::RefCell;
use std::time::Instant;

use crate::logger::METRICS_TARGET;

pub const DEV_TARGET: &str = "odatalite::dev6";

thread_local! {
    static CAPTURED: RefCell<Option<Vec<QueryBench>>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchOp {
    Find,
    Count,
}

/// Timing and size of one backend call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryBench {
    pub op: BenchOp,
    pub backend: &'static str,
    pub collection: String,
    pub duration_ms: u64,
    pub result_count: u64,
    /// Scoped match count; only finds have one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl QueryBench {
    #[must_use]
    pub fn find(backend: &'static str, collection: &str, start: Instant, returned: usize, total: u64) -> Self {
        Self {
            op: BenchOp::Find,
            backend,
            collection: collection.to_string(),
            duration_ms: elapsed_ms(start),
            result_count: u64::try_from(returned).unwrap_or(u64::MAX),
            total: Some(total),
        }
    }

    #[must_use]
    pub fn count(backend: &'static str, collection: &str, start: Instant, n: u64) -> Self {
        Self {
            op: BenchOp::Count,
            backend,
            collection: collection.to_string(),
            duration_ms: elapsed_ms(start),
            result_count: n,
            total: None,
        }
    }

    #[must_use]
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Logs `bench` and hands it to this thread's capture, if any.
pub fn record(bench: QueryBench) {
    log::trace!(target: DEV_TARGET, "{}", bench.to_line());
    if let Some(total) = bench.total {
        log::info!(
            target: METRICS_TARGET,
            "{} find on {} returned {} of {total} in {}ms",
            bench.backend,
            bench.collection,
            bench.result_count,
            bench.duration_ms
        );
    }
    CAPTURED.with(|c| {
        if let Some(buf) = c.borrow_mut().as_mut() {
            buf.push(bench);
        }
    });
}

/// Restores the enclosing capture (or none) on drop.
pub struct CaptureGuard {
    outer: Option<Vec<QueryBench>>,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        let outer = self.outer.take();
        CAPTURED.with(|c| *c.borrow_mut() = outer);
    }
}

/// Starts a fresh capture on the current thread.
#[must_use]
pub fn capture() -> CaptureGuard {
    let outer = CAPTURED.with(|c| c.replace(Some(Vec::new())));
    CaptureGuard { outer }
}

/// Takes the records captured so far on this thread.
pub fn take_captured() -> Vec<QueryBench> {
    CAPTURED.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

/// Elapsed milliseconds, saturated to `u64`.
#[must_use]
pub fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
