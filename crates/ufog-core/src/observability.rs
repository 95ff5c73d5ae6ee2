//! Structured logging, metrics and a rate-limited error sink (spec §4.2).
//!
//! Logging/span propagation itself is left to `tracing` call sites at
//! every layer (spans are parented the normal `tracing` way: a step span
//! created inside a run span, a message-handler span created inside the
//! step span). This module owns the two pieces `tracing` does not give
//! you for free: rate-limited error suppression and a small metrics
//! registry with counters, gauges and histograms.
//!
//! Every public method here swallows its own internal failures (e.g. a
//! poisoned mutex) rather than returning a `Result` — observability must
//! never raise into caller paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Rate-limits repeated errors sharing an `error_key` to at most `N` per
/// sliding 60-second window; the remainder are counted and periodically
/// summarized rather than silently dropped.
pub struct RateLimitedSink {
    limit_per_minute: u32,
    windows: Mutex<HashMap<String, Window>>,
}

struct Window {
    window_start_secs: u64,
    count_in_window: u32,
    suppressed_in_window: u32,
}

/// Outcome of offering an error to the sink.
pub enum SinkOutcome {
    /// Under budget: emit the `ERROR` event as normal.
    Emit,
    /// Over budget: suppress; `total_suppressed` is the running count for
    /// this key's current window, useful for a periodic rollup log line.
    Suppress { total_suppressed: u32 },
}

impl RateLimitedSink {
    pub fn new(limit_per_minute: u32) -> Self {
        Self {
            limit_per_minute,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record an occurrence of `error_key` "now" and decide whether it
    /// should be emitted or suppressed.
    pub fn offer(&self, error_key: &str) -> SinkOutcome {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut windows = match self.windows.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        let window = windows.entry(error_key.to_string()).or_insert(Window {
            window_start_secs: now,
            count_in_window: 0,
            suppressed_in_window: 0,
        });

        if now.saturating_sub(window.window_start_secs) >= 60 {
            window.window_start_secs = now;
            window.count_in_window = 0;
            window.suppressed_in_window = 0;
        }

        if window.count_in_window < self.limit_per_minute {
            window.count_in_window += 1;
            SinkOutcome::Emit
        } else {
            window.suppressed_in_window += 1;
            SinkOutcome::Suppress {
                total_suppressed: window.suppressed_in_window,
            }
        }
    }
}

/// A monotonic counter.
#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A last-write-wins gauge, stored as bit-cast `f64` so reads/writes stay
/// lock-free.
#[derive(Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn set(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// A histogram over pre-declared bucket boundaries.
pub struct Histogram {
    bounds: Vec<f64>,
    buckets: Vec<AtomicU64>,
    sum_bits: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(bounds: Vec<f64>) -> Self {
        let buckets = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            buckets,
            sum_bits: AtomicU64::new(0.0_f64.to_bits()),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: f64) {
        let idx = self.bounds.iter().position(|b| value <= *b).unwrap_or(self.bounds.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        // sum is observational only (used for mean); races lose precision,
        // never correctness of bucket counts.
        let mut cur = self.sum_bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(cur) + value).to_bits();
            match self
                .sum_bits
                .compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(prev) => cur = prev,
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let n = self.count();
        if n == 0 {
            0.0
        } else {
            f64::from_bits(self.sum_bits.load(Ordering::Relaxed)) / n as f64
        }
    }
}

/// The pre-declared metric set required by spec §4.2.
pub struct Metrics {
    pub step_duration_seconds: Histogram,
    pub message_latency_seconds: Histogram,
    pub mailbox_overflow_total: Counter,
    pub dropped_messages_total: Counter,
    pub agents_alive: Gauge,
    pub error_sink: RateLimitedSink,
}

impl Metrics {
    pub fn new(error_rate_limit_per_minute: u32) -> Self {
        Self {
            step_duration_seconds: Histogram::new(vec![
                0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0,
            ]),
            message_latency_seconds: Histogram::new(vec![
                0.0001, 0.001, 0.01, 0.1, 1.0,
            ]),
            mailbox_overflow_total: Counter::default(),
            dropped_messages_total: Counter::default(),
            agents_alive: Gauge::default(),
            error_sink: RateLimitedSink::new(error_rate_limit_per_minute),
        }
    }
}
