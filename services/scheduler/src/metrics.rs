//! Scheduling duration metrics.
//!
//! Hand-rolled histograms with Prometheus text exposition. Counters use
//! atomics so observation never contends with rendering; the per-placement
//! map is the only locked structure.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Histogram bucket upper bounds, in seconds.
const BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

struct Histogram {
    bucket_counts: Vec<AtomicU64>,
    count: AtomicU64,
    sum_micros: AtomicU64,
}

impl Histogram {
    fn new() -> Self {
        Self {
            bucket_counts: (0..BUCKETS.len()).map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
        }
    }

    fn observe(&self, duration: Duration) {
        let secs = duration.as_secs_f64();
        for (i, bound) in BUCKETS.iter().enumerate() {
            if secs <= *bound {
                self.bucket_counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }
}

type HistogramMap = RwLock<HashMap<String, Arc<Histogram>>>;

/// Duration histograms for the two reconcile phases, labeled by placement.
#[derive(Default)]
pub struct SchedulerMetrics {
    scheduling: HistogramMap,
    bind: HistogramMap,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time from reconcile entry until the scheduler returned a result.
    pub fn observe_scheduling(&self, placement: &str, duration: Duration) {
        Self::observe(&self.scheduling, placement, duration);
    }

    /// Time from scheduler return until decisions were durable.
    pub fn observe_bind(&self, placement: &str, duration: Duration) {
        Self::observe(&self.bind, placement, duration);
    }

    fn observe(map: &HistogramMap, placement: &str, duration: Duration) {
        let histogram = {
            let histograms = map.read().unwrap();
            histograms.get(placement).cloned()
        };
        let histogram = histogram.unwrap_or_else(|| {
            let mut histograms = map.write().unwrap();
            Arc::clone(
                histograms
                    .entry(placement.to_string())
                    .or_insert_with(|| Arc::new(Histogram::new())),
            )
        });
        histogram.observe(duration);
    }

    /// Render both histograms in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        Self::render_histogram(
            &mut out,
            "scheduling_duration_seconds",
            "How long it takes to schedule a placement.",
            &self.scheduling,
        );
        Self::render_histogram(
            &mut out,
            "bind_duration_seconds",
            "How long it takes to bind scheduling results to placement decisions.",
            &self.bind,
        );
        out
    }

    fn render_histogram(out: &mut String, name: &str, help: &str, map: &HistogramMap) {
        let _ = writeln!(out, "# HELP {name} {help}");
        let _ = writeln!(out, "# TYPE {name} histogram");
        let histograms = map.read().unwrap();
        let mut placements: Vec<&String> = histograms.keys().collect();
        placements.sort();
        for placement in placements {
            let histogram = &histograms[placement];
            for (i, bound) in BUCKETS.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{name}_bucket{{placement=\"{placement}\",le=\"{bound}\"}} {}",
                    histogram.bucket_counts[i].load(Ordering::Relaxed)
                );
            }
            let count = histogram.count.load(Ordering::Relaxed);
            let _ = writeln!(
                out,
                "{name}_bucket{{placement=\"{placement}\",le=\"+Inf\"}} {count}"
            );
            let _ = writeln!(
                out,
                "{name}_sum{{placement=\"{placement}\"}} {:.6}",
                histogram.sum_micros.load(Ordering::Relaxed) as f64 / 1e6
            );
            let _ = writeln!(out, "{name}_count{{placement=\"{placement}\"}} {count}");
        }
    }
}
