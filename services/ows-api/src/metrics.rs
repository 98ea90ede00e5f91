//! Request metrics: Prometheus series plus an in-process snapshot for
//! `/api/metrics`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use ows_protocol::{Disposition, Outcome};
use serde::{Deserialize, Serialize};

/// Metrics collector for the OWS gateway.
#[derive(Debug)]
pub struct MetricsCollector {
    pub requests: AtomicU64,
    pub sent: AtomicU64,
    pub faults: AtomicU64,
    /// Faults that could not be written because the response had started.
    pub undelivered_faults: AtomicU64,
    pub abandoned: AtomicU64,
    pub in_flight: AtomicU64,

    request_times: RwLock<TimingStats>,
    /// Keyed by protocol name, `UNKNOWN` when the request never got that far.
    protocol_stats: RwLock<BTreeMap<String, ProtocolCounters>>,
    fault_codes: RwLock<BTreeMap<String, u64>>,

    start_time: Instant,
}

#[derive(Debug, Default)]
struct TimingStats {
    count: u64,
    total_us: u64,
    min_us: u64,
    max_us: u64,
    last_us: u64,
}

impl TimingStats {
    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        self.last_us = duration_us;
        if self.min_us == 0 || duration_us < self.min_us {
            self.min_us = duration_us;
        }
        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
    }

    fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.total_us as f64 / self.count as f64) / 1000.0
        }
    }

    fn last_ms(&self) -> f64 {
        self.last_us as f64 / 1000.0
    }

    fn min_ms(&self) -> f64 {
        self.min_us as f64 / 1000.0
    }

    fn max_ms(&self) -> f64 {
        self.max_us as f64 / 1000.0
    }
}

#[derive(Debug, Default)]
struct ProtocolCounters {
    requests: u64,
    faults: u64,
    times: TimingStats,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            undelivered_faults: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            request_times: RwLock::new(TimingStats::default()),
            protocol_stats: RwLock::new(BTreeMap::new()),
            fault_codes: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    /// A request entered the pipeline.
    pub fn request_started(&self) {
        let in_flight = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        gauge!("ows_requests_in_flight").set(in_flight as f64);
    }

    /// Record how a request ended and how long it took.
    pub fn record_outcome(&self, outcome: &Outcome, elapsed: Duration) {
        let in_flight = self.in_flight.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        gauge!("ows_requests_in_flight").set(in_flight as f64);
        self.requests.fetch_add(1, Ordering::Relaxed);

        let protocol = outcome
            .protocol
            .map(|p| p.to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let operation = outcome.operation.clone().unwrap_or_else(|| "unknown".to_string());
        let duration_us = elapsed.as_micros() as u64;

        counter!(
            "ows_requests_total",
            "protocol" => protocol.clone(),
            "operation" => operation,
            "outcome" => outcome.label()
        )
        .increment(1);
        histogram!("ows_request_duration_seconds", "protocol" => protocol.clone()).record(elapsed.as_secs_f64());

        match &outcome.disposition {
            Disposition::Sent => {
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
            Disposition::Faulted { fault, delivered, .. } => {
                self.faults.fetch_add(1, Ordering::Relaxed);
                if !delivered {
                    self.undelivered_faults.fetch_add(1, Ordering::Relaxed);
                }
                let code = fault.exception_code.as_str().to_string();
                counter!("ows_faults_total", "code" => code.clone()).increment(1);
                if let Ok(mut codes) = self.fault_codes.write() {
                    *codes.entry(code).or_default() += 1;
                }
            }
            Disposition::Abandoned { .. } => {
                self.abandoned.fetch_add(1, Ordering::Relaxed);
                counter!("ows_abandoned_total").increment(1);
            }
        }

        if let Ok(mut times) = self.request_times.write() {
            times.record(duration_us);
        }
        if let Ok(mut stats) = self.protocol_stats.write() {
            let counters = stats.entry(protocol).or_default();
            counters.requests += 1;
            if outcome.fault().is_some() {
                counters.faults += 1;
            }
            counters.times.record(duration_us);
        }
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (request_avg_ms, request_last_ms, request_min_ms, request_max_ms) = self
            .request_times
            .read()
            .map(|t| (t.avg_ms(), t.last_ms(), t.min_ms(), t.max_ms()))
            .unwrap_or_default();

        let protocols = self
            .protocol_stats
            .read()
            .map(|stats| {
                stats
                    .iter()
                    .map(|(name, c)| {
                        (
                            name.clone(),
                            ProtocolStats {
                                requests: c.requests,
                                faults: c.faults,
                                avg_ms: c.times.avg_ms(),
                                max_ms: c.times.max_ms(),
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        let fault_codes = self.fault_codes.read().map(|c| c.clone()).unwrap_or_default();

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            undelivered_faults: self.undelivered_faults.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            request_avg_ms,
            request_last_ms,
            request_min_ms,
            request_max_ms,
            protocols,
            fault_codes,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics for JSON serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,

    // Request counts
    pub requests: u64,
    pub sent: u64,
    pub faults: u64,
    pub undelivered_faults: u64,
    pub abandoned: u64,
    pub in_flight: u64,

    // Timing
    pub request_avg_ms: f64,
    pub request_last_ms: f64,
    pub request_min_ms: f64,
    pub request_max_ms: f64,

    pub protocols: BTreeMap<String, ProtocolStats>,
    pub fault_codes: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolStats {
    pub requests: u64,
    pub faults: u64,
    pub avg_ms: f64,
    pub max_ms: f64,
}
