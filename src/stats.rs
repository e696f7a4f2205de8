use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use serde::Serialize;

pub struct Stats {
    ticks: AtomicU64,
    faces_seen: AtomicU64,
    unknown_alerts: AtomicU64,
    unpaid_alerts: AtomicU64,
    emails_sent: AtomicU64,
    emails_failed: AtomicU64,
    emails_throttled: AtomicU64,
    started: Instant,
    last_tick: parking_lot::Mutex<Option<Instant>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub ticks: u64,
    pub faces_seen: u64,
    pub unknown_alerts: u64,
    pub unpaid_alerts: u64,
    pub emails_sent: u64,
    pub emails_failed: u64,
    pub emails_throttled: u64,
    pub secs_since_last_tick: Option<f64>,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            faces_seen: AtomicU64::new(0),
            unknown_alerts: AtomicU64::new(0),
            unpaid_alerts: AtomicU64::new(0),
            emails_sent: AtomicU64::new(0),
            emails_failed: AtomicU64::new(0),
            emails_throttled: AtomicU64::new(0),
            started: Instant::now(),
            last_tick: parking_lot::Mutex::new(None),
        }
    }
    pub fn inc_ticks(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        *self.last_tick.lock() = Some(Instant::now());
    }
    pub fn inc_faces_seen(&self, n: u64) { self.faces_seen.fetch_add(n, Ordering::Relaxed); }
    pub fn inc_unknown_alerts(&self) { self.unknown_alerts.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_unpaid_alerts(&self) { self.unpaid_alerts.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_emails_sent(&self) { self.emails_sent.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_emails_failed(&self) { self.emails_failed.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_emails_throttled(&self) { self.emails_throttled.fetch_add(1, Ordering::Relaxed); }
    pub fn emails_sent(&self) -> u64 { self.emails_sent.load(Ordering::Relaxed) }
    pub fn uptime_secs(&self) -> u64 { self.started.elapsed().as_secs() }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.uptime_secs(),
            ticks: self.ticks.load(Ordering::Relaxed),
            faces_seen: self.faces_seen.load(Ordering::Relaxed),
            unknown_alerts: self.unknown_alerts.load(Ordering::Relaxed),
            unpaid_alerts: self.unpaid_alerts.load(Ordering::Relaxed),
            emails_sent: self.emails_sent.load(Ordering::Relaxed),
            emails_failed: self.emails_failed.load(Ordering::Relaxed),
            emails_throttled: self.emails_throttled.load(Ordering::Relaxed),
            secs_since_last_tick: self.last_tick.lock().map(|t| t.elapsed().as_secs_f64()),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.ticks,
            &self.faces_seen,
            &self.unknown_alerts,
            &self.unpaid_alerts,
            &self.emails_sent,
            &self.emails_failed,
            &self.emails_throttled,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.last_tick.lock() = None;
    }
}
