use crate::IterationRecord;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Receives run-wide diagnostics from the driver.
///
/// All methods have empty defaults so an observer only implements what it records.
pub trait SCFObserver: Send + Sync {
    fn add_count(&self, _key: &str, _n: usize) {}

    fn add_time(&self, _key: &str, _elapsed: Duration) {}

    fn on_iteration(&self, _record: &IterationRecord) {}
}

/// Discards everything.
pub struct NoObserver;

impl SCFObserver for NoObserver {}

/// Runs `f` and books its wall time under `key`.
pub fn timed<T, F: FnOnce() -> T>(observer: &dyn SCFObserver, key: &str, f: F) -> T {
    let stopwatch = Instant::now();

    let out = f();

    observer.add_time(key, stopwatch.elapsed());

    out
}

/// Counters and timers keyed by component name, plus the iteration log.
#[derive(Default)]
pub struct Instrumentation {
    counters: Mutex<BTreeMap<String, usize>>,
    timers: Mutex<BTreeMap<String, Duration>>,
    records: Mutex<Vec<IterationRecord>>,
}

impl Instrumentation {
    pub fn new() -> Instrumentation {
        Instrumentation::default()
    }

    pub fn get_count(&self, key: &str) -> usize {
        self.counters
            .lock()
            .map(|c| c.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn get_time(&self, key: &str) -> Duration {
        self.timers
            .lock()
            .map(|t| t.get(key).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn get_records(&self) -> Vec<IterationRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn display(&self) {
        log::info!("");
        log::info!("   {:-^88}", " statistics ");
        log::info!("");

        if let Ok(timers) = self.timers.lock() {
            for (key, elapsed) in timers.iter() {
                log::info!("   {:16}{:5}{:16.2} seconds", key, ":", elapsed.as_secs_f64());
            }
        }

        if let Ok(counters) = self.counters.lock() {
            for (key, n) in counters.iter() {
                log::info!("   {:16}{:5}{:16} calls", key, ":", n);
            }
        }
    }
}

impl SCFObserver for Instrumentation {
    fn add_count(&self, key: &str, n: usize) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(key.to_string()).or_insert(0) += n;
        }
    }

    fn add_time(&self, key: &str, elapsed: Duration) {
        if let Ok(mut timers) = self.timers.lock() {
            *timers.entry(key.to_string()).or_default() += elapsed;
        }
    }

    fn on_iteration(&self, record: &IterationRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_by_key() {
        let inst = Instrumentation::new();

        inst.add_count("h_psi", 3);
        inst.add_count("h_psi", 4);
        inst.add_count("diag", 1);

        assert_eq!(inst.get_count("h_psi"), 7);
        assert_eq!(inst.get_count("diag"), 1);
        assert_eq!(inst.get_count("mix"), 0);

        let n = timed(&inst, "work", || 2 + 2);
        assert_eq!(n, 4);

        inst.add_time("work", Duration::from_millis(5));
        assert!(inst.get_time("work") >= Duration::from_millis(5));
    }
}
