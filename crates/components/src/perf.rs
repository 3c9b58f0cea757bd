//! Stage timings
//!
//! ```rust
//! use components::PerfMonitor;
//!
//! let monitor = PerfMonitor::default();
//! {
//!     let _timer = monitor.begin("load");
//!     // ... load stage ...
//! } // recorded here
//! assert_eq!(monitor.timings().len(), 1);
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTiming {
    pub name: &'static str,
    pub elapsed: Duration,
}

/// Timings recorded by [`PerfTimer`]s for one document
#[derive(Debug, Clone, Default)]
pub struct PerfMonitor {
    timings: Rc<RefCell<Vec<StageTiming>>>,
}

impl PerfMonitor {
    /// Start a timer that records into this monitor when dropped
    pub fn begin(&self, name: &'static str) -> PerfTimer {
        PerfTimer {
            name,
            start: Instant::now(),
            sink: Rc::clone(&self.timings),
        }
    }

    pub fn timings(&self) -> Vec<StageTiming> {
        self.timings.borrow().clone()
    }

    /// Sum of every recording under `name`
    pub fn total(&self, name: &str) -> Duration {
        self.timings
            .borrow()
            .iter()
            .filter(|t| t.name == name)
            .map(|t| t.elapsed)
            .sum()
    }
}

/// Measures from creation to drop
pub struct PerfTimer {
    name: &'static str,
    start: Instant,
    sink: Rc<RefCell<Vec<StageTiming>>>,
}

impl PerfTimer {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        tracing::trace!(
            target: "perf",
            name = self.name,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "timer completed"
        );
        self.sink.borrow_mut().push(StageTiming {
            name: self.name,
            elapsed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timers_record_on_drop() {
        let monitor = PerfMonitor::default();
        {
            let timer = monitor.begin("bind");
            assert_eq!(timer.name(), "bind");
            assert!(monitor.timings().is_empty());
        }
        drop(monitor.begin("bind"));
        drop(monitor.begin("layout"));

        let names: Vec<_> = monitor.timings().iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["bind", "bind", "layout"]);
        assert!(monitor.total("bind") >= Duration::ZERO);
    }
}
