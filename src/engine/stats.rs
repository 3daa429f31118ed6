use chrono::{DateTime, Local};
use tracing::info;

/// Running counters of the poll loop, published after every cycle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    /// Cycles skipped because no controller answered
    pub disconnected_cycles: u64,
    pub batches_dispatched: u64,
    pub events_dispatched: u64,
    pub injection_failures: u64,
    /// Reset by the next successful dispatch
    pub consecutive_injection_failures: u64,
}

/// Logs a summary line of the counters once per interval
#[derive(Debug)]
pub struct StatsReporter {
    interval: chrono::Duration,
    last_log_time: DateTime<Local>,
    last_stats: LoopStats,
}

impl StatsReporter {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval: i64::try_from(interval_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .unwrap_or(chrono::Duration::MAX),
            last_log_time: Local::now(),
            last_stats: LoopStats::default(),
        }
    }

    pub fn maybe_log(&mut self, stats: &LoopStats) {
        let now = Local::now();
        if now - self.last_log_time <= self.interval {
            return;
        }

        let elapsed_seconds = (now - self.last_log_time).num_seconds().max(1);
        let cycles = stats.cycles - self.last_stats.cycles;
        let events = stats.events_dispatched - self.last_stats.events_dispatched;
        info!(
            "Poll loop stats: {} cycles ({} disconnected), {} batches, {} events, {} failed injections in {} seconds",
            cycles,
            stats.disconnected_cycles - self.last_stats.disconnected_cycles,
            stats.batches_dispatched - self.last_stats.batches_dispatched,
            events,
            stats.injection_failures - self.last_stats.injection_failures,
            elapsed_seconds
        );
        info!(
            "Average: {:.2} cycles/sec, {:.2} events/sec",
            cycles as f64 / elapsed_seconds as f64,
            events as f64 / elapsed_seconds as f64
        );

        self.last_stats = stats.clone();
        self.last_log_time = now;
    }
}
