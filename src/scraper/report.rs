use serde::Serialize;
use std::time::Duration;

/// Best-effort live progress event sent by a worker after finishing a page.
/// Delivery is not guaranteed; the authoritative record is the
/// [`WorkerOutcome`] each worker returns when it exits.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub worker_id: usize,
    pub page: u32,
    pub ok: bool,
}

/// Everything one worker did between spawning and draining the queue.
#[derive(Debug, Default, Clone, Serialize)]
pub struct WorkerOutcome {
    pub worker_id: usize,
    pub processed: Vec<u32>,
    pub failed: Vec<u32>,
}

impl WorkerOutcome {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Self::default()
        }
    }
}

/// Aggregated result of a scrape run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScrapeReport {
    pub processed: Vec<u32>,
    pub failed: Vec<u32>,
    pub elapsed_seconds: f64,
}

impl ScrapeReport {
    pub fn from_outcomes(outcomes: Vec<WorkerOutcome>, elapsed: Duration) -> Self {
        let mut report = Self {
            elapsed_seconds: elapsed.as_secs_f64(),
            ..Self::default()
        };
        for outcome in outcomes {
            report.processed.extend(outcome.processed);
            report.failed.extend(outcome.failed);
        }
        report.processed.sort_unstable();
        report.failed.sort_unstable();
        report
    }

    /// Pages that were pulled off the queue, whether they succeeded or not.
    pub fn total(&self) -> usize {
        self.processed.len() + self.failed.len()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        (self.processed.len() as f64 / self.total() as f64) * 100.0
    }
}
