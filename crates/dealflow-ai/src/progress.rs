use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dealflow_core::StepStatus;
use tokio::sync::watch;

/// Events emitted by the orchestrator while a run is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    StepStarted {
        index: usize,
        total: usize,
        name: String,
        percent: u8,
    },
    StepFinished {
        index: usize,
        key: String,
        status: StepStatus,
    },
    Finished {
        percent: u8,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for callers that only want the final report.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Latest view of a run, published through a `watch` channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub percent: u8,
    pub current_step: Option<String>,
    pub steps: Vec<(String, StepStatus)>,
    pub finished: bool,
}

/// Bridges orchestrator events to a `watch` channel; readers see the latest state.
pub struct WatchProgress {
    tx: watch::Sender<ProgressSnapshot>,
}

impl WatchProgress {
    pub fn new() -> (Self, watch::Receiver<ProgressSnapshot>) {
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        (Self { tx }, rx)
    }
}

impl ProgressReporter for WatchProgress {
    fn report(&self, event: ProgressEvent) {
        self.tx.send_modify(|snap| match event {
            ProgressEvent::StepStarted { name, percent, .. } => {
                snap.percent = percent;
                snap.current_step = Some(name);
            }
            ProgressEvent::StepFinished { key, status, .. } => {
                snap.steps.push((key, status));
            }
            ProgressEvent::Finished { percent } => {
                snap.percent = percent;
                snap.current_step = None;
                snap.finished = true;
            }
        });
    }
}

/// Percentage reported before step `index` of `total` starts.
pub fn step_percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((index as f64 / total as f64) * 100.0).round() as u8
}

/// Cooperative cancellation, checked by the orchestrator between steps.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_for_seven_steps() {
        let got: Vec<u8> = (0..7).map(|i| step_percent(i, 7)).collect();
        assert_eq!(got, [0, 14, 29, 43, 57, 71, 86]);
    }

    #[test]
    fn percent_rounds_half_up() {
        // 1/8 = 12.5%
        assert_eq!(step_percent(1, 8), 13);
        assert_eq!(step_percent(0, 0), 0);
    }

    #[test]
    fn watch_reporter_tracks_latest_state() {
        let (reporter, rx) = WatchProgress::new();
        reporter.report(ProgressEvent::StepStarted {
            index: 0,
            total: 2,
            name: "Fact Check".into(),
            percent: 0,
        });
        reporter.report(ProgressEvent::StepFinished {
            index: 0,
            key: "fact_check".into(),
            status: StepStatus::Completed,
        });
        reporter.report(ProgressEvent::StepStarted {
            index: 1,
            total: 2,
            name: "Market Size".into(),
            percent: 50,
        });
        {
            let snap = rx.borrow();
            assert_eq!(snap.percent, 50);
            assert_eq!(snap.current_step.as_deref(), Some("Market Size"));
            assert_eq!(snap.steps.len(), 1);
            assert!(!snap.finished);
        }
        reporter.report(ProgressEvent::Finished { percent: 100 });
        let snap = rx.borrow();
        assert_eq!(snap.percent, 100);
        assert!(snap.finished);
        assert!(snap.current_step.is_none());
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }
}
