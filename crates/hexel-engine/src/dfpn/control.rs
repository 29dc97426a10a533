//! Search control — abort flag and wall-clock limit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// How many abort polls between wall-clock checks. Reading the clock is far
/// more expensive than the atomic load, so the deadline is only consulted
/// every stride.
const TIMER_STRIDE: u64 = 4096;

/// Decides when a search must stop.
///
/// Polled at every descent step. The external stop flag aborts immediately;
/// the deadline is checked once per [`TIMER_STRIDE`] polls and latches the
/// stop flag when it fires, so all workers wind down together.
pub struct SolverControl {
    stopped: Arc<AtomicBool>,
    deadline: Option<Instant>,
    polls: AtomicU64,
}

impl SolverControl {
    /// Control with an optional time limit starting now.
    pub fn new(stopped: Arc<AtomicBool>, timelimit: Option<Duration>) -> SolverControl {
        SolverControl {
            stopped,
            deadline: timelimit.map(|limit| Instant::now() + limit),
            polls: AtomicU64::new(0),
        }
    }

    /// Whether the search should abort.
    pub fn should_stop(&self) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return true;
        }
        let Some(deadline) = self.deadline else {
            return false;
        };
        let polls = self.polls.fetch_add(1, Ordering::Relaxed);
        if polls % TIMER_STRIDE != 0 {
            return false;
        }
        if Instant::now() >= deadline {
            self.stopped.store(true, Ordering::Release);
            return true;
        }
        false
    }

    /// Whether the stop flag is raised, without counting a poll.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_limit_never_stops() {
        let control = SolverControl::new(Arc::new(AtomicBool::new(false)), None);
        for _ in 0..10_000 {
            assert!(!control.should_stop());
        }
    }

    #[test]
    fn stop_flag_aborts_immediately() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SolverControl::new(Arc::clone(&stopped), None);
        assert!(!control.should_stop());
        stopped.store(true, Ordering::Release);
        assert!(control.should_stop());
    }

    #[test]
    fn expired_deadline_latches_the_flag() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SolverControl::new(Arc::clone(&stopped), Some(Duration::ZERO));
        // The first poll is stride-aligned and sees the expired deadline
        assert!(control.should_stop());
        assert!(stopped.load(Ordering::Acquire));
    }

    #[test]
    fn generous_deadline_does_not_stop() {
        let control = SolverControl::new(
            Arc::new(AtomicBool::new(false)),
            Some(Duration::from_secs(3600)),
        );
        for _ in 0..10_000 {
            assert!(!control.should_stop());
        }
    }
}
