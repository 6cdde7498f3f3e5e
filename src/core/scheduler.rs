/// Scheduling surface — cancelable one-shot callbacks for timed
/// auto-advance. Sessions never block a thread waiting out a delay;
/// the host supplies whatever clock actually drives this.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Deferred work scheduled against the host clock.
pub type Callback = Box<dyn FnOnce() + Send>;

/// Handle for suppressing a scheduled callback. Cancellation is
/// cooperative: a callback already running is not interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
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

/// One-shot timer surface provided by the host environment.
pub trait Scheduler: Send + Sync {
    /// Run `callback` after `delay`, unless the returned token is
    /// cancelled first.
    fn schedule_once(&self, delay: Duration, callback: Callback) -> CancelToken;
}

struct Entry {
    due: Duration,
    seq: u64,
    token: CancelToken,
    callback: Callback,
}

/// Deterministic scheduler driven by explicit [`advance`] calls.
/// Used by the test suites and the preview tool; a real host wires
/// its own event loop instead.
///
/// [`advance`]: ManualScheduler::advance
#[derive(Default)]
pub struct ManualScheduler {
    inner: Mutex<ManualInner>,
}

#[derive(Default)]
struct ManualInner {
    now: Duration,
    next_seq: u64,
    pending: Vec<Entry>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock, firing due, uncancelled callbacks in
    /// schedule order. Callbacks run outside the queue lock so they
    /// may schedule further work.
    pub fn advance(&self, dt: Duration) {
        let due = {
            let mut inner = self.inner.lock();
            inner.now += dt;
            let now = inner.now;
            let mut due: Vec<Entry> = Vec::new();
            let mut remaining = Vec::new();
            for entry in inner.pending.drain(..) {
                if entry.due <= now {
                    due.push(entry);
                } else {
                    remaining.push(entry);
                }
            }
            inner.pending = remaining;
            due.sort_by_key(|e| (e.due, e.seq));
            due
        };

        for entry in due {
            if !entry.token.is_cancelled() {
                (entry.callback)();
            }
        }
    }

    /// Callbacks waiting on the clock, cancelled ones included.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, callback: Callback) -> CancelToken {
        let token = CancelToken::new();
        let mut inner = self.inner.lock();
        let due = inner.now + delay;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.pending.push(Entry {
            due,
            seq,
            token: token.clone(),
            callback,
        });
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_delay_not_before() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        scheduler.schedule_once(
            Duration::from_secs(2),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );

        scheduler.advance(Duration::from_secs(1));
        assert!(!fired.load(Ordering::SeqCst));
        scheduler.advance(Duration::from_secs(1));
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn cancelled_callback_never_fires() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let token = scheduler.schedule_once(
            Duration::from_secs(1),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        token.cancel();
        scheduler.advance(Duration::from_secs(5));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn fires_in_schedule_order() {
        let scheduler = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3u32 {
            let order = order.clone();
            scheduler.schedule_once(
                Duration::from_secs(1),
                Box::new(move || order.lock().push(i)),
            );
        }
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn callback_may_schedule_more_work() {
        let scheduler = Arc::new(ManualScheduler::new());
        let fired = Arc::new(AtomicBool::new(false));
        let inner_sched = scheduler.clone();
        let flag = fired.clone();
        scheduler.schedule_once(
            Duration::from_secs(1),
            Box::new(move || {
                let flag = flag.clone();
                inner_sched.schedule_once(
                    Duration::from_secs(1),
                    Box::new(move || flag.store(true, Ordering::SeqCst)),
                );
            }),
        );
        scheduler.advance(Duration::from_secs(1));
        assert!(!fired.load(Ordering::SeqCst));
        scheduler.advance(Duration::from_secs(1));
        assert!(fired.load(Ordering::SeqCst));
    }
}
