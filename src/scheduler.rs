use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::SynthError;

/// Cancellation gate shared with the timer thread. Ticks run while holding
/// `lock`, which is released again between ticks.
struct Gate {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Repeating beat timer on its own thread.
///
/// `cancel` flips the flag and then takes the gate, so once it returns no tick
/// is in progress and none can start.
pub struct Scheduler {
    gate: Arc<Gate>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Fire `tick(0)` immediately, then `tick(n)` every `interval`.
    pub fn start<F>(interval: Duration, tick: F) -> Result<Self, SynthError>
    where
        F: FnMut(u64) + Send + 'static,
    {
        if interval.is_zero() {
            return Err(SynthError::ParseError("Scheduler interval must be positive".to_string()));
        }

        let gate = Arc::new(Gate {
            cancelled: AtomicBool::new(false),
            lock: Mutex::new(()),
            wake: Condvar::new(),
        });
        let thread_gate = Arc::clone(&gate);
        let handle = thread::Builder::new()
            .name("riyaaz-scheduler".to_string())
            .spawn(move || run(&thread_gate, interval, tick))
            .map_err(|e| SynthError::AudioError(format!("Failed to spawn scheduler: {e}")))?;

        debug!("Scheduler started every {:?}", interval);
        Ok(Scheduler { gate, handle: Some(handle) })
    }

    pub fn is_cancelled(&self) -> bool {
        self.gate.cancelled.load(Ordering::SeqCst)
    }

    /// Stop ticking. When this returns no tick is running and none will run again.
    pub fn cancel(&mut self) {
        self.gate.cancelled.store(true, Ordering::SeqCst);
        {
            // Waits out a tick in progress
            let _guard = self.gate.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.gate.wake.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Scheduler thread panicked");
            }
            debug!("Scheduler cancelled");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run<F: FnMut(u64)>(gate: &Gate, interval: Duration, mut tick: F) {
    let mut deadline = Instant::now();
    let mut n: u64 = 0;

    loop {
        {
            let mut guard = gate.lock.lock().unwrap_or_else(PoisonError::into_inner);
            loop {
                if gate.cancelled.load(Ordering::SeqCst) {
                    return;
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                guard = gate
                    .wake
                    .wait_timeout(guard, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
            tick(n);
        }
        n += 1;

        // A late tick pushes the grid back rather than firing a burst to catch up
        deadline += interval;
        let now = Instant::now();
        if deadline < now {
            deadline = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::mpsc;

    #[test]
    fn first_tick_is_immediate() {
        let (tx, rx) = mpsc::channel();
        let start = Instant::now();
        let _scheduler = Scheduler::start(Duration::from_secs(10), move |n| {
            let _ = tx.send((n, start.elapsed()));
        })
        .expect("start");

        let (n, elapsed) = rx.recv_timeout(Duration::from_secs(1)).expect("first tick");
        assert_eq!(n, 0);
        assert!(elapsed < Duration::from_millis(500));
    }

    #[test]
    fn ticks_count_up_at_interval() {
        let (tx, rx) = mpsc::channel();
        let mut scheduler = Scheduler::start(Duration::from_millis(20), move |n| {
            let _ = tx.send(n);
        })
        .expect("start");

        let ticks: Vec<u64> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).expect("tick"))
            .collect();
        scheduler.cancel();
        assert_eq!(ticks, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn no_ticks_after_cancel_returns() {
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let mut scheduler = Scheduler::start(Duration::from_millis(5), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
        })
        .expect("start");

        thread::sleep(Duration::from_millis(30));
        scheduler.cancel();
        assert!(scheduler.is_cancelled());
        let at_cancel = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), at_cancel);
    }

    #[test]
    fn drop_cancels() {
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let scheduler = Scheduler::start(Duration::from_millis(5), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("start");
        drop(scheduler);

        let after_drop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }

    #[test]
    fn cancel_returns_while_ticks_overrun() {
        let mut scheduler = Scheduler::start(Duration::from_millis(1), |_| {
            thread::sleep(Duration::from_millis(15));
        })
        .expect("start");
        thread::sleep(Duration::from_millis(100));

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            scheduler.cancel();
            let _ = tx.send(scheduler.is_cancelled());
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(3)).ok(), Some(true));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Scheduler::start(Duration::ZERO, |_| {}).is_err());
    }
}
