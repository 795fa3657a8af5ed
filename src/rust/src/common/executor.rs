//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! The session executor.
//!
//! One worker thread runs every mutation of session and call state, so
//! frame handlers, API calls, and timer expirations never race each
//! other.  The protocol needs exactly two kinds of timer -- the
//! gateway-registration poll and the ICE-gather delay before an invite
//! goes out -- and both must be retired early (a REGED/NOREG frame
//! cancels the poll, a hangup cancels the pending invite).  `schedule`
//! therefore hands back a [`ScheduledTask`] whose `cancel()` keeps the
//! job from ever running; state transitions cancel their timer handle
//! explicitly instead of letting stale timers fire into dead state.
//!
//! Internally the worker parks on a condvar with a deadline: ready jobs
//! drain in FIFO order, and the pending-timer list (at most a handful
//! of entries, so a flat `Vec` scan beats any fancier structure) decides
//! how long to sleep when the queue is empty.

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Condvar, Mutex, MutexGuard,
};
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send>;

struct PendingTimer {
    deadline: Instant,
    job: Job,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
struct JobQueue {
    ready: VecDeque<Job>,
    timers: Vec<PendingTimer>,
    shutdown: bool,
}

struct ExecutorInner {
    queue: Mutex<JobQueue>,
    wake: Condvar,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

/// Handle to a delayed job.  Cancelling after the job has run is a
/// no-op, so callers can cancel unconditionally on state transitions.
pub struct ScheduledTask {
    cancelled: Arc<AtomicBool>,
}

impl ScheduledTask {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct Executor {
    inner: Arc<ExecutorInner>,
}

impl Executor {
    pub fn new(name: &str) -> Self {
        let inner = Arc::new(ExecutorInner {
            queue: Mutex::new(JobQueue::default()),
            wake: Condvar::new(),
            worker: Mutex::new(None),
        });

        let worker_inner = Arc::clone(&inner);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_worker(&worker_inner))
            .expect("spawn executor thread");
        *lock_recovering(&inner.worker) = Some(handle);

        Self { inner }
    }

    /// Queues `job` behind everything already posted.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        let mut queue = self.lock_queue();
        if queue.shutdown {
            debug!("executor: dropping job posted after shutdown");
            return;
        }
        queue.ready.push_back(Box::new(job));
        self.inner.wake.notify_one();
    }

    /// Runs `job` once `delay` has elapsed, unless the returned handle
    /// is cancelled first.
    pub fn schedule(&self, delay: Duration, job: impl FnOnce() + Send + 'static) -> ScheduledTask {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = ScheduledTask {
            cancelled: Arc::clone(&cancelled),
        };
        let mut queue = self.lock_queue();
        if queue.shutdown {
            debug!("executor: dropping timer scheduled after shutdown");
            return handle;
        }
        queue.timers.push(PendingTimer {
            deadline: Instant::now() + delay,
            job: Box::new(job),
            cancelled,
        });
        self.inner.wake.notify_one();
        handle
    }

    /// Blocks until every job posted before this call has run.  Pending
    /// timers whose deadline has not arrived are not waited for.
    pub fn synchronize(&self) {
        let (sender, receiver) = std::sync::mpsc::channel();
        self.post(move || {
            let _ = sender.send(());
        });
        // A shut-down executor drops the job, and with it the sender.
        let _ = receiver.recv();
    }

    /// Stops the worker after the job it is currently running and joins
    /// it.  Queued jobs and pending timers are discarded.
    pub fn shutdown(&self) {
        {
            let mut queue = self.lock_queue();
            queue.shutdown = true;
        }
        self.inner.wake.notify_all();
        let handle = lock_recovering(&self.inner.worker).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn lock_queue(&self) -> MutexGuard<'_, JobQueue> {
        lock_recovering(&self.inner.queue)
    }
}

// The queue lock is only held for pushes, pops, and deadline scans;
// recover rather than propagate if a panic ever poisons it.
fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn run_worker(inner: &ExecutorInner) {
    loop {
        let job = {
            let mut queue = lock_recovering(&inner.queue);
            loop {
                if queue.shutdown {
                    return;
                }
                if let Some(job) = queue.ready.pop_front() {
                    break job;
                }

                queue
                    .timers
                    .retain(|timer| !timer.cancelled.load(Ordering::Acquire));
                if promote_due_timers(&mut queue) {
                    continue;
                }

                let now = Instant::now();
                queue = match queue.timers.iter().map(|timer| timer.deadline).min() {
                    None => lock_recovering_wait(&inner.wake, queue),
                    Some(deadline) => {
                        let timeout = deadline.saturating_duration_since(now);
                        lock_recovering_wait_timeout(&inner.wake, queue, timeout)
                    }
                };
            }
        };
        // One panicking handler must not take the whole session's
        // executor down with it.
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)).is_err() {
            error!("executor: job panicked");
        }
    }
}

/// Moves every due timer onto the ready queue, earliest deadline first.
/// Returns true if anything moved.
fn promote_due_timers(queue: &mut JobQueue) -> bool {
    let mut promoted = false;
    loop {
        let now = Instant::now();
        let next_due = queue
            .timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.deadline <= now)
            .min_by_key(|(_, timer)| timer.deadline)
            .map(|(index, _)| index);
        let Some(index) = next_due else {
            return promoted;
        };

        let PendingTimer { job, cancelled, .. } = queue.timers.remove(index);
        // The cancel flag is re-checked at run time: a job queued here
        // can still be retired by a handler that runs before it.
        queue.ready.push_back(Box::new(move || {
            if !cancelled.load(Ordering::Acquire) {
                job();
            }
        }));
        promoted = true;
    }
}

fn lock_recovering_wait<'a>(
    wake: &Condvar,
    guard: MutexGuard<'a, JobQueue>,
) -> MutexGuard<'a, JobQueue> {
    wake.wait(guard)
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_recovering_wait_timeout<'a>(
    wake: &Condvar,
    guard: MutexGuard<'a, JobQueue>,
    timeout: Duration,
) -> MutexGuard<'a, JobQueue> {
    match wake.wait_timeout(guard, timeout) {
        Ok((guard, _)) => guard,
        Err(poisoned) => poisoned.into_inner().0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn jobs_run_in_post_order() {
        let executor = Executor::new("test-order");
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10u32 {
            let seen = Arc::clone(&seen);
            executor.post(move || seen.lock().unwrap().push(i));
        }
        executor.synchronize();
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
        executor.shutdown();
    }

    #[test]
    fn scheduled_job_fires_after_its_delay() {
        let executor = Executor::new("test-delay");
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        executor.schedule(Duration::from_millis(40), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        executor.synchronize();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        thread::sleep(Duration::from_millis(70));
        executor.synchronize();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        executor.shutdown();
    }

    #[test]
    fn cancelled_job_never_runs() {
        let executor = Executor::new("test-cancel");
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        let task = executor.schedule(Duration::from_millis(30), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        task.cancel();

        thread::sleep(Duration::from_millis(60));
        executor.synchronize();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        executor.shutdown();
    }

    #[test]
    fn earlier_deadline_runs_first() {
        let executor = Executor::new("test-deadlines");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let late = Arc::clone(&seen);
        executor.schedule(Duration::from_millis(50), move || {
            late.lock().unwrap().push("late");
        });
        let early = Arc::clone(&seen);
        executor.schedule(Duration::from_millis(20), move || {
            early.lock().unwrap().push("early");
        });

        thread::sleep(Duration::from_millis(90));
        executor.synchronize();
        assert_eq!(*seen.lock().unwrap(), vec!["early", "late"]);
        executor.shutdown();
    }

    #[test]
    fn shutdown_discards_queued_work_and_unblocks_synchronize() {
        let executor = Executor::new("test-shutdown");
        executor.shutdown();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        executor.post(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        executor.synchronize();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
