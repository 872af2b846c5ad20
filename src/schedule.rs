//! Host facilities for running continuations.
//!
//! A [`Deferred`][crate::Deferred] never runs its continuations itself, it hands them to a
//! [`Scheduler`] as [`Job`]s. The scheduler decides when the job actually runs:
//!
//! - [`Inline`] runs it on the thread that settled or subscribed, before returning,
//! - [`Microtasks`] queues it until [`Microtasks::run_until_idle`] is called,
//! - with the `tokio` feature, [`Scheduler::tokio`] spawns it on a runtime.
use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send>;

/// Deferred-execution facility.
///
/// Implementors must eventually run every scheduled job exactly once. Jobs scheduled from the
/// same thread should run in the order they were scheduled.
pub trait Schedule: Send + Sync {
    /// Schedule `job` to run.
    fn schedule(&self, job: Job);
}

/// Clonable handle to a [`Schedule`] implementation.
#[derive(Clone)]
pub struct Scheduler {
    repr: Arc<dyn Schedule>,
}

impl Scheduler {
    /// Create new [`Scheduler`] from a [`Schedule`] implementation.
    #[inline]
    pub fn new<S: Schedule + 'static>(schedule: S) -> Self {
        Self { repr: Arc::new(schedule) }
    }

    /// Create new [`Scheduler`] which runs jobs immediately.
    #[inline]
    pub fn inline() -> Self {
        Self::new(Inline)
    }

    #[inline]
    pub(crate) fn schedule(&self, job: Job) {
        self.repr.schedule(job);
    }
}

impl Default for Scheduler {
    #[inline]
    fn default() -> Self {
        Self::inline()
    }
}

impl From<Microtasks> for Scheduler {
    #[inline]
    fn from(value: Microtasks) -> Self {
        Self::new(value)
    }
}

impl From<Inline> for Scheduler {
    #[inline]
    fn from(value: Inline) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

// ===== Inline =====

/// Run jobs on the calling thread, before [`schedule`][Schedule::schedule] returns.
///
/// A continuation registered on an already settled value runs before the registering call
/// returns.
///
/// Jobs scheduled while an inline job is running are queued and run in order once it returns,
/// instead of nesting inside it. Settling a long chain therefore runs in constant stack depth.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

thread_local! {
    // `Some` while this thread is running inline jobs
    static RUN_QUEUE: RefCell<Option<VecDeque<Job>>> = const { RefCell::new(None) };
}

/// Leaves the run queue, even when a job unwinds.
struct Running;

impl Drop for Running {
    fn drop(&mut self) {
        // queued jobs are dropped outside the borrow, their captures may schedule more
        let rest = RUN_QUEUE.with_borrow_mut(Option::take);
        drop(rest);
    }
}

impl Schedule for Inline {
    fn schedule(&self, job: Job) {
        let job = RUN_QUEUE.with_borrow_mut(|queue| match queue {
            Some(queue) => {
                queue.push_back(job);
                None
            }
            idle @ None => {
                *idle = Some(VecDeque::new());
                Some(job)
            }
        });
        let Some(mut job) = job else {
            return;
        };

        let _running = Running;
        loop {
            job();
            match RUN_QUEUE.with_borrow_mut(|queue| queue.as_mut().and_then(VecDeque::pop_front)) {
                Some(next) => job = next,
                None => break,
            }
        }
    }
}

// ===== Microtasks =====

/// A FIFO queue of jobs, drained explicitly.
///
/// Nothing runs until [`run_until_idle`][Microtasks::run_until_idle] is called. Jobs scheduled
/// while draining are run by the same drain.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, Microtasks, Resolution};
///
/// let tasks = Microtasks::new();
/// let d = Deferred::<u8, String>::fulfilled_in(tasks.clone().into(), 1);
///
/// let next = d.and_then(|v| Resolution::Fulfill(v + 1));
/// assert!(next.is_pending());
///
/// tasks.run_until_idle();
/// assert_eq!(next.value(), Some(2));
/// ```
#[derive(Clone, Default)]
pub struct Microtasks {
    queue: Arc<Mutex<VecDeque<Job>>>,
}

impl Microtasks {
    /// Create new empty [`Microtasks`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the number of queued jobs.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue().len()
    }

    /// Returns `true` if there is no queued job.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    /// Run queued jobs until the queue is empty.
    ///
    /// Returns the number of jobs run.
    pub fn run_until_idle(&self) -> usize {
        let mut count = 0;
        loop {
            // guard must be dropped before the job runs, jobs may schedule more jobs
            let job = self.queue().pop_front();
            let Some(job) = job else {
                break count;
            };
            job();
            count += 1;
        }
    }
}

impl Schedule for Microtasks {
    #[inline]
    fn schedule(&self, job: Job) {
        self.queue().push_back(job);
    }
}

impl fmt::Debug for Microtasks {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Microtasks").field("len", &self.len()).finish()
    }
}

#[test]
fn test_microtasks_fifo() {
    let tasks = Microtasks::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    for i in 0..3 {
        let log = log.clone();
        tasks.schedule(Box::new(move || log.lock().unwrap().push(i)));
    }

    assert_eq!(tasks.len(), 3);
    assert!(log.lock().unwrap().is_empty());

    assert_eq!(tasks.run_until_idle(), 3);
    assert!(tasks.is_empty());
    assert_eq!(&log.lock().unwrap()[..], &[0, 1, 2]);
}

#[test]
fn test_microtasks_nested() {
    let tasks = Microtasks::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let inner = tasks.clone();
    let log2 = log.clone();
    tasks.schedule(Box::new(move || {
        log2.lock().unwrap().push("outer");
        let log3 = log2.clone();
        inner.schedule(Box::new(move || log3.lock().unwrap().push("nested")));
    }));
    let log2 = log.clone();
    tasks.schedule(Box::new(move || log2.lock().unwrap().push("second")));

    assert_eq!(tasks.run_until_idle(), 3);
    assert_eq!(&log.lock().unwrap()[..], &["outer", "second", "nested"]);
}

#[test]
fn test_inline_nested_jobs_queue() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let log2 = log.clone();
    Scheduler::inline().schedule(Box::new(move || {
        let log3 = log2.clone();
        Scheduler::inline().schedule(Box::new(move || log3.lock().unwrap().push("nested")));
        log2.lock().unwrap().push("outer");
    }));

    assert_eq!(&log.lock().unwrap()[..], &["outer", "nested"]);
}

#[test]
fn test_inline_recovers_from_panicking_job() {
    let outcome = std::panic::catch_unwind(|| {
        Scheduler::inline().schedule(Box::new(|| panic!("job failed")));
    });
    assert!(outcome.is_err());

    let ran = Arc::new(Mutex::new(false));
    let ran2 = ran.clone();
    Scheduler::inline().schedule(Box::new(move || *ran2.lock().unwrap() = true));
    assert!(*ran.lock().unwrap());
}

#[test]
fn test_inline_runs_immediately() {
    let ran = Arc::new(Mutex::new(false));
    let ran2 = ran.clone();
    Scheduler::inline().schedule(Box::new(move || *ran2.lock().unwrap() = true));
    assert!(*ran.lock().unwrap());
}
