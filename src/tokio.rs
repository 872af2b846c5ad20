//! Integration with [`tokio`][<https://docs.rs/tokio>] crate.
use std::time::Duration;
use tokio::runtime::Handle;

use crate::{Deferred, Job, Reason, Schedule, Scheduler, Value};

/// Run jobs as tasks on a tokio runtime.
///
/// Jobs are spawned in schedule order. On a multi-threaded runtime they may run concurrently,
/// use a current-thread runtime when the run order of independent continuations matters.
#[derive(Debug, Clone)]
pub struct TokioSchedule {
    handle: Handle,
}

impl TokioSchedule {
    /// Create new [`TokioSchedule`] spawning on `handle`.
    #[inline]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Schedule for TokioSchedule {
    #[inline]
    fn schedule(&self, job: Job) {
        self.handle.spawn(async move { job() });
    }
}

impl Scheduler {
    /// Create new [`Scheduler`] spawning jobs on a tokio runtime.
    #[inline]
    pub fn tokio(handle: Handle) -> Self {
        Self::new(TokioSchedule::new(handle))
    }
}

/// Create new [`Deferred`] fulfilled with `value` after `delay`.
///
/// The timer and every continuation run on `handle`, which must have the time driver enabled.
pub fn fulfill_after<T, E>(handle: &Handle, delay: Duration, value: T) -> Deferred<T, E>
where
    T: Value,
    E: Reason,
{
    let timer = handle.clone();
    Deferred::new_in(Scheduler::tokio(handle.clone()), move |fulfill, _| {
        timer.spawn(async move {
            tokio::time::sleep(delay).await;
            fulfill.settle(value);
        });
    })
}

/// Create new [`Deferred`] rejected with `reason` after `delay`.
///
/// The timer and every continuation run on `handle`, which must have the time driver enabled.
pub fn reject_after<T, E>(handle: &Handle, delay: Duration, reason: E) -> Deferred<T, E>
where
    T: Value,
    E: Reason,
{
    let timer = handle.clone();
    Deferred::new_in(Scheduler::tokio(handle.clone()), move |_, reject| {
        timer.spawn(async move {
            tokio::time::sleep(delay).await;
            reject.settle(reason);
        });
    })
}

#[cfg(test)]
fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

#[test]
fn test_fulfill_after() {
    let rt = runtime();
    let d = fulfill_after::<u8, String>(rt.handle(), Duration::from_millis(5), 7);

    assert!(d.is_pending());
    assert_eq!(rt.block_on(d.wait()), Ok(7));
}

#[test]
fn test_timer_chain() {
    use crate::Resolution;

    let rt = runtime();
    let handle = rt.handle().clone();

    let d = fulfill_after::<String, String>(&handle, Duration::from_millis(5), "my value".into())
        .and_then(move |v| fulfill_after(&handle, Duration::from_millis(5), v + ", another value"))
        .and_then(|v| Resolution::Fulfill(v + ", a final value"));

    let result = rt.block_on(async move { d.await });
    assert_eq!(result.as_deref(), Ok("my value, another value, a final value"));
}

#[test]
fn test_timer_rejection_caught() {
    use crate::Resolution;

    let rt = runtime();
    let reason = String::from("something broke");
    let d = reject_after::<u8, String>(rt.handle(), Duration::from_millis(5), reason)
        .catch(|r| Resolution::Fulfill(r.len() as u8));

    assert_eq!(rt.block_on(d.wait()), Ok(15));
}

#[test]
fn test_late_subscription_on_runtime() {
    use crate::Resolution;

    let rt = runtime();
    let d = Deferred::<u8, String>::fulfilled_in(Scheduler::tokio(rt.handle().clone()), 1);

    let next = d.and_then(|v| Resolution::Fulfill(v + 1));
    assert!(next.is_pending());

    assert_eq!(rt.block_on(next.wait()), Ok(2));
}
