use std::{
    future::IntoFuture,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Poll, Waker},
};

use crate::{Deferred, Reason, Value};

/// Future returned by [`wait`][Deferred::wait].
///
/// Resolves with the settled outcome.
///
/// # Example
///
/// ```
/// # async fn app() {
/// use deferred::Deferred;
/// let d = Deferred::<u8, String>::fulfilled(112);
/// let result = d.await;
/// assert_eq!(result, Ok(112));
/// # }
/// # assert!(matches!(
/// #     std::pin::pin!(app())
/// #         .poll(&mut std::task::Context::from_waker(std::task::Waker::noop())),
/// #     std::task::Poll::Ready(())
/// # ));
/// ```
pub struct Wait<T, E> {
    deferred: Deferred<T, E>,
    slot: Option<Arc<Mutex<Slot<T, E>>>>,
}

struct Slot<T, E> {
    outcome: Option<Result<T, E>>,
    waker: Option<Waker>,
}

fn lock<T, E>(slot: &Mutex<Slot<T, E>>) -> MutexGuard<'_, Slot<T, E>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Value, E: Reason> Deferred<T, E> {
    /// Wait for this value to settle.
    ///
    /// Waiting counts as handling a rejection.
    #[inline]
    pub fn wait(&self) -> Wait<T, E> {
        Wait {
            deferred: self.clone(),
            slot: None,
        }
    }
}

impl<T: Value, E: Reason> IntoFuture for Deferred<T, E> {
    type Output = Result<T, E>;
    type IntoFuture = Wait<T, E>;

    #[inline]
    fn into_future(self) -> Self::IntoFuture {
        Wait { deferred: self, slot: None }
    }
}

impl<T: Value, E: Reason> Future for Wait<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut std::task::Context) -> Poll<Self::Output> {
        let me = self.get_mut();
        let deferred = &me.deferred;
        let slot = me.slot.get_or_insert_with(|| {
            let slot = Arc::new(Mutex::new(Slot { outcome: None, waker: None }));
            let sink = slot.clone();
            deferred.subscribe(move |outcome| {
                let waker = {
                    let mut sink = lock(&sink);
                    sink.outcome = Some(outcome);
                    sink.waker.take()
                };
                if let Some(waker) = waker {
                    waker.wake();
                }
            });
            slot
        });

        let mut slot = lock(slot);
        match slot.outcome.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T, E> std::fmt::Debug for Wait<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Wait").finish_non_exhaustive()
    }
}

#[test]
fn test_wait_pending() {
    use crate::{Microtasks, Scheduler};
    use std::{pin::pin, task::Context};

    let tasks = Microtasks::new();
    let mut fulfill = None;
    let d = Deferred::<u8, String>::new_in(Scheduler::from(tasks.clone()), |f, _| {
        fulfill = Some(f)
    });

    let mut wait = pin!(d.wait());
    let mut cx = Context::from_waker(Waker::noop());

    assert!(wait.as_mut().poll(&mut cx).is_pending());
    assert!(wait.as_mut().poll(&mut cx).is_pending());

    fulfill.unwrap().settle(7);
    assert!(wait.as_mut().poll(&mut cx).is_pending());

    tasks.run_until_idle();
    assert_eq!(wait.as_mut().poll(&mut cx), Poll::Ready(Ok(7)));
}

#[test]
fn test_wait_rejected() {
    use std::{pin::pin, task::Context};

    let d = Deferred::<u8, String>::rejected("boom".into());
    let mut wait = pin!(d.into_future());
    let mut cx = Context::from_waker(Waker::noop());

    assert_eq!(wait.as_mut().poll(&mut cx), Poll::Ready(Err("boom".to_owned())));
}
