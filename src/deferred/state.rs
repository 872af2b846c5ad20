use std::{
    cell::RefCell,
    fmt,
    mem::take,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering::Relaxed},
    },
};

use crate::{
    Origin, Panicked, Scheduler,
    macros::{trace, warning},
    unhandled,
};

/// Continuation invoked once with the settled outcome.
pub(crate) type Subscriber<T, E> = Box<dyn FnOnce(Result<T, E>) + Send>;

pub(crate) enum State<T, E> {
    Pending(Vec<Subscriber<T, E>>),
    Fulfilled(T),
    Rejected(E),
}

/// Shared state of a deferred value.
pub(crate) struct Inner<T, E> {
    state: Mutex<State<T, E>>,
    scheduler: Scheduler,
    handled: AtomicBool,
    report: fn(&E),
    teardown: fn(Vec<Subscriber<T, E>>),
}

impl<T, E> Inner<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + fmt::Debug + 'static,
{
    pub(crate) fn new(scheduler: Scheduler) -> Self {
        Self {
            state: Mutex::new(State::Pending(Vec::new())),
            scheduler,
            handled: AtomicBool::new(false),
            report: unhandled::report::<E>,
            teardown: teardown::<T, E>,
        }
    }

    /// Transition out of pending, then dispatch queued subscribers in insertion order.
    ///
    /// Returns `false` if already settled.
    pub(crate) fn settle(&self, outcome: Result<T, E>) -> bool {
        let subscribers = {
            let mut state = self.lock();
            let State::Pending(subscribers) = &mut *state else {
                return false;
            };
            let subscribers = take(subscribers);
            *state = match &outcome {
                Ok(value) => State::Fulfilled(value.clone()),
                Err(reason) => State::Rejected(reason.clone()),
            };
            subscribers
        };

        trace!(
            "deferred {}, {} subscriber(s)",
            if outcome.is_ok() { "fulfilled" } else { "rejected" },
            subscribers.len(),
        );

        if !subscribers.is_empty() {
            self.scheduler.schedule(Box::new(move || drain(subscribers, outcome)));
        }

        true
    }

    /// Register a continuation, or schedule it right away when already settled.
    pub(crate) fn subscribe(&self, subscriber: Subscriber<T, E>) {
        self.handled.store(true, Relaxed);

        let outcome = {
            let mut state = self.lock();
            match &mut *state {
                State::Pending(subscribers) => {
                    subscribers.push(subscriber);
                    return;
                }
                State::Fulfilled(value) => Ok(value.clone()),
                State::Rejected(reason) => Err(reason.clone()),
            }
        };

        self.scheduler.schedule(Box::new(move || subscriber(outcome)));
    }

    pub(crate) fn outcome(&self) -> Option<Result<T, E>> {
        match &*self.lock() {
            State::Pending(_) => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }
}

impl<T, E> Inner<T, E> {
    // the state is only ever replaced whole, a poisoned lock still guards a consistent state
    pub(crate) fn lock(&self) -> MutexGuard<'_, State<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

fn drain<T: Clone, E: Clone>(subscribers: Vec<Subscriber<T, E>>, outcome: Result<T, E>) {
    let mut subscribers = subscribers.into_iter();
    let last = subscribers.next_back();
    for subscriber in subscribers {
        isolate(subscriber, outcome.clone());
    }
    if let Some(last) = last {
        isolate(last, outcome);
    }
}

/// Run one subscriber, a panic in it must not starve its siblings.
fn isolate<T, E>(subscriber: Subscriber<T, E>, outcome: Result<T, E>) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| subscriber(outcome))) {
        let panicked = Panicked::from_payload(Origin::Transform, payload);
        warning!("subscriber panicked: {}", panicked.message());
    }
}

// ===== Teardown =====

thread_local! {
    // `Some` while this thread is dropping orphaned subscribers
    static ORPHANS: RefCell<Option<Vec<Box<dyn Send>>>> = const { RefCell::new(None) };
}

/// Leaves the orphan list, even when a drop unwinds.
struct Dropping;

impl Drop for Dropping {
    fn drop(&mut self) {
        let rest = ORPHANS.with_borrow_mut(Option::take);
        drop(rest);
    }
}

/// Drop the subscribers of a value dropped while pending.
///
/// Subscribers may hold the last handle to a derived value, whose own subscribers are then
/// dropped, and so on down the chain. Nested teardowns are queued on the outermost one instead
/// of recursing.
fn teardown<T: Send + 'static, E: Send + 'static>(subscribers: Vec<Subscriber<T, E>>) {
    if subscribers.is_empty() {
        return;
    }

    let orphan: Box<dyn Send> = Box::new(subscribers);
    // if the thread local is already gone the closure, and `orphan` with it, is dropped
    let outermost = ORPHANS.try_with(|orphans| match &mut *orphans.borrow_mut() {
        Some(orphans) => {
            orphans.push(orphan);
            false
        }
        idle @ None => {
            *idle = Some(vec![orphan]);
            true
        }
    });
    if !matches!(outermost, Ok(true)) {
        return;
    }

    let _dropping = Dropping;
    while let Some(orphan) = ORPHANS.with_borrow_mut(|orphans| orphans.as_mut().and_then(Vec::pop)) {
        drop(orphan);
    }
}

impl<T, E> Drop for Inner<T, E> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        match state {
            State::Pending(subscribers) => (self.teardown)(take(subscribers)),
            State::Rejected(reason) if !self.handled.load(Relaxed) => (self.report)(reason),
            _ => {}
        }
    }
}
