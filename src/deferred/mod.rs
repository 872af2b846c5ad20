//! Settle-once deferred value.
//!
//! A [`Deferred`] starts pending, and settles exactly once, either fulfilled with a value or
//! rejected with a reason. Its initializer receives the [`Fulfill`] and [`Reject`]
//! capabilities, and is free to call them now, later, from another thread, or never.
//!
//! Consumers compose with [`then`][Deferred::then] and its variants. Each call returns a new
//! [`Deferred`] that settles from the transform's [`Resolution`], so a transform can return
//! another [`Deferred`] and the chain waits for it.
//!
//! # Examples
//!
//! ```
//! use deferred::{Deferred, Resolution};
//!
//! let d = Deferred::<String, String>::fulfilled("a".into())
//!     .and_then(|v| Deferred::fulfilled(v + "b"))
//!     .and_then(|v| Resolution::Fulfill(v + "c"));
//!
//! assert_eq!(d.value().as_deref(), Some("abc"));
//! ```
use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use crate::{Origin, Panicked, Scheduler};

mod resolution;
mod settle;
mod state;
mod then;

#[cfg(test)]
mod test;

use state::{Inner, State};

pub use resolution::{Resolution, Thenable};
pub use settle::{Fulfill, Reject};

/// Bounds of a fulfillment value.
pub trait Value: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> Value for T {}

/// Bounds of a rejection reason.
///
/// The [`From<Panicked>`] bound lets a panicking initializer or transform reject.
pub trait Reason: Clone + Send + fmt::Debug + From<Panicked> + 'static {}

impl<E: Clone + Send + fmt::Debug + From<Panicked> + 'static> Reason for E {}

/// Lifecycle state of a [`Deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with a reason.
    Rejected,
}

/// A value that becomes available, or fails to, at some later point.
///
/// Cloning is cheap, all clones share the same state.
///
/// See [module level docs][self] for more details.
pub struct Deferred<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T: Value, E: Reason> Deferred<T, E> {
    /// Create new [`Deferred`] settled by `init`, running continuations inline.
    ///
    /// `init` runs before this function returns. A panic in `init` rejects with [`Panicked`].
    ///
    /// # Inline continuations
    ///
    /// This uses the [`Inline`][crate::Inline] scheduler, and so does every value derived from
    /// it. A [`then`][Deferred::then] on an already settled value runs its transform *before*
    /// returning, and settling runs pending continuations before
    /// [`settle`][Fulfill::settle] returns.
    ///
    /// To run continuations on a later turn instead, so a caller never observes their effects
    /// before `then` returns, use [`new_in`][Deferred::new_in] with a deferring scheduler such as
    /// [`Microtasks`][crate::Microtasks] or, with the `tokio` feature, `Scheduler::tokio`.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred::{Deferred, Microtasks, Resolution};
    ///
    /// let d = Deferred::<u8, String>::new(|fulfill, reject| {
    ///     assert!(fulfill.settle(112));
    ///     assert!(!reject.settle("too late".into()));
    /// });
    /// assert_eq!(d.value(), Some(112));
    ///
    /// // inline: already applied
    /// assert_eq!(d.and_then(|v| Resolution::Fulfill(v + 1)).value(), Some(113));
    ///
    /// // deferred: applied on the next drain
    /// let tasks = Microtasks::new();
    /// let d = Deferred::<u8, String>::new_in(tasks.clone().into(), |fulfill, _| {
    ///     fulfill.settle(112);
    /// });
    /// let next = d.and_then(|v| Resolution::Fulfill(v + 1));
    /// assert!(next.is_pending());
    /// tasks.run_until_idle();
    /// assert_eq!(next.value(), Some(113));
    /// ```
    #[inline]
    pub fn new<F>(init: F) -> Self
    where
        F: FnOnce(Fulfill<T, E>, Reject<T, E>),
    {
        Self::new_in(Scheduler::inline(), init)
    }

    /// Create new [`Deferred`] settled by `init`, running continuations on `scheduler`.
    ///
    /// Every [`Deferred`] derived from this one uses the same scheduler.
    pub fn new_in<F>(scheduler: Scheduler, init: F) -> Self
    where
        F: FnOnce(Fulfill<T, E>, Reject<T, E>),
    {
        let inner = Arc::new(Inner::new(scheduler));
        let fulfill = Fulfill::new(inner.clone());
        let reject = Reject::new(inner.clone());
        let fault = reject.clone();

        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| init(fulfill, reject))) {
            fault.settle(Panicked::from_payload(Origin::Initializer, payload).into());
        }

        Self { inner }
    }

    /// Create new fulfilled [`Deferred`].
    #[inline]
    pub fn fulfilled(value: T) -> Self {
        Self::fulfilled_in(Scheduler::inline(), value)
    }

    /// Create new fulfilled [`Deferred`] running continuations on `scheduler`.
    #[inline]
    pub fn fulfilled_in(scheduler: Scheduler, value: T) -> Self {
        Self::new_in(scheduler, |fulfill, _| {
            fulfill.settle(value);
        })
    }

    /// Create new rejected [`Deferred`].
    #[inline]
    pub fn rejected(reason: E) -> Self {
        Self::rejected_in(Scheduler::inline(), reason)
    }

    /// Create new rejected [`Deferred`] running continuations on `scheduler`.
    #[inline]
    pub fn rejected_in(scheduler: Scheduler, reason: E) -> Self {
        Self::new_in(scheduler, |_, reject| {
            reject.settle(reason);
        })
    }

    /// Register a continuation receiving the settled outcome.
    #[inline]
    pub(crate) fn subscribe<F>(&self, subscriber: F)
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        self.inner.subscribe(Box::new(subscriber));
    }

    // ===== Inspection =====

    /// Returns the settled outcome, or [`None`] if still pending.
    ///
    /// Inspecting does not count as handling a rejection.
    #[inline]
    pub fn outcome(&self) -> Option<Result<T, E>> {
        self.inner.outcome()
    }

    /// Returns the fulfilled value.
    #[inline]
    pub fn value(&self) -> Option<T> {
        self.outcome()?.ok()
    }

    /// Returns the rejection reason.
    #[inline]
    pub fn reason(&self) -> Option<E> {
        self.outcome()?.err()
    }
}

impl<T, E> Deferred<T, E> {
    /// Returns the current [`Status`].
    pub fn status(&self) -> Status {
        match &*self.inner.lock() {
            State::Pending(_) => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }

    /// Returns `true` if not settled yet.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    /// Returns `true` if fulfilled.
    #[inline]
    pub fn is_fulfilled(&self) -> bool {
        self.status() == Status::Fulfilled
    }

    /// Returns `true` if rejected.
    #[inline]
    pub fn is_rejected(&self) -> bool {
        self.status() == Status::Rejected
    }
}

impl<T, E> Clone for Deferred<T, E> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: Clone + fmt::Debug, E: Clone + fmt::Debug> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // formatting the payload may inspect this same value, so it is cloned out of the lock
        let snapshot = match &*self.inner.lock() {
            State::Pending(subscribers) => Err(subscribers.len()),
            State::Fulfilled(value) => Ok(Ok(value.clone())),
            State::Rejected(reason) => Ok(Err(reason.clone())),
        };

        let mut f = f.debug_struct("Deferred");
        match &snapshot {
            Err(subscribers) => f
                .field("status", &Status::Pending)
                .field("subscribers", subscribers),
            Ok(Ok(value)) => f.field("status", &Status::Fulfilled).field("value", value),
            Ok(Err(reason)) => f.field("status", &Status::Rejected).field("reason", reason),
        };
        f.finish()
    }
}
