use std::panic::{AssertUnwindSafe, catch_unwind};

use super::{Deferred, Reason, Resolution, Value};
use crate::{Origin, Panicked, either::Either};

/// Apply `transform` to `input` if present, otherwise pass `input` through.
#[inline]
pub(crate) fn apply<A, R, F>(transform: Option<F>, input: A) -> Either<R, A>
where
    F: FnOnce(A) -> R,
{
    match transform {
        Some(f) => Either::Left(f(input)),
        None => Either::Right(input),
    }
}

impl<T: Value, E: Reason> Deferred<T, E> {
    /// Derive a new [`Deferred`] settled by `reaction` once this one settles.
    ///
    /// This is the only place a derived value is created, all variants of `then` go through it.
    fn react<U, F>(&self, reaction: F) -> Deferred<U, E>
    where
        U: Value,
        F: FnOnce(Result<T, E>) -> Resolution<U, E> + Send + 'static,
    {
        let parent = self.inner.clone();
        Deferred::new_in(parent.scheduler().clone(), move |fulfill, reject| {
            let fault = reject.clone();
            parent.subscribe(Box::new(move |outcome| {
                // forwarding into a closure thenable runs user code too
                let settled =
                    catch_unwind(AssertUnwindSafe(|| reaction(outcome).reconcile(fulfill, reject)));
                if let Err(payload) = settled {
                    fault.settle(Panicked::from_payload(Origin::Transform, payload).into());
                }
            }));
        })
    }

    /// Returns a new [`Deferred`] settled by applying the matching transform to this outcome.
    ///
    /// Each transform returns anything convertible into [`Resolution`]. Returning another
    /// [`Deferred`] makes the derived one wait for it. A rejection transform that returns a
    /// fulfillment recovers the chain.
    ///
    /// If this is already settled, the transform is handed to the scheduler right away. A panic
    /// in a transform, or in a closure [`Thenable`][super::Thenable] it returns, rejects the
    /// derived value with [`Panicked`], unless the thenable already settled it.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred::{Deferred, Resolution};
    ///
    /// let d = Deferred::<u8, String>::rejected("boom".into());
    /// let next = d.then(
    ///     |v| Resolution::Fulfill(v.to_string()),
    ///     |r| Resolution::Fulfill(format!("recovered: {r}")),
    /// );
    ///
    /// assert_eq!(next.value().as_deref(), Some("recovered: boom"));
    /// ```
    pub fn then<U, F, G, R1, R2>(&self, on_fulfilled: F, on_rejected: G) -> Deferred<U, E>
    where
        U: Value,
        F: FnOnce(T) -> R1 + Send + 'static,
        G: FnOnce(E) -> R2 + Send + 'static,
        R1: Into<Resolution<U, E>>,
        R2: Into<Resolution<U, E>>,
    {
        self.react(move |outcome| match outcome {
            Ok(value) => on_fulfilled(value).into(),
            Err(reason) => on_rejected(reason).into(),
        })
    }

    /// Like [`then`][Deferred::then], but a rejection passes through untouched.
    pub fn and_then<U, F, R>(&self, on_fulfilled: F) -> Deferred<U, E>
    where
        U: Value,
        F: FnOnce(T) -> R + Send + 'static,
        R: Into<Resolution<U, E>>,
    {
        self.react(move |outcome| match outcome {
            Ok(value) => on_fulfilled(value).into(),
            Err(reason) => Resolution::Reject(reason),
        })
    }

    /// [`then`][Deferred::then] with optional transforms.
    ///
    /// A missing transform passes the outcome through with its polarity unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred::{Deferred, Resolution};
    ///
    /// let d = Deferred::<String, String>::fulfilled("X".into());
    /// let next = d.chain(
    ///     Some(|v: String| Resolution::Fulfill(v + "!")),
    ///     None::<fn(String) -> Resolution<String, String>>,
    /// );
    ///
    /// assert_eq!(next.value().as_deref(), Some("X!"));
    /// ```
    pub fn chain<F, G, R1, R2>(&self, on_fulfilled: Option<F>, on_rejected: Option<G>) -> Self
    where
        F: FnOnce(T) -> R1 + Send + 'static,
        G: FnOnce(E) -> R2 + Send + 'static,
        R1: Into<Resolution<T, E>>,
        R2: Into<Resolution<T, E>>,
    {
        self.react(move |outcome| match outcome {
            Ok(value) => apply(on_fulfilled, value).either(Into::into, Resolution::Fulfill),
            Err(reason) => apply(on_rejected, reason).either(Into::into, Resolution::Reject),
        })
    }

    /// Handle a rejection, a fulfillment passes through untouched.
    ///
    /// Returns the derived [`Deferred`], so the chain can continue.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred::{Deferred, Resolution};
    ///
    /// let d = Deferred::<String, String>::rejected("e".into());
    /// let next = d
    ///     .catch(|r| Resolution::Fulfill(format!("recovered:{r}")))
    ///     .and_then(|v| Resolution::Fulfill(v.len()));
    ///
    /// assert_eq!(next.value(), Some(11));
    /// ```
    pub fn catch<G, R>(&self, on_rejected: G) -> Self
    where
        G: FnOnce(E) -> R + Send + 'static,
        R: Into<Resolution<T, E>>,
    {
        self.chain(None::<fn(T) -> Resolution<T, E>>, Some(on_rejected))
    }
}

#[test]
fn test_apply() {
    let double = |n: u8| n * 2;
    assert_eq!(apply(Some(double), 4), Either::Left(8));
    assert_eq!(apply(None::<fn(u8) -> u8>, 4), Either::Right(4));
}
