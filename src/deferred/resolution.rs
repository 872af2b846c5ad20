use std::fmt;

use super::{Deferred, Fulfill, Reason, Reject, Value};

/// Anything that eventually settles a pair of capabilities.
///
/// Returning a thenable from a transform makes the derived [`Deferred`] wait on it, instead of
/// being settled with the thenable itself.
///
/// Implemented for [`Deferred`] and for closures taking the two capabilities.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, Fulfill, Reject, Resolution};
///
/// let d = Deferred::<u8, String>::fulfilled(20);
/// let next = d.and_then(|v| {
///     Resolution::follow(move |fulfill: Fulfill<u8, String>, _: Reject<u8, String>| {
///         fulfill.settle(v + 1);
///     })
/// });
///
/// assert_eq!(next.value(), Some(21));
/// ```
pub trait Thenable<T, E>: Send + 'static {
    /// Forward the eventual outcome into `fulfill` or `reject`.
    fn forward(self: Box<Self>, fulfill: Fulfill<T, E>, reject: Reject<T, E>);
}

impl<T: Value, E: Reason> Thenable<T, E> for Deferred<T, E> {
    fn forward(self: Box<Self>, fulfill: Fulfill<T, E>, reject: Reject<T, E>) {
        self.subscribe(move |outcome| {
            match outcome {
                Ok(value) => fulfill.settle(value),
                Err(reason) => reject.settle(reason),
            };
        });
    }
}

impl<T, E, F> Thenable<T, E> for F
where
    F: FnOnce(Fulfill<T, E>, Reject<T, E>) + Send + 'static,
{
    #[inline]
    fn forward(self: Box<Self>, fulfill: Fulfill<T, E>, reject: Reject<T, E>) {
        self(fulfill, reject)
    }
}

/// How a transform settles the derived [`Deferred`].
///
/// Transforms may return anything convertible into [`Resolution`]: a [`Resolution`] itself, a
/// [`Result`], or another [`Deferred`] to wait on.
pub enum Resolution<T, E> {
    /// Fulfill with the value.
    Fulfill(T),
    /// Reject with the reason.
    Reject(E),
    /// Wait for the thenable, then settle the same way.
    Follow(Box<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    /// Create [`Resolution::Follow`] from a thenable.
    #[inline]
    pub fn follow<F: Thenable<T, E>>(thenable: F) -> Self {
        Self::Follow(Box::new(thenable))
    }

    /// Settle through the given capabilities.
    pub(crate) fn reconcile(self, fulfill: Fulfill<T, E>, reject: Reject<T, E>)
    where
        T: Value,
        E: Reason,
    {
        match self {
            Resolution::Fulfill(value) => {
                fulfill.settle(value);
            }
            Resolution::Reject(reason) => {
                reject.settle(reason);
            }
            Resolution::Follow(thenable) => thenable.forward(fulfill, reject),
        }
    }
}

impl<T, E> From<Result<T, E>> for Resolution<T, E> {
    #[inline]
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(ok) => Resolution::Fulfill(ok),
            Err(err) => Resolution::Reject(err),
        }
    }
}

impl<T: Value, E: Reason> From<Deferred<T, E>> for Resolution<T, E> {
    #[inline]
    fn from(value: Deferred<T, E>) -> Self {
        Resolution::Follow(Box::new(value))
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Resolution::Fulfill(value) => f.debug_tuple("Fulfill").field(value).finish(),
            Resolution::Reject(reason) => f.debug_tuple("Reject").field(reason).finish(),
            Resolution::Follow(_) => f.debug_tuple("Follow").finish_non_exhaustive(),
        }
    }
}
