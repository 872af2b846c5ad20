use std::{fmt, sync::Arc};

use super::{Inner, Reason, Value};

/// Capability to fulfill a [`Deferred`][super::Deferred].
///
/// Handed to the initializer of [`Deferred::new`][super::Deferred::new]. It can be cloned and
/// moved freely, only the first settlement through either capability has any effect.
pub struct Fulfill<T, E> {
    inner: Arc<Inner<T, E>>,
}

/// Capability to reject a [`Deferred`][super::Deferred].
///
/// Counterpart of [`Fulfill`].
pub struct Reject<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T: Value, E: Reason> Fulfill<T, E> {
    #[inline]
    pub(crate) fn new(inner: Arc<Inner<T, E>>) -> Self {
        Self { inner }
    }

    /// Fulfill with `value`.
    ///
    /// Returns `false` and drops `value` if already settled.
    #[inline]
    pub fn settle(&self, value: T) -> bool {
        self.inner.settle(Ok(value))
    }
}

impl<T: Value, E: Reason> Reject<T, E> {
    #[inline]
    pub(crate) fn new(inner: Arc<Inner<T, E>>) -> Self {
        Self { inner }
    }

    /// Reject with `reason`.
    ///
    /// Returns `false` and drops `reason` if already settled.
    #[inline]
    pub fn settle(&self, reason: E) -> bool {
        self.inner.settle(Err(reason))
    }
}

impl<T, E> Clone for Fulfill<T, E> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, E> Clone for Reject<T, E> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, E> fmt::Debug for Fulfill<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Fulfill").finish_non_exhaustive()
    }
}

impl<T, E> fmt::Debug for Reject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reject").finish_non_exhaustive()
    }
}
