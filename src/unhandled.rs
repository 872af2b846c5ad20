//! Unhandled rejection reporting.
//!
//! A rejection is unhandled when the last handle to a rejected [`Deferred`][crate::Deferred] is
//! dropped without any continuation ever being attached to it. This is never fatal, it is only
//! reported: to the hook installed with [`set_unhandled_hook`], or as a `warn` log record when
//! no hook is installed and the `log` feature is enabled.
use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use crate::macros::warning;

/// Callback receiving the reason of an unhandled rejection.
pub type UnhandledHook = Arc<dyn Fn(&dyn fmt::Debug) + Send + Sync>;

static HOOK: RwLock<Option<UnhandledHook>> = RwLock::new(None);

/// Install a process wide hook for unhandled rejections, replacing the previous one.
///
/// The hook runs without any lock held, so it may install another hook or drop other deferred
/// values.
///
/// # Examples
///
/// ```
/// use deferred::Deferred;
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// deferred::set_unhandled_hook(move |reason| sink.lock().unwrap().push(format!("{reason:?}")));
///
/// drop(Deferred::<(), String>::rejected("lost".into()));
///
/// assert_eq!(&seen.lock().unwrap()[..], &[r#""lost""#]);
/// # deferred::take_unhandled_hook();
/// ```
pub fn set_unhandled_hook<F>(hook: F)
where
    F: Fn(&dyn fmt::Debug) + Send + Sync + 'static,
{
    *HOOK.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
}

/// Remove the installed hook, returning it.
pub fn take_unhandled_hook() -> Option<UnhandledHook> {
    HOOK.write().unwrap_or_else(PoisonError::into_inner).take()
}

pub(crate) fn report<E: fmt::Debug>(reason: &E) {
    let hook = HOOK.read().unwrap_or_else(PoisonError::into_inner).clone();
    match hook {
        Some(hook) => hook(reason),
        None => warning!("unhandled rejection: {reason:?}"),
    }
}
