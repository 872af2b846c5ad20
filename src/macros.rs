//! Logging shims.
//!
//! Forward to [`log`][<https://docs.rs/log>] when the `log` feature is enabled, otherwise the
//! arguments are only type checked.

macro_rules! trace {
    ($($tt:tt)*) => {
        crate::macros::log_with!(trace, $($tt)*)
    };
}

macro_rules! warning {
    ($($tt:tt)*) => {
        crate::macros::log_with!(warn, $($tt)*)
    };
}

#[cfg(feature = "log")]
macro_rules! log_with {
    ($level:ident, $($tt:tt)*) => {
        ::log::$level!($($tt)*)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! log_with {
    ($level:ident, $($tt:tt)*) => {
        {
            let _ = format_args!($($tt)*);
        }
    };
}

pub(crate) use {log_with, trace, warning};
