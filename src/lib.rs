//! Settle-once deferred values with chainable continuations.
//!
//! See [`Deferred`] for the core type.
#![warn(missing_docs, missing_debug_implementations)]

mod deferred;
mod either;
mod error;
mod macros;
mod schedule;
mod unhandled;

pub mod futures;

#[cfg(feature = "tokio")]
pub mod tokio;

pub use deferred::{Deferred, Fulfill, Reason, Reject, Resolution, Status, Thenable, Value};
pub use error::{Origin, Panicked};
pub use schedule::{Inline, Job, Microtasks, Schedule, Scheduler};
pub use unhandled::{UnhandledHook, set_unhandled_hook, take_unhandled_hook};
