//! Bridge between [`Deferred`][crate::Deferred] and [`Future`].
mod wait;

pub use wait::Wait;
