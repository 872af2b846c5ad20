use std::{any::Any, error::Error, fmt};

/// Where a caught panic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// The initializer passed to [`Deferred::new`][crate::Deferred::new].
    Initializer,
    /// A transform passed to [`then`][crate::Deferred::then] or one of its variants.
    Transform,
}

/// Rejection reason for a panic caught while running user code.
///
/// Any reason type used with [`Deferred`][crate::Deferred] must be constructible from
/// [`Panicked`], so an initializer or transform that panics rejects the deferred value instead
/// of leaving it pending forever.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, Origin, Panicked};
///
/// let d = Deferred::<u8, Panicked>::new(|_, _| panic!("no disk"));
///
/// let reason = d.reason().unwrap();
/// assert_eq!(reason.origin(), Origin::Initializer);
/// assert_eq!(reason.message(), "no disk");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panicked {
    origin: Origin,
    message: Box<str>,
}

impl Panicked {
    pub(crate) fn from_payload(origin: Origin, payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(s) => (*s).into_boxed_str(),
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(s) => Box::from(*s),
                Err(_) => Box::from("Box<dyn Any>"),
            },
        };
        Self { origin, message }
    }

    /// Returns where the panic was caught.
    #[inline]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Returns the panic message.
    ///
    /// Payloads that are neither [`String`] nor `&str` are reported as `Box<dyn Any>`.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Panicked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            Origin::Initializer => write!(f, "initializer panicked: {}", self.message),
            Origin::Transform => write!(f, "transform panicked: {}", self.message),
        }
    }
}

impl Error for Panicked {}

impl From<Panicked> for String {
    #[inline]
    fn from(value: Panicked) -> Self {
        value.to_string()
    }
}

#[test]
fn test_panicked_payload() {
    let p = Panicked::from_payload(Origin::Transform, Box::new(String::from("owned")));
    assert_eq!(p.message(), "owned");
    assert_eq!(p.to_string(), "transform panicked: owned");

    let p = Panicked::from_payload(Origin::Initializer, Box::new("static"));
    assert_eq!(p.message(), "static");
    assert_eq!(String::from(p), "initializer panicked: static");

    let p = Panicked::from_payload(Origin::Transform, Box::new(420u32));
    assert_eq!(p.message(), "Box<dyn Any>");

    let boxed: Box<dyn Error + Send + Sync> = p.into();
    assert_eq!(boxed.to_string(), "transform panicked: Box<dyn Any>");
}
