/// Represent either of two types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L, R> Either<L, R> {
    /// Collapse both variants into a single type.
    #[inline]
    pub(crate) fn either<O>(self, left: impl FnOnce(L) -> O, right: impl FnOnce(R) -> O) -> O {
        match self {
            Either::Left(l) => left(l),
            Either::Right(r) => right(r),
        }
    }
}

#[test]
fn test_either() {
    let l = Either::<u8, &str>::Left(4);
    let r = Either::<u8, &str>::Right("20");

    assert_eq!(l.either(|n| n.to_string(), str::to_owned), "4");
    assert_eq!(r.either(|n| n.to_string(), str::to_owned), "20");
}
