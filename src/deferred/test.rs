use std::{
    fmt,
    sync::{
        Arc, Barrier, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering::SeqCst},
    },
};

use super::{Deferred, Fulfill, Reject, Resolution, Status};
use crate::{Microtasks, Origin, Panicked, Scheduler};

type Log = Arc<Mutex<Vec<String>>>;

const LONG_CHAIN: u32 = 100_000;

fn pending<T: super::Value, E: super::Reason>(
    scheduler: Scheduler,
) -> (Deferred<T, E>, Fulfill<T, E>, Reject<T, E>) {
    let mut caps = None;
    let d = Deferred::new_in(scheduler, |f, r| caps = Some((f, r)));
    let (f, r) = caps.unwrap();
    (d, f, r)
}

// ===== Settlement =====

#[test]
fn test_settle_once() {
    let (d, fulfill, reject) = pending::<u8, String>(Scheduler::inline());
    assert_eq!(d.status(), Status::Pending);

    assert!(fulfill.settle(1));
    assert!(!fulfill.settle(2));
    assert!(!reject.settle("late".into()));

    assert_eq!(d.status(), Status::Fulfilled);
    assert_eq!(d.value(), Some(1));
    assert_eq!(d.reason(), None);
}

#[test]
fn test_subscribers_fire_once() {
    let log = Log::default();
    let (d, fulfill, reject) = pending::<u8, String>(Scheduler::inline());

    let sink = log.clone();
    d.and_then(move |v| {
        sink.lock().unwrap().push(format!("got {v}"));
        Resolution::Fulfill(())
    });

    reject.settle("first".into());
    fulfill.settle(9);
    reject.settle("second".into());

    assert!(log.lock().unwrap().is_empty());
    assert_eq!(d.reason().as_deref(), Some("first"));
}

#[test]
fn test_never_settled() {
    let d = Deferred::<u8, String>::new(|_, _| {});
    let next = d.and_then(|v| Resolution::Fulfill(v + 1));

    assert!(d.is_pending());
    assert!(next.is_pending());
    assert_eq!(d.outcome(), None);
}

#[test]
fn test_settle_later_from_thread() {
    let (d, fulfill, _) = pending::<u8, String>(Scheduler::inline());
    let next = d.and_then(|v| Resolution::Fulfill(v * 2));

    std::thread::spawn(move || fulfill.settle(21)).join().unwrap();

    assert_eq!(next.value(), Some(42));
}

#[test]
fn test_settle_race() {
    const THREADS: usize = 8;
    const SUBSCRIBERS: usize = 3;

    let log = Log::default();
    let runs = Arc::new(AtomicUsize::new(0));
    let (d, fulfill, reject) = pending::<usize, String>(Scheduler::inline());

    for _ in 0..SUBSCRIBERS {
        let (sink, count) = (log.clone(), runs.clone());
        d.then(
            {
                let (sink, count) = (sink.clone(), count.clone());
                move |v| {
                    count.fetch_add(1, SeqCst);
                    sink.lock().unwrap().push(format!("fulfilled {v}"));
                    Resolution::<(), String>::Fulfill(())
                }
            },
            move |r| {
                count.fetch_add(1, SeqCst);
                sink.lock().unwrap().push(format!("rejected {r}"));
                Resolution::Fulfill(())
            },
        );
    }

    let barrier = Arc::new(Barrier::new(THREADS));
    let threads: Vec<_> = (0..THREADS)
        .map(|i| {
            let (fulfill, reject, barrier) = (fulfill.clone(), reject.clone(), barrier.clone());
            std::thread::spawn(move || {
                barrier.wait();
                if i % 2 == 0 {
                    (fulfill.settle(i), format!("fulfilled {i}"))
                } else {
                    (reject.settle(i.to_string()), format!("rejected {i}"))
                }
            })
        })
        .collect();

    let attempts: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    let winners: Vec<_> = attempts.iter().filter(|(won, _)| *won).collect();
    assert_eq!(winners.len(), 1);
    let winner = &winners[0].1;

    let stored = match d.outcome().unwrap() {
        Ok(v) => format!("fulfilled {v}"),
        Err(r) => format!("rejected {r}"),
    };
    assert_eq!(&stored, winner);

    assert_eq!(runs.load(SeqCst), SUBSCRIBERS);
    assert!(log.lock().unwrap().iter().all(|entry| entry == winner));
}

#[test]
fn test_initializer_panic() {
    let d = Deferred::<u8, String>::new(|_, _| panic!("broken init"));
    assert_eq!(d.reason().as_deref(), Some("initializer panicked: broken init"));

    let d = Deferred::<u8, Panicked>::new(|fulfill, _| {
        fulfill.settle(5);
        panic!("after settle");
    });
    assert_eq!(d.value(), Some(5));
}

// ===== Ordering =====

#[test]
fn test_order_preservation() {
    let log = Log::default();
    let (d, fulfill, _) = pending::<u8, String>(Scheduler::inline());

    for name in ["s1", "s2", "s3"] {
        let sink = log.clone();
        d.and_then(move |v| {
            sink.lock().unwrap().push(format!("{name}:{v}"));
            Resolution::Fulfill(())
        });
    }

    fulfill.settle(0);
    assert_eq!(&log.lock().unwrap()[..], &["s1:0", "s2:0", "s3:0"]);
}

#[test]
fn test_chain_is_linear() {
    let log = Log::default();
    let tasks = Microtasks::new();
    let (d, fulfill, _) = pending::<u8, String>(tasks.clone().into());

    let (s1, s2) = (log.clone(), log.clone());
    let end = d
        .and_then(move |v| {
            s1.lock().unwrap().push("first".into());
            Resolution::Fulfill(v + 1)
        })
        .and_then(move |v| {
            s2.lock().unwrap().push("second".into());
            Resolution::Fulfill(v + 1)
        });

    assert_eq!(tasks.run_until_idle(), 0);
    fulfill.settle(0);
    tasks.run_until_idle();

    assert_eq!(&log.lock().unwrap()[..], &["first", "second"]);
    assert_eq!(end.value(), Some(2));
}

// ===== Late subscription =====

#[test]
fn test_late_subscription() {
    let d = Deferred::<String, String>::fulfilled("X".into());
    let next = d.and_then(|v| Resolution::Fulfill(v + "!"));
    assert_eq!(next.value().as_deref(), Some("X!"));
}

#[test]
fn test_late_subscription_is_deferred() {
    let tasks = Microtasks::new();
    let d = Deferred::<String, String>::fulfilled_in(tasks.clone().into(), "X".into());

    let next = d.and_then(|v| Resolution::Fulfill(v + "!"));
    assert!(next.is_pending());
    assert_eq!(tasks.len(), 1);

    tasks.run_until_idle();
    assert_eq!(next.value().as_deref(), Some("X!"));
}

// ===== Flattening =====

#[test]
fn test_flatten_deferred() {
    let (other, fulfill_other, _) = pending::<u32, String>(Scheduler::inline());
    let outer = Deferred::<(), String>::fulfilled(()).and_then(move |()| other);

    assert!(outer.is_pending());
    fulfill_other.settle(42);
    assert_eq!(outer.value(), Some(42));
}

#[test]
fn test_flatten_rejection() {
    let outer = Deferred::<(), String>::fulfilled(())
        .and_then(|()| Deferred::<u8, String>::rejected("inner".into()));
    assert_eq!(outer.reason().as_deref(), Some("inner"));
}

#[test]
fn test_flatten_closure_thenable() {
    let (d, fulfill, _) = pending::<u8, String>(Scheduler::inline());
    let slot = Arc::new(Mutex::new(None));

    let keep = slot.clone();
    let next = d.and_then(move |v| {
        Resolution::follow(move |f: Fulfill<u8, String>, _: Reject<u8, String>| {
            *keep.lock().unwrap() = Some((f, v));
        })
    });

    fulfill.settle(3);
    assert!(next.is_pending());

    let (f, v) = slot.lock().unwrap().take().unwrap();
    f.settle(v * 10);
    assert_eq!(next.value(), Some(30));
}

#[test]
fn test_result_resolution() {
    let d = Deferred::<u8, String>::fulfilled(4);

    let ok = d.and_then(|v| Ok::<_, String>(v + 1));
    let err = d.and_then(|v| Err::<u8, _>(format!("rejected {v}")));

    assert_eq!(ok.value(), Some(5));
    assert_eq!(err.reason().as_deref(), Some("rejected 4"));
}

// ===== Rejection =====

#[test]
fn test_rejection_passes_through() {
    let d = Deferred::<u8, String>::rejected("boom".into());
    let end = d
        .and_then(|v| Resolution::Fulfill(v + 1))
        .and_then(|v| Resolution::Fulfill(v + 1));
    assert_eq!(end.reason().as_deref(), Some("boom"));
}

#[test]
fn test_rejection_handler_recovers() {
    let d = Deferred::<String, String>::rejected("boom".into());
    let next = d.chain(
        None::<fn(String) -> Resolution<String, String>>,
        Some(|r: String| Resolution::Fulfill(r)),
    );
    assert_eq!(next.status(), Status::Fulfilled);
    assert_eq!(next.value().as_deref(), Some("boom"));
}

#[test]
fn test_rejection_handler_rejects() {
    let d = Deferred::<String, String>::rejected("boom".into());
    let next = d.chain(
        None::<fn(String) -> Resolution<String, String>>,
        Some(|r: String| Resolution::Reject(r)),
    );
    assert_eq!(next.status(), Status::Rejected);
    assert_eq!(next.reason().as_deref(), Some("boom"));
}

#[test]
fn test_chain_without_transforms() {
    let f = Deferred::<u8, String>::fulfilled(1).chain(
        None::<fn(u8) -> Resolution<u8, String>>,
        None::<fn(String) -> Resolution<u8, String>>,
    );
    let r = Deferred::<u8, String>::rejected("no".into()).chain(
        None::<fn(u8) -> Resolution<u8, String>>,
        None::<fn(String) -> Resolution<u8, String>>,
    );

    assert_eq!(f.value(), Some(1));
    assert_eq!(r.reason().as_deref(), Some("no"));
}

#[test]
fn test_catch_chainable() {
    let log = Log::default();
    let sink = log.clone();

    Deferred::<String, String>::rejected("e".into())
        .catch(|r| Resolution::Fulfill(format!("recovered:{r}")))
        .and_then(move |v| {
            sink.lock().unwrap().push(v);
            Resolution::Fulfill(())
        });

    assert_eq!(&log.lock().unwrap()[..], &["recovered:e"]);
}

#[test]
fn test_catch_skips_fulfilled() {
    let d = Deferred::<u8, String>::fulfilled(8).catch(|_| Resolution::Fulfill(0));
    assert_eq!(d.value(), Some(8));
}

#[test]
fn test_transform_panic() {
    let d = Deferred::<u8, Panicked>::fulfilled(1);
    let next = d.and_then(|_| -> Resolution<u8, Panicked> { panic!("bad transform") });

    let reason = next.reason().unwrap();
    assert_eq!(reason.origin(), Origin::Transform);
    assert_eq!(reason.message(), "bad transform");

    let recovered = next.catch(|r| Resolution::Fulfill(r.message().len() as u8));
    assert_eq!(recovered.value(), Some(13));
}

fn broken_thenable(_: Fulfill<u8, Panicked>, _: Reject<u8, Panicked>) {
    panic!("broken thenable")
}

fn settle_then_panic(fulfill: Fulfill<u8, Panicked>, _: Reject<u8, Panicked>) {
    fulfill.settle(7);
    panic!("after settle")
}

#[test]
fn test_thenable_panic() {
    let (d, fulfill, _) = pending::<u8, Panicked>(Scheduler::inline());

    let broken = d.and_then(|_| Resolution::follow(broken_thenable));
    let settled = d.and_then(|_| Resolution::follow(settle_then_panic));
    let sibling = d.and_then(|v| Resolution::Fulfill(v + 1));

    assert!(fulfill.settle(1));

    let reason = broken.reason().unwrap();
    assert_eq!(reason.origin(), Origin::Transform);
    assert_eq!(reason.message(), "broken thenable");
    assert_eq!(settled.value(), Some(7));
    assert_eq!(sibling.value(), Some(2));
}

struct FailingWaker;

impl std::task::Wake for FailingWaker {
    fn wake(self: Arc<Self>) {
        panic!("waker failed")
    }
}

#[test]
fn test_subscriber_panic_isolated() {
    use std::{
        pin::pin,
        task::{Context, Poll, Waker},
    };

    let (d, fulfill, _) = pending::<u8, String>(Scheduler::inline());
    let waker = Waker::from(Arc::new(FailingWaker));
    let mut cx = Context::from_waker(&waker);

    let mut wait = pin!(d.wait());
    assert_eq!(wait.as_mut().poll(&mut cx), Poll::Pending);
    let next = d.and_then(|v| Resolution::Fulfill(v + 1));

    assert!(fulfill.settle(1));
    assert_eq!(next.value(), Some(2));
    assert_eq!(wait.as_mut().poll(&mut cx), Poll::Ready(Ok(1)));
}

// ===== Long chains =====

#[test]
fn test_settle_long_chain() {
    let (d, fulfill, _) = pending::<u32, String>(Scheduler::inline());

    let mut end = d.clone();
    for _ in 0..LONG_CHAIN {
        end = end.and_then(|v| Resolution::Fulfill(v + 1));
    }

    assert!(fulfill.settle(0));
    assert_eq!(end.value(), Some(LONG_CHAIN));
}

#[test]
fn test_settle_long_flattened_chain() {
    let (d, fulfill, _) = pending::<u32, String>(Scheduler::inline());

    let mut end = d.clone();
    for _ in 0..LONG_CHAIN {
        end = end.and_then(|v| Deferred::fulfilled(v + 1));
    }

    assert!(fulfill.settle(0));
    assert_eq!(end.value(), Some(LONG_CHAIN));
}

#[test]
fn test_drop_long_pending_chain() {
    for scheduler in [Scheduler::inline(), Microtasks::new().into()] {
        let (d, fulfill, reject) = pending::<u32, String>(scheduler);
        let token = Arc::new(());

        let mut end = d.clone();
        for _ in 0..LONG_CHAIN {
            end = end.and_then(|v| Resolution::Fulfill(v + 1));
        }
        let held = token.clone();
        let end = end.and_then(move |v| {
            drop(held);
            Resolution::Fulfill(v)
        });

        drop((d, fulfill, reject, end));
        assert_eq!(Arc::strong_count(&token), 1);
    }
}

// ===== Scenario =====

#[test]
fn test_chain_scenario() {
    let tasks = Microtasks::new();
    let scheduler = Scheduler::from(tasks.clone());

    let s = scheduler.clone();
    let d = Deferred::<String, String>::fulfilled_in(scheduler, "a".into())
        .and_then(move |v| Deferred::fulfilled_in(s, v + "b"))
        .and_then(|v| Resolution::Fulfill(v + "c"));

    assert!(d.is_pending());
    tasks.run_until_idle();
    assert_eq!(d.value().as_deref(), Some("abc"));
}

#[derive(Clone)]
struct Introspect(Arc<Mutex<Option<Deferred<Introspect, String>>>>);

impl fmt::Debug for Introspect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let status = self.0.lock().unwrap().as_ref().map(Deferred::status);
        write!(f, "Introspect({status:?})")
    }
}

#[test]
fn test_debug_reentrant() {
    let slot = Arc::new(Mutex::new(None));
    let d = Deferred::<Introspect, String>::fulfilled(Introspect(slot.clone()));
    *slot.lock().unwrap() = Some(d.clone());

    assert_eq!(
        format!("{d:?}"),
        "Deferred { status: Fulfilled, value: Introspect(Some(Fulfilled)) }"
    );
    slot.lock().unwrap().take();
}

#[test]
fn test_debug() {
    let (d, _f, _r) = pending::<u8, String>(Scheduler::inline());
    d.and_then(|v| Resolution::Fulfill(v));
    assert_eq!(format!("{d:?}"), "Deferred { status: Pending, subscribers: 1 }");

    let d = Deferred::<u8, String>::fulfilled(7);
    assert_eq!(format!("{d:?}"), "Deferred { status: Fulfilled, value: 7 }");

    let d = Deferred::<u8, String>::rejected("x".into());
    assert_eq!(format!("{d:?}"), r#"Deferred { status: Rejected, reason: "x" }"#);
}

// ===== Unhandled =====

/// The hook is process wide, tests installing one run one at a time.
fn hook_serial() -> MutexGuard<'static, ()> {
    static SERIAL: Mutex<()> = Mutex::new(());
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

#[test]
fn test_unhandled_rejection() {
    let _serial = hook_serial();
    let seen = Log::default();
    let sink = seen.clone();
    crate::set_unhandled_hook(move |reason| sink.lock().unwrap().push(format!("{reason:?}")));

    drop(Deferred::<u8, String>::rejected("unhandled-a".into()));

    let handled = Deferred::<u8, String>::rejected("handled-b".into());
    let recovered = handled.catch(|_| Resolution::Fulfill(0));
    drop(handled);
    drop(recovered);

    let passed = Deferred::<u8, String>::rejected("passed-c".into())
        .and_then(|v| Resolution::Fulfill(v));
    drop(passed);

    crate::take_unhandled_hook();

    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|r| r == r#""unhandled-a""#));
    assert!(!seen.iter().any(|r| r == r#""handled-b""#));
    assert_eq!(seen.iter().filter(|r| *r == r#""passed-c""#).count(), 1);
}

#[test]
fn test_unhandled_hook_reentrant() {
    let _serial = hook_serial();
    let seen = Log::default();

    let sink = seen.clone();
    crate::set_unhandled_hook(move |reason| {
        let reason = format!("{reason:?}");
        sink.lock().unwrap().push(reason.clone());

        if reason == r#""first""# {
            drop(Deferred::<u8, String>::rejected("nested".into()));
        }
        let sink = sink.clone();
        crate::set_unhandled_hook(move |reason| sink.lock().unwrap().push(format!("{reason:?}")));
    });

    drop(Deferred::<u8, String>::rejected("first".into()));
    drop(Deferred::<u8, String>::rejected("second".into()));

    crate::take_unhandled_hook();

    let seen = seen.lock().unwrap();
    for expected in [r#""first""#, r#""nested""#, r#""second""#] {
        assert!(seen.iter().any(|r| r == expected), "missing {expected}");
    }
}
