//! Memora Test Utilities
//!
//! Shared test infrastructure for the memora workspace:
//! - Instrumented locks that count acquisitions or fail to acquire or release
//! - Callables that count their invocations
//! - Proptest generators for arguments and calls

pub use memora_cache::{BoundedCache, Cache, CacheLock, Cached, Callable, ReentrantLock};
pub use memora_core::{call_args, Arg, ArgType, CallArgs, Key, LockError, MemoError, MemoResult};

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use proptest::prelude::*;

// ============================================================================
// LOCKS
// ============================================================================

/// Lock that counts `enter` and `exit` calls and excludes nothing.
#[derive(Debug, Default)]
pub struct CountingLock {
    enters: AtomicUsize,
    exits: AtomicUsize,
}

impl CountingLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of acquisitions so far.
    pub fn count(&self) -> usize {
        self.enters.load(Ordering::SeqCst)
    }

    /// Number of releases so far.
    pub fn exits(&self) -> usize {
        self.exits.load(Ordering::SeqCst)
    }

    /// Whether every acquisition has been released.
    pub fn is_balanced(&self) -> bool {
        self.count() == self.exits()
    }
}

impl CacheLock for CountingLock {
    fn enter(&self) -> Result<(), LockError> {
        self.enters.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exit(&self) -> Result<(), LockError> {
        self.exits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Lock whose acquisition always fails.
#[derive(Debug, Clone)]
pub struct FailingLock {
    reason: String,
}

impl FailingLock {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl CacheLock for FailingLock {
    fn enter(&self) -> Result<(), LockError> {
        Err(LockError::AcquireFailed {
            reason: self.reason.clone(),
        })
    }

    fn exit(&self) -> Result<(), LockError> {
        Ok(())
    }
}

/// Lock that acquires normally but fails every release.
#[derive(Debug)]
pub struct FailingReleaseLock {
    reason: String,
    enters: AtomicUsize,
}

impl FailingReleaseLock {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            enters: AtomicUsize::new(0),
        }
    }

    /// Number of acquisitions so far.
    pub fn count(&self) -> usize {
        self.enters.load(Ordering::SeqCst)
    }
}

impl CacheLock for FailingReleaseLock {
    fn enter(&self) -> Result<(), LockError> {
        self.enters.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exit(&self) -> Result<(), LockError> {
        Err(LockError::ReleaseFailed {
            reason: self.reason.clone(),
        })
    }
}

// ============================================================================
// CALLABLES
// ============================================================================

/// Returns 0 on its first call, 1 on its second, and so on, whatever the
/// arguments. Repeated results therefore mean the call was served from a
/// cache.
#[derive(Debug, Default)]
pub struct CountingFn {
    count: AtomicI64,
}

impl CountingFn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of invocations so far.
    pub fn calls(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Callable for CountingFn {
    type Output = i64;
    type Error = MemoError;

    fn call(&self, _args: &CallArgs) -> MemoResult<i64> {
        Ok(self.count.fetch_add(1, Ordering::SeqCst))
    }
}

/// Returns its first positional argument as an integer.
pub fn identity(args: &CallArgs) -> MemoResult<i64> {
    Ok(args.get(0).and_then(Arg::as_int).unwrap_or_default())
}

/// Returns its arguments unchanged.
pub fn echo(args: &CallArgs) -> MemoResult<CallArgs> {
    Ok(args.clone())
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Generates hashable scalar arguments (NaN excluded).
pub fn arb_scalar_arg() -> impl Strategy<Value = Arg> {
    prop_oneof![
        Just(Arg::None),
        any::<bool>().prop_map(Arg::Bool),
        any::<i64>().prop_map(Arg::Int),
        (-1.0e12f64..1.0e12f64).prop_map(Arg::Float),
        "[a-z]{0,8}".prop_map(Arg::Str),
        proptest::collection::vec(any::<u8>(), 0..8).prop_map(Arg::Bytes),
    ]
}

/// Generates hashable arguments, including nested tuples.
pub fn arb_hashable_arg() -> impl Strategy<Value = Arg> {
    arb_scalar_arg().prop_recursive(2, 16, 4, |inner| {
        proptest::collection::vec(inner, 0..4).prop_map(Arg::Tuple)
    })
}

/// Generates arguments that can never be part of a key.
pub fn arb_unhashable_arg() -> impl Strategy<Value = Arg> {
    prop_oneof![
        proptest::collection::vec(arb_scalar_arg(), 0..4).prop_map(Arg::List),
        proptest::collection::btree_map("[a-z]{1,4}", arb_scalar_arg(), 0..4).prop_map(Arg::Map),
        Just(Arg::Float(f64::NAN)),
    ]
}

/// Generates hashable calls with up to 4 positional and 4 named arguments.
pub fn arb_call_args() -> impl Strategy<Value = CallArgs> {
    (
        proptest::collection::vec(arb_hashable_arg(), 0..4),
        proptest::collection::btree_map("[a-z]{1,6}", arb_hashable_arg(), 0..4),
    )
        .prop_map(|(positional, named)| {
            named
                .into_iter()
                .fold(CallArgs::from_positional(positional), |args, (name, value)| {
                    args.named(name, value)
                })
        })
}

/// Generates integers paired with the equal float.
pub fn arb_integral_pair() -> impl Strategy<Value = (i64, f64)> {
    (-(1i64 << 52)..(1i64 << 52)).prop_map(|n| (n, n as f64))
}

// ============================================================================
// TESTS
// ============================================================================
