//! Call protocol tests for the memoizing wrapper.
//!
//! Each scenario runs against a bounded cache and, where capacity does not
//! matter, an unbounded map as well.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use memora_cache::{
    cached, BoundedCache, Cache, CallArgs, HashKey, KeyBuilder, Memoize, MemoConfig, MemoError,
    TypedKey, UnboundedCache,
};
use memora_core::{call_args, Arg, KeyError, LockError, MethodKey};
use memora_test_utils::{
    arb_call_args, echo, identity, CountingFn, CountingLock, FailingLock, FailingReleaseLock,
};
use parking_lot::RwLock;
use proptest::prelude::*;

fn hashkey(args: CallArgs) -> memora_core::Key {
    HashKey.build(&args).unwrap()
}

fn typedkey(args: CallArgs) -> memora_core::Key {
    TypedKey.build(&args).unwrap()
}

fn unbounded() -> Arc<UnboundedCache<i64>> {
    Arc::new(RwLock::new(HashMap::new()))
}

// ============================================================================
// DECORATOR BASICS
// ============================================================================

fn check_decorator<C: Cache<i64>>(cache: Arc<C>) {
    let wrapper = cached(Arc::clone(&cache)).wrap(CountingFn::new());

    assert_eq!(cache.len(), 0);
    assert_eq!(wrapper.wrapped().calls(), 0);

    assert_eq!(wrapper.call(&call_args![0]).unwrap(), 0);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&hashkey(call_args![0])));
    assert!(!cache.contains(&hashkey(call_args![1])));
    assert!(!cache.contains(&hashkey(call_args![1.0])));

    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&hashkey(call_args![0])));
    assert!(cache.contains(&hashkey(call_args![1])));
    assert!(cache.contains(&hashkey(call_args![1.0])));

    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(cache.len(), 2);

    assert_eq!(wrapper.call(&call_args![1.0]).unwrap(), 1);
    assert_eq!(cache.len(), 2);

    assert_eq!(wrapper.call(&call_args![1.0]).unwrap(), 1);
    assert_eq!(cache.len(), 2);

    assert_eq!(wrapper.wrapped().calls(), 2);
}

#[test]
fn test_decorator_bounded() {
    check_decorator(Arc::new(BoundedCache::new(2)));
}

#[test]
fn test_decorator_unbounded() {
    check_decorator(unbounded());
}

fn check_decorator_typed<C: Cache<i64>>(cache: Arc<C>) {
    let wrapper = cached(Arc::clone(&cache))
        .key(TypedKey)
        .wrap(CountingFn::new());

    assert_eq!(cache.len(), 0);

    assert_eq!(wrapper.call(&call_args![0]).unwrap(), 0);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&typedkey(call_args![0])));
    assert!(!cache.contains(&typedkey(call_args![1])));
    assert!(!cache.contains(&typedkey(call_args![1.0])));

    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&typedkey(call_args![0])));
    assert!(cache.contains(&typedkey(call_args![1])));
    assert!(!cache.contains(&typedkey(call_args![1.0])));

    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(cache.len(), 2);

    assert_eq!(wrapper.call(&call_args![1.0]).unwrap(), 2);
    assert_eq!(cache.len(), 3);
    assert!(cache.contains(&typedkey(call_args![0])));
    assert!(cache.contains(&typedkey(call_args![1])));
    assert!(cache.contains(&typedkey(call_args![1.0])));

    assert_eq!(wrapper.call(&call_args![1.0]).unwrap(), 2);
    assert_eq!(cache.len(), 3);
}

#[test]
fn test_decorator_typed_bounded() {
    check_decorator_typed(Arc::new(BoundedCache::new(3)));
}

#[test]
fn test_decorator_typed_unbounded() {
    check_decorator_typed(unbounded());
}

fn check_decorator_lock<C: Cache<i64>>(cache: Arc<C>) {
    let lock = Arc::new(CountingLock::new());
    let wrapper = cached(Arc::clone(&cache))
        .lock(lock.clone())
        .wrap(CountingFn::new());

    assert_eq!(cache.len(), 0);
    assert_eq!(wrapper.call(&call_args![0]).unwrap(), 0);
    assert_eq!(lock.count(), 2);
    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(lock.count(), 4);
    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(lock.count(), 5);
    assert!(lock.is_balanced());
}

#[test]
fn test_decorator_lock_bounded() {
    check_decorator_lock(Arc::new(BoundedCache::new(2)));
}

#[test]
fn test_decorator_lock_unbounded() {
    check_decorator_lock(unbounded());
}

#[test]
fn test_zero_arg_calls_share_one_slot() {
    let cache = Arc::new(BoundedCache::new(2));
    let wrapper = cached(Arc::clone(&cache)).wrap(CountingFn::new());

    assert_eq!(wrapper.call(&call_args![]).unwrap(), 0);
    assert_eq!(wrapper.call(&CallArgs::new()).unwrap(), 0);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&memora_core::Key::EMPTY));
}

#[test]
fn test_named_args_order_shares_slot() {
    let cache = Arc::new(BoundedCache::new(4));
    let wrapper = cached(Arc::clone(&cache)).wrap(CountingFn::new());

    let a = CallArgs::new().arg(1).named("x", 1).named("y", 2);
    let b = CallArgs::new().arg(1).named("y", 2).named("x", 1);
    assert_eq!(wrapper.call(&a).unwrap(), 0);
    assert_eq!(wrapper.call(&b).unwrap(), 0);
    assert_eq!(cache.len(), 1);

    assert_eq!(wrapper.call(&call_args![1; x = 2, y = 2]).unwrap(), 1);
    assert_eq!(cache.len(), 2);
}

// ============================================================================
// ZERO CAPACITY
// ============================================================================

#[test]
fn test_zero_size_cache_decorator() {
    let cache = Arc::new(BoundedCache::new(0));
    let wrapper = cached(Arc::clone(&cache)).wrap(CountingFn::new());

    assert_eq!(cache.len(), 0);
    assert_eq!(wrapper.call(&call_args![0]).unwrap(), 0);
    assert_eq!(cache.len(), 0);
    assert_eq!(wrapper.call(&call_args![0]).unwrap(), 1);
    assert_eq!(cache.len(), 0);
    assert_eq!(wrapper.wrapped().calls(), 2);
}

#[test]
fn test_zero_size_cache_decorator_lock() {
    let lock = Arc::new(CountingLock::new());
    let cache = Arc::new(BoundedCache::new(0));
    let wrapper = cached(Arc::clone(&cache))
        .lock(lock.clone())
        .wrap(CountingFn::new());

    assert_eq!(cache.len(), 0);
    assert_eq!(wrapper.call(&call_args![0]).unwrap(), 0);
    assert_eq!(cache.len(), 0);
    assert_eq!(lock.count(), 2);
}

// ============================================================================
// IGNORE PREDICATES
// ============================================================================

fn ignore_negative(v: &i64, _args: &CallArgs) -> bool {
    *v < 0
}

fn ignore_non_positive(v: &i64, _args: &CallArgs) -> bool {
    *v <= 0
}

fn ignore_non_negative(v: &i64, _args: &CallArgs) -> bool {
    *v >= 0
}

#[test]
fn test_conditional_cache_decorator() {
    let cache = Arc::new(BoundedCache::new(5));
    let wrapper = cached(Arc::clone(&cache))
        .ignore(ignore_negative)
        .wrap(identity);

    assert_eq!(cache.len(), 0);

    assert_eq!(wrapper.call(&call_args![-1]).unwrap(), -1);
    assert_eq!(cache.len(), 0);

    assert_eq!(wrapper.call(&call_args![0]).unwrap(), 0);
    assert_eq!(cache.len(), 1);

    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(cache.len(), 2);

    assert_eq!(wrapper.call(&call_args![-1]).unwrap(), -1);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_conditional_cache_decorator_lock() {
    let lock = Arc::new(CountingLock::new());
    let cache = Arc::new(BoundedCache::new(5));
    let wrapper = cached(Arc::clone(&cache))
        .lock(lock.clone())
        .ignore(ignore_negative)
        .wrap(identity);

    assert_eq!(cache.len(), 0);

    assert_eq!(wrapper.call(&call_args![-1]).unwrap(), -1);
    assert_eq!(cache.len(), 0);
    assert_eq!(lock.count(), 1);

    assert_eq!(wrapper.call(&call_args![0]).unwrap(), 0);
    assert_eq!(cache.len(), 1);
    assert_eq!(lock.count(), 3);

    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(cache.len(), 2);
    assert_eq!(lock.count(), 5);

    assert_eq!(wrapper.call(&call_args![-1]).unwrap(), -1);
    assert_eq!(cache.len(), 2);
    assert_eq!(lock.count(), 6);
}

#[test]
fn test_ignore_predicate_sees_arguments() {
    let cache = Arc::new(BoundedCache::new(5));
    let wrapper = cached(Arc::clone(&cache))
        .ignore(|_: &i64, args: &CallArgs| args.get_named("fresh").is_some())
        .wrap(identity);

    assert_eq!(wrapper.call(&call_args![3; fresh = true]).unwrap(), 3);
    assert_eq!(cache.len(), 0);
    assert_eq!(wrapper.call(&call_args![3]).unwrap(), 3);
    assert_eq!(cache.len(), 1);
}

// ============================================================================
// STACKED WRAPPERS
// ============================================================================

#[test]
fn test_conditional_cache_decorators() {
    let cache_positive = Arc::new(BoundedCache::new(5));
    let cache_negative = Arc::new(BoundedCache::new(5));

    let inner = cached(Arc::clone(&cache_positive))
        .ignore(ignore_non_positive)
        .wrap(identity);
    let wrapper = cached(Arc::clone(&cache_negative))
        .ignore(ignore_non_negative)
        .wrap(inner);

    assert_eq!(cache_positive.len(), 0);
    assert_eq!(cache_negative.len(), 0);
    assert!(Arc::ptr_eq(
        wrapper.wrapped().cache().unwrap(),
        &cache_positive
    ));
    assert_eq!((wrapper.wrapped().wrapped())(&call_args![9]).unwrap(), 9);

    assert_eq!(wrapper.call(&call_args![0]).unwrap(), 0);
    assert_eq!(cache_positive.len(), 0);
    assert_eq!(cache_negative.len(), 0);

    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(cache_positive.len(), 1);
    assert_eq!(cache_negative.len(), 0);

    assert_eq!(wrapper.call(&call_args![-1]).unwrap(), -1);
    assert_eq!(cache_positive.len(), 1);
    assert_eq!(cache_negative.len(), 1);

    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(cache_positive.len(), 1);
    assert_eq!(cache_negative.len(), 1);

    assert_eq!(wrapper.call(&call_args![-1]).unwrap(), -1);
    assert_eq!(cache_positive.len(), 1);
    assert_eq!(cache_negative.len(), 1);
}

#[test]
fn test_conditional_cache_decorators_lock() {
    let lock = Arc::new(CountingLock::new());
    let cache_positive = Arc::new(BoundedCache::new(5));
    let cache_negative = Arc::new(BoundedCache::new(5));

    let inner = cached(Arc::clone(&cache_positive))
        .lock(lock.clone())
        .ignore(ignore_non_positive)
        .wrap(identity);
    let wrapper = cached(Arc::clone(&cache_negative))
        .lock(lock.clone())
        .ignore(ignore_non_negative)
        .wrap(inner);

    assert_eq!(wrapper.call(&call_args![0]).unwrap(), 0);
    assert_eq!(cache_positive.len(), 0);
    assert_eq!(cache_negative.len(), 0);
    assert_eq!(lock.count(), 2);

    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(cache_positive.len(), 1);
    assert_eq!(cache_negative.len(), 0);
    assert_eq!(lock.count(), 5);

    assert_eq!(wrapper.call(&call_args![-1]).unwrap(), -1);
    assert_eq!(cache_positive.len(), 1);
    assert_eq!(cache_negative.len(), 1);
    assert_eq!(lock.count(), 8);

    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(cache_positive.len(), 1);
    assert_eq!(cache_negative.len(), 1);
    assert_eq!(lock.count(), 10);

    assert_eq!(wrapper.call(&call_args![-1]).unwrap(), -1);
    assert_eq!(cache_positive.len(), 1);
    assert_eq!(cache_negative.len(), 1);
    assert_eq!(lock.count(), 11);

    assert!(lock.is_balanced());
}

#[test]
fn test_stacked_wrappers_keep_their_own_key_builders() {
    let typed_cache = Arc::new(BoundedCache::new(5));
    let untyped_cache = Arc::new(BoundedCache::new(5));

    let inner = cached(Arc::clone(&typed_cache))
        .key(TypedKey)
        .wrap(identity);
    let wrapper = cached(Arc::clone(&untyped_cache)).wrap(inner);

    wrapper.call(&call_args![1]).unwrap();
    wrapper.call(&call_args![1.0]).unwrap();

    // The outer layer answers 1.0 from its untyped slot; the inner never sees it.
    assert_eq!(untyped_cache.len(), 1);
    assert_eq!(typed_cache.len(), 1);

    wrapper.wrapped().call(&call_args![1.0]).unwrap();
    assert_eq!(typed_cache.len(), 2);
}

// ============================================================================
// NO CACHE
// ============================================================================

#[test]
fn test_no_cache_decorator() {
    let wrapper = Memoize::uncached().wrap(echo);
    assert!(wrapper.cache().is_none());

    for args in [
        call_args![0],
        call_args![1],
        call_args![1; foo = "bar"],
        call_args![; only = "named"],
        call_args![],
    ] {
        assert_eq!(wrapper.call(&args).unwrap(), echo(&args).unwrap());
    }

    let info = wrapper.cache_info();
    assert_eq!(info.hits, 0);
    assert_eq!(info.current_size, 0);
}

#[test]
fn test_no_cache_calls_every_time() {
    let wrapper = Memoize::uncached().wrap(CountingFn::new());
    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 0);
    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert_eq!(wrapper.wrapped().calls(), 2);
}

#[test]
fn test_no_cache_still_rejects_unhashable() {
    let wrapper = Memoize::uncached().wrap(CountingFn::new());
    let err = wrapper.call(&call_args![Arg::list([1, 2])]).unwrap_err();
    assert!(matches!(
        err,
        MemoError::Key(KeyError::UnhashableArgument { .. })
    ));
    assert_eq!(wrapper.wrapped().calls(), 0);
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
enum LookupError {
    #[error("not found: {0}")]
    NotFound(i64),

    #[error(transparent)]
    Memo(#[from] MemoError),
}

#[test]
fn test_callable_error_propagates_verbatim() {
    let cache = Arc::new(BoundedCache::new(4));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let wrapper = cached(Arc::clone(&cache)).wrap(move |args: &CallArgs| {
        counter.fetch_add(1, Ordering::SeqCst);
        match args.get(0).and_then(Arg::as_int) {
            Some(n) if n >= 0 => Ok(n * 10),
            Some(n) => Err(LookupError::NotFound(n)),
            None => Ok(0),
        }
    });

    assert_eq!(wrapper.call(&call_args![-4]), Err(LookupError::NotFound(-4)));
    assert_eq!(wrapper.call(&call_args![-4]), Err(LookupError::NotFound(-4)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.is_empty());

    assert_eq!(wrapper.call(&call_args![4]), Ok(40));
    assert_eq!(cache.len(), 1);

    let err = wrapper.call(&call_args![Arg::list([1])]).unwrap_err();
    assert!(matches!(err, LookupError::Memo(MemoError::Key(_))));
}

#[test]
fn test_lock_failure_skips_everything() {
    let cache = Arc::new(BoundedCache::new(4));
    let wrapper = cached(Arc::clone(&cache))
        .lock(Arc::new(FailingLock::new("lock service down")))
        .wrap(CountingFn::new());

    let err = wrapper.call(&call_args![1]).unwrap_err();
    assert_eq!(
        err,
        MemoError::Lock(LockError::AcquireFailed {
            reason: "lock service down".to_string()
        })
    );
    assert_eq!(wrapper.wrapped().calls(), 0);
    assert!(cache.is_empty());
}

#[test]
fn test_lock_release_failure_reaches_caller() {
    let cache = Arc::new(BoundedCache::new(4));
    let lock = Arc::new(FailingReleaseLock::new("release rejected"));
    let wrapper = cached(Arc::clone(&cache))
        .lock(lock.clone())
        .wrap(CountingFn::new());

    let expected = MemoError::Lock(LockError::ReleaseFailed {
        reason: "release rejected".to_string(),
    });

    // Miss: the lookup scope fails to release, so the function never runs.
    assert_eq!(wrapper.call(&call_args![1]).unwrap_err(), expected);
    assert_eq!(wrapper.wrapped().calls(), 0);
    assert_eq!(lock.count(), 1);

    // Hit: a cached value is not returned past a failed release either.
    cache.set(hashkey(call_args![2]), 20).unwrap();
    assert_eq!(wrapper.call(&call_args![2]).unwrap_err(), expected);
    assert_eq!(lock.count(), 2);
}

#[test]
fn test_strict_store_reports_full_cache() {
    let cache = Arc::new(BoundedCache::new(1));
    let wrapper = cached(Arc::clone(&cache))
        .config(MemoConfig::new().with_name("strict").with_strict_store(true))
        .unwrap()
        .wrap(identity);

    assert_eq!(wrapper.call(&call_args![1]).unwrap(), 1);
    assert!(matches!(
        wrapper.call(&call_args![2]),
        Err(MemoError::Store(_))
    ));
    assert_eq!(wrapper.cache_info().name.as_deref(), Some("strict"));
}

// ============================================================================
// MAINTENANCE
// ============================================================================

#[test]
fn test_method_key_shares_across_receivers() {
    let cache = Arc::new(BoundedCache::new(4));
    let wrapper = cached(Arc::clone(&cache))
        .key(MethodKey(HashKey))
        .wrap(CountingFn::new());

    assert_eq!(wrapper.call(&call_args!["first", 5]).unwrap(), 0);
    assert_eq!(wrapper.call(&call_args!["second", 5]).unwrap(), 0);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_cache_info_tracks_hits_and_misses() {
    let cache = Arc::new(BoundedCache::new(8));
    let wrapper = cached(Arc::clone(&cache)).name("squares").wrap(identity);

    for n in [1, 2, 1, 1, 3] {
        wrapper.call(&call_args![n]).unwrap();
    }

    let info = wrapper.cache_info();
    assert_eq!(info.hits, 2);
    assert_eq!(info.misses, 3);
    assert_eq!(info.current_size, 3);
    assert_eq!(info.max_size, Some(8));
    assert!((info.hit_rate() - 0.4).abs() < 1e-9);

    wrapper.cache_clear().unwrap();
    let cleared = wrapper.cache_info();
    assert_eq!(cleared.hits, 0);
    assert_eq!(cleared.current_size, 0);
}

#[test]
fn test_stats_can_be_disabled() {
    let cache = Arc::new(BoundedCache::new(8));
    let wrapper = cached(Arc::clone(&cache))
        .config(MemoConfig::new().with_stats(false))
        .unwrap()
        .wrap(identity);

    wrapper.call(&call_args![1]).unwrap();
    wrapper.call(&call_args![1]).unwrap();
    let info = wrapper.cache_info();
    assert_eq!(info.hits, 0);
    assert_eq!(info.misses, 0);
    assert_eq!(info.current_size, 1);
}

#[test]
fn test_invalidate_forces_recompute() {
    let cache = Arc::new(BoundedCache::new(4));
    let lock = Arc::new(CountingLock::new());
    let wrapper = cached(Arc::clone(&cache))
        .lock(lock.clone())
        .wrap(CountingFn::new());

    assert_eq!(wrapper.call(&call_args![7]).unwrap(), 0);
    assert_eq!(wrapper.invalidate(&call_args![7.0]).unwrap(), Some(0));
    assert_eq!(lock.count(), 3);
    assert_eq!(wrapper.call(&call_args![7]).unwrap(), 1);
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn prop_second_call_is_a_hit(args in arb_call_args()) {
        let cache = Arc::new(BoundedCache::new(1));
        let wrapper = cached(Arc::clone(&cache)).wrap(CountingFn::new());

        let first = wrapper.call(&args).unwrap();
        let second = wrapper.call(&args).unwrap();

        prop_assert_eq!(first, second);
        prop_assert_eq!(wrapper.wrapped().calls(), 1);
        prop_assert_eq!(cache.len(), 1);
    }

    #[test]
    fn prop_ignore_negative_caches_only_non_negative(values in proptest::collection::vec(-50i64..50, 0..40)) {
        let cache = Arc::new(BoundedCache::new(100));
        let wrapper = cached(Arc::clone(&cache))
            .ignore(ignore_negative)
            .wrap(identity);

        for v in &values {
            prop_assert_eq!(wrapper.call(&call_args![*v]).unwrap(), *v);
        }

        let mut distinct: Vec<i64> = values.iter().copied().filter(|v| *v >= 0).collect();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(cache.len(), distinct.len());
    }

    #[test]
    fn prop_stacked_partition(values in proptest::collection::vec(-20i64..20, 0..40)) {
        let cache_positive = Arc::new(BoundedCache::new(100));
        let cache_negative = Arc::new(BoundedCache::new(100));
        let inner = cached(Arc::clone(&cache_positive))
            .ignore(ignore_non_positive)
            .wrap(identity);
        let wrapper = cached(Arc::clone(&cache_negative))
            .ignore(ignore_non_negative)
            .wrap(inner);

        for v in &values {
            prop_assert_eq!(wrapper.call(&call_args![*v]).unwrap(), *v);
        }

        for v in &values {
            let key = hashkey(call_args![*v]);
            let in_positive = cache_positive.contains(&key);
            let in_negative = cache_negative.contains(&key);
            prop_assert!(!(in_positive && in_negative));
            prop_assert_eq!(in_positive, *v > 0);
            prop_assert_eq!(in_negative, *v < 0);
        }
    }
}
