//! Memora Cache - Memoizing Wrapper
//!
//! Wraps a function so repeated calls with equal arguments are answered from
//! a cache:
//!
//! - [`cached`] / [`Memoize`]: configure cache, key builder, lock and ignore
//!   predicate, then [`Memoize::wrap`] a function.
//! - [`Cached`]: the resulting wrapper. It is itself [`Callable`], so
//!   wrappers stack.
//! - [`Cache`]: the mapping contract a cache must satisfy.
//! - [`CacheLock`]: optional caller-supplied mutual exclusion around cache
//!   accesses.

pub mod cache;
pub mod cached;
pub mod lock;

pub use cache::{BoundedCache, Cache, CacheInfo, CallStats, SizeFn, UnboundedCache};
pub use cached::{cached, Cached, Callable, IgnoreFn, Memoize, NoCache};
pub use lock::{CacheLock, LockScope, NoLock, ReentrantLock};

pub use memora_core::{
    call_args, Arg, ArgType, CallArgs, HashKey, Key, KeyBuilder, KeyError, LockError, MemoConfig,
    MemoError, MemoResult, MethodKey, StoreError, TypedKey,
};
