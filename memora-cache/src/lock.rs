//! Caller-supplied mutual exclusion around cache accesses.
//!
//! A [`CacheLock`] has enter/exit semantics. The wrapper never calls them
//! directly: it takes a [`LockScope`] around each cache access and releases it
//! explicitly, so errors from either side reach the caller. The wrapped
//! function always runs outside any scope.
//!
//! # Sharing a lock between stacked wrappers
//!
//! When an outer wrapper and an inner wrapper share one lock, the same thread
//! may enter it again while a scope is still open further up the stack. Use
//! [`ReentrantLock`] for that.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use memora_core::LockError;
use parking_lot::lock_api::RawReentrantMutex;
use parking_lot::{RawMutex, RawThreadId};

/// Scoped-acquisition capability.
pub trait CacheLock: Send + Sync {
    /// Acquire. Errors propagate to the wrapper's caller.
    fn enter(&self) -> Result<(), LockError>;

    /// Release one acquisition. Errors propagate to the wrapper's caller.
    fn exit(&self) -> Result<(), LockError>;
}

/// Guard holding one acquisition of a [`CacheLock`].
///
/// Call [`LockScope::release`] to observe release errors. A scope that is
/// dropped instead, as on unwind, still exits and logs any failure.
#[must_use = "the lock is released as soon as the scope is dropped"]
pub struct LockScope<'a> {
    lock: Option<&'a dyn CacheLock>,
}

impl<'a> LockScope<'a> {
    pub fn acquire(lock: &'a dyn CacheLock) -> Result<Self, LockError> {
        lock.enter()?;
        Ok(Self { lock: Some(lock) })
    }

    /// Exit now, returning the lock's release error if any.
    pub fn release(mut self) -> Result<(), LockError> {
        match self.lock.take() {
            Some(lock) => lock.exit(),
            None => Ok(()),
        }
    }
}

impl Drop for LockScope<'_> {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            if let Err(err) = lock.exit() {
                tracing::warn!(error = %err, "Lock release failed while dropping scope");
            }
        }
    }
}

impl fmt::Debug for LockScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockScope")
            .field("held", &self.lock.is_some())
            .finish()
    }
}

/// Stand-in used when no lock is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLock;

impl CacheLock for NoLock {
    fn enter(&self) -> Result<(), LockError> {
        Ok(())
    }

    fn exit(&self) -> Result<(), LockError> {
        Ok(())
    }
}

/// Recursive mutex: the owning thread may enter again without blocking.
///
/// Other threads block in [`CacheLock::enter`] until the owner has exited as
/// many times as it entered. Exiting from a thread that does not own the lock
/// fails with [`LockError::ReleaseFailed`].
pub struct ReentrantLock {
    raw: RawReentrantMutex<RawMutex, RawThreadId>,
    // Written only by the owning thread.
    depth: AtomicUsize,
}

impl ReentrantLock {
    pub fn new() -> Self {
        Self {
            raw: RawReentrantMutex::INIT,
            depth: AtomicUsize::new(0),
        }
    }

    /// Whether any thread currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Current thread's recursion depth (0 when it does not own the lock).
    pub fn depth(&self) -> usize {
        if self.raw.is_owned_by_current_thread() {
            self.depth.load(Ordering::Relaxed)
        } else {
            0
        }
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl CacheLock for ReentrantLock {
    fn enter(&self) -> Result<(), LockError> {
        self.raw.lock();
        self.depth.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn exit(&self) -> Result<(), LockError> {
        if !self.raw.is_owned_by_current_thread() {
            return Err(LockError::ReleaseFailed {
                reason: "calling thread does not own the lock".to_string(),
            });
        }
        self.depth.fetch_sub(1, Ordering::Relaxed);
        // SAFETY: the current thread owns the lock, checked above.
        unsafe { self.raw.unlock() };
        Ok(())
    }
}
