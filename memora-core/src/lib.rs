//! Memora Core - Keys and Errors
//!
//! Pure data types shared by the memoization layer: call arguments, cache
//! keys and the builders that derive them, configuration, and errors.
//! Nothing here touches a cache or a lock.

mod args;
mod config;
mod error;
mod key;

pub use args::{Arg, ArgPosition, ArgType, CallArgs};
pub use config::MemoConfig;
pub use error::{ConfigError, KeyError, LockError, MemoError, MemoResult, StoreError};
pub use key::{HashKey, Key, KeyBuilder, KeyFingerprint, KeyPart, KeyParts, MethodKey, TypedKey};
