//! Fuzz test for key construction.
//!
//! Feeds arbitrary JSON documents through argument conversion and both key
//! builders, checking that:
//! - Building never panics
//! - Keys and fingerprints are deterministic
//! - Untyped and typed keys agree on success and on value parts
//!
//! Run with: cargo +nightly fuzz run key_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use memora_core::{Arg, CallArgs, HashKey, KeyBuilder, MethodKey, TypedKey};

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    // Top-level arrays spread into positional arguments, objects into named ones.
    let args = match value {
        serde_json::Value::Array(items) => CallArgs::from_positional(items.into_iter().map(Arg::from)),
        serde_json::Value::Object(fields) => fields
            .into_iter()
            .fold(CallArgs::new(), |args, (name, v)| args.named(name, Arg::from(v))),
        other => CallArgs::new().arg(Arg::from(other)),
    };

    let plain = HashKey.build(&args);
    let typed = TypedKey.build(&args);
    assert_eq!(plain.is_ok(), typed.is_ok(), "builders disagree on hashability");

    if let (Ok(plain), Ok(typed)) = (plain, typed) {
        assert_eq!(plain, HashKey.build(&args).expect("rebuild"));
        assert_eq!(plain.fingerprint(), HashKey.build(&args).expect("rebuild").fingerprint());
        assert_eq!(plain.parts(), typed.parts());
        if !args.is_empty() {
            assert_ne!(plain.fingerprint(), typed.fingerprint(), "typed key collides with plain");
        }
        let _ = MethodKey(TypedKey).build(&args);
    }
});
