//! Cache keys and the builders that derive them from call arguments.
//!
//! A [`Key`] is a pure value: two calls that are equal under a builder's rules
//! produce keys that compare equal and hash identically. Keys come in two
//! shapes:
//!
//! - [`Key::Plain`]: argument values only ([`HashKey`]).
//! - [`Key::Typed`]: argument values plus the [`ArgType`] of every argument
//!   ([`TypedKey`]).
//!
//! Numbers are normalized before they enter a key, so `Int(1)` and
//! `Float(1.0)` become the same [`KeyPart`]. Only the typed discriminator
//! tells them apart.

use crate::{Arg, ArgPosition, ArgType, CallArgs, KeyError};
use std::fmt;

/// Separator byte between the positional, named and type sections of the
/// canonical encoding.
const SECTION: u8 = 0xFF;

/// `i64::MIN as f64` is exactly -2^63; `i64::MAX as f64` rounds up to 2^63.
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

// ============================================================================
// KEY PARTS
// ============================================================================

/// One normalized, hashable argument value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    None,
    Bool(bool),
    Int(i64),
    /// Non-integral (or out of `i64` range) float, stored by bit pattern.
    Float(u64),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<KeyPart>),
}

impl KeyPart {
    /// Normalize an argument. Fails for mutable containers and NaN.
    pub fn from_arg(arg: &Arg, position: &ArgPosition) -> Result<Self, KeyError> {
        match arg {
            Arg::None => Ok(KeyPart::None),
            Arg::Bool(b) => Ok(KeyPart::Bool(*b)),
            Arg::Int(i) => Ok(KeyPart::Int(*i)),
            Arg::Float(f) => normalize_float(*f, position),
            Arg::Str(s) => Ok(KeyPart::Str(s.clone())),
            Arg::Bytes(b) => Ok(KeyPart::Bytes(b.clone())),
            Arg::Tuple(items) => items
                .iter()
                .map(|item| KeyPart::from_arg(item, position))
                .collect::<Result<Vec<_>, _>>()
                .map(KeyPart::Tuple),
            Arg::List(_) | Arg::Map(_) => Err(KeyError::UnhashableArgument {
                position: position.clone(),
                arg_type: arg.arg_type(),
                reason: "mutable container".to_string(),
            }),
        }
    }

    fn encode_into(&self, hasher: &mut blake3::Hasher) {
        match self {
            KeyPart::None => {
                hasher.update(&[0]);
            }
            KeyPart::Bool(b) => {
                hasher.update(&[1, *b as u8]);
            }
            KeyPart::Int(i) => {
                hasher.update(&[2]);
                hasher.update(&i.to_be_bytes());
            }
            KeyPart::Float(bits) => {
                hasher.update(&[3]);
                hasher.update(&bits.to_be_bytes());
            }
            KeyPart::Str(s) => {
                hasher.update(&[4]);
                encode_len_prefixed(hasher, s.as_bytes());
            }
            KeyPart::Bytes(b) => {
                hasher.update(&[5]);
                encode_len_prefixed(hasher, b);
            }
            KeyPart::Tuple(items) => {
                hasher.update(&[6]);
                hasher.update(&(items.len() as u64).to_be_bytes());
                for item in items {
                    item.encode_into(hasher);
                }
            }
        }
    }
}

fn normalize_float(value: f64, position: &ArgPosition) -> Result<KeyPart, KeyError> {
    if value.is_nan() {
        return Err(KeyError::UnhashableArgument {
            position: position.clone(),
            arg_type: ArgType::Float,
            reason: "NaN is not equal to itself".to_string(),
        });
    }
    if value.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(&value) {
        // Also folds -0.0 into 0.
        Ok(KeyPart::Int(value as i64))
    } else {
        Ok(KeyPart::Float(value.to_bits()))
    }
}

fn encode_len_prefixed(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// The value portion of a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyParts {
    positional: Vec<KeyPart>,
    named: Vec<(String, KeyPart)>,
}

impl KeyParts {
    pub const EMPTY: KeyParts = KeyParts {
        positional: Vec::new(),
        named: Vec::new(),
    };

    /// Normalize every argument of a call.
    pub fn from_call(args: &CallArgs) -> Result<Self, KeyError> {
        let positional = args
            .positional()
            .iter()
            .enumerate()
            .map(|(index, arg)| KeyPart::from_arg(arg, &ArgPosition::Positional(index)))
            .collect::<Result<Vec<_>, _>>()?;

        let named = args
            .named_args()
            .map(|(name, arg)| {
                KeyPart::from_arg(arg, &ArgPosition::Named(name.to_string()))
                    .map(|part| (name.to_string(), part))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { positional, named })
    }

    pub fn positional(&self) -> &[KeyPart] {
        &self.positional
    }

    pub fn named(&self) -> &[(String, KeyPart)] {
        &self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

// ============================================================================
// KEY
// ============================================================================

/// A cache key for one logical call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Value-only key.
    Plain(KeyParts),
    /// Value key followed by the type of each participating argument.
    Typed(KeyParts, Vec<ArgType>),
}

impl Key {
    /// The key shared by every zero-argument call, whatever the builder.
    pub const EMPTY: Key = Key::Plain(KeyParts::EMPTY);

    pub fn parts(&self) -> &KeyParts {
        match self {
            Key::Plain(parts) | Key::Typed(parts, _) => parts,
        }
    }

    /// Type discriminators, for typed keys.
    pub fn types(&self) -> Option<&[ArgType]> {
        match self {
            Key::Plain(_) => None,
            Key::Typed(_, types) => Some(types),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Key::EMPTY
    }

    /// Stable BLAKE3 digest of the key's canonical encoding.
    ///
    /// Unlike `Hash`, the digest does not depend on the hasher or the process,
    /// so it can be logged and compared across runs.
    pub fn fingerprint(&self) -> KeyFingerprint {
        let mut hasher = blake3::Hasher::new();
        let parts = self.parts();

        hasher.update(&(parts.positional.len() as u64).to_be_bytes());
        for part in &parts.positional {
            part.encode_into(&mut hasher);
        }

        hasher.update(&[SECTION]);
        hasher.update(&(parts.named.len() as u64).to_be_bytes());
        for (name, part) in &parts.named {
            encode_len_prefixed(&mut hasher, name.as_bytes());
            part.encode_into(&mut hasher);
        }

        if let Some(types) = self.types() {
            hasher.update(&[SECTION]);
            let tags: Vec<u8> = types.iter().map(ArgType::tag).collect();
            encode_len_prefixed(&mut hasher, &tags);
        }

        KeyFingerprint(*hasher.finalize().as_bytes())
    }
}

/// 32-byte BLAKE3 digest of a [`Key`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyFingerprint([u8; 32]);

impl KeyFingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Displays the first 8 bytes, which is plenty to tell keys apart in logs.
impl fmt::Display for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyFingerprint({})", self.to_hex())
    }
}

// ============================================================================
// KEY BUILDERS
// ============================================================================

/// Maps a call's arguments to a [`Key`].
///
/// Implementations must be pure and deterministic. Any
/// `Fn(&CallArgs) -> Result<Key, KeyError>` is a key builder.
pub trait KeyBuilder {
    fn build(&self, args: &CallArgs) -> Result<Key, KeyError>;
}

impl<F> KeyBuilder for F
where
    F: Fn(&CallArgs) -> Result<Key, KeyError>,
{
    fn build(&self, args: &CallArgs) -> Result<Key, KeyError> {
        self(args)
    }
}

/// Untyped key builder: `1` and `1.0` share a key.
///
/// Only integral floats fold into integers. Booleans keep their own variant,
/// so `true` and `1` produce different keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashKey;

impl KeyBuilder for HashKey {
    fn build(&self, args: &CallArgs) -> Result<Key, KeyError> {
        if args.is_empty() {
            return Ok(Key::EMPTY);
        }
        Ok(Key::Plain(KeyParts::from_call(args)?))
    }
}

/// Typed key builder: `1` and `1.0` get distinct keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypedKey;

impl KeyBuilder for TypedKey {
    fn build(&self, args: &CallArgs) -> Result<Key, KeyError> {
        if args.is_empty() {
            return Ok(Key::EMPTY);
        }
        let parts = KeyParts::from_call(args)?;
        let types = args
            .positional()
            .iter()
            .chain(args.named_args().map(|(_, arg)| arg))
            .map(Arg::arg_type)
            .collect();
        Ok(Key::Typed(parts, types))
    }
}

/// Drops the leading receiver argument, then delegates to `K`.
///
/// Lets every instance of a type share one cache for a method, keyed by the
/// remaining arguments only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodKey<K = HashKey>(pub K);

impl<K: KeyBuilder> KeyBuilder for MethodKey<K> {
    fn build(&self, args: &CallArgs) -> Result<Key, KeyError> {
        self.0.build(&args.without_receiver())
    }
}
