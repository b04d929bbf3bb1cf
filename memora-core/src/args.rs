//! Call arguments as seen by a key builder.
//!
//! A call is captured as an ordered list of positional [`Arg`] values plus a
//! name -> value map. Named arguments live in a `BTreeMap`, so their order is
//! canonical no matter how the call site listed them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// ARGUMENT VALUES
// ============================================================================

/// A single argument value.
///
/// `List` and `Map` model mutable containers: they can be passed to a
/// wrapped function but cannot take part in a cache key.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<Arg>),
    List(Vec<Arg>),
    Map(BTreeMap<String, Arg>),
}

impl Arg {
    /// Build a tuple argument from anything convertible to arguments.
    pub fn tuple<I, A>(items: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Arg::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Build a list argument (unhashable).
    pub fn list<I, A>(items: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Arg::List(items.into_iter().map(Into::into).collect())
    }

    /// Runtime type of this argument.
    pub fn arg_type(&self) -> ArgType {
        match self {
            Arg::None => ArgType::None,
            Arg::Bool(_) => ArgType::Bool,
            Arg::Int(_) => ArgType::Int,
            Arg::Float(_) => ArgType::Float,
            Arg::Str(_) => ArgType::Str,
            Arg::Bytes(_) => ArgType::Bytes,
            Arg::Tuple(_) => ArgType::Tuple,
            Arg::List(_) => ArgType::List,
            Arg::Map(_) => ArgType::Map,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Int(v) => Some(*v),
            Arg::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<()> for Arg {
    fn from(_: ()) -> Self {
        Arg::None
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Arg {
                fn from(v: $t) -> Self {
                    Arg::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

/// Integers wider than `i64` keep their value as a float when out of range.
macro_rules! impl_from_wide_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Arg {
                fn from(v: $t) -> Self {
                    match i64::try_from(v) {
                        Ok(n) => Arg::Int(n),
                        Err(_) => Arg::Float(v as f64),
                    }
                }
            }
        )*
    };
}

impl_from_wide_int!(u64, usize, isize, i128, u128);

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Arg::Float(f64::from(v))
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Str(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Str(v)
    }
}

impl From<&[u8]> for Arg {
    fn from(v: &[u8]) -> Self {
        Arg::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Arg {
    fn from(v: Vec<u8>) -> Self {
        Arg::Bytes(v)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Arg::None)
    }
}

/// JSON arrays become tuples (hashable); JSON objects become maps, which
/// cannot be keyed. Integers beyond `i64` fall back to floats.
impl From<serde_json::Value> for Arg {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Arg::None,
            Value::Bool(b) => Arg::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Arg::Int(i),
                None => Arg::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Arg::Str(s),
            Value::Array(items) => Arg::Tuple(items.into_iter().map(Arg::from).collect()),
            Value::Object(map) => {
                Arg::Map(map.into_iter().map(|(k, v)| (k, Arg::from(v))).collect())
            }
        }
    }
}

// ============================================================================
// ARGUMENT TYPES AND POSITIONS
// ============================================================================

/// Type discriminator carried by typed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    None,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    Tuple,
    List,
    Map,
}

impl ArgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgType::None => "none",
            ArgType::Bool => "bool",
            ArgType::Int => "int",
            ArgType::Float => "float",
            ArgType::Str => "str",
            ArgType::Bytes => "bytes",
            ArgType::Tuple => "tuple",
            ArgType::List => "list",
            ArgType::Map => "map",
        }
    }

    /// Single-byte tag used in the canonical key encoding.
    pub(crate) fn tag(&self) -> u8 {
        match self {
            ArgType::None => 0,
            ArgType::Bool => 1,
            ArgType::Int => 2,
            ArgType::Float => 3,
            ArgType::Str => 4,
            ArgType::Bytes => 5,
            ArgType::Tuple => 6,
            ArgType::List => 7,
            ArgType::Map => 8,
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an argument sits in a call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgPosition {
    Positional(usize),
    Named(String),
}

impl fmt::Display for ArgPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgPosition::Positional(index) => write!(f, "position {}", index),
            ArgPosition::Named(name) => write!(f, "argument '{}'", name),
        }
    }
}

// ============================================================================
// CALL ARGUMENTS
// ============================================================================

/// The full argument list of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Arg>,
    named: BTreeMap<String, Arg>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from positional arguments only.
    pub fn from_positional<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Self {
            positional: args.into_iter().map(Into::into).collect(),
            named: BTreeMap::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Arg>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a named argument, replacing any previous value for `name`.
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn positional(&self) -> &[Arg] {
        &self.positional
    }

    /// Named arguments in canonical (sorted by name) order.
    pub fn named_args(&self) -> impl Iterator<Item = (&str, &Arg)> {
        self.named.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.positional.get(index)
    }

    pub fn get_named(&self, name: &str) -> Option<&Arg> {
        self.named.get(name)
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// A copy of these arguments without the first positional one.
    pub fn without_receiver(&self) -> Self {
        Self {
            positional: self.positional.iter().skip(1).cloned().collect(),
            named: self.named.clone(),
        }
    }
}

/// Build [`CallArgs`]: positional values first, then `; name = value` pairs.
///
/// ```
/// use memora_core::call_args;
///
/// let args = call_args![1, "two"; scale = 2.5];
/// assert_eq!(args.positional().len(), 2);
/// assert!(args.get_named("scale").is_some());
/// ```
#[macro_export]
macro_rules! call_args {
    ($($arg:expr),* $(,)? $(; $($name:ident = $value:expr),* $(,)?)?) => {{
        #[allow(unused_mut)]
        let mut args = $crate::CallArgs::new();
        $( args = args.arg($arg); )*
        $($( args = args.named(stringify!($name), $value); )*)?
        args
    }};
}
