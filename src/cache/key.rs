//! Key Codec Module
//!
//! Derives stable lookup keys from caller input. Non-string input is
//! stringified as JSON first; the result is passed through a deterministic,
//! non-cryptographic string hash. Collisions are tolerated.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CacheError, Result};

// == Key Hasher ==
/// A pure `string -> string` hash used to derive lookup keys.
pub trait KeyHasher: Send + Sync {
    fn hash(&self, input: &str) -> String;
}

impl<F> KeyHasher for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn hash(&self, input: &str) -> String {
        self(input)
    }
}

// == String Hasher ==
/// 32-bit shift-and-add hash over UTF-16 code units, rendered in signed
/// radix 32.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringHasher;

impl KeyHasher for StringHasher {
    fn hash(&self, input: &str) -> String {
        let hash = input.encode_utf16().fold(0i32, |acc, unit| {
            acc.wrapping_shl(5)
                .wrapping_sub(acc)
                .wrapping_add(acc.wrapping_mul(24))
                .wrapping_add(i32::from(unit))
        });
        to_radix_32(hash)
    }
}

fn to_radix_32(value: i32) -> String {
    const DIGITS: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

    let mut magnitude = i64::from(value).unsigned_abs();
    if magnitude == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while magnitude > 0 {
        out.push(DIGITS[(magnitude % 32) as usize]);
        magnitude /= 32;
    }
    if value < 0 {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

// == Stringify ==
/// Converts any serializable input to the string that gets hashed.
///
/// Strings pass through unchanged, absent input (`None`, `()`) becomes the
/// empty string, everything else is rendered as compact JSON.
pub fn stringify<T: Serialize + ?Sized>(input: &T) -> Result<String> {
    let value = serde_json::to_value(input).map_err(CacheError::KeyEncoding)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// == Key Codec ==
/// Turns caller keys into lookup keys.
#[derive(Clone)]
pub struct KeyCodec {
    hasher: Arc<dyn KeyHasher>,
}

impl KeyCodec {
    pub fn new(hasher: Arc<dyn KeyHasher>) -> Self {
        Self { hasher }
    }

    /// Derives the lookup key for a string key.
    pub fn derive(&self, input: &str) -> String {
        self.hasher.hash(input)
    }

    /// Returns `key` unchanged when the caller asserts it is already hashed,
    /// otherwise derives it.
    pub fn resolve(&self, key: &str, is_hashed: bool) -> String {
        if is_hashed {
            key.to_string()
        } else {
            self.derive(key)
        }
    }

    /// Derives the lookup key for any serializable input.
    pub fn derive_value<T: Serialize + ?Sized>(&self, input: &T) -> Result<String> {
        Ok(self.derive(&stringify(input)?))
    }
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new(Arc::new(StringHasher))
    }
}

impl fmt::Debug for KeyCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCodec").finish_non_exhaustive()
    }
}
