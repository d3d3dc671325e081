//! Canonical JSON for hash inputs.
//!
//! Two parties that build a proposal from the same listing must arrive at the
//! same bytes, so hash inputs are never produced by a general serializer.
//! Instead every hashed object has a fixed field schema and is written as:
//!
//! - Compact: `,` and `:` separators, no other whitespace.
//! - Keys in schema order (not sorted, not insertion order).
//! - Strings escaped to pure ASCII: `\"`, `\\`, `\n`, `\r`, `\t`, `\b`, `\f`,
//!   and `\uXXXX` (lowercase hex, UTF-16 surrogate pairs above the BMP) for
//!   every other character outside printable ASCII.
//! - Integers in plain decimal.
//!
//! A schema field that was never set, or was set to an empty string, makes the
//! object unhashable. Callers get a [`GuardError::Protocol`] instead of a hash
//! over a partial structure.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use crate::error::{GuardError, Result};

/// A scalar value inside a canonical object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalValue {
    Str(String),
    Int(i64),
}

impl From<&str> for CanonicalValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for CanonicalValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for CanonicalValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for CanonicalValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

/// A flat JSON object with a fixed key order.
///
/// ```
/// use listguard_core::canonical::CanonicalFields;
///
/// let json = CanonicalFields::new(&["b", "a"])
///     .set("a", 1_i64)
///     .set("b", "x")
///     .to_json()
///     .unwrap();
/// assert_eq!(json, r#"{"b":"x","a":1}"#);
/// ```
#[derive(Debug, Clone)]
pub struct CanonicalFields {
    schema: &'static [&'static str],
    values: Vec<Option<CanonicalValue>>,
    unknown: Vec<String>,
}

impl CanonicalFields {
    #[must_use]
    pub fn new(schema: &'static [&'static str]) -> Self {
        Self {
            schema,
            values: vec![None; schema.len()],
            unknown: Vec::new(),
        }
    }

    /// Set a schema field. Keys outside the schema are recorded and rejected
    /// when the object is rendered.
    #[must_use]
    pub fn set(mut self, key: &str, value: impl Into<CanonicalValue>) -> Self {
        match self.schema.iter().position(|k| *k == key) {
            Some(idx) => self.values[idx] = Some(value.into()),
            None => self.unknown.push(key.to_string()),
        }
        self
    }

    /// Render the canonical JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Protocol`] if a schema field is missing or empty,
    /// or if a key outside the schema was set.
    pub fn to_json(&self) -> Result<String> {
        if let Some(key) = self.unknown.first() {
            return Err(GuardError::Protocol(format!(
                "field `{key}` is not part of the canonical schema"
            )));
        }

        let mut buf = String::from("{");
        for (i, (key, value)) in self.schema.iter().zip(&self.values).enumerate() {
            let value = match value {
                Some(CanonicalValue::Str(s)) if s.is_empty() => None,
                other => other.as_ref(),
            }
            .ok_or_else(|| GuardError::Protocol(format!("required field `{key}` is missing")))?;

            if i > 0 {
                buf.push(',');
            }
            write_ascii_string(key, &mut buf);
            buf.push(':');
            match value {
                CanonicalValue::Str(s) => write_ascii_string(s, &mut buf),
                CanonicalValue::Int(n) => {
                    let _ = write!(buf, "{n}");
                }
            }
        }
        buf.push('}');
        Ok(buf)
    }

    /// SHA-256 hex digest of [`to_json`](Self::to_json).
    ///
    /// # Errors
    ///
    /// Same as [`to_json`](Self::to_json).
    pub fn hash(&self) -> Result<String> {
        Ok(sha256_hex(self.to_json()?.as_bytes()))
    }
}

/// Lowercase hex SHA-256 digest.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Append `s` as a quoted JSON string using ASCII-only escaping.
pub fn write_ascii_string(s: &str, buf: &mut String) {
    buf.push('"');
    for ch in s.chars() {
        match ch {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            '\u{08}' => buf.push_str("\\b"),
            '\u{0c}' => buf.push_str("\\f"),
            ' '..='~' => buf.push(ch),
            _ => {
                let mut units = [0_u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    let _ = write!(buf, "\\u{unit:04x}");
                }
            }
        }
    }
    buf.push('"');
}
