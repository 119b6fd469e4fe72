//! Claim sets and their canonical serialization.
//!
//! Two callers holding the same claim set must always hash the same bytes.
//! The canonical form is JSON with keys sorted, `", "` between entries,
//! `": "` between key and value, and every string escaped to printable ASCII:
//!
//! ```text
//! {"identity": "42", "service_name": "billing"}
//! ```

use serde::Serializer as _;
use serde_json::ser::Formatter;
use std::collections::BTreeMap;
use std::io;

pub const IDENTITY: &str = "identity";
pub const SERVICE_NAME: &str = "service_name";
pub const TIMESTAMP: &str = "timestamp";
pub const VALID_UNTIL: &str = "valid_until";
pub const NONCE: &str = "nonce";

/// Key-sorted map of claim name to raw claim value.
///
/// Values are kept exactly as transmitted; conversion (identity types,
/// date-times) happens in validation and never feeds back into the hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims(BTreeMap<String, String>);

impl Claims {
    /// Minimal claim set: `identity` and `service_name`.
    pub fn new(identity: impl Into<String>, service_name: impl Into<String>) -> Self {
        let mut claims = Self::default();
        claims.insert(IDENTITY, identity);
        claims.insert(SERVICE_NAME, service_name);
        claims
    }

    pub fn timestamp(self, value: impl Into<String>) -> Self {
        self.with(TIMESTAMP, value)
    }

    pub fn valid_until(self, value: impl Into<String>) -> Self {
        self.with(VALID_UNTIL, value)
    }

    pub fn nonce(self, value: impl Into<String>) -> Self {
        self.with(NONCE, value)
    }

    /// Add a caller-defined extension claim.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn identity(&self) -> Option<&str> {
        self.get(IDENTITY)
    }

    pub fn service_name(&self) -> Option<&str> {
        self.get(SERVICE_NAME)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Canonical bytes hashed into a CAT.
    pub fn canonical_json(&self) -> String {
        canonical_json(self.iter())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Claims {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Serialize already key-sorted string pairs in canonical form.
pub fn canonical_json<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = Vec::with_capacity(128);
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, CanonicalFormatter);
    (&mut serializer)
        .collect_map(entries)
        .expect("string pairs always serialize into a Vec");
    // The formatter only emits printable ASCII.
    String::from_utf8_lossy(&out).into_owned()
}

/// Compact JSON with spaced separators and every non-printable-ASCII
/// character written as a `\uXXXX` escape.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.bytes().all(|b| (b' '..=b'~').contains(&b)) {
            return writer.write_all(fragment.as_bytes());
        }
        for c in fragment.chars() {
            if (' '..='~').contains(&c) {
                writer.write_all(&[c as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}
