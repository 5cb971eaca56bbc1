//! Values resolved from a blittable document.

use crate::comparator::compare_encoded;
use crate::compression::Lz4Codec;
use crate::error::{BlittableError, BlittableResult};
use crate::reader::{BlittableArray, BlittableObject};
use crate::tag::ValueKind;
use serde_json::{Number, Value as JsonValue};
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A value read from a document.
///
/// Objects and arrays are views into the document; scalars are decoded.
/// Strings stay encoded until asked for.
#[derive(Debug, Clone)]
pub enum BlittableValue<'a> {
    /// A nested object.
    Object(Arc<BlittableObject<'a>>),
    /// A nested array.
    Array(Arc<BlittableArray<'a>>),
    /// An integer.
    Integer(i64),
    /// A float.
    Float(f64),
    /// A string, decoded on demand.
    String(LazyString<'a>),
    /// A boolean.
    Boolean(bool),
    /// `null`
    Null,
}

impl<'a> BlittableValue<'a> {
    /// Returns the kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Object(_) => ValueKind::StartObject,
            Self::Array(_) => ValueKind::StartArray,
            Self::Integer(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Float,
            Self::String(s) if s.is_compressed() => ValueKind::CompressedString,
            Self::String(_) => ValueKind::String,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Null => ValueKind::Null,
        }
    }

    /// Returns the object, if this is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&BlittableObject<'a>> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the array, if this is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&BlittableArray<'a>> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the number as a float, for floats and integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string handle, if this is a string.
    #[must_use]
    pub fn as_string(&self) -> Option<&LazyString<'a>> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns true for `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Materializes this value and everything below it.
    ///
    /// Non-finite floats become `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed below this value.
    pub fn to_json(&self) -> BlittableResult<JsonValue> {
        self.to_json_at(0)
    }

    pub(crate) fn to_json_at(&self, depth: usize) -> BlittableResult<JsonValue> {
        Ok(match self {
            Self::Object(object) => object.to_json_at(depth + 1)?,
            Self::Array(array) => array.to_json_at(depth + 1)?,
            Self::Integer(value) => JsonValue::from(*value),
            Self::Float(value) => Number::from_f64(*value).map_or(JsonValue::Null, JsonValue::Number),
            Self::String(value) => JsonValue::String(value.materialize()?),
            Self::Boolean(value) => JsonValue::Bool(*value),
            Self::Null => JsonValue::Null,
        })
    }
}

#[derive(Clone, Copy)]
enum Encoded<'a> {
    Raw(&'a [u8]),
    Compressed {
        data: &'a [u8],
        uncompressed_len: usize,
        codec: Lz4Codec,
    },
}

/// A string that has not been decoded yet.
///
/// Plain strings borrow their UTF-8 bytes straight from the document and
/// compare without allocating. Compressed strings are decompressed once, on
/// first use, and the result is kept.
#[derive(Clone)]
pub struct LazyString<'a> {
    encoded: Encoded<'a>,
    position: usize,
    decompressed: OnceLock<String>,
}

impl<'a> LazyString<'a> {
    pub(crate) fn raw(bytes: &'a [u8], position: usize) -> Self {
        Self {
            encoded: Encoded::Raw(bytes),
            position,
            decompressed: OnceLock::new(),
        }
    }

    pub(crate) fn compressed(
        data: &'a [u8],
        uncompressed_len: usize,
        codec: Lz4Codec,
        position: usize,
    ) -> Self {
        Self {
            encoded: Encoded::Compressed {
                data,
                uncompressed_len,
                codec,
            },
            position,
            decompressed: OnceLock::new(),
        }
    }

    /// Returns true if the string is stored LZ4-compressed.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        matches!(self.encoded, Encoded::Compressed { .. })
    }

    /// Returns the length of the UTF-8 string in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        match self.encoded {
            Encoded::Raw(bytes) => bytes.len(),
            Encoded::Compressed {
                uncompressed_len, ..
            } => uncompressed_len,
        }
    }

    /// Returns the string, decoding it on first use.
    ///
    /// This is the cached accessor. A plain string is borrowed from the
    /// document on every call, and a compressed one is decompressed once
    /// into storage owned by this handle.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidUtf8`] for invalid UTF-8 and a
    /// decompression error for a corrupt compressed payload.
    pub fn as_str(&self) -> BlittableResult<&str> {
        match self.encoded {
            Encoded::Raw(bytes) => std::str::from_utf8(bytes).map_err(|_| self.invalid_utf8()),
            Encoded::Compressed {
                data,
                uncompressed_len,
                codec,
            } => {
                if let Some(text) = self.decompressed.get() {
                    return Ok(text);
                }
                let bytes = codec.decompress(data, uncompressed_len)?;
                let text = String::from_utf8(bytes).map_err(|_| self.invalid_utf8())?;
                Ok(self.decompressed.get_or_init(|| text))
            }
        }
    }

    /// Returns an owned copy of [`LazyString::as_str`].
    ///
    /// Each call allocates; the decoded text itself is only produced once.
    ///
    /// # Errors
    ///
    /// Same as [`LazyString::as_str`].
    pub fn materialize(&self) -> BlittableResult<String> {
        self.as_str().map(str::to_owned)
    }

    /// Orders this string against `other` by UTF-8 bytes.
    ///
    /// Plain strings compare in place without allocating.
    ///
    /// # Errors
    ///
    /// Returns an error if a compressed payload cannot be decoded.
    pub fn compare_to(&self, other: &str) -> BlittableResult<Ordering> {
        let bytes = match self.encoded {
            Encoded::Raw(bytes) => bytes,
            Encoded::Compressed { .. } => self.as_str()?.as_bytes(),
        };
        Ok(compare_encoded(bytes, other.as_bytes()))
    }

    fn invalid_utf8(&self) -> BlittableError {
        BlittableError::InvalidUtf8 {
            position: self.position,
        }
    }
}

impl fmt::Debug for LazyString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyString")
            .field("position", &self.position)
            .field("byte_len", &self.byte_len())
            .field("compressed", &self.is_compressed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_string_compares_in_place() {
        let s = LazyString::raw(b"Oscar", 0);
        assert_eq!(s.compare_to("Oscar").unwrap(), Ordering::Equal);
        assert_eq!(s.compare_to("Arava").unwrap(), Ordering::Greater);
        assert_eq!(s.compare_to("Oscars").unwrap(), Ordering::Less);
        assert_eq!(s.as_str().unwrap(), "Oscar");
        assert_eq!(s.byte_len(), 5);
        assert!(!s.is_compressed());
    }

    #[test]
    fn raw_string_borrows_document_bytes() {
        let bytes = b"Hadera".to_vec();
        let s = LazyString::raw(&bytes, 0);
        assert_eq!(s.as_str().unwrap().as_ptr(), bytes.as_ptr());
        assert_eq!(s.as_str().unwrap().as_ptr(), bytes.as_ptr());
        assert_eq!(s.materialize().unwrap(), "Hadera");
        assert!(s.decompressed.get().is_none());
    }

    #[test]
    fn compressed_string_decodes_once() {
        let codec = Lz4Codec::new();
        let text = "Hanashia 21, Hadera. ".repeat(20);
        let mut buf = vec![0u8; codec.max_compressed_len(text.len())];
        let len = codec.compress_into(text.as_bytes(), &mut buf).unwrap();

        let s = LazyString::compressed(&buf[..len], text.len(), codec, 7);
        assert!(s.is_compressed());
        assert_eq!(s.byte_len(), text.len());
        assert!(s.decompressed.get().is_none());
        assert_eq!(s.compare_to(&text).unwrap(), Ordering::Equal);

        let first = s.as_str().unwrap().as_ptr();
        let second = s.as_str().unwrap().as_ptr();
        assert_eq!(first, second);
        assert_eq!(s.materialize().unwrap(), text);
        assert_eq!(s.decompressed.get().map(|d| d.as_ptr()), Some(first));
    }

    #[test]
    fn wrong_length_fails_loudly() {
        let codec = Lz4Codec::new();
        let text = "abc".repeat(100);
        let mut buf = vec![0u8; codec.max_compressed_len(text.len())];
        let len = codec.compress_into(text.as_bytes(), &mut buf).unwrap();

        let s = LazyString::compressed(&buf[..len], text.len() + 1, codec, 0);
        assert!(matches!(
            s.as_str(),
            Err(BlittableError::DecompressedSizeMismatch { .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let s = LazyString::raw(&[0xFF, 0xFE], 42);
        assert_eq!(
            s.as_str(),
            Err(BlittableError::InvalidUtf8 { position: 42 })
        );
    }

    #[test]
    fn scalar_accessors() {
        assert_eq!(BlittableValue::Integer(34).as_integer(), Some(34));
        assert_eq!(BlittableValue::Integer(2).as_float(), Some(2.0));
        assert_eq!(BlittableValue::Boolean(true).as_bool(), Some(true));
        assert!(BlittableValue::Null.is_null());
        assert_eq!(BlittableValue::Null.as_integer(), None);
        assert_eq!(
            BlittableValue::Float(f64::NAN).to_json().unwrap(),
            JsonValue::Null
        );
    }
}
