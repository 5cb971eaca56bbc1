//! Zero-copy views over a finished document.
//!
//! Nothing here copies the document. Objects and arrays are offsets into the
//! byte slice; every field read is bounds-checked and malformed input yields
//! [`BlittableError::InvalidFormat`] instead of a panic.

use crate::context::DocumentContext;
use crate::error::{BlittableError, BlittableResult};
use crate::tag::{TypeTag, ValueKind, Width};
use crate::value::{BlittableValue, LazyString};
use crate::varint;
use crate::writer::MAX_NESTING_DEPTH;
use parking_lot::RwLock;
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Bytes after the name table: rootOffset, propertiesStart and root tag.
pub const TRAILER_LEN: usize = 9;

/// The smallest well-formed document: the name table flags plus the trailer.
pub const MIN_DOCUMENT_LEN: usize = TRAILER_LEN + 1;

/// Upper bound on how far an LZ4 block can expand.
const MAX_LZ4_RATIO: usize = 255;

/// Returns `len` bytes of `data` starting at `start`.
fn slice(data: &[u8], start: usize, len: usize) -> BlittableResult<&[u8]> {
    start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| {
            BlittableError::invalid_format(format!(
                "{len} bytes at {start} run past the end of the document"
            ))
        })
}

fn read_u32(data: &[u8], position: usize) -> BlittableResult<usize> {
    Width::Int.read(data, position)
}

/// Resolves a backward offset from a metadata start. Composite values always
/// lie strictly before the metadata that references them.
fn value_position(metadata_start: usize, offset: usize, tag: TypeTag) -> BlittableResult<usize> {
    if offset == 0 && tag.kind.is_composite() {
        return Err(BlittableError::invalid_format(format!(
            "{} at {metadata_start} refers to itself",
            tag.kind
        )));
    }
    metadata_start.checked_sub(offset).ok_or_else(|| {
        BlittableError::invalid_format(format!("offset {offset} points before the document"))
    })
}

fn check_depth(depth: usize) -> BlittableResult<()> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(BlittableError::invalid_format(format!(
            "nesting deeper than {MAX_NESTING_DEPTH} levels"
        )));
    }
    Ok(())
}

/// Parsed trailer of a document.
///
/// Locates the root value and the property name table. Cheap to copy; every
/// object and array view holds one.
#[derive(Clone, Copy)]
pub struct DocumentLayout<'a> {
    data: &'a [u8],
    ctx: &'a DocumentContext,
    root_position: usize,
    root_tag: TypeTag,
    properties_start: usize,
    name_width: Width,
    name_count: usize,
}

impl<'a> DocumentLayout<'a> {
    /// Parses the trailer of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidFormat`] if the trailer is
    /// inconsistent with the document length.
    pub fn parse(data: &'a [u8], ctx: &'a DocumentContext) -> BlittableResult<Self> {
        let len = data.len();
        if len < MIN_DOCUMENT_LEN {
            return Err(BlittableError::invalid_format(format!(
                "document of {len} bytes is shorter than the {MIN_DOCUMENT_LEN}-byte minimum"
            )));
        }

        let trailer = len - TRAILER_LEN;
        let root_position = read_u32(data, trailer)?;
        let properties_start = read_u32(data, trailer + 4)?;
        let root_tag = TypeTag::from_byte(data[len - 1])?;

        if properties_start >= trailer {
            return Err(BlittableError::invalid_format(format!(
                "properties start {properties_start} lies inside the trailer"
            )));
        }
        if root_position >= properties_start {
            return Err(BlittableError::invalid_format(format!(
                "root offset {root_position} is not before properties start {properties_start}"
            )));
        }

        let name_width = Width::from_offset_flag(data[properties_start])?;
        let table_len = trailer - (properties_start + 1);
        if table_len % name_width.size() != 0 {
            return Err(BlittableError::invalid_format(format!(
                "name table of {table_len} bytes is not a multiple of {}",
                name_width.size()
            )));
        }

        Ok(Self {
            data,
            ctx,
            root_position,
            root_tag,
            properties_start,
            name_width,
            name_count: table_len / name_width.size(),
        })
    }

    /// Returns the document bytes.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the context used for decoding.
    #[must_use]
    pub fn context(&self) -> &'a DocumentContext {
        self.ctx
    }

    /// Returns the number of distinct property names in the document.
    #[must_use]
    pub fn name_count(&self) -> usize {
        self.name_count
    }

    /// Returns the root object.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidFormat`] if the root is not an
    /// object or its metadata is malformed.
    pub fn root(&self) -> BlittableResult<BlittableObject<'a>> {
        if self.root_tag.kind != ValueKind::StartObject {
            return Err(BlittableError::invalid_format(format!(
                "root value is {}, not an object",
                self.root_tag.kind
            )));
        }
        BlittableObject::new(*self, self.root_position, self.root_tag)
    }

    /// Returns the absolute position of property name `id`.
    fn name_position(&self, id: usize) -> BlittableResult<usize> {
        if id >= self.name_count {
            return Err(BlittableError::invalid_format(format!(
                "property id {id} is outside the name table of {}",
                self.name_count
            )));
        }
        let entry = self.properties_start + 1 + id * self.name_width.size();
        let offset = self.name_width.read(self.data, entry)?;
        self.properties_start.checked_sub(offset).ok_or_else(|| {
            BlittableError::invalid_format(format!("name offset {offset} points before the document"))
        })
    }

    /// Returns the UTF-8 bytes of property name `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidFormat`] for an unknown id or a
    /// malformed entry.
    pub fn property_name_bytes(&self, id: usize) -> BlittableResult<&'a [u8]> {
        let position = self.name_position(id)?;
        let (len, prefix) = varint::decode_usize(self.data, position)?;
        slice(self.data, position + prefix, len)
    }

    /// Returns property name `id`.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentLayout::property_name_bytes`], plus
    /// [`BlittableError::InvalidUtf8`].
    pub fn property_name(&self, id: usize) -> BlittableResult<&'a str> {
        let bytes = self.property_name_bytes(id)?;
        std::str::from_utf8(bytes).map_err(|_| BlittableError::InvalidUtf8 {
            position: self.name_position(id).unwrap_or(0),
        })
    }

    /// Returns every property name in the document, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if any name table entry is malformed.
    pub fn property_names(&self) -> BlittableResult<Vec<&'a str>> {
        (0..self.name_count).map(|id| self.property_name(id)).collect()
    }

    /// Decodes the value at `position` described by `tag`.
    fn read_value(&self, position: usize, tag: TypeTag) -> BlittableResult<BlittableValue<'a>> {
        Ok(match tag.kind {
            ValueKind::StartObject => {
                BlittableValue::Object(Arc::new(BlittableObject::new(*self, position, tag)?))
            }
            ValueKind::StartArray => {
                BlittableValue::Array(Arc::new(BlittableArray::new(*self, position, tag)?))
            }
            ValueKind::Integer => BlittableValue::Integer(varint::decode_i64(self.data, position)?.0),
            ValueKind::Float => {
                let bytes = slice(self.data, position, 8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                BlittableValue::Float(f64::from_le_bytes(raw))
            }
            ValueKind::String => {
                let (len, prefix) = varint::decode_usize(self.data, position)?;
                let bytes = slice(self.data, position + prefix, len)?;
                BlittableValue::String(LazyString::raw(bytes, position))
            }
            ValueKind::CompressedString => {
                let (len, first) = varint::decode_usize(self.data, position)?;
                let (compressed_len, second) =
                    varint::decode_usize(self.data, position + first)?;
                let bytes = slice(self.data, position + first + second, compressed_len)?;
                if len > compressed_len.saturating_mul(MAX_LZ4_RATIO) {
                    return Err(BlittableError::invalid_format(format!(
                        "compressed string at {position} claims {len} bytes from {compressed_len}"
                    )));
                }
                BlittableValue::String(LazyString::compressed(
                    bytes,
                    len,
                    *self.ctx.codec(),
                    position,
                ))
            }
            ValueKind::Boolean => match slice(self.data, position, 1)?[0] {
                0 => BlittableValue::Boolean(false),
                1 => BlittableValue::Boolean(true),
                other => {
                    return Err(BlittableError::invalid_format(format!(
                        "boolean byte {other} at {position}"
                    )))
                }
            },
            ValueKind::Null => BlittableValue::Null,
        })
    }
}

impl fmt::Debug for DocumentLayout<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentLayout")
            .field("len", &self.data.len())
            .field("root_position", &self.root_position)
            .field("properties_start", &self.properties_start)
            .field("name_count", &self.name_count)
            .finish()
    }
}

/// Reads the root object of `data`.
///
/// # Errors
///
/// Returns [`BlittableError::InvalidFormat`] if the document is malformed.
pub fn read_document<'a>(
    data: &'a [u8],
    ctx: &'a DocumentContext,
) -> BlittableResult<BlittableObject<'a>> {
    DocumentLayout::parse(data, ctx)?.root()
}

/// Looks up a cached composite value or resolves and caches it.
fn cached<'a>(
    cache: &RwLock<HashMap<usize, BlittableValue<'a>>>,
    index: usize,
    resolve: impl FnOnce() -> BlittableResult<BlittableValue<'a>>,
) -> BlittableResult<BlittableValue<'a>> {
    if let Some(value) = cache.read().get(&index) {
        return Ok(value.clone());
    }
    let value = resolve()?;
    Ok(cache.write().entry(index).or_insert(value).clone())
}

/// An object inside a document.
///
/// Property lookup is a binary search over the object's sorted metadata.
/// Nested objects and arrays are cached after the first lookup; the cache
/// is safe to fill from several threads at once.
pub struct BlittableObject<'a> {
    layout: DocumentLayout<'a>,
    metadata_start: usize,
    entries_start: usize,
    count: usize,
    offset_width: Width,
    id_width: Width,
    cache: RwLock<HashMap<usize, BlittableValue<'a>>>,
}

impl<'a> BlittableObject<'a> {
    fn new(layout: DocumentLayout<'a>, position: usize, tag: TypeTag) -> BlittableResult<Self> {
        let offset_width = tag.require_offset_width()?;
        let id_width = tag.require_id_width()?;
        let (count, prefix) = varint::decode_usize(layout.data, position)?;
        let entries_start = position + prefix;

        let entry_size = offset_width.size() + id_width.size() + 1;
        count
            .checked_mul(entry_size)
            .and_then(|len| entries_start.checked_add(len))
            .filter(|&end| end <= layout.data.len())
            .ok_or_else(|| {
                BlittableError::invalid_format(format!(
                    "object at {position} declares {count} properties past the end of the document"
                ))
            })?;

        Ok(Self {
            layout,
            metadata_start: position,
            entries_start,
            count,
            offset_width,
            id_width,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the object has no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Reads metadata entry `index`: the value position, property id and tag.
    fn entry(&self, index: usize) -> BlittableResult<(usize, usize, TypeTag)> {
        let entry_size = self.offset_width.size() + self.id_width.size() + 1;
        let start = self.entries_start + index * entry_size;
        let offset = self.offset_width.read(self.layout.data, start)?;
        let id = self
            .id_width
            .read(self.layout.data, start + self.offset_width.size())?;
        let tag = TypeTag::from_byte(self.layout.data[start + entry_size - 1])?;
        Ok((value_position(self.metadata_start, offset, tag)?, id, tag))
    }

    fn value_at(&self, index: usize) -> BlittableResult<BlittableValue<'a>> {
        let (position, _, tag) = self.entry(index)?;
        if tag.kind.is_composite() {
            cached(&self.cache, index, || self.layout.read_value(position, tag))
        } else {
            self.layout.read_value(position, tag)
        }
    }

    /// Looks up a property by name. A miss is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn try_get(&self, name: &str) -> BlittableResult<Option<BlittableValue<'a>>> {
        let comparator = self.layout.ctx.comparator_for(name)?;
        let (mut lo, mut hi) = (0, self.count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (_, id, _) = self.entry(mid)?;
            let candidate = self.layout.property_name_bytes(id)?;
            match comparator.compare_to(candidate) {
                Ordering::Equal => return self.value_at(mid).map(Some),
                Ordering::Less => hi = mid,
                Ordering::Greater => lo = mid + 1,
            }
        }
        Ok(None)
    }

    /// Looks up a property that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::MemberNotFound`] on a miss.
    pub fn get(&self, name: &str) -> BlittableResult<BlittableValue<'a>> {
        self.try_get(name)?
            .ok_or_else(|| BlittableError::member_not_found(name))
    }

    /// Returns the property names in stored (sorted) order.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn property_names(&self) -> BlittableResult<Vec<&'a str>> {
        (0..self.count)
            .map(|index| {
                let (_, id, _) = self.entry(index)?;
                self.layout.property_name(id)
            })
            .collect()
    }

    /// Returns every property with its value, in stored order.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn properties(&self) -> BlittableResult<Vec<(&'a str, BlittableValue<'a>)>> {
        (0..self.count)
            .map(|index| {
                let (_, id, _) = self.entry(index)?;
                Ok((self.layout.property_name(id)?, self.value_at(index)?))
            })
            .collect()
    }

    /// Materializes the object.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn to_json(&self) -> BlittableResult<JsonValue> {
        self.to_json_at(0)
    }

    pub(crate) fn to_json_at(&self, depth: usize) -> BlittableResult<JsonValue> {
        check_depth(depth)?;
        let mut map = Map::with_capacity(self.count);
        for (name, value) in self.properties()? {
            map.insert(name.to_owned(), value.to_json_at(depth)?);
        }
        Ok(JsonValue::Object(map))
    }

    /// Returns the document layout this object belongs to.
    #[must_use]
    pub fn layout(&self) -> &DocumentLayout<'a> {
        &self.layout
    }
}

impl fmt::Debug for BlittableObject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlittableObject")
            .field("position", &self.metadata_start)
            .field("len", &self.count)
            .finish()
    }
}

/// An array inside a document.
///
/// Elements are addressed directly by index.
pub struct BlittableArray<'a> {
    layout: DocumentLayout<'a>,
    metadata_start: usize,
    offsets_start: usize,
    count: usize,
    offset_width: Width,
    cache: RwLock<HashMap<usize, BlittableValue<'a>>>,
}

impl<'a> BlittableArray<'a> {
    fn new(layout: DocumentLayout<'a>, position: usize, tag: TypeTag) -> BlittableResult<Self> {
        let offset_width = tag.require_offset_width()?;
        let (count, prefix) = varint::decode_usize(layout.data, position)?;
        let offsets_start = position + prefix;

        // Empty arrays carry no offset or tag tables.
        if count > 0 {
            count
                .checked_mul(offset_width.size() + 1)
                .and_then(|len| offsets_start.checked_add(len))
                .filter(|&end| end <= layout.data.len())
                .ok_or_else(|| {
                    BlittableError::invalid_format(format!(
                        "array at {position} declares {count} elements past the end of the document"
                    ))
                })?;
        }

        Ok(Self {
            layout,
            metadata_start: position,
            offsets_start,
            count,
            offset_width,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns element `index`, or `Ok(None)` past the end.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn try_get(&self, index: usize) -> BlittableResult<Option<BlittableValue<'a>>> {
        if index >= self.count {
            return Ok(None);
        }
        let data = self.layout.data;
        let offset = self
            .offset_width
            .read(data, self.offsets_start + index * self.offset_width.size())?;
        let tags_start = self.offsets_start + self.count * self.offset_width.size();
        let tag = TypeTag::from_byte(slice(data, tags_start + index, 1)?[0])?;
        let position = value_position(self.metadata_start, offset, tag)?;

        let value = if tag.kind.is_composite() {
            cached(&self.cache, index, || self.layout.read_value(position, tag))?
        } else {
            self.layout.read_value(position, tag)?
        };
        Ok(Some(value))
    }

    /// Returns element `index`, which must exist.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::IndexOutOfRange`] past the end.
    pub fn get(&self, index: usize) -> BlittableResult<BlittableValue<'a>> {
        self.try_get(index)?
            .ok_or(BlittableError::IndexOutOfRange {
                index,
                len: self.count,
            })
    }

    /// Returns all elements in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn values(&self) -> BlittableResult<Vec<BlittableValue<'a>>> {
        (0..self.count).map(|index| self.get(index)).collect()
    }

    /// Materializes the array.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn to_json(&self) -> BlittableResult<JsonValue> {
        self.to_json_at(0)
    }

    pub(crate) fn to_json_at(&self, depth: usize) -> BlittableResult<JsonValue> {
        check_depth(depth)?;
        self.values()?
            .iter()
            .map(|value| value.to_json_at(depth))
            .collect::<BlittableResult<Vec<_>>>()
            .map(JsonValue::Array)
    }
}

impl fmt::Debug for BlittableArray<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlittableArray")
            .field("position", &self.metadata_start)
            .field("len", &self.count)
            .finish()
    }
}
