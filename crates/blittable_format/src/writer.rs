//! Blittable document writer.
//!
//! The writer walks a token stream depth first. Every value is written
//! before the metadata that points at it, so all offsets are backward
//! distances from a metadata start. After the root object come the
//! property names and the trailer:
//!
//! ```text
//! [values and metadata ... root metadata]
//! [name 0][name 1] ...                     varint length + UTF-8
//! [flags]                                  at propertiesStart
//! [name table]                             propertiesStart - name position
//! [rootOffset: u32][propertiesStart: u32][root tag: u8]
//! ```

use crate::comparator::{compare_encoded, PropertyComparator};
use crate::compression::worth_compressing;
use crate::context::DocumentContext;
use crate::document::Document;
use crate::error::{BlittableError, BlittableResult};
use crate::tag::{TypeTag, ValueKind, Width};
use crate::token::{Token, TokenSource};
use crate::varint::{self, MAX_VARINT_LEN};
use blittable_memory::{GrowableBuffer, PoolResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Maximum nesting of objects and arrays.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Encodes a whole token stream into a finished [`Document`].
///
/// # Errors
///
/// Returns an error if the token stream is malformed or memory cannot be
/// acquired.
pub fn write_document<S: TokenSource>(
    source: S,
    ctx: &mut DocumentContext,
) -> BlittableResult<Document> {
    let mut writer = BlittableWriter::new(source, ctx)?;
    writer.write()?;
    writer.finish()
}

/// One interned property name.
struct PropertyName {
    comparator: Arc<PropertyComparator>,
    sort_index: usize,
}

/// The document-wide property name table.
///
/// Ids are assigned in first-seen order. The global sort order is rebuilt
/// only when a name was added since the last rebuild.
#[derive(Default)]
struct PropertyTable {
    names: Vec<PropertyName>,
    ids: HashMap<String, usize>,
    sort_order: Vec<usize>,
    needs_sorting: bool,
}

impl PropertyTable {
    fn intern(&mut self, ctx: &DocumentContext, name: &str) -> BlittableResult<usize> {
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }
        let id = self.names.len();
        self.names.push(PropertyName {
            comparator: ctx.comparator_for(name)?,
            sort_index: 0,
        });
        self.ids.insert(name.to_owned(), id);
        self.needs_sorting = true;
        Ok(id)
    }

    fn ensure_sorted(&mut self) {
        if !self.needs_sorting {
            return;
        }
        let names = &self.names;
        self.sort_order = (0..names.len()).collect();
        self.sort_order.sort_by(|&a, &b| {
            compare_encoded(names[a].comparator.encoded(), names[b].comparator.encoded())
        });
        for (index, &id) in self.sort_order.iter().enumerate() {
            self.names[id].sort_index = index;
        }
        self.needs_sorting = false;
    }

    fn sort_index(&self, id: usize) -> usize {
        self.names[id].sort_index
    }
}

/// A metadata entry collected while writing an object.
struct PropertyEntry {
    position: usize,
    id: usize,
    tag: TypeTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Ready,
    Finished,
    Failed,
}

/// Writes one document from a token stream.
///
/// The writer holds the context mutably for its whole life; readers can
/// share the context once the writer is gone.
///
/// # Example
///
/// ```rust
/// use blittable_format::{BlittableWriter, ContextConfig, DocumentContext, TokenBuffer};
/// use blittable_memory::{MemoryPool, PoolConfig};
///
/// let pool = MemoryPool::shared(PoolConfig::default());
/// let mut ctx = DocumentContext::new(pool, ContextConfig::default()).unwrap();
///
/// let tokens = TokenBuffer::parse_json(r#"{"Name": "Oren", "Age": 34}"#).unwrap();
/// let mut writer = BlittableWriter::new(tokens, &mut ctx).unwrap();
/// writer.write().unwrap();
///
/// let mut bytes = vec![0u8; writer.size_in_bytes()];
/// writer.copy_to(&mut bytes).unwrap();
/// assert_eq!(*bytes.last().unwrap(), 0x51); // object, 1-byte offsets and ids
/// ```
pub struct BlittableWriter<'ctx, S> {
    source: S,
    ctx: &'ctx mut DocumentContext,
    buffer: GrowableBuffer,
    properties: PropertyTable,
    state: WriterState,
    depth: usize,
    compressed_strings: usize,
}

impl<'ctx, S: TokenSource> BlittableWriter<'ctx, S> {
    /// Creates a writer over `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document buffer cannot be acquired.
    pub fn new(source: S, ctx: &'ctx mut DocumentContext) -> BlittableResult<Self> {
        let buffer = ctx.new_buffer()?;
        Ok(Self {
            source,
            ctx,
            buffer,
            properties: PropertyTable::default(),
            state: WriterState::Ready,
            depth: 0,
            compressed_strings: 0,
        })
    }

    /// Consumes the token stream and writes the document.
    ///
    /// On failure the buffer goes back to the pool and the writer is
    /// unusable; it cannot be resumed.
    ///
    /// # Errors
    ///
    /// Returns a format error for a malformed token stream,
    /// [`BlittableError::Unsupported`] for raw byte values and
    /// [`BlittableError::InvalidOperation`] if called twice.
    pub fn write(&mut self) -> BlittableResult<()> {
        match self.state {
            WriterState::Ready => {}
            WriterState::Finished => {
                return Err(BlittableError::invalid_operation("document already written"))
            }
            WriterState::Failed => {
                return Err(BlittableError::invalid_operation("writer failed earlier"))
            }
        }

        match self.write_root() {
            Ok(()) => {
                self.state = WriterState::Finished;
                debug!(
                    size = self.buffer.logical_size(),
                    properties = self.properties.names.len(),
                    compressed_strings = self.compressed_strings,
                    "document written"
                );
                Ok(())
            }
            Err(e) => {
                self.buffer.dispose();
                self.state = WriterState::Failed;
                Err(e)
            }
        }
    }

    /// Returns the size of the written document.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        if self.state == WriterState::Finished {
            self.buffer.logical_size()
        } else {
            0
        }
    }

    /// Returns the number of distinct property names in the document.
    #[must_use]
    pub fn property_count(&self) -> usize {
        self.properties.names.len()
    }

    /// Returns how many strings were stored compressed.
    #[must_use]
    pub fn compressed_strings(&self) -> usize {
        self.compressed_strings
    }

    /// Copies the finished document to the start of `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidOperation`] if nothing has been
    /// written or `dest` is too small.
    pub fn copy_to(&self, dest: &mut [u8]) -> BlittableResult<usize> {
        self.require_finished()?;
        let size = self.buffer.logical_size();
        if dest.len() < size {
            return Err(BlittableError::invalid_operation(format!(
                "destination holds {} bytes, document needs {size}",
                dest.len()
            )));
        }
        Ok(self.buffer.copy_into(dest))
    }

    /// Copies the finished document into one pool block.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidOperation`] if nothing has been
    /// written, or a pool error.
    pub fn finish(mut self) -> BlittableResult<Document> {
        self.require_finished()?;
        let len = self.buffer.logical_size();
        let pool = Arc::clone(self.ctx.pool());
        let mut block = pool.acquire(len)?;
        self.buffer.copy_into(&mut block);
        self.buffer.dispose();
        Ok(Document::from_block(pool, block, len))
    }

    fn require_finished(&self) -> BlittableResult<()> {
        match self.state {
            WriterState::Finished => Ok(()),
            WriterState::Ready => Err(BlittableError::invalid_operation(
                "document has not been written yet",
            )),
            WriterState::Failed => Err(BlittableError::invalid_operation("writer failed earlier")),
        }
    }

    fn position(&self) -> usize {
        self.buffer.logical_size()
    }

    fn advance(&mut self, expected: &str) -> BlittableResult<()> {
        if self.source.advance()? {
            Ok(())
        } else {
            Err(BlittableError::unexpected_eof(expected))
        }
    }

    fn write_root(&mut self) -> BlittableResult<()> {
        self.advance("StartObject")?;
        if self.source.current_token() != &Token::StartObject {
            return Err(BlittableError::unexpected_token(
                "StartObject",
                self.source.current_token().kind_name(),
            ));
        }
        let (root_position, root_tag) = self.write_object()?;
        self.write_trailer(root_position, root_tag)
    }

    /// Writes the value under the cursor.
    fn write_value(&mut self) -> BlittableResult<(usize, TypeTag)> {
        let position = self.position();
        let tag = match self.source.current_token() {
            Token::StartObject => return self.write_object(),
            Token::StartArray => return self.write_array(),
            Token::String(value) => {
                let (tag, compressed) = write_string(&mut self.buffer, self.ctx, value)?;
                self.compressed_strings += usize::from(compressed);
                tag
            }
            Token::Integer(value) => {
                put_varint_i64(&mut self.buffer, *value)?;
                TypeTag::scalar(ValueKind::Integer)
            }
            Token::Float(value) => {
                self.buffer.write(&value.to_le_bytes())?;
                TypeTag::scalar(ValueKind::Float)
            }
            Token::Boolean(value) => {
                self.buffer.write_byte(u8::from(*value))?;
                TypeTag::scalar(ValueKind::Boolean)
            }
            Token::Null | Token::Undefined => TypeTag::scalar(ValueKind::Null),
            Token::Bytes(_) => return Err(BlittableError::unsupported("raw bytes")),
            other => return Err(BlittableError::unexpected_token("value", other.kind_name())),
        };
        Ok((position, tag))
    }

    fn enter(&mut self) -> BlittableResult<()> {
        if self.depth == MAX_NESTING_DEPTH {
            return Err(BlittableError::invalid_operation(format!(
                "nesting deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn write_object(&mut self) -> BlittableResult<(usize, TypeTag)> {
        self.enter()?;
        let mut entries = Vec::new();
        loop {
            self.advance("PropertyName or EndObject")?;
            let id = match self.source.current_token() {
                Token::EndObject => break,
                Token::PropertyName(name) => self.properties.intern(self.ctx, name)?,
                other => {
                    return Err(BlittableError::unexpected_token(
                        "PropertyName or EndObject",
                        other.kind_name(),
                    ))
                }
            };
            self.advance("property value")?;
            let (position, tag) = self.write_value()?;
            entries.push(PropertyEntry { position, id, tag });
        }
        self.depth -= 1;

        self.properties.ensure_sorted();
        let properties = &self.properties;
        entries.sort_by_key(|entry| properties.sort_index(entry.id));

        let metadata_start = self.position();
        let max_offset = entries
            .iter()
            .map(|entry| metadata_start - entry.position)
            .max()
            .unwrap_or(0);
        let max_id = entries.iter().map(|entry| entry.id).max().unwrap_or(0);
        let offset_width = Width::for_value(max_offset);
        let id_width = Width::for_value(max_id);

        put_varint(&mut self.buffer, entries.len() as u64)?;
        let mut field = [0u8; 4];
        for entry in &entries {
            let n = offset_width.put(metadata_start - entry.position, &mut field)?;
            self.buffer.write(&field[..n])?;
            let n = id_width.put(entry.id, &mut field)?;
            self.buffer.write(&field[..n])?;
            self.buffer.write_byte(entry.tag.to_byte())?;
        }
        Ok((metadata_start, TypeTag::object(offset_width, id_width)))
    }

    fn write_array(&mut self) -> BlittableResult<(usize, TypeTag)> {
        self.enter()?;
        let mut elements = Vec::new();
        loop {
            self.advance("array element or EndArray")?;
            if self.source.current_token() == &Token::EndArray {
                break;
            }
            elements.push(self.write_value()?);
        }
        self.depth -= 1;

        let metadata_start = self.position();
        put_varint(&mut self.buffer, elements.len() as u64)?;
        if elements.is_empty() {
            return Ok((metadata_start, TypeTag::array(Width::Byte)));
        }

        let max_offset = elements
            .iter()
            .map(|(position, _)| metadata_start - position)
            .max()
            .unwrap_or(0);
        let offset_width = Width::for_value(max_offset);

        let mut field = [0u8; 4];
        for (position, _) in &elements {
            let n = offset_width.put(metadata_start - position, &mut field)?;
            self.buffer.write(&field[..n])?;
        }
        for (_, tag) in &elements {
            self.buffer.write_byte(tag.to_byte())?;
        }
        Ok((metadata_start, TypeTag::array(offset_width)))
    }

    fn write_trailer(&mut self, root_position: usize, root_tag: TypeTag) -> BlittableResult<()> {
        let mut name_positions = Vec::with_capacity(self.properties.names.len());
        for name in &self.properties.names {
            name_positions.push(self.buffer.logical_size());
            let encoded = name.comparator.encoded();
            put_varint(&mut self.buffer, encoded.len() as u64)?;
            self.buffer.write(encoded)?;
        }

        let properties_start = self.position();
        let max_offset = name_positions
            .iter()
            .map(|position| properties_start - position)
            .max()
            .unwrap_or(0);
        let width = Width::for_value(max_offset);
        self.buffer.write_byte(width.offset_flag())?;

        let mut field = [0u8; 4];
        for position in &name_positions {
            let n = width.put(properties_start - position, &mut field)?;
            self.buffer.write(&field[..n])?;
        }

        let root_offset = trailer_field(root_position)?;
        let properties_start = trailer_field(properties_start)?;
        self.buffer.write(&root_offset.to_le_bytes())?;
        self.buffer.write(&properties_start.to_le_bytes())?;
        self.buffer.write_byte(root_tag.to_byte())?;

        trailer_field(self.buffer.logical_size())?;
        Ok(())
    }
}

fn trailer_field(position: usize) -> BlittableResult<u32> {
    u32::try_from(position).map_err(|_| {
        BlittableError::invalid_operation(format!(
            "document of {position} bytes exceeds the 4 GiB format limit"
        ))
    })
}

fn put_varint(buffer: &mut GrowableBuffer, value: u64) -> PoolResult<()> {
    let mut out = [0u8; MAX_VARINT_LEN];
    let len = varint::encode_u64(value, &mut out);
    buffer.write(&out[..len])
}

fn put_varint_i64(buffer: &mut GrowableBuffer, value: i64) -> PoolResult<()> {
    let mut out = [0u8; MAX_VARINT_LEN];
    let len = varint::encode_i64(value, &mut out);
    buffer.write(&out[..len])
}

/// Writes a string, compressed when that saves more than 10%. Returns the
/// tag and whether the compressed form was kept.
fn write_string(
    buffer: &mut GrowableBuffer,
    ctx: &mut DocumentContext,
    value: &str,
) -> BlittableResult<(TypeTag, bool)> {
    let bytes = value.as_bytes();
    let compression = ctx.config().compression;
    let threshold = ctx.config().compression_threshold;

    if compression && bytes.len() > threshold {
        let codec = *ctx.codec();
        let scratch = ctx.scratch(codec.max_compressed_len(bytes.len()))?;
        let compressed_len = codec.compress_into(bytes, scratch)?;
        if worth_compressing(bytes.len(), compressed_len) {
            put_varint(buffer, bytes.len() as u64)?;
            put_varint(buffer, compressed_len as u64)?;
            buffer.write(&scratch[..compressed_len])?;
            return Ok((TypeTag::scalar(ValueKind::CompressedString), true));
        }
    }

    put_varint(buffer, bytes.len() as u64)?;
    buffer.write(bytes)?;
    Ok((TypeTag::scalar(ValueKind::String), false))
}
