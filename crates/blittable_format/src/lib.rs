//! # Blittable Format
//!
//! A self-describing, random-access binary encoding for JSON documents.
//!
//! A blittable document can be navigated in place: property lookups are a
//! binary search over sorted metadata, array access is direct indexing, and
//! strings are only decoded when asked for.
//!
//! ## Layout
//!
//! - Values are written depth first, each before the metadata pointing at it
//! - Objects store `count` then `[offset][property id][type tag]` entries
//!   sorted by property name
//! - Arrays store `count`, then offsets, then type tags
//! - Offset and property-id fields are 1, 2 or 4 bytes, chosen per container
//! - Property names are stored once per document, after the root
//! - A 9-byte trailer locates the root and the name table
//!
//! ## Usage
//!
//! ```
//! use blittable_format::{write_document, ContextConfig, DocumentContext, TokenBuffer};
//! use blittable_memory::{MemoryPool, PoolConfig};
//!
//! let pool = MemoryPool::shared(PoolConfig::default());
//! let mut ctx = DocumentContext::new(pool, ContextConfig::default()).unwrap();
//!
//! let tokens = TokenBuffer::parse_json(r#"{"Name": "Oren", "Dogs": ["Arava", "Oscar"]}"#).unwrap();
//! let doc = write_document(tokens, &mut ctx).unwrap();
//!
//! let root = doc.reader(&ctx).unwrap();
//! let dogs = root.get("Dogs").unwrap();
//! let second = dogs.as_array().unwrap().get(1).unwrap();
//! assert_eq!(second.as_string().unwrap().as_str().unwrap(), "Oscar");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod comparator;
mod compression;
mod config;
mod context;
mod document;
mod error;
mod reader;
pub mod tag;
mod token;
mod value;
pub mod varint;
mod writer;

pub use comparator::{compare_encoded, PropertyComparator};
pub use compression::{worth_compressing, Lz4Codec};
pub use config::ContextConfig;
pub use context::DocumentContext;
pub use document::Document;
pub use error::{BlittableError, BlittableResult};
pub use reader::{
    read_document, BlittableArray, BlittableObject, DocumentLayout, MIN_DOCUMENT_LEN, TRAILER_LEN,
};
pub use tag::{TypeTag, ValueKind, Width};
pub use token::{Token, TokenBuffer, TokenSource};
pub use value::{BlittableValue, LazyString};
pub use writer::{write_document, BlittableWriter, MAX_NESTING_DEPTH};
