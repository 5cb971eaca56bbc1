//! Type tags and width classes.
//!
//! A type tag is one byte:
//!
//! ```text
//!   7 6   5 4   3 2 1 0
//!  [ id ][ off ][ kind  ]
//! ```
//!
//! The low nibble is the [`ValueKind`]. For objects and arrays the upper
//! bits carry the [`Width`] of the offset fields (bits 4-5) and, for
//! objects, of the property-id fields (bits 6-7). Scalars use only the kind.

use crate::error::{BlittableError, BlittableResult};
use std::fmt;

const KIND_MASK: u8 = 0x0F;
const OFFSET_SHIFT: u8 = 4;
const ID_SHIFT: u8 = 6;

/// The kind of value a tag describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    /// An object.
    StartObject = 1,
    /// An array.
    StartArray = 2,
    /// A signed 64-bit integer, LEB128 encoded.
    Integer = 3,
    /// A 64-bit float, stored as 8 little-endian bytes.
    Float = 4,
    /// A UTF-8 string with a varint length prefix.
    String = 5,
    /// A single byte, 0 or 1.
    Boolean = 6,
    /// No payload.
    Null = 7,
    /// An LZ4-compressed UTF-8 string.
    CompressedString = 8,
}

impl ValueKind {
    /// Returns the kind stored in the low nibble of `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidFormat`] for an unknown kind.
    pub fn from_tag(tag: u8) -> BlittableResult<Self> {
        Ok(match tag & KIND_MASK {
            1 => Self::StartObject,
            2 => Self::StartArray,
            3 => Self::Integer,
            4 => Self::Float,
            5 => Self::String,
            6 => Self::Boolean,
            7 => Self::Null,
            8 => Self::CompressedString,
            other => {
                return Err(BlittableError::invalid_format(format!(
                    "unknown value kind {other} in type tag {tag:#04x}"
                )))
            }
        })
    }

    /// Returns true for objects and arrays.
    #[must_use]
    pub fn is_composite(self) -> bool {
        matches!(self, Self::StartObject | Self::StartArray)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartObject => "object",
            Self::StartArray => "array",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::CompressedString => "compressed string",
        };
        f.write_str(name)
    }
}

/// Byte width of offset or property-id fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Width {
    /// One byte.
    Byte,
    /// Two bytes.
    Short,
    /// Four bytes.
    Int,
}

impl Width {
    /// Returns the narrowest width able to hold `max`.
    #[must_use]
    pub fn for_value(max: usize) -> Self {
        if max <= usize::from(u8::MAX) {
            Self::Byte
        } else if max <= usize::from(u16::MAX) {
            Self::Short
        } else {
            Self::Int
        }
    }

    /// Returns the field size in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Short => 2,
            Self::Int => 4,
        }
    }

    const fn code(self) -> u8 {
        match self {
            Self::Byte => 1,
            Self::Short => 2,
            Self::Int => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Byte),
            2 => Some(Self::Short),
            3 => Some(Self::Int),
            _ => None,
        }
    }

    /// Reads a width from the offset bits of a tag or flags byte.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidFormat`] if the bits are zero.
    pub fn from_offset_flag(byte: u8) -> BlittableResult<Self> {
        Self::from_code((byte >> OFFSET_SHIFT) & 0b11).ok_or_else(|| {
            BlittableError::invalid_format(format!("no offset width in flags {byte:#04x}"))
        })
    }

    /// Returns the tag bits for this width in the offset position.
    #[must_use]
    pub const fn offset_flag(self) -> u8 {
        self.code() << OFFSET_SHIFT
    }

    /// Returns the tag bits for this width in the property-id position.
    #[must_use]
    pub const fn id_flag(self) -> u8 {
        self.code() << ID_SHIFT
    }

    /// Writes `value` little-endian into `out`, returning the bytes used.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidOperation`] if `value` does not fit.
    pub fn put(self, value: usize, out: &mut [u8; 4]) -> BlittableResult<usize> {
        let too_wide = || {
            BlittableError::invalid_operation(format!("{value} does not fit in {} bytes", self.size()))
        };
        match self {
            Self::Byte => out[0] = u8::try_from(value).map_err(|_| too_wide())?,
            Self::Short => {
                let v = u16::try_from(value).map_err(|_| too_wide())?;
                out[..2].copy_from_slice(&v.to_le_bytes());
            }
            Self::Int => {
                let v = u32::try_from(value).map_err(|_| too_wide())?;
                out.copy_from_slice(&v.to_le_bytes());
            }
        }
        Ok(self.size())
    }

    /// Reads a little-endian field of this width at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidFormat`] if the field runs past the
    /// end of `data`.
    pub fn read(self, data: &[u8], position: usize) -> BlittableResult<usize> {
        let bytes = position
            .checked_add(self.size())
            .and_then(|end| data.get(position..end))
            .ok_or_else(|| {
                BlittableError::invalid_format(format!(
                    "{}-byte field at {position} runs past the end of the document",
                    self.size()
                ))
            })?;
        Ok(match self {
            Self::Byte => usize::from(bytes[0]),
            Self::Short => usize::from(u16::from_le_bytes([bytes[0], bytes[1]])),
            Self::Int => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize,
        })
    }
}

/// A decoded type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag {
    /// The value kind.
    pub kind: ValueKind,
    /// Offset width, for objects and arrays.
    pub offset_width: Option<Width>,
    /// Property-id width, for objects.
    pub id_width: Option<Width>,
}

impl TypeTag {
    /// A scalar tag with no width bits.
    #[must_use]
    pub const fn scalar(kind: ValueKind) -> Self {
        Self {
            kind,
            offset_width: None,
            id_width: None,
        }
    }

    /// An object tag.
    #[must_use]
    pub const fn object(offset_width: Width, id_width: Width) -> Self {
        Self {
            kind: ValueKind::StartObject,
            offset_width: Some(offset_width),
            id_width: Some(id_width),
        }
    }

    /// An array tag.
    #[must_use]
    pub const fn array(offset_width: Width) -> Self {
        Self {
            kind: ValueKind::StartArray,
            offset_width: Some(offset_width),
            id_width: None,
        }
    }

    /// Packs the tag into its byte form.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        let mut byte = self.kind as u8;
        if let Some(width) = self.offset_width {
            byte |= width.offset_flag();
        }
        if let Some(width) = self.id_width {
            byte |= width.id_flag();
        }
        byte
    }

    /// Unpacks a tag byte.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidFormat`] for an unknown kind.
    pub fn from_byte(byte: u8) -> BlittableResult<Self> {
        Ok(Self {
            kind: ValueKind::from_tag(byte)?,
            offset_width: Width::from_code((byte >> OFFSET_SHIFT) & 0b11),
            id_width: Width::from_code(byte >> ID_SHIFT),
        })
    }

    /// Returns the offset width, which objects and arrays must carry.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidFormat`] if the bits are zero.
    pub fn require_offset_width(self) -> BlittableResult<Width> {
        self.offset_width.ok_or_else(|| {
            BlittableError::invalid_format(format!("{} tag without offset width", self.kind))
        })
    }

    /// Returns the property-id width, which objects must carry.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidFormat`] if the bits are zero.
    pub fn require_id_width(self) -> BlittableResult<Width> {
        self.id_width.ok_or_else(|| {
            BlittableError::invalid_format(format!("{} tag without property-id width", self.kind))
        })
    }
}
