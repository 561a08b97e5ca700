//! Minimal big-endian NBT reader and writer.
//!
//! Supports every tag type up to `LongArray` (id 12). The reader never
//! indexes past the input and refuses nesting deeper than
//! [`MAX_DEPTH`].

use std::collections::BTreeMap;

/// Deepest compound/list nesting the reader accepts.
pub const MAX_DEPTH: usize = 512;

/// Named child tags of a compound.
pub type Compound = BTreeMap<String, Tag>;

/// Errors produced while reading or writing NBT.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NbtError {
    /// The input ended in the middle of a tag.
    #[error("unexpected end of data at byte {offset}")]
    UnexpectedEof {
        /// Where the missing bytes were expected.
        offset: usize,
    },

    /// A tag id outside 0..=12.
    #[error("unknown tag id {id} at byte {offset}")]
    UnknownTag {
        /// The offending id.
        id: u8,
        /// Where it was read.
        offset: usize,
    },

    /// A negative array or list length.
    #[error("negative length {length} at byte {offset}")]
    NegativeLength {
        /// The length as read.
        length: i32,
        /// Where it was read.
        offset: usize,
    },

    /// A string that is not valid UTF-8.
    #[error("invalid string at byte {offset}")]
    InvalidString {
        /// Where the string starts.
        offset: usize,
    },

    /// Nesting deeper than [`MAX_DEPTH`].
    #[error("nesting deeper than {MAX_DEPTH}")]
    TooDeep,

    /// The root tag is not a compound.
    #[error("root tag is not a compound")]
    RootNotCompound,

    /// A value too large to encode.
    #[error("{what} too large to encode")]
    TooLarge {
        /// What overflowed.
        what: &'static str,
    },
}

/// One NBT value.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    /// Tag 1.
    Byte(i8),
    /// Tag 2.
    Short(i16),
    /// Tag 3.
    Int(i32),
    /// Tag 4.
    Long(i64),
    /// Tag 5.
    Float(f32),
    /// Tag 6.
    Double(f64),
    /// Tag 7.
    ByteArray(Vec<u8>),
    /// Tag 8.
    String(String),
    /// Tag 9. Elements share one tag type.
    List(Vec<Tag>),
    /// Tag 10.
    Compound(Compound),
    /// Tag 11.
    IntArray(Vec<i32>),
    /// Tag 12.
    LongArray(Vec<i64>),
}

impl Tag {
    /// Tag type id.
    pub const fn id(&self) -> u8 {
        match self {
            Self::Byte(_) => 1,
            Self::Short(_) => 2,
            Self::Int(_) => 3,
            Self::Long(_) => 4,
            Self::Float(_) => 5,
            Self::Double(_) => 6,
            Self::ByteArray(_) => 7,
            Self::String(_) => 8,
            Self::List(_) => 9,
            Self::Compound(_) => 10,
            Self::IntArray(_) => 11,
            Self::LongArray(_) => 12,
        }
    }

    /// Integer value of a `Byte`, `Short`, or `Int` tag.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Byte(v) => Some(i32::from(*v)),
            Self::Short(v) => Some(i32::from(*v)),
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Unsigned reading of a `Short` tag (schematic dimensions).
    pub const fn as_u16(&self) -> Option<u16> {
        match self {
            Self::Short(v) => Some(u16::from_be_bytes(v.to_be_bytes())),
            _ => None,
        }
    }

    /// Contents of a `String` tag.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Contents of a `ByteArray` tag.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::ByteArray(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Contents of a `Compound` tag.
    pub const fn as_compound(&self) -> Option<&Compound> {
        match self {
            Self::Compound(map) => Some(map),
            _ => None,
        }
    }
}

/// Decode a root compound and its name.
///
/// # Errors
///
/// Returns [`NbtError`] if the data is truncated or malformed.
pub fn read(data: &[u8]) -> Result<(String, Compound), NbtError> {
    let mut reader = Reader { data, pos: 0 };
    let id = reader.u8()?;
    if id != 10 {
        return Err(NbtError::RootNotCompound);
    }
    let name = reader.string()?;
    let root = reader.compound(0)?;
    Ok((name, root))
}

/// Encode a named root compound.
///
/// # Errors
///
/// Returns [`NbtError::TooLarge`] if a string or array exceeds the
/// format's length fields.
pub fn write(name: &str, root: &Compound) -> Result<Vec<u8>, NbtError> {
    let mut out = vec![10];
    write_string(&mut out, name)?;
    write_compound(&mut out, root)?;
    Ok(out)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], NbtError> {
        let eof = NbtError::UnexpectedEof { offset: self.pos };
        let end = self.pos.checked_add(n).ok_or_else(|| eof.clone())?;
        let bytes = self.data.get(self.pos..end).ok_or(eof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], NbtError> {
        let offset = self.pos;
        let bytes = self.take(N)?;
        bytes
            .try_into()
            .ok()
            .ok_or(NbtError::UnexpectedEof { offset })
    }

    fn u8(&mut self) -> Result<u8, NbtError> {
        Ok(u8::from_be_bytes(self.array()?))
    }

    fn i16(&mut self) -> Result<i16, NbtError> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, NbtError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, NbtError> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    fn length(&mut self) -> Result<usize, NbtError> {
        let offset = self.pos;
        let length = self.i32()?;
        usize::try_from(length)
            .ok()
            .ok_or(NbtError::NegativeLength { length, offset })
    }

    /// Capacity hint that never exceeds what the remaining input could hold.
    fn capacity(&self, length: usize, element_size: usize) -> usize {
        let remaining = self.data.len().saturating_sub(self.pos);
        length.min(remaining.checked_div(element_size).unwrap_or(0))
    }

    fn string(&mut self) -> Result<String, NbtError> {
        let offset = self.pos;
        let length = usize::from(u16::from_be_bytes(self.array()?));
        let bytes = self.take(length)?;
        String::from_utf8(bytes.to_vec())
            .ok()
            .ok_or(NbtError::InvalidString { offset })
    }

    fn compound(&mut self, depth: usize) -> Result<Compound, NbtError> {
        if depth >= MAX_DEPTH {
            return Err(NbtError::TooDeep);
        }
        let mut map = Compound::new();
        loop {
            let id = self.u8()?;
            if id == 0 {
                return Ok(map);
            }
            let name = self.string()?;
            let tag = self.payload(id, depth.saturating_add(1))?;
            map.insert(name, tag);
        }
    }

    fn payload(&mut self, id: u8, depth: usize) -> Result<Tag, NbtError> {
        let offset = self.pos;
        let tag = match id {
            1 => Tag::Byte(i8::from_be_bytes(self.array()?)),
            2 => Tag::Short(self.i16()?),
            3 => Tag::Int(self.i32()?),
            4 => Tag::Long(self.i64()?),
            5 => Tag::Float(f32::from_be_bytes(self.array()?)),
            6 => Tag::Double(f64::from_be_bytes(self.array()?)),
            7 => {
                let length = self.length()?;
                Tag::ByteArray(self.take(length)?.to_vec())
            }
            8 => Tag::String(self.string()?),
            9 => {
                if depth >= MAX_DEPTH {
                    return Err(NbtError::TooDeep);
                }
                let element = self.u8()?;
                let length = self.length()?;
                if element == 0 && length > 0 {
                    return Err(NbtError::UnknownTag { id: 0, offset });
                }
                let mut items = Vec::with_capacity(self.capacity(length, 1));
                for _ in 0..length {
                    items.push(self.payload(element, depth.saturating_add(1))?);
                }
                Tag::List(items)
            }
            10 => Tag::Compound(self.compound(depth)?),
            11 => {
                let length = self.length()?;
                let mut items = Vec::with_capacity(self.capacity(length, 4));
                for _ in 0..length {
                    items.push(self.i32()?);
                }
                Tag::IntArray(items)
            }
            12 => {
                let length = self.length()?;
                let mut items = Vec::with_capacity(self.capacity(length, 8));
                for _ in 0..length {
                    items.push(self.i64()?);
                }
                Tag::LongArray(items)
            }
            _ => return Err(NbtError::UnknownTag { id, offset }),
        };
        Ok(tag)
    }
}

fn write_length(out: &mut Vec<u8>, length: usize, what: &'static str) -> Result<(), NbtError> {
    let length = i32::try_from(length)
        .ok()
        .ok_or(NbtError::TooLarge { what })?;
    out.extend_from_slice(&length.to_be_bytes());
    Ok(())
}

fn write_string(out: &mut Vec<u8>, value: &str) -> Result<(), NbtError> {
    let length = u16::try_from(value.len())
        .ok()
        .ok_or(NbtError::TooLarge { what: "string" })?;
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

fn write_compound(out: &mut Vec<u8>, map: &Compound) -> Result<(), NbtError> {
    for (name, tag) in map {
        out.push(tag.id());
        write_string(out, name)?;
        write_payload(out, tag)?;
    }
    out.push(0);
    Ok(())
}

fn write_payload(out: &mut Vec<u8>, tag: &Tag) -> Result<(), NbtError> {
    match tag {
        Tag::Byte(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Short(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::ByteArray(bytes) => {
            write_length(out, bytes.len(), "byte array")?;
            out.extend_from_slice(bytes);
        }
        Tag::String(s) => write_string(out, s)?,
        Tag::List(items) => {
            out.push(items.first().map_or(0, Tag::id));
            write_length(out, items.len(), "list")?;
            for item in items {
                write_payload(out, item)?;
            }
        }
        Tag::Compound(map) => write_compound(out, map)?,
        Tag::IntArray(items) => {
            write_length(out, items.len(), "int array")?;
            for v in items {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
        Tag::LongArray(items) => {
            write_length(out, items.len(), "long array")?;
            for v in items {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
    }
    Ok(())
}
