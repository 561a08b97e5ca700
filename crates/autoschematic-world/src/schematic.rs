//! Decoded schematics and the paste operation over them.
//!
//! Three on-disk layouts are understood:
//!
//! - Sponge v2: `Palette` plus varint `BlockData` at the top level.
//! - Sponge v3: a `Schematic` compound whose `Blocks` holds `Palette` and
//!   `Data`.
//! - Legacy `MCEdit`: numeric `Blocks` and `Data` byte arrays. Blocks are
//!   named `legacy:<id>:<data>`; id 0 is air.
//!
//! Block index `i` maps to `x + z * width + y * width * length`, and the
//! minimum corner of the structure is placed at the paste origin.

use std::collections::HashMap;
use std::fmt;

use autoschematic_core::capability::{
    Clipboard, DecodeError, EditSession, OperationError, PasteOperation,
};
use autoschematic_types::{BlockPos, Bounds};

use crate::nbt::{Compound, Tag};

/// Block name written for air.
pub const AIR: &str = "minecraft:air";

/// Layout a schematic was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchematicFormat {
    /// Sponge schematic version 2.
    SpongeV2,
    /// Sponge schematic version 3.
    SpongeV3,
    /// `MCEdit` `.schematic`.
    Legacy,
}

impl fmt::Display for SchematicFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpongeV2 => write!(f, "sponge-v2"),
            Self::SpongeV3 => write!(f, "sponge-v3"),
            Self::Legacy => write!(f, "mcedit"),
        }
    }
}

/// Whether `block` names an air block, ignoring block-state properties.
pub fn is_air(block: &str) -> bool {
    let name = block.split('[').next().unwrap_or(block);
    matches!(
        name,
        "minecraft:air" | "minecraft:cave_air" | "minecraft:void_air" | "air"
    )
}

/// A decoded block region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schematic {
    width: u16,
    height: u16,
    length: u16,
    palette: Vec<String>,
    blocks: Vec<u32>,
}

fn malformed(reason: impl Into<String>) -> DecodeError {
    DecodeError::Malformed {
        reason: reason.into(),
    }
}

impl Schematic {
    /// Build a schematic from dimensions, a palette, and one palette index
    /// per block.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Empty`] for a zero-sized region and
    /// [`DecodeError::Malformed`] when the block count or an index does not
    /// match.
    pub fn new(
        width: u16,
        height: u16,
        length: u16,
        palette: Vec<String>,
        blocks: Vec<u32>,
    ) -> Result<Self, DecodeError> {
        let volume = u64::from(width)
            .saturating_mul(u64::from(height))
            .saturating_mul(u64::from(length));
        if volume == 0 {
            return Err(DecodeError::Empty);
        }
        if u64::try_from(blocks.len()).ok() != Some(volume) {
            return Err(malformed(format!(
                "expected {volume} blocks, found {}",
                blocks.len()
            )));
        }
        if let Some(bad) = blocks
            .iter()
            .find(|&&index| !usize::try_from(index).is_ok_and(|i| i < palette.len()))
        {
            return Err(malformed(format!("palette index {bad} out of range")));
        }
        Ok(Self {
            width,
            height,
            length,
            palette,
            blocks,
        })
    }

    /// Decode a schematic from its root compound.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedFormat`] when no known layout
    /// matches, otherwise the errors of [`Schematic::new`].
    pub fn from_nbt(root: &Compound) -> Result<(Self, SchematicFormat), DecodeError> {
        let body = root
            .get("Schematic")
            .and_then(Tag::as_compound)
            .unwrap_or(root);

        if let Some(blocks) = body.get("Blocks").and_then(Tag::as_compound) {
            let (width, height, length) = dimensions(body)?;
            let palette = sponge_palette(blocks)?;
            let data = byte_array(blocks, "Data")?;
            let schematic = Self::new(width, height, length, palette, decode_varints(data)?)?;
            return Ok((schematic, SchematicFormat::SpongeV3));
        }

        if body.contains_key("Palette") && body.contains_key("BlockData") {
            let (width, height, length) = dimensions(body)?;
            let palette = sponge_palette(body)?;
            let data = byte_array(body, "BlockData")?;
            let schematic = Self::new(width, height, length, palette, decode_varints(data)?)?;
            return Ok((schematic, SchematicFormat::SpongeV2));
        }

        if let Some(ids) = body.get("Blocks").and_then(Tag::as_bytes) {
            let (width, height, length) = dimensions(body)?;
            let meta = byte_array(body, "Data")?;
            if meta.len() != ids.len() {
                return Err(malformed("Blocks and Data lengths differ"));
            }
            let (palette, blocks) = legacy_palette(ids, meta);
            let schematic = Self::new(width, height, length, palette, blocks)?;
            return Ok((schematic, SchematicFormat::Legacy));
        }

        Err(DecodeError::UnsupportedFormat)
    }

    /// Encode as a Sponge v2 root compound.
    pub fn to_sponge_v2(&self) -> Compound {
        let mut palette = Compound::new();
        for (index, name) in self.palette.iter().enumerate() {
            let index = i32::try_from(index).unwrap_or(i32::MAX);
            palette.insert(name.clone(), Tag::Int(index));
        }
        let mut data = Vec::new();
        for &index in &self.blocks {
            encode_varint(&mut data, index);
        }
        let mut root = Compound::new();
        root.insert("Version".to_owned(), Tag::Int(2));
        root.insert("Width".to_owned(), short(self.width));
        root.insert("Height".to_owned(), short(self.height));
        root.insert("Length".to_owned(), short(self.length));
        root.insert(
            "PaletteMax".to_owned(),
            Tag::Int(i32::try_from(self.palette.len()).unwrap_or(i32::MAX)),
        );
        root.insert("Palette".to_owned(), Tag::Compound(palette));
        root.insert("BlockData".to_owned(), Tag::ByteArray(data));
        root
    }

    /// `(width, height, length)`.
    pub const fn dimensions(&self) -> (u16, u16, u16) {
        (self.width, self.height, self.length)
    }

    /// Number of block positions.
    pub fn volume(&self) -> u64 {
        u64::from(self.width)
            .saturating_mul(u64::from(self.height))
            .saturating_mul(u64::from(self.length))
    }

    /// Distinct block names.
    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    /// Block name and offset from the minimum corner of block `index`.
    pub fn entry(&self, index: u64) -> Option<(&str, (i32, i32, i32))> {
        let width = u64::from(self.width);
        let layer = width.checked_mul(u64::from(self.length))?;
        let x = index.checked_rem(width)?;
        let z = index.checked_div(width)?.checked_rem(u64::from(self.length))?;
        let y = index.checked_div(layer)?;
        let palette_index = self.blocks.get(usize::try_from(index).ok()?)?;
        let name = self.palette.get(usize::try_from(*palette_index).ok()?)?;
        Some((
            name,
            (
                i32::try_from(x).ok()?,
                i32::try_from(y).ok()?,
                i32::try_from(z).ok()?,
            ),
        ))
    }

    /// Block name at an offset from the minimum corner.
    pub fn block_at(&self, x: u16, y: u16, z: u16) -> Option<&str> {
        if x >= self.width || y >= self.height || z >= self.length {
            return None;
        }
        let index = u64::from(y)
            .checked_mul(u64::from(self.length))?
            .checked_add(u64::from(z))?
            .checked_mul(u64::from(self.width))?
            .checked_add(u64::from(x))?;
        self.entry(index).map(|(name, _)| name)
    }
}

const fn short(value: u16) -> Tag {
    Tag::Short(i16::from_be_bytes(value.to_be_bytes()))
}

fn dimensions(body: &Compound) -> Result<(u16, u16, u16), DecodeError> {
    let get = |key: &str| {
        body.get(key)
            .and_then(Tag::as_u16)
            .ok_or_else(|| malformed(format!("missing {key}")))
    };
    Ok((get("Width")?, get("Height")?, get("Length")?))
}

fn byte_array<'a>(body: &'a Compound, key: &str) -> Result<&'a [u8], DecodeError> {
    body.get(key)
        .and_then(Tag::as_bytes)
        .ok_or_else(|| malformed(format!("missing {key}")))
}

fn sponge_palette(body: &Compound) -> Result<Vec<String>, DecodeError> {
    let entries = body
        .get("Palette")
        .and_then(Tag::as_compound)
        .ok_or_else(|| malformed("missing Palette"))?;
    let mut slots: Vec<Option<String>> = vec![None; entries.len()];
    for (name, tag) in entries {
        let index = tag
            .as_i32()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| malformed(format!("bad palette index for {name}")))?;
        let slot = slots
            .get_mut(index)
            .ok_or_else(|| malformed(format!("palette index {index} out of range")))?;
        if slot.replace(name.clone()).is_some() {
            return Err(malformed(format!("palette index {index} used twice")));
        }
    }
    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| malformed("palette has gaps"))
}

fn legacy_palette(ids: &[u8], meta: &[u8]) -> (Vec<String>, Vec<u32>) {
    let mut palette = Vec::new();
    let mut lookup: HashMap<String, u32> = HashMap::new();
    let mut blocks = Vec::with_capacity(ids.len());
    for (&id, &data) in ids.iter().zip(meta) {
        let name = if id == 0 {
            AIR.to_owned()
        } else {
            format!("legacy:{id}:{}", data & 0x0f)
        };
        let index = *lookup.entry(name).or_insert_with_key(|name| {
            let index = u32::try_from(palette.len()).unwrap_or(u32::MAX);
            palette.push(name.clone());
            index
        });
        blocks.push(index);
    }
    (palette, blocks)
}

fn decode_varints(data: &[u8]) -> Result<Vec<u32>, DecodeError> {
    let mut values = Vec::new();
    let mut value: u32 = 0;
    let mut shift: u32 = 0;
    for &byte in data {
        let bits = u32::from(byte & 0x7f);
        // The fifth byte may only carry the top four bits of a u32.
        if shift > 28 || (shift == 28 && bits > 0x0f) {
            return Err(malformed("varint too long"));
        }
        value |= bits.checked_shl(shift).unwrap_or(0);
        if byte & 0x80 == 0 {
            values.push(value);
            value = 0;
            shift = 0;
        } else {
            shift = shift.saturating_add(7);
        }
    }
    if shift != 0 {
        return Err(malformed("truncated varint"));
    }
    Ok(values)
}

fn encode_varint(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = u8::try_from(value & 0x7f).unwrap_or(0);
        value = value.checked_shr(7).unwrap_or(0);
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// A decoded schematic handed to the scheduler.
#[derive(Debug, Clone)]
pub struct SchematicClipboard {
    schematic: Schematic,
}

impl SchematicClipboard {
    /// Wrap a decoded schematic.
    pub const fn new(schematic: Schematic) -> Self {
        Self { schematic }
    }

    /// The wrapped schematic.
    pub const fn schematic(&self) -> &Schematic {
        &self.schematic
    }
}

impl Clipboard for SchematicClipboard {
    fn region_volume(&self) -> u64 {
        self.schematic.volume()
    }

    fn footprint(&self, origin: BlockPos) -> Option<Bounds> {
        let (width, height, length) = self.schematic.dimensions();
        Bounds::from_origin_and_size(
            origin,
            u32::from(width),
            u32::from(height),
            u32::from(length),
        )
    }

    fn into_paste(
        self: Box<Self>,
        origin: BlockPos,
        ignore_air_blocks: bool,
    ) -> Result<Box<dyn PasteOperation>, OperationError> {
        if self.footprint(origin).is_none() {
            return Err(OperationError::new(format!(
                "structure does not fit at {origin}"
            )));
        }
        Ok(Box::new(SchematicPaste {
            total: self.schematic.volume(),
            schematic: self.schematic,
            origin,
            ignore_air_blocks,
            next: 0,
        }))
    }
}

/// Writes a schematic block by block, one unit per block position.
///
/// Air positions count as units even when they are skipped.
#[derive(Debug)]
pub struct SchematicPaste {
    schematic: Schematic,
    origin: BlockPos,
    ignore_air_blocks: bool,
    next: u64,
    total: u64,
}

impl PasteOperation for SchematicPaste {
    fn total_units(&self) -> u64 {
        self.total
    }

    fn advance_by(
        &mut self,
        session: &mut dyn EditSession,
        max_units: u64,
    ) -> Result<u64, OperationError> {
        let start = self.next;
        let end = start.saturating_add(max_units).min(self.total);
        while self.next < end {
            let index = self.next;
            let (block, (dx, dy, dz)) = self
                .schematic
                .entry(index)
                .ok_or_else(|| OperationError::new(format!("block {index} out of range")))?;
            if !(self.ignore_air_blocks && is_air(block)) {
                let pos = self
                    .origin
                    .offset(dx, dy, dz)
                    .ok_or_else(|| OperationError::new("block position overflows"))?;
                session.set_block(pos, block)?;
            }
            self.next = index.saturating_add(1);
        }
        Ok(self.next.saturating_sub(start))
    }

    fn is_complete(&self) -> bool {
        self.next >= self.total
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::world::BlockWorld;
    use autoschematic_core::capability::{SessionFlags, WorldHandle};

    /// 2x2x2 cube: stone floor, air on top except one glass block.
    fn cube() -> Schematic {
        let palette = vec![
            AIR.to_owned(),
            "minecraft:stone".to_owned(),
            "minecraft:glass".to_owned(),
        ];
        Schematic::new(2, 2, 2, palette, vec![1, 1, 1, 1, 0, 0, 2, 0]).unwrap()
    }

    #[test]
    fn indices_map_x_then_z_then_y() {
        let schematic = cube();
        assert_eq!(schematic.entry(1), Some(("minecraft:stone", (1, 0, 0))));
        assert_eq!(schematic.entry(2), Some(("minecraft:stone", (0, 0, 1))));
        assert_eq!(schematic.entry(6), Some(("minecraft:glass", (0, 1, 1))));
        assert_eq!(schematic.block_at(0, 1, 1), Some("minecraft:glass"));
        assert_eq!(schematic.entry(8), None);
    }

    #[test]
    fn sponge_v2_round_trips_through_nbt() {
        let schematic = cube();
        let (decoded, format) = Schematic::from_nbt(&schematic.to_sponge_v2()).unwrap();
        assert_eq!(format, SchematicFormat::SpongeV2);
        assert_eq!(decoded, schematic);
    }

    #[test]
    fn sponge_v3_nested_layout_decodes() {
        let v2 = cube().to_sponge_v2();
        let mut blocks = Compound::new();
        blocks.insert("Palette".to_owned(), v2.get("Palette").unwrap().clone());
        blocks.insert("Data".to_owned(), v2.get("BlockData").unwrap().clone());
        let mut body = Compound::new();
        body.insert("Version".to_owned(), Tag::Int(3));
        for key in ["Width", "Height", "Length"] {
            body.insert(key.to_owned(), v2.get(key).unwrap().clone());
        }
        body.insert("Blocks".to_owned(), Tag::Compound(blocks));
        let mut root = Compound::new();
        root.insert("Schematic".to_owned(), Tag::Compound(body));

        let (decoded, format) = Schematic::from_nbt(&root).unwrap();
        assert_eq!(format, SchematicFormat::SpongeV3);
        assert_eq!(decoded, cube());
    }

    #[test]
    fn legacy_layout_names_blocks_by_id() {
        let mut root = Compound::new();
        root.insert("Width".to_owned(), Tag::Short(2));
        root.insert("Height".to_owned(), Tag::Short(1));
        root.insert("Length".to_owned(), Tag::Short(1));
        root.insert("Materials".to_owned(), Tag::String("Alpha".to_owned()));
        root.insert("Blocks".to_owned(), Tag::ByteArray(vec![0, 35]));
        root.insert("Data".to_owned(), Tag::ByteArray(vec![0, 0x1e]));
        let (decoded, format) = Schematic::from_nbt(&root).unwrap();
        assert_eq!(format, SchematicFormat::Legacy);
        assert_eq!(decoded.block_at(0, 0, 0), Some(AIR));
        assert_eq!(decoded.block_at(1, 0, 0), Some("legacy:35:14"));
    }

    #[test]
    fn wide_varints_decode() {
        let mut data = Vec::new();
        encode_varint(&mut data, 300);
        encode_varint(&mut data, 5);
        assert_eq!(data, vec![0xac, 0x02, 0x05]);
        assert_eq!(decode_varints(&data).unwrap(), vec![300, 5]);
        assert!(decode_varints(&[0x80]).is_err());
        assert!(decode_varints(&[0xff, 0xff, 0xff, 0xff, 0xff, 0x01]).is_err());
    }

    #[test]
    fn fifth_varint_byte_cannot_overflow_u32() {
        let mut data = Vec::new();
        encode_varint(&mut data, u32::MAX);
        assert_eq!(data, vec![0xff, 0xff, 0xff, 0xff, 0x0f]);
        assert_eq!(decode_varints(&data).unwrap(), vec![u32::MAX]);

        // 1 | 1 << 32 would wrap to index 1.
        assert!(matches!(
            decode_varints(&[0x81, 0x80, 0x80, 0x80, 0x10]),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn inconsistent_inputs_are_malformed() {
        assert!(matches!(
            Schematic::new(2, 1, 1, vec![AIR.to_owned()], vec![0]),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            Schematic::new(1, 1, 1, vec![AIR.to_owned()], vec![3]),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            Schematic::new(0, 1, 1, Vec::new(), Vec::new()),
            Err(DecodeError::Empty)
        ));
        assert!(matches!(
            Schematic::from_nbt(&Compound::new()),
            Err(DecodeError::UnsupportedFormat)
        ));
    }

    #[test]
    fn paste_reports_real_progress_and_skips_air() {
        let world = BlockWorld::new("test");
        let mut session = world.open_session(SessionFlags::default()).unwrap();
        let clipboard = Box::new(SchematicClipboard::new(cube()));
        let mut paste = clipboard.into_paste(BlockPos::new(10, 64, 10), true).unwrap();

        assert_eq!(paste.total_units(), 8);
        assert_eq!(paste.advance_by(session.as_mut(), 5).unwrap(), 5);
        assert!(!paste.is_complete());
        assert_eq!(paste.advance_by(session.as_mut(), 100).unwrap(), 3);
        assert!(paste.is_complete());
        assert_eq!(paste.advance_by(session.as_mut(), 100).unwrap(), 0);
        session.close().unwrap();

        assert_eq!(world.block(BlockPos::new(11, 64, 11)).as_deref(), Some("minecraft:stone"));
        assert_eq!(world.block(BlockPos::new(10, 65, 11)).as_deref(), Some("minecraft:glass"));
        assert_eq!(world.len(), 5);
    }

    #[test]
    fn air_overwrites_when_not_ignored() {
        let world = BlockWorld::new("test");
        world.place(BlockPos::new(0, 1, 0), "minecraft:dirt");
        let mut session = world.open_session(SessionFlags::default()).unwrap();
        let mut paste = Box::new(SchematicClipboard::new(cube()))
            .into_paste(BlockPos::new(0, 0, 0), false)
            .unwrap();
        paste.advance_by(session.as_mut(), u64::MAX).unwrap();
        session.close().unwrap();
        assert_eq!(world.block(BlockPos::new(0, 1, 0)), None);
    }
}
