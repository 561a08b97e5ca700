//! Clipboard source backed by schematic files on disk.

use std::io::Read;
use std::path::Path;

use autoschematic_core::capability::{Clipboard, ClipboardSource, DecodeError};
use flate2::read::GzDecoder;
use tracing::debug;

use crate::nbt;
use crate::schematic::{Schematic, SchematicClipboard};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Reads `.schem` and `.schematic` files, gzip-compressed or raw.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileClipboardSource;

impl FileClipboardSource {
    /// A new source.
    pub const fn new() -> Self {
        Self
    }

    /// Decode schematic bytes as read from disk.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the bytes are not a supported schematic.
    pub fn decode(bytes: &[u8]) -> Result<SchematicClipboard, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let inflated;
        let raw = if bytes.starts_with(&GZIP_MAGIC) {
            let mut buf = Vec::new();
            GzDecoder::new(bytes).read_to_end(&mut buf)?;
            inflated = buf;
            inflated.as_slice()
        } else {
            bytes
        };

        let (_, root) = nbt::read(raw).map_err(|err| DecodeError::Malformed {
            reason: err.to_string(),
        })?;
        let (schematic, format) = Schematic::from_nbt(&root)?;
        let (width, height, length) = schematic.dimensions();
        debug!(
            %format,
            width,
            height,
            length,
            palette = schematic.palette().len(),
            "Schematic decoded"
        );
        Ok(SchematicClipboard::new(schematic))
    }
}

impl ClipboardSource for FileClipboardSource {
    fn load(&self, path: &Path) -> Result<Box<dyn Clipboard>, DecodeError> {
        let bytes = std::fs::read(path)?;
        Ok(Box::new(Self::decode(&bytes)?))
    }
}
