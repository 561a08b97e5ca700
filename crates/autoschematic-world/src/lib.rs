//! Concrete collaborators for the `AutoSchematic` paste scheduler.
//!
//! # Modules
//!
//! - [`nbt`] -- Big-endian NBT reader and writer.
//! - [`schematic`] -- Sponge and `MCEdit` schematic decoding, plus the
//!   block-by-block paste operation.
//! - [`source`] -- [`FileClipboardSource`], gzip-aware file loading.
//! - [`world`] -- [`BlockWorld`], an in-memory world with buffered edit
//!   sessions.
//!
//! [`FileClipboardSource`]: source::FileClipboardSource
//! [`BlockWorld`]: world::BlockWorld

pub mod nbt;
pub mod schematic;
pub mod source;
pub mod world;
