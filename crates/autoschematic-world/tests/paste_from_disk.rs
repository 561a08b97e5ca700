//! End-to-end pastes from schematic files on disk into an in-memory world.

#![allow(clippy::unwrap_used)]

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use autoschematic_core::error::FailureKind;
use autoschematic_core::locate::SchematicLocator;
use autoschematic_core::options::PasteOptions;
use autoschematic_core::paste::{PasteRequest, PasteScheduler};
use autoschematic_core::schedule::TickScheduler;
use autoschematic_core::sink::{MemorySink, PasteNotice, ResultSink};
use autoschematic_core::tick_queue::TickQueue;
use autoschematic_types::BlockPos;
use autoschematic_world::nbt::{self, Compound, Tag};
use autoschematic_world::schematic::{AIR, Schematic};
use autoschematic_world::source::FileClipboardSource;
use autoschematic_world::world::BlockWorld;
use flate2::Compression;
use flate2::write::GzEncoder;

struct Server {
    dir: tempfile::TempDir,
    queue: Arc<TickQueue>,
    world: BlockWorld,
    scheduler: PasteScheduler,
}

fn server() -> Server {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("schematics")).unwrap();
    let queue = Arc::new(TickQueue::new());
    let world = BlockWorld::new("world");
    let scheduler = PasteScheduler::new(
        Arc::clone(&queue) as Arc<dyn TickScheduler>,
        Arc::new(FileClipboardSource::new()),
        Arc::new(world.clone()),
        SchematicLocator::new(dir.path(), "schematics"),
    );
    Server {
        dir,
        queue,
        world,
        scheduler,
    }
}

/// Solid box of `block` with an air column at x = 0, z = 0.
fn hollow_corner(width: u16, height: u16, length: u16, block: &str) -> Schematic {
    let layer = usize::from(width).saturating_mul(usize::from(length));
    let volume = layer.saturating_mul(usize::from(height));
    let blocks = (0..volume)
        .map(|i| u32::from(i.checked_rem(layer).unwrap() != 0))
        .collect();
    Schematic::new(
        width,
        height,
        length,
        vec![AIR.to_owned(), block.to_owned()],
        blocks,
    )
    .unwrap()
}

fn write_gzip(path: &Path, schematic: &Schematic) {
    let raw = nbt::write("Schematic", &schematic.to_sponge_v2()).unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();
    std::fs::write(path, encoder.finish().unwrap()).unwrap();
}

#[test]
fn small_schematic_lands_in_one_owner_slot() {
    let server = server();
    write_gzip(
        &server.dir.path().join("schematics/hut.schem"),
        &hollow_corner(4, 3, 4, "minecraft:oak_planks"),
    );
    let sink = Arc::new(MemorySink::new());
    let origin = BlockPos::new(100, 64, -20);
    let mut handle = server.scheduler.load(
        PasteRequest::new("hut", origin, PasteOptions::default()),
        Some(Arc::clone(&sink) as Arc<dyn ResultSink>),
    );

    server.queue.advance(2);
    assert!(handle.try_outcome().unwrap().is_success());
    assert_eq!(sink.notices(), vec![PasteNotice::Pasted { origin }]);
    assert_eq!(server.world.len(), 45);
    assert_eq!(server.world.block(origin), None);
    assert_eq!(
        server.world.block(BlockPos::new(103, 66, -17)).as_deref(),
        Some("minecraft:oak_planks")
    );
}

#[test]
fn large_schematic_commits_when_the_last_tick_finishes() {
    let server = server();
    write_gzip(
        &server.dir.path().join("schematics/keep.schem"),
        &hollow_corner(40, 10, 40, "minecraft:stone_bricks"),
    );
    let mut handle = server.scheduler.load(
        PasteRequest::new("keep", BlockPos::new(0, 60, 0), PasteOptions::default()),
        None,
    );

    // Prepare, apply entry, then 16 steps of 1000 units.
    server.queue.advance(17);
    assert!(handle.try_outcome().is_none());
    assert!(server.world.is_empty());

    server.queue.tick();
    let report = handle.try_outcome().unwrap().report().copied().unwrap();
    assert_eq!(report.units, 16_000);
    assert_eq!(report.ticks, 16);
    assert_eq!(server.world.len(), 15_990);
    assert_eq!(server.world.commits(), 1);
}

#[test]
fn legacy_extension_wins_when_both_exist() {
    let server = server();
    write_gzip(
        &server.dir.path().join("schematics/gate.schem"),
        &hollow_corner(2, 1, 1, "minecraft:iron_bars"),
    );
    let mut legacy = Compound::new();
    legacy.insert("Width".to_owned(), Tag::Short(2));
    legacy.insert("Height".to_owned(), Tag::Short(1));
    legacy.insert("Length".to_owned(), Tag::Short(1));
    legacy.insert("Blocks".to_owned(), Tag::ByteArray(vec![1, 1]));
    legacy.insert("Data".to_owned(), Tag::ByteArray(vec![0, 0]));
    std::fs::write(
        server.dir.path().join("schematics/gate.schematic"),
        nbt::write("Schematic", &legacy).unwrap(),
    )
    .unwrap();

    let mut handle = server.scheduler.load(
        PasteRequest::new("gate", BlockPos::default(), PasteOptions::default()),
        None,
    );
    server.queue.advance(2);
    assert!(handle.try_outcome().unwrap().is_success());
    assert_eq!(server.world.block(BlockPos::default()).as_deref(), Some("legacy:1:0"));
}

#[test]
fn corrupt_file_is_a_decode_failure_not_not_found() {
    let server = server();
    std::fs::write(server.dir.path().join("schematics/broken.schem"), b"\x1f\x8bnope").unwrap();
    let mut handle = server.scheduler.load(
        PasteRequest::new("broken", BlockPos::default(), PasteOptions::default()),
        None,
    );
    server.queue.tick();
    let failure = handle.try_outcome().unwrap().failure().unwrap();
    assert_eq!(failure.kind(), FailureKind::Decode);
    assert!(server.world.is_empty());
}

#[test]
fn listing_shows_stems_of_known_extensions() {
    let server = server();
    let folder = server.dir.path().join("schematics");
    std::fs::write(folder.join("b.schem"), b"").unwrap();
    std::fs::write(folder.join("a.schematic"), b"").unwrap();
    std::fs::write(folder.join("a.schem"), b"").unwrap();
    std::fs::write(folder.join("notes.txt"), b"").unwrap();
    assert_eq!(server.scheduler.locator().available(), vec!["a", "a", "b"]);
}

#[tokio::test]
async fn handle_future_resolves_after_ticks() {
    let server = server();
    write_gzip(
        &server.dir.path().join("schematics/hut.schem"),
        &hollow_corner(2, 2, 2, "minecraft:stone"),
    );
    let handle = server.scheduler.load(
        PasteRequest::new("schematics/hut.schem", BlockPos::default(), PasteOptions::default()),
        None,
    );
    server.queue.advance(2);
    assert!(handle.succeeded().await);
}
