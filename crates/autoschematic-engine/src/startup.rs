//! Startup paste trigger.

use std::sync::Arc;

use autoschematic_core::config::ConfigStore;
use autoschematic_core::paste::{PasteRequest, PasteScheduler};
use autoschematic_core::schedule::{TaskHandle, TickScheduler};
use tracing::{error, info};

/// Ticks to wait after boot before the startup paste fires.
pub const STARTUP_DELAY_TICKS: u64 = 100;

/// Schedule the configured startup paste, if `load-on-startup` is set.
///
/// The request is built when the task fires, so a reload before then
/// is honoured. A failed paste is logged and otherwise ignored.
pub fn schedule(
    scheduler: &dyn TickScheduler,
    pastes: PasteScheduler,
    config: Arc<ConfigStore>,
) -> Option<TaskHandle> {
    if !config.snapshot().load_on_startup {
        info!("Startup paste disabled");
        return None;
    }
    info!(delay_ticks = STARTUP_DELAY_TICKS, "Startup paste scheduled");
    let handle = scheduler.run_after(
        Box::new(move || {
            let current = config.snapshot();
            if !current.load_on_startup {
                return;
            }
            let request = PasteRequest::from_config(&current);
            let file = request.source_file.clone();
            let outcome = pastes.load(request, None);
            tokio::spawn(async move {
                if !outcome.succeeded().await {
                    error!(file = %file, "Failed to load startup schematic");
                }
            });
        }),
        STARTUP_DELAY_TICKS,
    );
    Some(handle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use autoschematic_core::config::PluginConfig;
    use autoschematic_core::locate::SchematicLocator;
    use autoschematic_core::tick_queue::TickQueue;
    use autoschematic_types::BlockPos;
    use autoschematic_world::nbt;
    use autoschematic_world::schematic::Schematic;
    use autoschematic_world::source::FileClipboardSource;
    use autoschematic_world::world::BlockWorld;

    use super::*;

    fn setup(load_on_startup: bool) -> (tempfile::TempDir, Arc<TickQueue>, BlockWorld, Option<TaskHandle>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("schematics")).unwrap();
        let schematic = Schematic::new(1, 1, 1, vec!["minecraft:beacon".to_owned()], vec![0]).unwrap();
        std::fs::write(
            dir.path().join("schematics/spawn.schem"),
            nbt::write("Schematic", &schematic.to_sponge_v2()).unwrap(),
        )
        .unwrap();

        let config = PluginConfig {
            spawn_x: 3,
            spawn_y: 70,
            spawn_z: 3,
            load_on_startup,
            ..PluginConfig::default()
        };
        let store = Arc::new(ConfigStore::from_config(dir.path(), config));
        let queue = Arc::new(TickQueue::new());
        let world = BlockWorld::new("world");
        let pastes = PasteScheduler::new(
            Arc::clone(&queue) as Arc<dyn TickScheduler>,
            Arc::new(FileClipboardSource::new()),
            Arc::new(world.clone()),
            SchematicLocator::new(dir.path(), "schematics"),
        );
        let handle = schedule(queue.as_ref(), pastes, store);
        (dir, queue, world, handle)
    }

    #[tokio::test]
    async fn fires_after_the_startup_delay() {
        let (_dir, queue, world, handle) = setup(true);
        assert!(handle.is_some());
        queue.advance(STARTUP_DELAY_TICKS);
        assert!(world.is_empty());
        // Prepare, then apply.
        queue.advance(2);
        assert_eq!(
            world.block(BlockPos::new(3, 70, 3)).as_deref(),
            Some("minecraft:beacon")
        );
    }

    #[tokio::test]
    async fn disabled_startup_schedules_nothing() {
        let (_dir, queue, world, handle) = setup(false);
        assert!(handle.is_none());
        queue.advance(STARTUP_DELAY_TICKS.saturating_add(5));
        assert!(world.is_empty());
        assert_eq!(queue.pending(), 0);
    }
}
