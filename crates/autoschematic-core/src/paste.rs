//! Request entry point.
//!
//! [`PasteScheduler::load`] runs each request through three phases, in
//! order:
//!
//! 1. **Prepare** (background): resolve the name, decode the clipboard,
//!    pick a strategy. Nothing here touches the world.
//! 2. **Apply entry** (owner thread): compute the footprint, take the
//!    region lock, open the edit session.
//! 3. **Apply**: one slot for [`PasteStrategy::Immediate`], a per-tick
//!    state machine with a timeout race for [`PasteStrategy::Chunked`].
//!
//! Every phase that fails resolves the request's handle directly; no
//! phase is skipped on success.

use std::sync::{Arc, PoisonError, RwLock};

use autoschematic_types::{BlockPos, RequestId};
use tracing::{debug, info};

use crate::capability::{Clipboard, ClipboardSource, WorldHandle};
use crate::chunked;
use crate::completion::Completion;
use crate::config::PluginConfig;
use crate::error::PasteError;
use crate::immediate;
use crate::locate::SchematicLocator;
use crate::options::PasteOptions;
use crate::outcome::{PasteHandle, outcome_channel};
use crate::region::RegionLocks;
use crate::schedule::TickScheduler;
use crate::sink::ResultSink;
use crate::strategy::{self, PasteStrategy};

/// One paste invocation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteRequest {
    /// Correlates log lines and the returned handle.
    pub id: RequestId,
    /// Name or path to resolve.
    pub source_file: String,
    /// Paste origin.
    pub target: BlockPos,
    /// Options snapshot taken when the request was made.
    pub options: PasteOptions,
}

impl PasteRequest {
    /// A request with a fresh id.
    pub fn new(source_file: impl Into<String>, target: BlockPos, options: PasteOptions) -> Self {
        Self {
            id: RequestId::new(),
            source_file: source_file.into(),
            target,
            options,
        }
    }

    /// The configured startup paste: `schematic-file` at the spawn
    /// coordinate.
    pub fn from_config(config: &PluginConfig) -> Self {
        Self::new(
            config.schematic_file.clone(),
            config.spawn_position(),
            PasteOptions::from_config(&config.performance),
        )
    }
}

struct Inner {
    scheduler: Arc<dyn TickScheduler>,
    source: Arc<dyn ClipboardSource>,
    world: Arc<dyn WorldHandle>,
    locator: RwLock<SchematicLocator>,
    locks: Arc<RegionLocks>,
}

/// Drives paste requests against one world.
///
/// Cheap to clone; clones share the region locks and the locator.
#[derive(Clone)]
pub struct PasteScheduler {
    inner: Arc<Inner>,
}

impl PasteScheduler {
    /// Build a scheduler from its collaborators.
    pub fn new(
        scheduler: Arc<dyn TickScheduler>,
        source: Arc<dyn ClipboardSource>,
        world: Arc<dyn WorldHandle>,
        locator: SchematicLocator,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                scheduler,
                source,
                world,
                locator: RwLock::new(locator),
                locks: Arc::new(RegionLocks::new()),
            }),
        }
    }

    /// Current locator.
    pub fn locator(&self) -> SchematicLocator {
        self.inner
            .locator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the locator, e.g. after the schematics folder was
    /// reconfigured. Requests already past resolution are unaffected.
    pub fn set_locator(&self, locator: SchematicLocator) {
        *self
            .inner
            .locator
            .write()
            .unwrap_or_else(PoisonError::into_inner) = locator;
    }

    /// Region locks held by in-flight pastes.
    pub fn region_locks(&self) -> &Arc<RegionLocks> {
        &self.inner.locks
    }

    /// Submit a request. The returned handle resolves exactly once.
    ///
    /// `sink`, if present, is told about the outcome before the handle
    /// resolves.
    pub fn load(&self, request: PasteRequest, sink: Option<Arc<dyn ResultSink>>) -> PasteHandle {
        let (cell, handle) = outcome_channel(request.id);
        let completion = Completion::new(
            request.id,
            request.source_file.clone(),
            request.target,
            cell,
            sink,
        );
        info!(
            request = %request.id,
            file = %request.source_file,
            target = %request.target,
            "Paste requested"
        );

        let inner = Arc::clone(&self.inner);
        self.inner
            .scheduler
            .run_async(Box::new(move || Inner::prepare(&inner, &request, completion)));
        handle
    }
}

impl std::fmt::Debug for PasteScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasteScheduler")
            .field("world", &self.inner.world.name())
            .field("locator", &self.locator())
            .field("held_regions", &self.inner.locks.held_count())
            .finish_non_exhaustive()
    }
}

impl Inner {
    /// Background phase: resolve, decode, decide.
    fn prepare(this: &Arc<Self>, request: &PasteRequest, completion: Completion) {
        let resolved = this
            .locator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve(&request.source_file);
        let path = match resolved {
            Ok(path) => path,
            Err(err) => {
                completion.fail(err);
                return;
            }
        };

        let clipboard = match this.source.load(&path) {
            Ok(clipboard) => clipboard,
            Err(err) => {
                completion.fail(PasteError::Decode {
                    path,
                    message: err.to_string(),
                });
                return;
            }
        };

        let options = request.options;
        let volume = clipboard.region_volume();
        let strategy = strategy::decide(volume, &options);
        debug!(
            request = %request.id,
            path = %path.display(),
            volume,
            %strategy,
            "Clipboard loaded"
        );

        let inner = Arc::clone(this);
        this.scheduler.run_on_owner(Box::new(move || {
            inner.apply(clipboard, &options, strategy, completion);
        }));
    }

    /// Owner-thread phase: reserve the footprint and dispatch.
    fn apply(
        &self,
        clipboard: Box<dyn Clipboard>,
        options: &PasteOptions,
        strategy: PasteStrategy,
        completion: Completion,
    ) {
        let origin = completion.origin();
        let Some(bounds) = clipboard.footprint(origin) else {
            completion.fail(PasteError::Apply {
                message: format!("structure does not fit at {origin}"),
            });
            return;
        };
        let Some(region) = self.locks.try_acquire(bounds) else {
            completion.fail(PasteError::RegionBusy { bounds });
            return;
        };

        match strategy {
            PasteStrategy::Immediate => {
                immediate::apply(self.world.as_ref(), clipboard, options, &completion, region);
            }
            PasteStrategy::Chunked => {
                chunked::start(
                    &self.scheduler,
                    self.world.as_ref(),
                    clipboard,
                    options,
                    completion,
                    region,
                );
            }
        }
    }
}
