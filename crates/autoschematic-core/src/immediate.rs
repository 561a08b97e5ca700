//! Immediate apply: the whole paste inside one owner-thread slot.

use tracing::debug;

use crate::capability::{Clipboard, EditSession, PasteOperation, WorldHandle};
use crate::completion::{Completion, settle};
use crate::error::PasteError;
use crate::options::PasteOptions;
use crate::outcome::PasteReport;
use crate::region::RegionGuard;
use crate::strategy::PasteStrategy;

/// Drive `operation` to completion with no per-tick bound.
fn run_to_completion(
    operation: &mut dyn PasteOperation,
    session: &mut dyn EditSession,
) -> Result<u64, PasteError> {
    let mut units: u64 = 0;
    while !operation.is_complete() {
        let advanced = operation
            .advance_by(session, u64::MAX)
            .map_err(|err| PasteError::Apply {
                message: err.message,
            })?;
        if advanced == 0 {
            return Err(PasteError::Apply {
                message: "paste operation stalled".to_owned(),
            });
        }
        units = units.saturating_add(advanced);
    }
    Ok(units)
}

/// Open a session, paste everything, close, resolve.
///
/// The session is closed on every path that opened it, before the
/// outcome is resolved.
pub(crate) fn apply(
    world: &dyn WorldHandle,
    clipboard: Box<dyn Clipboard>,
    options: &PasteOptions,
    completion: &Completion,
    region: RegionGuard,
) {
    let mut session = match world.open_session(options.session_flags) {
        Ok(session) => session,
        Err(err) => {
            drop(region);
            completion.fail(PasteError::Apply {
                message: err.message,
            });
            return;
        }
    };

    let result = clipboard
        .into_paste(completion.origin(), options.ignore_air_blocks)
        .map_err(|err| PasteError::Apply {
            message: err.message,
        })
        .and_then(|mut operation| run_to_completion(operation.as_mut(), session.as_mut()));
    let close = session.close();
    drop(region);

    debug!(request = %completion.id(), world = world.name(), "Immediate paste applied");

    let Some(claim) = completion.try_claim() else {
        return;
    };
    let result = result.map(|units| PasteReport {
        origin: completion.origin(),
        strategy: PasteStrategy::Immediate,
        units,
        ticks: 0,
    });
    completion.finish(claim, settle(completion.id(), result, close));
}
