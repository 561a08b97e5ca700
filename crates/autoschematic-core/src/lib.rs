//! Paste scheduler core for `AutoSchematic`.
//!
//! This crate decides how a decoded structure is written into a world:
//! all at once inside one owner-thread slot, or spread across ticks under
//! a per-tick budget with a timeout racing it. Every request resolves its
//! [`PasteHandle`] exactly once.
//!
//! # Modules
//!
//! - [`capability`] -- Traits for the external collaborators: clipboard
//!   source, clipboard, paste operation, edit session, world.
//! - [`chunked`] -- Resumable per-tick state machine and timeout race.
//! - [`config`] -- `config.yml` loading and the reloadable [`ConfigStore`].
//! - [`error`] -- [`PasteError`] and [`PasteFailure`].
//! - [`locate`] -- Name-to-file resolution in the schematics folder.
//! - [`messages`] -- `messages.yml` catalog and colour codes.
//! - [`options`] -- Clamped per-request [`PasteOptions`] snapshot.
//! - [`outcome`] -- Single-assignment outcome cell and [`PasteHandle`].
//! - [`paste`] -- [`PasteScheduler`], the request entry point.
//! - [`region`] -- Mutual exclusion for overlapping footprints.
//! - [`schedule`] -- The [`TickScheduler`] abstraction.
//! - [`sink`] -- [`ResultSink`] notification of terminal outcomes.
//! - [`strategy`] -- Immediate-versus-chunked decision.
//! - [`tick_queue`] -- Manually clocked [`TickScheduler`].
//!
//! [`ConfigStore`]: config::ConfigStore
//! [`PasteError`]: error::PasteError
//! [`PasteFailure`]: error::PasteFailure
//! [`PasteOptions`]: options::PasteOptions
//! [`PasteHandle`]: outcome::PasteHandle
//! [`PasteScheduler`]: paste::PasteScheduler
//! [`TickScheduler`]: schedule::TickScheduler
//! [`ResultSink`]: sink::ResultSink

pub mod capability;
pub mod chunked;
mod completion;
pub mod config;
pub mod error;
mod immediate;
pub mod locate;
pub mod messages;
pub mod options;
pub mod outcome;
pub mod paste;
pub mod region;
pub mod schedule;
pub mod sink;
pub mod strategy;
pub mod tick_queue;

#[cfg(test)]
mod testing;
