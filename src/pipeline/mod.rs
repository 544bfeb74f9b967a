//! MIDI to mlog compilation pipeline
//!
//! - Parser: Load a Standard MIDI File into a [`Score`]
//! - Extractor: Turn the score into timed note events
//! - Scheduler: Pack note events onto execution units
//! - Emitter: Generate each unit's mlog while it is being packed

pub mod emitter;
pub mod extractor;
pub mod parser;
pub mod scheduler;

use std::path::Path;

pub use emitter::Emitter;
pub use extractor::{extract_notes, NoteEvent, NoteKind};
pub use parser::{load_score, parse_smf, EventKind, Score, ScoreEvent, Timing};
pub use scheduler::{schedule, ExecutionUnit, Schedule, Scheduler};

use crate::config::CompileConfig;
use crate::error::Result;
use crate::profile::ProfileTable;

/// Extract and schedule a score with already resolved profiles
pub fn compile_score(score: &Score, profiles: &ProfileTable, config: &CompileConfig) -> Schedule {
    let notes = extract_notes(score, profiles);
    log::info!("extracted {} note events", notes.len());

    let schedule = schedule(
        &notes,
        Emitter::from_config(profiles, config),
        config.capacity(),
        0,
    );
    log::info!(
        "scheduled {} notes on {} units",
        schedule.event_count(),
        schedule.units.len()
    );
    schedule
}

/// Load, extract and schedule a MIDI file
///
/// Fails before any unit is produced if the configuration is invalid or the
/// file cannot be read or parsed.
pub fn compile_file(path: &Path, config: &CompileConfig) -> Result<Schedule> {
    config.validate()?;
    let profiles = config.profiles()?;
    let score = load_score(path)?;
    Ok(compile_score(&score, &profiles, config))
}
