//! Compile MIDI files into banks of Mindustry world processors
//!
//! Each note of the song becomes a short mlog fragment that waits for the
//! note's start time and then plays a sound. Fragments are packed onto as few
//! processors as their timing and instruction budget allow, and the
//! processors are laid out into a schematic next to a shared start switch.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod profile;
pub mod schematic;

pub use config::{CompileConfig, Placement};
pub use error::{Error, Result};
pub use pipeline::{compile_file, compile_score};
pub use profile::ProfileTable;
pub use schematic::Schematic;
