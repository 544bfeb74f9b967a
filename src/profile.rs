//! Instrument profile tables
//!
//! Maps every melodic program (0-127) and every percussion key (0-127) to an
//! in-game sound and the parameters needed to trigger it. Tables start from
//! built-in defaults, are patched by user overrides, and then have the global
//! note/drum volume multipliers applied.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of entries in each table (7-bit MIDI domain)
pub const TABLE_SIZE: usize = 128;

/// Loop length recorded for programs that do not loop
pub const DEFAULT_LOOP_LENGTH_MS: f64 = 1000.0;

/// Sound parameters for a melodic program
#[derive(Debug, Clone, PartialEq)]
pub struct MelodicProfile {
    /// In-game sound identifier (e.g. `@sfx-press`)
    pub sound: String,
    /// MIDI note at which the sound plays at its natural pitch
    pub reference_note: u8,
    /// Volume multiplier
    pub volume: f64,
    /// Re-trigger the sound for as long as the key is held
    pub sustain: bool,
    /// Length of one loop segment at the reference note, in ms
    pub loop_length_ms: f64,
}

impl MelodicProfile {
    /// A profile that triggers once per note
    pub fn one_shot(sound: &str, reference_note: u8, volume: f64) -> Self {
        Self {
            sound: sound.to_string(),
            reference_note,
            volume,
            sustain: false,
            loop_length_ms: DEFAULT_LOOP_LENGTH_MS,
        }
    }

    /// A profile that loops while the key is held
    pub fn looping(sound: &str, reference_note: u8, volume: f64, loop_length_ms: f64) -> Self {
        Self {
            sound: sound.to_string(),
            reference_note,
            volume,
            sustain: true,
            loop_length_ms,
        }
    }

    /// Playback speed that transposes the sound from its reference note to `key`
    pub fn pitch_ratio(&self, key: u8) -> f64 {
        semitone_ratio(key, self.reference_note)
    }

    /// Loop segment length for `key`; higher keys loop faster
    pub fn effective_loop_length(&self, key: u8) -> f64 {
        self.loop_length_ms / self.pitch_ratio(key)
    }
}

/// Sound parameters for a percussion key
#[derive(Debug, Clone, PartialEq)]
pub struct PercussionProfile {
    pub sound: String,
    /// Fixed playback speed, independent of the key
    pub pitch_ratio: f64,
    pub volume: f64,
}

impl PercussionProfile {
    pub fn new(sound: &str, pitch_ratio: f64, volume: f64) -> Self {
        Self {
            sound: sound.to_string(),
            pitch_ratio,
            volume,
        }
    }
}

/// `2^((key - reference) / 12)`
pub fn semitone_ratio(key: u8, reference: u8) -> f64 {
    2f64.powf((f64::from(key) - f64::from(reference)) / 12.0)
}

/// Replaces one melodic program's profile
///
/// `program` is one-based (1-128) as printed in General MIDI tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramOverride {
    pub program: u8,
    pub sound: String,
    pub note: u8,
    pub volume: f64,
    #[serde(default, rename = "loop")]
    pub looped: bool,
    #[serde(default)]
    pub length: Option<f64>,
}

impl ProgramOverride {
    pub fn validate(&self) -> Result<()> {
        if !(1..=128).contains(&self.program) {
            return Err(Error::Config(format!(
                "program {} out of range [1, 128]",
                self.program
            )));
        }
        if self.note > 127 {
            return Err(Error::Config(format!(
                "program {}: note {} out of range [0, 127]",
                self.program, self.note
            )));
        }
        if !self.volume.is_finite() {
            return Err(Error::Config(format!(
                "program {}: volume must be a finite number",
                self.program
            )));
        }
        if self.looped {
            match self.length {
                Some(length) if length.is_finite() && length > 0.0 => {}
                Some(length) => {
                    return Err(Error::Config(format!(
                        "program {}: loop length must be positive, found {}",
                        self.program, length
                    )))
                }
                None => {
                    return Err(Error::Config(format!(
                        "program {}: looping programs need a length",
                        self.program
                    )))
                }
            }
        }
        Ok(())
    }

    fn to_profile(&self) -> MelodicProfile {
        match (self.looped, self.length) {
            (true, Some(length)) => {
                MelodicProfile::looping(&self.sound, self.note, self.volume, length)
            }
            _ => MelodicProfile::one_shot(&self.sound, self.note, self.volume),
        }
    }
}

/// Parses `PROGRAM:SOUND:NOTE:VOLUME:LOOP[:LENGTH]`
impl FromStr for ProgramOverride {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if !(5..=6).contains(&parts.len()) {
            return Err(Error::Config(format!(
                "expected PROGRAM:SOUND:NOTE:VOLUME:LOOP[:LENGTH], found '{}'",
                s
            )));
        }

        let looped = parse_bool("prog", "loop", parts[4])?;
        let length = match parts.get(5) {
            Some(v) => Some(parse_number::<f64>("prog", "length", v)?),
            None => None,
        };
        if !looped && length.is_some() {
            return Err(Error::Config(format!(
                "'{}': a length is only accepted for looping programs",
                s
            )));
        }

        let parsed = Self {
            program: parse_number("prog", "program", parts[0])?,
            sound: unquote(parts[1]).to_string(),
            note: parse_number("prog", "note", parts[2])?,
            volume: parse_number("prog", "volume", parts[3])?,
            looped,
            length,
        };
        parsed.validate()?;
        Ok(parsed)
    }
}

/// Replaces one percussion key's profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrumOverride {
    pub drum: u8,
    pub sound: String,
    pub pitch: f64,
    pub volume: f64,
}

impl DrumOverride {
    pub fn validate(&self) -> Result<()> {
        if self.drum > 127 {
            return Err(Error::Config(format!(
                "drum {} out of range [0, 127]",
                self.drum
            )));
        }
        if !self.pitch.is_finite() || !self.volume.is_finite() {
            return Err(Error::Config(format!(
                "drum {}: pitch and volume must be finite numbers",
                self.drum
            )));
        }
        Ok(())
    }
}

/// Parses `DRUM:SOUND:PITCH:VOLUME`
impl FromStr for DrumOverride {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(Error::Config(format!(
                "expected DRUM:SOUND:PITCH:VOLUME, found '{}'",
                s
            )));
        }

        let parsed = Self {
            drum: parse_number("drum", "drum", parts[0])?,
            sound: unquote(parts[1]).to_string(),
            pitch: parse_number("drum", "pitch", parts[2])?,
            volume: parse_number("drum", "volume", parts[3])?,
        };
        parsed.validate()?;
        Ok(parsed)
    }
}

fn parse_number<T: FromStr>(command: &str, field: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        Error::Config(format!(
            "'{}' at value '{}' expected a number, found '{}'",
            command, field, value
        ))
    })
}

fn parse_bool(command: &str, field: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "True" => Ok(true),
        "false" | "False" => Ok(false),
        _ => Err(Error::Config(format!(
            "'{}' at value '{}' expected bool, found '{}'",
            command, field, value
        ))),
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}

/// Resolved melodic and percussion tables
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTable {
    melodic: Vec<MelodicProfile>,
    percussion: Vec<PercussionProfile>,
}

impl Default for ProfileTable {
    fn default() -> Self {
        let mut melodic = vec![MelodicProfile::one_shot("@sfx-press", 60, 20.0); TABLE_SIZE];
        // Synth leads loop a short mine-deploy blip
        for program in 29..=32 {
            melodic[program] = MelodicProfile::looping("@sfx-mineDeploy", 31, 1.0, 146.0);
        }

        let mut percussion = vec![PercussionProfile::new("@sfx-pew", 1.0, 0.0); TABLE_SIZE];
        let drum_kit: [(usize, &str, f64, f64); 16] = [
            (35, "@sfx-place", 0.4, 0.3),
            (36, "@sfx-place", 0.5, 0.3),
            (37, "@sfx-pew", 1.0, 0.2),
            (38, "@sfx-flame", 1.5, 0.2),
            (39, "@sfx-missile", 4.0, 0.3),
            (40, "@sfx-flame2", 1.5, 0.2),
            (41, "@sfx-dullExplosion", 1.5, 0.3),
            (42, "@sfx-sap", 4.0, 0.3),
            (43, "@sfx-dullExplosion", 2.0, 0.3),
            (44, "@sfx-sap", 2.5, 0.3),
            (45, "@sfx-dullExplosion", 2.5, 0.3),
            (46, "@sfx-flame2", 1.5, 0.3),
            (47, "@sfx-dullExplosion", 3.0, 0.3),
            (48, "@sfx-dullExplosion", 3.5, 0.3),
            (49, "@sfx-flame2", 1.5, 0.3),
            (50, "@sfx-dullExplosion", 4.0, 0.3),
        ];
        for (key, sound, pitch, volume) in drum_kit {
            percussion[key] = PercussionProfile::new(sound, pitch, volume);
        }

        Self {
            melodic,
            percussion,
        }
    }
}

impl ProfileTable {
    /// Apply overrides to the default tables, then scale every volume
    pub fn resolve(
        programs: &[ProgramOverride],
        drums: &[DrumOverride],
        note_volume: f64,
        drum_volume: f64,
    ) -> Result<Self> {
        let mut table = Self::default();

        for program in programs {
            program.validate()?;
            table.melodic[usize::from(program.program - 1)] = program.to_profile();
        }
        for drum in drums {
            drum.validate()?;
            table.percussion[usize::from(drum.drum)] =
                PercussionProfile::new(&drum.sound, drum.pitch, drum.volume);
        }

        table.scale_volumes(note_volume, drum_volume);
        Ok(table)
    }

    /// Multiply every melodic and percussion volume
    pub fn scale_volumes(&mut self, note_volume: f64, drum_volume: f64) {
        for profile in &mut self.melodic {
            profile.volume *= note_volume;
        }
        for profile in &mut self.percussion {
            profile.volume *= drum_volume;
        }
    }

    pub fn melodic(&self, program: u8) -> &MelodicProfile {
        &self.melodic[usize::from(program & 0x7F)]
    }

    pub fn percussion(&self, key: u8) -> &PercussionProfile {
        &self.percussion[usize::from(key & 0x7F)]
    }

    pub fn set_melodic(&mut self, program: u8, profile: MelodicProfile) {
        self.melodic[usize::from(program & 0x7F)] = profile;
    }

    pub fn set_percussion(&mut self, key: u8, profile: PercussionProfile) {
        self.percussion[usize::from(key & 0x7F)] = profile;
    }
}
