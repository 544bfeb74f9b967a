//! Compiler configuration
//!
//! Settings can come from a TOML file and are then layered with
//! command-line flags:
//!
//! ```toml
//! vfx = true
//! limit = false
//! note_volume = 1.0
//! drum_volume = 0.5
//!
//! [placement]
//! mode = "location"
//! x = 100.0
//! y = 40.0
//!
//! [[programs]]
//! program = 30
//! sound = "@sfx-press"
//! note = 60
//! volume = 1.0
//! loop = true
//! length = 146.0
//!
//! [[drums]]
//! drum = 36
//! sound = "@sfx-place"
//! pitch = 0.5
//! volume = 0.3
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::emitter::format_number;
use crate::profile::{DrumOverride, ProfileTable, ProgramOverride};

/// Events per unit when visual effects are emitted
pub const VFX_CAPACITY: usize = 230;

/// Events per unit without visual effects
pub const PLAIN_CAPACITY: usize = 320;

/// Where sounds are played from
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Placement {
    /// Non-positional playback, panned by the MIDI channel
    #[default]
    Global,
    /// Positional playback at the emitting processor
    #[serde(rename = "self")]
    Processor,
    /// Positional playback at a fixed world coordinate
    Location { x: f64, y: f64 },
}

impl Placement {
    pub fn is_positional(&self) -> bool {
        !matches!(self, Placement::Global)
    }

    /// Coordinates used by positional sounds and visual effects
    pub fn coordinates(&self) -> (String, String) {
        match self {
            Placement::Global | Placement::Processor => ("@thisx".to_string(), "@thisy".to_string()),
            Placement::Location { x, y } => (format_number(*x), format_number(*y)),
        }
    }
}

/// Parses `self` or `X,Y`
impl FromStr for Placement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "self" => Ok(Placement::Processor),
            "global" => Ok(Placement::Global),
            other => {
                let (x, y) = other.split_once(',').ok_or_else(|| {
                    Error::Config(format!(
                        "'pos' expected either 'self' or 'X,Y', found '{}'",
                        other
                    ))
                })?;
                let parse = |v: &str| {
                    v.trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|n| n.is_finite())
                        .ok_or_else(|| {
                            Error::Config(format!("'pos' expected a coordinate, found '{}'", v))
                        })
                };
                Ok(Placement::Location {
                    x: parse(x)?,
                    y: parse(y)?,
                })
            }
        }
    }
}

/// Full configuration of one compiler run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Show an effect over the processor whenever a note plays
    pub vfx: bool,
    pub placement: Placement,
    /// Ask the runtime to limit overlapping instances of the same sound
    pub limit: bool,
    /// Multiplier for every melodic profile's volume
    pub note_volume: f64,
    /// Multiplier for every percussion profile's volume
    pub drum_volume: f64,
    pub programs: Vec<ProgramOverride>,
    pub drums: Vec<DrumOverride>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            vfx: false,
            placement: Placement::Global,
            limit: false,
            note_volume: 1.0,
            drum_volume: 1.0,
            programs: Vec::new(),
            drums: Vec::new(),
        }
    }
}

impl CompileConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: CompileConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values outside their domain
    pub fn validate(&self) -> Result<()> {
        if !self.note_volume.is_finite() {
            return Err(Error::Config("note volume must be a finite number".to_string()));
        }
        if !self.drum_volume.is_finite() {
            return Err(Error::Config("drum volume must be a finite number".to_string()));
        }
        if let Placement::Location { x, y } = self.placement {
            if !x.is_finite() || !y.is_finite() {
                return Err(Error::Config("location must be finite".to_string()));
            }
        }
        for program in &self.programs {
            program.validate()?;
        }
        for drum in &self.drums {
            drum.validate()?;
        }
        Ok(())
    }

    /// Maximum events per unit for this configuration
    pub fn capacity(&self) -> usize {
        if self.vfx {
            VFX_CAPACITY
        } else {
            PLAIN_CAPACITY
        }
    }

    /// Profile tables with this configuration's overrides and volumes applied
    pub fn profiles(&self) -> Result<ProfileTable> {
        ProfileTable::resolve(
            &self.programs,
            &self.drums,
            self.note_volume,
            self.drum_volume,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity() {
        let mut config = CompileConfig::default();
        assert_eq!(config.capacity(), 320);
        config.vfx = true;
        assert_eq!(config.capacity(), 230);
    }

    #[test]
    fn test_parse_placement() {
        assert_eq!("self".parse::<Placement>().unwrap(), Placement::Processor);
        assert_eq!(
            "12,-4.5".parse::<Placement>().unwrap(),
            Placement::Location { x: 12.0, y: -4.5 }
        );
        assert!("elsewhere".parse::<Placement>().is_err());
        assert!("1,y".parse::<Placement>().is_err());
    }

    #[test]
    fn test_placement_coordinates() {
        assert_eq!(
            Placement::Global.coordinates(),
            ("@thisx".to_string(), "@thisy".to_string())
        );
        assert_eq!(
            Placement::Location { x: 10.0, y: 2.5 }.coordinates(),
            ("10.0".to_string(), "2.5".to_string())
        );
        assert!(!Placement::Global.is_positional());
        assert!(Placement::Processor.is_positional());
    }

    #[test]
    fn test_toml_config() {
        let text = r#"
vfx = true
drum_volume = 0.5

[placement]
mode = "location"
x = 100.0
y = 40.0

[[programs]]
program = 30
sound = "@sfx-press"
note = 60
volume = 1.0
loop = true
length = 146.0

[[drums]]
drum = 36
sound = "@sfx-place"
pitch = 0.5
volume = 0.3
"#;
        let config: CompileConfig = toml::from_str(text).unwrap();
        assert!(config.vfx);
        assert!(!config.limit);
        assert_eq!(config.note_volume, 1.0);
        assert_eq!(config.drum_volume, 0.5);
        assert_eq!(config.placement, Placement::Location { x: 100.0, y: 40.0 });
        assert_eq!(config.programs.len(), 1);
        assert!(config.programs[0].looped);
        assert_eq!(config.drums[0].drum, 36);
        assert!(config.validate().is_ok());

        let profiles = config.profiles().unwrap();
        assert!(profiles.melodic(29).sustain);
        assert_eq!(profiles.melodic(29).sound, "@sfx-press");
        assert!((profiles.percussion(36).volume - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_toml_self_placement() {
        let config: CompileConfig = toml::from_str("[placement]\nmode = \"self\"\n").unwrap();
        assert_eq!(config.placement, Placement::Processor);
    }

    #[test]
    fn test_validate_rejects_bad_override() {
        let config = CompileConfig {
            drums: vec![DrumOverride {
                drum: 128,
                sound: "@sfx-pew".to_string(),
                pitch: 1.0,
                volume: 1.0,
            }],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
