//! mlog instruction emission
//!
//! Generates the code fragment a world processor runs for one note: a busy
//! wait on the processor's reference clock, an optional visual effect, and
//! the `playsound` call itself.

use crate::config::{CompileConfig, Placement};
use crate::pipeline::extractor::{NoteEvent, NoteKind};
use crate::profile::ProfileTable;

/// Code every unit starts with: run at full speed, idle while the shared
/// switch is off, then latch the start time
pub const PROLOGUE: &str = "setrate 1000\nsensor enable switch1 @enabled\n jump 1 notEqual enable true\nset start_time @time\n";

/// Render a number the way mlog tooling prints floats: integral values keep
/// one decimal, everything else uses the shortest round-trip form
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// HSV (all 0..1) to 8-bit RGB, rounding half to even
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let (r, g, b) = if s == 0.0 {
        (v, v, v)
    } else {
        let sector = (h * 6.0).trunc();
        let f = h * 6.0 - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        match (sector as i64).rem_euclid(6) {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        }
    };
    let channel = |c: f64| (c * 255.0).round_ties_even().clamp(0.0, 255.0) as u8;
    (channel(r), channel(g), channel(b))
}

/// Effect colour for a key: hue sweeps the keyboard, full saturation and value
pub fn key_color(key: u8) -> String {
    let (r, g, b) = hsv_to_rgb(f64::from(key) / 127.0, 1.0, 1.0);
    format!("%{:02x}{:02x}{:02x}", r, g, b)
}

/// `(velocity / 127) * 2 * multiplier`
pub fn note_volume(velocity: u8, multiplier: f64) -> f64 {
    (f64::from(velocity) / 127.0) * 2.0 * multiplier
}

/// Renders note events into mlog
#[derive(Debug, Clone)]
pub struct Emitter<'a> {
    profiles: &'a ProfileTable,
    vfx: bool,
    positional: bool,
    x: String,
    y: String,
    limit: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(profiles: &'a ProfileTable, vfx: bool, placement: &Placement, limit: bool) -> Self {
        let (x, y) = placement.coordinates();
        Self {
            profiles,
            vfx,
            positional: placement.is_positional(),
            x,
            y,
            limit,
        }
    }

    pub fn from_config(profiles: &'a ProfileTable, config: &CompileConfig) -> Self {
        Self::new(profiles, config.vfx, &config.placement, config.limit)
    }

    /// Append the full fragment for `note` to `code`, using wait label `label`
    pub fn emit(&self, code: &mut String, note: &NoteEvent, label: u64) {
        self.emit_wait(code, note.start_ms, label);
        if self.vfx {
            self.emit_effect(code, note);
        }
        self.emit_sound(code, note);
    }

    fn emit_wait(&self, code: &mut String, start_ms: f64, label: u64) {
        code.push_str(&format!(
            "op add wait_time start_time {}\n",
            format_number(start_ms)
        ));
        code.push_str(&format!("Label{}:\n", label));
        code.push_str(&format!("jump Label{} lessThan @time wait_time\n", label));
    }

    fn emit_effect(&self, code: &mut String, note: &NoteEvent) {
        match note.kind {
            NoteKind::Melodic { .. } => code.push_str(&format!(
                "effect wave {} {} 1.5 {}\n",
                self.x,
                self.y,
                key_color(note.key)
            )),
            NoteKind::Percussion => {
                code.push_str(&format!("effect placeBlock {} {} 1\n", self.x, self.y))
            }
        }
    }

    fn emit_sound(&self, code: &mut String, note: &NoteEvent) {
        let (sound, multiplier, pitch) = match note.kind {
            NoteKind::Melodic { program } => {
                let profile = self.profiles.melodic(program);
                (&profile.sound, profile.volume, profile.pitch_ratio(note.key))
            }
            NoteKind::Percussion => {
                let profile = self.profiles.percussion(note.key);
                (&profile.sound, profile.volume, profile.pitch_ratio)
            }
        };
        let volume = format_number(note_volume(note.velocity, multiplier));
        let pitch = format_number(pitch);
        let limit = u8::from(self.limit);

        if self.positional {
            code.push_str(&format!(
                "playsound true {} {} {} 0 {} {} {}\n",
                sound, volume, pitch, self.x, self.y, limit
            ));
        } else {
            code.push_str(&format!(
                "playsound false {} {} {} {} 0 0 {}\n",
                sound,
                volume,
                pitch,
                format_number(note.pan),
                limit
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{MelodicProfile, PercussionProfile};

    fn melodic(key: u8, velocity: u8, pan: f64, start_ms: f64) -> NoteEvent {
        NoteEvent {
            key,
            kind: NoteKind::Melodic { program: 0 },
            channel: 0,
            velocity,
            pan,
            start_ms,
        }
    }

    fn drum(key: u8, velocity: u8, start_ms: f64) -> NoteEvent {
        NoteEvent {
            key,
            kind: NoteKind::Percussion,
            channel: 9,
            velocity,
            pan: 0.0,
            start_ms,
        }
    }

    fn create_test_profiles() -> ProfileTable {
        let mut profiles = ProfileTable::default();
        profiles.set_melodic(0, MelodicProfile::one_shot("@sfx-press", 60, 1.0));
        profiles.set_percussion(36, PercussionProfile::new("@sfx-place", 0.5, 0.5));
        profiles
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(160.0), "160.0");
        assert_eq!(format_number(0.0), "0.0");
        assert_eq!(format_number(-1.0), "-1.0");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(146.25), "146.25");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn test_hsv_to_rgb() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), (255, 0, 0));
        assert_eq!(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), (0, 255, 0));
        assert_eq!(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), (0, 0, 255));
        assert_eq!(hsv_to_rgb(1.0, 1.0, 1.0), (255, 0, 0));
        assert_eq!(hsv_to_rgb(0.5, 0.0, 0.5), (128, 128, 128));
    }

    #[test]
    fn test_key_color() {
        assert_eq!(key_color(0), "%ff0000");
        assert_eq!(key_color(127), "%ff0000");
        // Hue 0.5: cyan
        let (r, g, b) = hsv_to_rgb(63.5 / 127.0, 1.0, 1.0);
        assert_eq!((r, g, b), (0, 255, 255));
    }

    #[test]
    fn test_global_melodic() {
        let profiles = create_test_profiles();
        let emitter = Emitter::new(&profiles, false, &Placement::Global, false);
        let mut code = String::new();

        emitter.emit(&mut code, &melodic(72, 127, -0.5, 250.0), 7);

        assert_eq!(
            code,
            "op add wait_time start_time 250.0\n\
             Label7:\n\
             jump Label7 lessThan @time wait_time\n\
             playsound false @sfx-press 2.0 2.0 -0.5 0 0 0\n"
        );
    }

    #[test]
    fn test_melodic_pitch_below_reference() {
        let profiles = create_test_profiles();
        let emitter = Emitter::new(&profiles, false, &Placement::Global, false);
        let mut code = String::new();

        emitter.emit(&mut code, &melodic(48, 127, 0.0, 0.0), 0);

        assert!(code.ends_with("playsound false @sfx-press 2.0 0.5 0.0 0 0 0\n"));
    }

    #[test]
    fn test_positional_drum_with_limit() {
        let profiles = create_test_profiles();
        let emitter = Emitter::new(&profiles, false, &Placement::Processor, true);
        let mut code = String::new();

        emitter.emit(&mut code, &drum(36, 127, 10.0), 3);

        assert!(code.ends_with("playsound true @sfx-place 1.0 0.5 0 @thisx @thisy 1\n"));
    }

    #[test]
    fn test_positional_location() {
        let profiles = create_test_profiles();
        let placement = Placement::Location { x: 12.0, y: 3.5 };
        let emitter = Emitter::new(&profiles, false, &placement, false);
        let mut code = String::new();

        emitter.emit(&mut code, &melodic(60, 127, 0.75, 0.0), 0);

        // Positional playback ignores the channel pan
        assert!(code.ends_with("playsound true @sfx-press 2.0 1.0 0 12.0 3.5 0\n"));
    }

    #[test]
    fn test_vfx_fragments() {
        let profiles = create_test_profiles();
        let emitter = Emitter::new(&profiles, true, &Placement::Global, false);

        let mut code = String::new();
        emitter.emit(&mut code, &melodic(0, 127, 0.0, 0.0), 0);
        let lines: Vec<&str> = code.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[3], "effect wave @thisx @thisy 1.5 %ff0000");
        assert!(lines[4].starts_with("playsound false"));

        let mut code = String::new();
        emitter.emit(&mut code, &drum(36, 127, 0.0), 1);
        let lines: Vec<&str> = code.lines().collect();
        assert_eq!(lines[3], "effect placeBlock @thisx @thisy 1");
    }

    #[test]
    fn test_no_vfx_without_flag() {
        let profiles = create_test_profiles();
        let emitter = Emitter::new(&profiles, false, &Placement::Global, false);
        let mut code = String::new();

        emitter.emit(&mut code, &drum(36, 64, 0.0), 0);

        assert!(!code.contains("effect"));
        assert_eq!(code.lines().count(), 4);
    }

    #[test]
    fn test_note_volume() {
        assert_eq!(note_volume(127, 1.0), 2.0);
        assert_eq!(note_volume(0, 20.0), 0.0);
        assert!((note_volume(64, 0.3) - 64.0 / 127.0 * 0.6).abs() < 1e-12);
    }
}
