//! Standard MIDI File loader
//!
//! Reads an SMF with `midly` and reduces it to an owned [`Score`]: the file's
//! timing resolution and, per track, the delta-timed events the extractor
//! understands. Events of any other kind are kept as [`EventKind::Other`] so
//! their delta times still advance the track clock.

use std::fs;
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};

use crate::error::{Error, Result};

/// How delta ticks map to wall-clock time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timing {
    /// Ticks per quarter note; tick length depends on the running tempo
    Metrical { ticks_per_quarter: u16 },
    /// SMPTE timecode; tick length is fixed
    Timecode { fps: f32, subframes: u8 },
}

impl Timing {
    /// Convert `ticks` to milliseconds at `tempo` microseconds per quarter note
    pub fn ticks_to_ms(&self, ticks: u32, tempo: u32) -> f64 {
        match *self {
            Timing::Metrical { ticks_per_quarter } => {
                let scale = f64::from(tempo) * 1e-6 / f64::from(ticks_per_quarter.max(1));
                f64::from(ticks) * scale * 1000.0
            }
            Timing::Timecode { fps, subframes } => {
                let ticks_per_second = f64::from(fps) * f64::from(subframes.max(1));
                f64::from(ticks) * 1000.0 / ticks_per_second
            }
        }
    }
}

/// The subset of MIDI events the compiler reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8 },
    ProgramChange { channel: u8, program: u8 },
    Controller { channel: u8, controller: u8, value: u8 },
    /// Microseconds per quarter note
    Tempo(u32),
    Other,
}

/// One event with its delta time in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreEvent {
    pub delta: u32,
    pub kind: EventKind,
}

impl ScoreEvent {
    pub fn new(delta: u32, kind: EventKind) -> Self {
        Self { delta, kind }
    }
}

/// A parsed multi-track MIDI file
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub timing: Timing,
    pub tracks: Vec<Vec<ScoreEvent>>,
}

impl Score {
    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(Vec::len).sum()
    }
}

fn convert_kind(kind: TrackEventKind<'_>) -> EventKind {
    match kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            match message {
                MidiMessage::NoteOn { key, vel } => EventKind::NoteOn {
                    channel,
                    key: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::NoteOff { key, .. } => EventKind::NoteOff {
                    channel,
                    key: key.as_int(),
                },
                MidiMessage::ProgramChange { program } => EventKind::ProgramChange {
                    channel,
                    program: program.as_int(),
                },
                MidiMessage::Controller { controller, value } => EventKind::Controller {
                    channel,
                    controller: controller.as_int(),
                    value: value.as_int(),
                },
                _ => EventKind::Other,
            }
        }
        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => EventKind::Tempo(tempo.as_int()),
        _ => EventKind::Other,
    }
}

/// Parse an in-memory Standard MIDI File
pub fn parse_smf(bytes: &[u8]) -> Result<Score> {
    let smf = Smf::parse(bytes)?;

    let timing = match smf.header.timing {
        midly::Timing::Metrical(ticks) => Timing::Metrical {
            ticks_per_quarter: ticks.as_int(),
        },
        midly::Timing::Timecode(fps, subframes) => Timing::Timecode {
            fps: fps.as_f32(),
            subframes,
        },
    };

    let tracks = smf
        .tracks
        .iter()
        .map(|track| {
            track
                .iter()
                .map(|event| ScoreEvent::new(event.delta.as_int(), convert_kind(event.kind)))
                .collect()
        })
        .collect();

    Ok(Score { timing, tracks })
}

/// Read and parse a MIDI file from disk
pub fn load_score(path: &Path) -> Result<Score> {
    let bytes = fs::read(path).map_err(|source| Error::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    let score = parse_smf(&bytes)?;
    log::debug!(
        "loaded {}: {} tracks, {} events, {:?}",
        path.display(),
        score.tracks.len(),
        score.event_count(),
        score.timing
    );
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Format, Header, TrackEvent};

    fn write_smf(tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
        let smf = Smf {
            header: Header::new(Format::Parallel, midly::Timing::Metrical(u15::new(480))),
            tracks,
        };
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    fn midi(delta: u32, channel: u8, message: MidiMessage) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message,
            },
        }
    }

    fn end_of_track() -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        }
    }

    #[test]
    fn test_ticks_to_ms_metrical() {
        let timing = Timing::Metrical {
            ticks_per_quarter: 480,
        };
        // 120 BPM: one quarter note = 500ms
        assert!((timing.ticks_to_ms(480, 500_000) - 500.0).abs() < 1e-9);
        assert!((timing.ticks_to_ms(240, 1_000_000) - 500.0).abs() < 1e-9);
        assert_eq!(timing.ticks_to_ms(0, 500_000), 0.0);
    }

    #[test]
    fn test_ticks_to_ms_timecode() {
        let timing = Timing::Timecode {
            fps: 25.0,
            subframes: 40,
        };
        // 1000 ticks per second, independent of tempo
        assert!((timing.ticks_to_ms(1000, 500_000) - 1000.0).abs() < 1e-9);
        assert!((timing.ticks_to_ms(1000, 250_000) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_smf_events() {
        let bytes = write_smf(vec![vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(600_000))),
            },
            midi(0, 2, MidiMessage::ProgramChange { program: u7::new(30) }),
            midi(
                0,
                2,
                MidiMessage::Controller {
                    controller: u7::new(10),
                    value: u7::new(127),
                },
            ),
            midi(
                10,
                2,
                MidiMessage::NoteOn {
                    key: u7::new(60),
                    vel: u7::new(100),
                },
            ),
            midi(
                20,
                2,
                MidiMessage::NoteOff {
                    key: u7::new(60),
                    vel: u7::new(0),
                },
            ),
            midi(5, 2, MidiMessage::ChannelAftertouch { vel: u7::new(3) }),
            end_of_track(),
        ]]);

        let score = parse_smf(&bytes).unwrap();
        assert_eq!(
            score.timing,
            Timing::Metrical {
                ticks_per_quarter: 480
            }
        );
        assert_eq!(score.tracks.len(), 1);
        assert_eq!(
            score.tracks[0],
            vec![
                ScoreEvent::new(0, EventKind::Tempo(600_000)),
                ScoreEvent::new(0, EventKind::ProgramChange { channel: 2, program: 30 }),
                ScoreEvent::new(
                    0,
                    EventKind::Controller {
                        channel: 2,
                        controller: 10,
                        value: 127
                    }
                ),
                ScoreEvent::new(
                    10,
                    EventKind::NoteOn {
                        channel: 2,
                        key: 60,
                        velocity: 100
                    }
                ),
                ScoreEvent::new(20, EventKind::NoteOff { channel: 2, key: 60 }),
                ScoreEvent::new(5, EventKind::Other),
                ScoreEvent::new(0, EventKind::Other),
            ]
        );
    }

    #[test]
    fn test_parse_invalid_bytes() {
        assert!(matches!(
            parse_smf(b"definitely not a midi file"),
            Err(Error::Midi(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_score(Path::new("/nonexistent/song.mid"));
        assert!(matches!(result, Err(Error::ReadInput { .. })));
    }
}
