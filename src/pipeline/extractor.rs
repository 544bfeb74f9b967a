//! Note extraction
//!
//! Walks every track of a [`Score`] and turns matched note-on/note-off pairs
//! into discrete [`NoteEvent`]s with absolute start times. Sustained
//! (looping) instruments are expanded into one event per loop segment for as
//! long as the key is held.
//!
//! Channel state and the running tempo are shared by all tracks; each track
//! has its own clock and its own table of held keys.

use crate::pipeline::parser::{EventKind, Score};
use crate::profile::ProfileTable;

/// Channel whose keys select percussion sounds
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Controller number for channel pan
pub const PAN_CONTROLLER: u8 = 10;

/// 120 BPM
pub const DEFAULT_TEMPO: u32 = 500_000;

/// What a note triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    /// A pitched instrument, transposed from its reference note
    Melodic { program: u8 },
    /// A drum sound selected by the key
    Percussion,
}

/// One discrete trigger request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub key: u8,
    pub kind: NoteKind,
    pub channel: u8,
    pub velocity: u8,
    /// -1.0 (left) to 1.0 (right)
    pub pan: f64,
    pub start_ms: f64,
}

impl NoteEvent {
    pub fn is_percussion(&self) -> bool {
        self.kind == NoteKind::Percussion
    }
}

#[derive(Debug, Clone, Copy)]
struct ChannelState {
    program: u8,
    pan: f64,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            program: 0,
            pan: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingNote {
    start_ms: f64,
    velocity: u8,
    program: u8,
}

/// Stateful walker over a score
struct Extractor<'a> {
    profiles: &'a ProfileTable,
    channels: [ChannelState; 16],
    tempo: u32,
    notes: Vec<NoteEvent>,
}

impl<'a> Extractor<'a> {
    fn new(profiles: &'a ProfileTable) -> Self {
        Self {
            profiles,
            channels: [ChannelState::default(); 16],
            tempo: DEFAULT_TEMPO,
            notes: Vec::new(),
        }
    }

    fn channel(&mut self, channel: u8) -> &mut ChannelState {
        &mut self.channels[usize::from(channel & 0x0F)]
    }

    fn run_track(&mut self, score: &Score, index: usize) {
        let mut pending: [Option<PendingNote>; 128] = [None; 128];
        let mut now_ms = 0.0;
        let before = self.notes.len();

        for event in &score.tracks[index] {
            now_ms += score.timing.ticks_to_ms(event.delta, self.tempo);

            match event.kind {
                EventKind::NoteOn {
                    channel,
                    key,
                    velocity,
                } if velocity > 0 => {
                    let slot = &mut pending[usize::from(key & 0x7F)];
                    if slot.is_none() {
                        *slot = Some(PendingNote {
                            start_ms: now_ms,
                            velocity,
                            program: self.channel(channel).program,
                        });
                    }
                }
                EventKind::NoteOn { channel, key, .. } | EventKind::NoteOff { channel, key } => {
                    if let Some(note) = pending[usize::from(key & 0x7F)].take() {
                        self.close(note, channel, key, now_ms);
                    }
                }
                EventKind::ProgramChange { channel, program } => {
                    self.channel(channel).program = program;
                }
                EventKind::Controller {
                    channel,
                    controller: PAN_CONTROLLER,
                    value,
                } => {
                    self.channel(channel).pan = (f64::from(value) - 64.0) / 64.0;
                }
                EventKind::Tempo(tempo) => self.tempo = tempo,
                EventKind::Controller { .. } | EventKind::Other => {}
            }
        }

        let unclosed = pending.iter().filter(|p| p.is_some()).count();
        if unclosed > 0 {
            log::warn!("track {}: {} notes never released, dropped", index, unclosed);
        }
        log::debug!(
            "track {}: {} note events, ends at {:.1}ms",
            index,
            self.notes.len() - before,
            now_ms
        );
    }

    /// Emit the events for a released key
    fn close(&mut self, note: PendingNote, channel: u8, key: u8, end_ms: f64) {
        let pan = self.channel(channel).pan;
        let event = |kind, start_ms| NoteEvent {
            key,
            kind,
            channel,
            velocity: note.velocity,
            pan,
            start_ms,
        };

        if channel == PERCUSSION_CHANNEL {
            self.notes.push(event(NoteKind::Percussion, note.start_ms));
            return;
        }

        let kind = NoteKind::Melodic {
            program: note.program,
        };
        let profile = self.profiles.melodic(note.program);
        if !profile.sustain {
            self.notes.push(event(kind, note.start_ms));
            return;
        }

        let length = profile.effective_loop_length(key);
        if !(length.is_finite() && length > 0.0) {
            log::warn!(
                "program {}: unusable loop length {} for key {}, triggering once",
                note.program,
                length,
                key
            );
            self.notes.push(event(kind, note.start_ms));
            return;
        }

        let end = (note.start_ms + length).max(end_ms - length);
        let mut t = note.start_ms;
        while t < end {
            self.notes.push(event(kind, t));
            t += length;
        }
    }
}

/// Extract every note trigger from `score`, sorted by start time
///
/// Ties keep extraction order (track order, then release order).
pub fn extract_notes(score: &Score, profiles: &ProfileTable) -> Vec<NoteEvent> {
    let mut extractor = Extractor::new(profiles);
    for index in 0..score.tracks.len() {
        extractor.run_track(score, index);
    }

    let mut notes = extractor.notes;
    notes.sort_by(|a, b| a.start_ms.total_cmp(&b.start_ms));
    notes
}
