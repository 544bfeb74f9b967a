//! Unit scheduler
//!
//! Packs note events onto world processors ("execution units"). Every unit can
//! only wait for one moment at a time, so once it has been given a note it is
//! busy for a fixed cooldown, and it can only hold a bounded number of notes
//! before its instruction budget runs out.
//!
//! Assignment is first-fit: each note goes to the oldest unit that is free at
//! the note's start time and still has room; a new unit is created otherwise.

use crate::pipeline::emitter::{Emitter, PROLOGUE};
use crate::pipeline::extractor::NoteEvent;

/// How long a unit stays busy after being given a note, in ms
pub const COOLDOWN_MS: f64 = 50.0;

/// One world processor's program
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUnit {
    code: String,
    busy_until_ms: f64,
    trigger_times: Vec<f64>,
}

impl Default for ExecutionUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionUnit {
    /// An empty unit holding only the prologue
    pub fn new() -> Self {
        Self {
            code: PROLOGUE.to_string(),
            busy_until_ms: f64::NEG_INFINITY,
            trigger_times: Vec::new(),
        }
    }

    /// The unit's mlog source
    pub fn instructions(&self) -> &str {
        &self.code
    }

    pub fn busy_until_ms(&self) -> f64 {
        self.busy_until_ms
    }

    pub fn event_count(&self) -> usize {
        self.trigger_times.len()
    }

    /// Start times of the notes assigned to this unit, in assignment order
    pub fn trigger_times(&self) -> &[f64] {
        &self.trigger_times
    }

    /// Whether a note starting at `start_ms` fits on this unit
    pub fn accepts(&self, start_ms: f64, capacity: usize) -> bool {
        start_ms > self.busy_until_ms && self.event_count() < capacity
    }

    fn assign(&mut self, emitter: &Emitter<'_>, note: &NoteEvent, label: u64) {
        emitter.emit(&mut self.code, note, label);
        self.busy_until_ms = note.start_ms + COOLDOWN_MS;
        self.trigger_times.push(note.start_ms);
    }
}

/// Result of a scheduling pass
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    /// Units in creation order
    pub units: Vec<ExecutionUnit>,
    /// First wait label not used by this pass
    pub next_label: u64,
}

impl Schedule {
    pub fn event_count(&self) -> usize {
        self.units.iter().map(ExecutionUnit::event_count).sum()
    }
}

/// Running state of one scheduling pass
pub struct Scheduler<'a> {
    emitter: Emitter<'a>,
    capacity: usize,
    units: Vec<ExecutionUnit>,
    next_label: u64,
}

impl<'a> Scheduler<'a> {
    /// Create a scheduler with a single empty unit
    ///
    /// # Arguments
    /// * `emitter` - Renders each assigned note
    /// * `capacity` - Maximum notes per unit (at least 1)
    /// * `first_label` - First wait label to hand out
    pub fn new(emitter: Emitter<'a>, capacity: usize, first_label: u64) -> Self {
        Self {
            emitter,
            capacity: capacity.max(1),
            units: vec![ExecutionUnit::new()],
            next_label: first_label,
        }
    }

    /// Assign one note; returns the index of the unit that took it
    pub fn push(&mut self, note: &NoteEvent) -> usize {
        let index = match self
            .units
            .iter()
            .position(|unit| unit.accepts(note.start_ms, self.capacity))
        {
            Some(index) => index,
            None => {
                self.units.push(ExecutionUnit::new());
                log::debug!(
                    "unit {} created for note at {:.1}ms",
                    self.units.len() - 1,
                    note.start_ms
                );
                self.units.len() - 1
            }
        };

        self.units[index].assign(&self.emitter, note, self.next_label);
        self.next_label += 1;
        index
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn finish(self) -> Schedule {
        Schedule {
            units: self.units,
            next_label: self.next_label,
        }
    }
}

/// Schedule `notes` (sorted by start time) in a single pass
pub fn schedule(
    notes: &[NoteEvent],
    emitter: Emitter<'_>,
    capacity: usize,
    first_label: u64,
) -> Schedule {
    let mut scheduler = Scheduler::new(emitter, capacity, first_label);
    for note in notes {
        scheduler.push(note);
    }
    scheduler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Placement, PLAIN_CAPACITY, VFX_CAPACITY};
    use crate::pipeline::extractor::NoteKind;
    use crate::profile::ProfileTable;

    fn note_at(start_ms: f64) -> NoteEvent {
        NoteEvent {
            key: 60,
            kind: NoteKind::Melodic { program: 0 },
            channel: 0,
            velocity: 100,
            pan: 0.0,
            start_ms,
        }
    }

    fn create_test_emitter(profiles: &ProfileTable) -> Emitter<'_> {
        Emitter::new(profiles, false, &Placement::Global, false)
    }

    #[test]
    fn test_starts_with_one_unit() {
        let profiles = ProfileTable::default();
        let schedule = schedule(&[], create_test_emitter(&profiles), PLAIN_CAPACITY, 0);

        assert_eq!(schedule.units.len(), 1);
        assert_eq!(schedule.units[0].instructions(), PROLOGUE);
        assert_eq!(schedule.units[0].event_count(), 0);
        assert_eq!(schedule.next_label, 0);
    }

    #[test]
    fn test_spaced_notes_share_a_unit() {
        let profiles = ProfileTable::default();
        let notes: Vec<_> = [0.0, 51.0, 102.0, 500.0].into_iter().map(note_at).collect();
        let schedule = schedule(&notes, create_test_emitter(&profiles), PLAIN_CAPACITY, 0);

        assert_eq!(schedule.units.len(), 1);
        assert_eq!(schedule.units[0].event_count(), 4);
        assert_eq!(schedule.units[0].busy_until_ms(), 550.0);
        assert_eq!(schedule.next_label, 4);
    }

    #[test]
    fn test_cooldown_is_strict() {
        let profiles = ProfileTable::default();
        let notes: Vec<_> = [0.0, 50.0, 50.5].into_iter().map(note_at).collect();
        let schedule = schedule(&notes, create_test_emitter(&profiles), PLAIN_CAPACITY, 0);

        assert_eq!(schedule.units.len(), 2);
        assert_eq!(schedule.units[0].trigger_times(), &[0.0, 50.5]);
        assert_eq!(schedule.units[1].trigger_times(), &[50.0]);
    }

    #[test]
    fn test_chord_spreads_over_units() {
        let profiles = ProfileTable::default();
        let notes: Vec<_> = [0.0, 0.0, 0.0, 100.0].into_iter().map(note_at).collect();
        let schedule = schedule(&notes, create_test_emitter(&profiles), PLAIN_CAPACITY, 0);

        assert_eq!(schedule.units.len(), 3);
        // First fit: the oldest free unit takes the later note
        assert_eq!(schedule.units[0].trigger_times(), &[0.0, 100.0]);
        assert_eq!(schedule.units[1].event_count(), 1);
        assert_eq!(schedule.units[2].event_count(), 1);
    }

    #[test]
    fn test_capacity_limit() {
        let profiles = ProfileTable::default();
        let notes: Vec<_> = (0..7).map(|i| note_at(i as f64 * 100.0)).collect();
        let schedule = schedule(&notes, create_test_emitter(&profiles), 3, 0);

        let counts: Vec<usize> = schedule.units.iter().map(|u| u.event_count()).collect();
        assert_eq!(counts, vec![3, 3, 1]);
    }

    #[test]
    fn test_labels_unique_across_units() {
        let profiles = ProfileTable::default();
        let notes: Vec<_> = [0.0, 0.0, 10.0, 60.0].into_iter().map(note_at).collect();
        let schedule = schedule(&notes, create_test_emitter(&profiles), PLAIN_CAPACITY, 40);

        assert_eq!(schedule.next_label, 44);
        let all_code: String = schedule.units.iter().map(|u| u.instructions()).collect();
        for label in 40..44 {
            assert_eq!(all_code.matches(&format!("Label{}:\n", label)).count(), 1);
        }
        assert!(!all_code.contains("Label44:"));
    }

    #[test]
    fn test_invariants_on_dense_input() {
        let profiles = ProfileTable::default();
        // 3 notes every 7ms for 2 seconds
        let notes: Vec<_> = (0..286)
            .flat_map(|i| std::iter::repeat(i as f64 * 7.0).take(3))
            .map(note_at)
            .collect();
        let capacity = VFX_CAPACITY;
        let emitter = Emitter::new(&profiles, true, &Placement::Global, false);
        let schedule = schedule(&notes, emitter, capacity, 0);

        assert_eq!(schedule.event_count(), notes.len());
        for unit in &schedule.units {
            assert!(unit.event_count() <= capacity);
            for pair in unit.trigger_times().windows(2) {
                assert!(pair[1] > pair[0] + COOLDOWN_MS);
            }
        }
    }

    #[test]
    fn test_push_reports_unit() {
        let profiles = ProfileTable::default();
        let mut scheduler = Scheduler::new(create_test_emitter(&profiles), PLAIN_CAPACITY, 0);

        assert_eq!(scheduler.push(&note_at(0.0)), 0);
        assert_eq!(scheduler.push(&note_at(0.0)), 1);
        assert_eq!(scheduler.push(&note_at(60.0)), 0);
        assert_eq!(scheduler.unit_count(), 2);
    }
}
