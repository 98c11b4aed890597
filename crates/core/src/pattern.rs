use std::sync::Arc;

use stepline_project::{CLIPBOARD_POSITION, PatternData};
use stepline_transport::{BEATS_PER_TACT, MidiTime, SampleFrame, TICKS_PER_STEP};

use crate::clip::SaveTarget;
use crate::freeze::FrozenPattern;
use crate::instrument::Instrument;
use crate::modified::ModifiedFlag;
use crate::note::{ACTIVE_STEP_LENGTH, Note, NoteId};
use crate::time::TempoContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PatternType {
    #[default]
    Beat = 0,
    Melody = 1,
}

impl PatternType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PatternType::Melody,
            _ => PatternType::Beat,
        }
    }
}

/// An ordered collection of notes placed on an instrument track.
///
/// Notes are kept sorted by position; notes sharing a position stay in the
/// order they were added. Every structural edit re-infers the pattern type,
/// recomputes the length and drops the freeze cache.
#[derive(Debug)]
pub struct Pattern {
    pattern_type: PatternType,
    name: String,
    start: MidiTime,
    length: MidiTime,
    notes: Vec<(NoteId, Note)>,
    next_note_id: u64,
    frozen: Arc<FrozenPattern>,
    modified: ModifiedFlag,
}

impl Pattern {
    /// An empty beat pattern with all sixteen steps switched off.
    pub fn new(name: impl Into<String>, modified: ModifiedFlag) -> Self {
        let mut pattern = Self {
            pattern_type: PatternType::Beat,
            name: name.into(),
            start: MidiTime::ZERO,
            length: MidiTime::ONE_TACT,
            notes: Vec::with_capacity(BEATS_PER_TACT),
            next_note_id: 0,
            frozen: Arc::new(FrozenPattern::new()),
            modified,
        };
        pattern.ensure_beat_notes();
        pattern
    }

    pub fn pattern_type(&self) -> PatternType {
        self.pattern_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.modified.set();
    }

    /// Take the name of the owning track.
    pub fn reset_name(&mut self, track_name: &str) {
        self.set_name(track_name);
    }

    pub fn start_position(&self) -> MidiTime {
        self.start
    }

    pub fn length(&self) -> MidiTime {
        self.length
    }

    /// Patterns always sit on tact boundaries.
    pub fn move_position(&mut self, pos: MidiTime) {
        let snapped = pos.floor_to_tact().max(MidiTime::ZERO);
        if snapped != self.start {
            self.start = snapped;
            self.modified.set();
        }
    }

    pub fn notes(&self) -> impl Iterator<Item = (NoteId, &Note)> {
        self.notes.iter().map(|(id, note)| (*id, note))
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.index_of(id).map(|i| &self.notes[i].1)
    }

    pub fn note_at(&self, index: usize) -> Option<(NoteId, &Note)> {
        self.notes.get(index).map(|(id, note)| (*id, note))
    }

    fn index_of(&self, id: NoteId) -> Option<usize> {
        self.notes.iter().position(|(nid, _)| *nid == id)
    }

    fn next_id(&mut self) -> NoteId {
        let id = NoteId(self.next_note_id);
        self.next_note_id += 1;
        id
    }

    fn insert_sorted(&mut self, id: NoteId, note: Note) {
        let at = self.notes.partition_point(|(_, n)| n.pos <= note.pos);
        self.notes.insert(at, (id, note));
    }

    /// Bookkeeping shared by every structural edit.
    fn changed(&mut self) {
        self.check_type();
        self.length = self.compute_length();
        self.frozen.unfreeze();
        self.modified.set();
    }

    pub fn add_note(&mut self, note: Note) -> NoteId {
        let id = self.next_id();
        self.insert_sorted(id, note);
        self.changed();
        id
    }

    /// Remove the note behind `id`. Unknown handles are ignored.
    pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
        let index = self.index_of(id)?;
        let (_, note) = self.notes.remove(index);
        self.changed();
        Some(note)
    }

    /// Re-sort a note after its position was changed elsewhere. The note gets
    /// a new handle.
    pub fn rearrange_note(&mut self, id: NoteId) -> Option<NoteId> {
        let note = self.remove_note(id)?;
        Some(self.add_note(note))
    }

    /// Replace the note at `index`. Out of range indices are ignored.
    pub fn set_note_at(&mut self, index: usize, note: Note) -> Option<NoteId> {
        let (id, old) = *self.notes.get(index)?;
        if old.pos == note.pos {
            self.notes[index].1 = note;
        } else {
            self.notes.remove(index);
            self.insert_sorted(id, note);
        }
        self.changed();
        Some(id)
    }

    /// Switch beat step `step` (0..16) on or off. Returns the new state, or
    /// None when the slot has no step note.
    pub fn toggle_step(&mut self, step: usize) -> Option<bool> {
        let pos = MidiTime::from_ticks(step as i64 * TICKS_PER_STEP);
        let note = self
            .notes
            .iter_mut()
            .map(|(_, note)| note)
            .find(|note| note.pos == pos && note.is_step())?;

        note.length = if note.is_active_step() {
            MidiTime::ZERO
        } else {
            ACTIVE_STEP_LENGTH
        };
        let active = note.is_active_step();
        self.changed();
        Some(active)
    }

    pub fn clear_notes(&mut self) {
        self.notes.clear();
        self.changed();
    }

    /// Remove all notes and put back the sixteen silent steps.
    pub fn clear(&mut self) {
        self.clear_notes();
        self.ensure_beat_notes();
    }

    /// Make sure every step slot holds a step note.
    pub fn ensure_beat_notes(&mut self) {
        for step in 0..BEATS_PER_TACT {
            let pos = MidiTime::from_ticks(step as i64 * TICKS_PER_STEP);
            let exists = self
                .notes
                .iter()
                .any(|(_, note)| note.pos == pos && note.is_step());
            if !exists {
                self.add_note(Note::step(pos));
            }
        }
    }

    fn compute_length(&self) -> MidiTime {
        if self.pattern_type == PatternType::Beat {
            return MidiTime::ONE_TACT;
        }
        let max_end = self
            .notes
            .iter()
            .map(|(_, note)| note.end_pos())
            .max()
            .unwrap_or(MidiTime::ZERO);
        max_end.ceil_to_tact().max(MidiTime::ONE_TACT)
    }

    /// Override the type until the next edit infers it again.
    pub fn set_type(&mut self, pattern_type: PatternType) {
        self.pattern_type = pattern_type;
        self.length = self.compute_length();
    }

    /// A pattern holding any note with a positive length is a melody.
    pub fn check_type(&mut self) {
        self.pattern_type = if self.notes.iter().any(|(_, note)| note.length > MidiTime::ZERO) {
            PatternType::Melody
        } else {
            PatternType::Beat
        };
    }

    /// Copy of the notes and type, without a name or frozen render.
    pub fn duplicate(&self) -> Self {
        Self {
            pattern_type: self.pattern_type,
            name: String::new(),
            start: self.start,
            length: self.length,
            notes: self.notes.clone(),
            next_note_id: self.next_note_id,
            frozen: Arc::new(FrozenPattern::new()),
            modified: self.modified.clone(),
        }
    }

    pub fn freeze_cache(&self) -> &Arc<FrozenPattern> {
        &self.frozen
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_frozen()
    }

    pub fn unfreeze(&self) {
        self.frozen.unfreeze();
    }

    /// Play the frozen render for song frame `start_frame`. Returns false
    /// when there is no render, in which case `dest` is untouched.
    pub fn play(&self, dest: &mut [SampleFrame], start_frame: u64, tempo: &TempoContext) -> bool {
        let local = start_frame.saturating_sub(tempo.ticks_to_frames(self.start));
        self.frozen.play_frozen_data(dest, local)
    }

    /// Render the notes sounding in the pattern-local window starting at
    /// `start_frame` through `instrument`, adding onto `dest`.
    pub fn render_notes(
        &self,
        instrument: &dyn Instrument,
        dest: &mut [SampleFrame],
        start_frame: u64,
        tempo: &TempoContext,
    ) -> bool {
        let window_end = start_frame + dest.len() as u64;
        let mut rendered = false;

        for (_, note) in &self.notes {
            let sounding = note.sounding_length();
            if sounding == MidiTime::ZERO {
                continue;
            }
            let note_start = tempo.ticks_to_frames(note.pos);
            if note_start >= window_end {
                // sorted by position, nothing later can overlap
                break;
            }
            let note_end = tempo.ticks_to_frames(note.pos + sounding);
            if note_end <= start_frame {
                continue;
            }

            let from = note_start.max(start_frame);
            let to = note_end.min(window_end);
            let slice = &mut dest[(from - start_frame) as usize..(to - start_frame) as usize];
            instrument.render_note(note, from - note_start, slice, tempo.sample_rate);
            rendered = true;
        }
        rendered
    }

    pub fn save(&self, target: SaveTarget) -> PatternData {
        PatternData {
            pattern_type: self.pattern_type as u8,
            name: self.name.clone(),
            pos: match target {
                SaveTarget::Timeline => self.start.ticks(),
                SaveTarget::Clipboard => CLIPBOARD_POSITION,
            },
            len: self.length.ticks(),
            frozen: self.is_frozen() as u8,
            notes: self
                .notes
                .iter()
                .filter(|(_, note)| note.length != MidiTime::ZERO)
                .map(|(_, note)| note.to_data())
                .collect(),
        }
    }

    /// Replace the contents with `data`. A frozen flag in `data` is ignored.
    pub fn load(&mut self, data: &PatternData) {
        self.frozen.unfreeze();
        self.pattern_type = PatternType::from_u8(data.pattern_type);
        self.name = data.name.clone();
        if data.pos >= 0 {
            self.move_position(MidiTime::from_ticks(data.pos));
        }

        self.notes.clear();
        for note in &data.notes {
            let id = self.next_id();
            self.insert_sorted(id, Note::from_data(note));
        }
        self.ensure_beat_notes();
        self.changed();
        log::debug!("loaded pattern '{}' with {} notes", self.name, self.notes.len());
    }

    pub fn from_data(data: &PatternData, modified: ModifiedFlag) -> Self {
        let mut pattern = Self::new(String::new(), modified);
        pattern.load(data);
        pattern
    }
}
