use stepline_project::NoteData;
use stepline_transport::{MidiTime, TICKS_PER_TACT};

pub const DEFAULT_VOLUME: u8 = 100;

/// Key used for beat steps: A in the default octave.
pub const DEFAULT_KEY: i32 = 57;

/// Length given to a beat step when it is switched on.
pub const ACTIVE_STEP_LENGTH: MidiTime = MidiTime::from_ticks(-TICKS_PER_TACT);

/// Stable handle to a note inside one pattern.
///
/// Handles are never reused within a pattern, so a stale handle simply
/// stops resolving once its note has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteId(pub u64);

/// A single event in a pattern.
///
/// The sign of `length` carries meaning: a positive length is a held
/// melodic note, zero is a beat step that is switched off and a negative
/// length is a beat step that is switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub pos: MidiTime,
    pub length: MidiTime,
    pub key: i32,
    pub volume: u8,
    pub panning: i8,
}

impl Note {
    pub fn new(pos: MidiTime, length: MidiTime, key: i32) -> Self {
        Self {
            pos,
            length,
            key,
            volume: DEFAULT_VOLUME,
            panning: 0,
        }
    }

    /// Inactive beat step at `pos`.
    pub fn step(pos: MidiTime) -> Self {
        Self::new(pos, MidiTime::ZERO, DEFAULT_KEY)
    }

    pub fn end_pos(&self) -> MidiTime {
        self.pos + self.length.max(MidiTime::ZERO)
    }

    pub fn is_step(&self) -> bool {
        self.length <= MidiTime::ZERO
    }

    pub fn is_active_step(&self) -> bool {
        self.length < MidiTime::ZERO
    }

    /// How long the note actually sounds: its length, or the magnitude of
    /// an active step's length. Inactive steps are silent.
    pub fn sounding_length(&self) -> MidiTime {
        MidiTime::from_ticks(self.length.ticks().abs())
    }

    pub fn to_data(&self) -> NoteData {
        NoteData {
            pos: self.pos.ticks(),
            len: self.length.ticks(),
            key: self.key,
            vol: self.volume,
            pan: self.panning,
        }
    }

    pub fn from_data(data: &NoteData) -> Self {
        Self {
            pos: MidiTime::from_ticks(data.pos.max(0)),
            length: MidiTime::from_ticks(data.len),
            key: data.key,
            volume: data.vol,
            panning: data.pan,
        }
    }
}

impl Default for Note {
    fn default() -> Self {
        Self::step(MidiTime::ZERO)
    }
}
