use stepline_transport::{MidiTime, TICKS_PER_TACT};

/// Beats per tact; the time model only knows common time.
const BEATS_PER_TACT: u64 = 4;

/// Tempo and sample rate, the two values that tie musical time to audio
/// frames. Passed explicitly to everything that converts between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoContext {
    pub bpm: u32,
    pub sample_rate: u32,
}

impl TempoContext {
    pub fn new(bpm: u32, sample_rate: u32) -> Self {
        Self {
            bpm: bpm.max(1),
            sample_rate,
        }
    }

    pub fn frames_per_tact(&self) -> u64 {
        self.sample_rate as u64 * 60 * BEATS_PER_TACT / self.bpm as u64
    }

    pub fn ticks_to_frames(&self, time: MidiTime) -> u64 {
        time.to_frames(self.frames_per_tact())
    }

    pub fn frames_to_ticks(&self, frames: u64) -> MidiTime {
        MidiTime::from_frames(frames, self.frames_per_tact())
    }

    /// Ticks covered by a period of `frames`, rounded up so that a short
    /// period never maps to an empty tick range.
    pub fn period_ticks(&self, frames: u64) -> MidiTime {
        let fpt = self.frames_per_tact().max(1);
        MidiTime::from_ticks((frames * TICKS_PER_TACT as u64).div_ceil(fpt) as i64)
    }

    pub fn ticks_to_seconds(&self, time: MidiTime) -> f64 {
        self.ticks_to_frames(time) as f64 / self.sample_rate as f64
    }

    pub fn format_position(&self, time: MidiTime) -> MusicalPosition {
        MusicalPosition {
            tact: time.tact() as u32 + 1,
            tick: time.tact64th() as u32,
        }
    }
}

impl Default for TempoContext {
    fn default() -> Self {
        Self::new(140, 44100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MusicalPosition {
    pub tact: u32,
    pub tick: u32,
}

impl std::fmt::Display for MusicalPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.tact, self.tick)
    }
}
