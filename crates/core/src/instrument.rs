use std::f32::consts::PI;
use std::sync::Arc;

use stepline_transport::SampleFrame;

use crate::note::{DEFAULT_VOLUME, Note};

/// Sound source of an instrument track.
///
/// Implementations are shared between the control thread and the mixer, so
/// they must be stateless with respect to individual notes: everything a
/// note needs is derived from the note and its playback offset.
pub trait Instrument: Send + Sync {
    fn name(&self) -> &str;

    /// Add the sound of `note` to `dest`, which starts `frames_into_note`
    /// frames after the note was triggered. `dest` never extends past the
    /// end of the note.
    fn render_note(
        &self,
        note: &Note,
        frames_into_note: u64,
        dest: &mut [SampleFrame],
        sample_rate: u32,
    );
}

/// Plain sine oscillator.
#[derive(Debug, Clone, Copy)]
pub struct SineInstrument {
    pub amplitude: f32,
}

impl SineInstrument {
    pub const NAME: &'static str = "sine";

    pub fn new() -> Self {
        Self { amplitude: 0.25 }
    }
}

impl Default for SineInstrument {
    fn default() -> Self {
        Self::new()
    }
}

pub fn key_to_frequency(key: i32) -> f32 {
    440.0 * 2_f32.powf((key as f32 - 69.0) / 12.0)
}

/// Stereo gains for a panning value in `-100..=100`.
pub fn pan_gains(panning: i8) -> [f32; 2] {
    let pan = (panning as f32 / 100.0).clamp(-1.0, 1.0);
    [(1.0 - pan).min(1.0), (1.0 + pan).min(1.0)]
}

impl Instrument for SineInstrument {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn render_note(
        &self,
        note: &Note,
        frames_into_note: u64,
        dest: &mut [SampleFrame],
        sample_rate: u32,
    ) {
        if sample_rate == 0 {
            return;
        }
        let increment = key_to_frequency(note.key) / sample_rate as f32;
        let level = self.amplitude * note.volume as f32 / DEFAULT_VOLUME as f32;
        let [left, right] = pan_gains(note.panning);

        for (i, out) in dest.iter_mut().enumerate() {
            // phase from the absolute offset keeps periods continuous
            let phase = ((frames_into_note + i as u64) as f64 * increment as f64).fract() as f32;
            let sample = (phase * 2.0 * PI).sin() * level;
            out[0] += sample * left;
            out[1] += sample * right;
        }
    }
}

/// Look up a built-in instrument by its persisted name.
pub fn instrument_by_name(name: &str) -> Option<Arc<dyn Instrument>> {
    match name {
        SineInstrument::NAME => Some(Arc::new(SineInstrument::new())),
        _ => None,
    }
}
