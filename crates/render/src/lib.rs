use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use stepline_transport::{AudioArc, AudioDevice, SampleFrame};

/// Audio device that captures everything the mixer writes instead of
/// sending it to a sound card. Used for freezing patterns and exporting.
pub struct SampleRecorder {
    frames: Arc<Mutex<Vec<SampleFrame>>>,
}

/// Control-side view of a [`SampleRecorder`] that stays valid after the
/// recorder itself has been handed to (and taken back from) the mixer.
#[derive(Clone)]
pub struct CaptureHandle {
    frames: Arc<Mutex<Vec<SampleFrame>>>,
    sample_rate: u32,
}

impl SampleRecorder {
    pub fn new(sample_rate: u32) -> (Self, CaptureHandle) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                frames: frames.clone(),
            },
            CaptureHandle {
                frames,
                sample_rate,
            },
        )
    }
}

impl AudioDevice for SampleRecorder {
    fn name(&self) -> &str {
        "sample recorder"
    }

    fn write_frames(&mut self, frames: &[SampleFrame]) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(frames);
    }
}

impl CaptureHandle {
    pub fn frames_recorded(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Move the captured frames out into an immutable buffer, truncated to
    /// `max_frames` when given.
    pub fn create_sample_buffer(&self, max_frames: Option<usize>) -> AudioArc {
        let mut frames = std::mem::take(
            &mut *self.frames.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if let Some(max) = max_frames {
            frames.truncate(max);
        }
        AudioArc::from_frames(&frames, self.sample_rate)
    }
}

pub fn write_wav(buffer: &AudioArc, path: &Path) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;

    for &sample in buffer.samples() {
        writer.write_sample(sample)?;
    }

    writer.finalize()?;
    Ok(())
}
