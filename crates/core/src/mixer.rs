use stepline_transport::{AudioDevice, NullDevice, SampleFrame, VolumeVector};

pub const DEFAULT_GAIN: VolumeVector = [1.0, 1.0];

/// Accumulates one period of audio from all playing clips and hands it to
/// the current output device.
///
/// The output device can be temporarily redirected (e.g. to a capture sink
/// while a pattern is frozen) and restored afterwards.
pub struct Mixer {
    sample_rate: u32,
    period: Vec<SampleFrame>,
    device: Box<dyn AudioDevice>,
    saved_device: Option<Box<dyn AudioDevice>>,
}

impl Mixer {
    pub fn new(sample_rate: u32, device: Box<dyn AudioDevice>) -> Self {
        Self {
            sample_rate,
            period: Vec::new(),
            device,
            saved_device: None,
        }
    }

    pub fn with_null_device(sample_rate: u32) -> Self {
        Self::new(sample_rate, Box::new(NullDevice))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    pub fn is_redirected(&self) -> bool {
        self.saved_device.is_some()
    }

    /// Start a new period of `frames` silent frames.
    pub fn begin_period(&mut self, frames: usize) {
        self.period.clear();
        self.period.resize(frames, [0.0; 2]);
    }

    pub fn period(&self) -> &[SampleFrame] {
        &self.period
    }

    /// Mix `src` into the current period starting at frame `offset`.
    /// Frames that would land past the end of the period are dropped.
    pub fn add_buffer(&mut self, src: &[SampleFrame], offset: usize, gain: VolumeVector) {
        if offset >= self.period.len() {
            return;
        }
        for (out, frame) in self.period[offset..].iter_mut().zip(src) {
            out[0] += frame[0] * gain[0];
            out[1] += frame[1] * gain[1];
        }
    }

    /// Push the finished period to the output device.
    pub fn flush(&mut self) {
        self.device.write_frames(&self.period);
    }

    /// Send output to `device` until [`Mixer::restore_audio_device`] is called.
    /// Redirecting twice replaces the redirect but keeps the original device.
    pub fn set_audio_device(&mut self, device: Box<dyn AudioDevice>) {
        log::debug!("redirecting mixer output to {}", device.name());
        let previous = std::mem::replace(&mut self.device, device);
        if self.saved_device.is_none() {
            self.saved_device = Some(previous);
        }
    }

    /// Switch back to the device that was active before the redirect and
    /// return the redirect target. No-op when nothing is redirected.
    pub fn restore_audio_device(&mut self) -> Option<Box<dyn AudioDevice>> {
        let saved = self.saved_device.take()?;
        let redirect = std::mem::replace(&mut self.device, saved);
        log::debug!("restored mixer output to {}", self.device.name());
        Some(redirect)
    }
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("sample_rate", &self.sample_rate)
            .field("device", &self.device.name())
            .field("redirected", &self.is_redirected())
            .finish()
    }
}
