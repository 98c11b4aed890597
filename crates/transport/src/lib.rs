use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::sync::Arc;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Ticks per tact - defines timing resolution
pub const TICKS_PER_TACT: i64 = 64;

/// Number of step slots a beat pattern holds per tact
pub const BEATS_PER_TACT: usize = 16;

/// Distance between two beat steps in ticks
pub const TICKS_PER_STEP: i64 = TICKS_PER_TACT / BEATS_PER_TACT as i64;

/// Channel count of every buffer handed between clips, mixer and devices
pub const DEFAULT_CHANNELS: usize = 2;

/// One interleaved frame of the internal stereo bus.
pub type SampleFrame = [f32; DEFAULT_CHANNELS];

/// Per-channel gain applied when a buffer is accumulated into the mixer.
pub type VolumeVector = [f32; DEFAULT_CHANNELS];

/// A position or duration in musical time.
///
/// Stored as a plain tick count where one tact is [`TICKS_PER_TACT`] ticks.
/// Conversions to audio frames use integer arithmetic only, so repeated
/// conversions never drift.
///
/// ```
/// use stepline_transport::MidiTime;
///
/// let t = MidiTime::new(2, 16);
/// assert_eq!(t.ticks(), 144);
/// assert_eq!(t.tact(), 2);
/// assert_eq!(t.tact64th(), 16);
/// assert_eq!(t.to_frames(44100), 99225);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MidiTime(i64);

impl MidiTime {
    pub const ZERO: Self = Self(0);
    pub const ONE_TACT: Self = Self(TICKS_PER_TACT);

    pub const fn new(tact: i64, tick: i64) -> Self {
        Self(tact * TICKS_PER_TACT + tick)
    }

    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    #[inline]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Index of the tact this position falls into.
    #[inline]
    pub fn tact(self) -> i64 {
        self.0.div_euclid(TICKS_PER_TACT)
    }

    /// Tick offset inside the current tact.
    #[inline]
    pub fn tact64th(self) -> i64 {
        self.0.rem_euclid(TICKS_PER_TACT)
    }

    pub fn floor_to_tact(self) -> Self {
        Self::new(self.tact(), 0)
    }

    /// Smallest tact-aligned time that is not before `self`.
    pub fn ceil_to_tact(self) -> Self {
        if self.tact64th() == 0 {
            self
        } else {
            Self::new(self.tact() + 1, 0)
        }
    }

    /// Convert to a frame count. Negative times map to frame 0.
    pub fn to_frames(self, frames_per_tact: u64) -> u64 {
        if self.0 <= 0 {
            return 0;
        }
        (self.0 as u128 * frames_per_tact as u128 / TICKS_PER_TACT as u128) as u64
    }

    /// Convert a frame count back to ticks, truncating partial ticks.
    pub fn from_frames(frames: u64, frames_per_tact: u64) -> Self {
        if frames_per_tact == 0 {
            return Self::ZERO;
        }
        Self((frames as u128 * TICKS_PER_TACT as u128 / frames_per_tact as u128) as i64)
    }
}

impl From<i64> for MidiTime {
    fn from(ticks: i64) -> Self {
        Self(ticks)
    }
}

impl From<MidiTime> for i64 {
    fn from(time: MidiTime) -> Self {
        time.0
    }
}

impl Add for MidiTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for MidiTime {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for MidiTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for MidiTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.tact(), self.tact64th())
    }
}

/// Something the mixer can push finished periods into: a sound card, a
/// capture buffer, or nothing at all.
pub trait AudioDevice: Send {
    fn name(&self) -> &str;

    fn write_frames(&mut self, frames: &[SampleFrame]);
}

/// Device that discards everything written to it.
#[derive(Debug, Default)]
pub struct NullDevice;

impl AudioDevice for NullDevice {
    fn name(&self) -> &str {
        "null"
    }

    fn write_frames(&mut self, _frames: &[SampleFrame]) {}
}

/// Shared, immutable audio sample data.
///
/// `AudioArc` provides cheap cloning through reference counting while keeping
/// the sample data immutable and shareable. Decoded samples and frozen pattern
/// renders are both held this way so the audio thread can read them while the
/// control thread drops its own reference.
///
/// Cloning an `AudioArc` only increments the reference count.
///
/// ```
/// use stepline_transport::AudioArc;
///
/// let samples = vec![0.0, 0.5, 1.0, 0.5];
/// let audio = AudioArc::new(samples, 44100, 2);
///
/// let audio2 = audio.clone();
/// assert_eq!(audio.frames(), 2);
/// assert_eq!(audio2.frames(), 2);
/// assert_eq!(audio.samples()[0], 0.0);
/// ```
#[derive(Clone)]
pub struct AudioArc {
    /// Raw interleaved samples stored in a reference-counted slice.
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioArc {
    /// Create a new `AudioArc` from owned interleaved sample data.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is 0 or if `samples.len()` is not divisible by `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "samples.len() must be divisible by channels"
        );
        Self {
            samples: Arc::from(samples),
            sample_rate,
            channels,
        }
    }

    /// Build a stereo `AudioArc` from bus frames, e.g. a captured render.
    pub fn from_frames(frames: &[SampleFrame], sample_rate: u32) -> Self {
        let samples: Vec<f32> = frames.iter().flat_map(|frame| frame.iter().copied()).collect();
        Self::new(samples, sample_rate, DEFAULT_CHANNELS as u16)
    }

    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate, DEFAULT_CHANNELS as u16)
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_arc(&self) -> &Arc<[f32]> {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Read one frame mapped onto the stereo bus. Mono sources are
    /// duplicated, extra source channels are dropped.
    #[inline]
    pub fn frame(&self, index: usize) -> SampleFrame {
        let channels = self.channels as usize;
        let base = index * channels;
        let mut frame = [0.0; DEFAULT_CHANNELS];
        for (ch, out) in frame.iter_mut().enumerate() {
            *out = self.samples[base + ch % channels];
        }
        frame
    }

    /// Copy frames starting at `start_frame` into `dest`, zeroing whatever
    /// lies past the end of the data. Returns false when nothing was copied.
    pub fn play_into(&self, dest: &mut [SampleFrame], start_frame: usize) -> bool {
        let total = self.frames();
        if start_frame >= total {
            dest.fill([0.0; DEFAULT_CHANNELS]);
            return false;
        }

        let available = (total - start_frame).min(dest.len());
        for (i, out) in dest[..available].iter_mut().enumerate() {
            *out = self.frame(start_frame + i);
        }
        dest[available..].fill([0.0; DEFAULT_CHANNELS]);
        true
    }

    /// Resample this audio to a target sample rate.
    ///
    /// If the audio is already at the target rate, returns a clone (cheap refcount bump).
    pub fn resample(&self, target_sample_rate: u32) -> anyhow::Result<Self> {
        if self.sample_rate == target_sample_rate {
            return Ok(self.clone());
        }

        resample_audio_arc(self, target_sample_rate)
    }
}

impl fmt::Debug for AudioArc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioArc")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}

/// Resample an `AudioArc` to a target sample rate with sinc interpolation.
pub fn resample_audio_arc(audio: &AudioArc, target_sample_rate: u32) -> anyhow::Result<AudioArc> {
    if audio.sample_rate == target_sample_rate {
        return Ok(audio.clone());
    }
    if audio.is_empty() {
        return Ok(AudioArc::new(Vec::new(), target_sample_rate, audio.channels));
    }

    let channels = audio.channels as usize;
    let input_frames = audio.frames();
    let resample_ratio = target_sample_rate as f64 / audio.sample_rate as f64;
    let output_frames = (input_frames as f64 * resample_ratio).ceil() as usize;

    // rubato works on planar buffers
    let mut input_channels = vec![Vec::with_capacity(input_frames); channels];
    for frame_idx in 0..input_frames {
        for (ch, channel) in input_channels.iter_mut().enumerate() {
            channel.push(audio.samples()[frame_idx * channels + ch]);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler =
        SincFixedIn::<f32>::new(resample_ratio, 2.0, params, input_frames, channels)?;
    let output_channels = resampler.process(&input_channels, None)?;

    let mut output_samples = Vec::with_capacity(output_frames * channels);
    for frame_idx in 0..output_channels[0].len() {
        for channel in &output_channels {
            output_samples.push(channel[frame_idx]);
        }
    }

    Ok(AudioArc::new(
        output_samples,
        target_sample_rate,
        audio.channels,
    ))
}

#[cfg(test)]
mod midi_time_tests {
    use super::*;

    #[test]
    fn test_tact_and_tick_split() {
        let t = MidiTime::new(3, 10);
        assert_eq!(t.ticks(), 3 * 64 + 10);
        assert_eq!(t.tact(), 3);
        assert_eq!(t.tact64th(), 10);
    }

    #[test]
    fn test_negative_ticks_floor_towards_previous_tact() {
        let t = MidiTime::from_ticks(-1);
        assert_eq!(t.tact(), -1);
        assert_eq!(t.tact64th(), 63);
    }

    #[test]
    fn test_ceil_to_tact() {
        assert_eq!(MidiTime::from_ticks(70).ceil_to_tact(), MidiTime::from_ticks(128));
        assert_eq!(MidiTime::from_ticks(128).ceil_to_tact(), MidiTime::from_ticks(128));
        assert_eq!(MidiTime::ZERO.ceil_to_tact(), MidiTime::ZERO);
        assert_eq!(MidiTime::from_ticks(1).ceil_to_tact(), MidiTime::ONE_TACT);
    }

    #[test]
    fn test_floor_to_tact() {
        assert_eq!(MidiTime::from_ticks(127).floor_to_tact(), MidiTime::ONE_TACT);
    }

    #[test]
    fn test_frame_conversion_is_exact() {
        let fpt = 75_600;
        for ticks in [0, 1, 17, 64, 333, 4096] {
            let frames = MidiTime::from_ticks(ticks).to_frames(fpt);
            assert_eq!(frames, ticks as u64 * fpt / 64);
        }
        assert_eq!(MidiTime::from_frames(fpt, fpt), MidiTime::ONE_TACT);
        assert_eq!(MidiTime::from_frames(fpt / 2, fpt), MidiTime::from_ticks(32));
    }

    #[test]
    fn test_negative_time_has_no_frames() {
        assert_eq!(MidiTime::from_ticks(-64).to_frames(44100), 0);
    }

    #[test]
    fn test_zero_frames_per_tact() {
        assert_eq!(MidiTime::from_frames(1000, 0), MidiTime::ZERO);
    }

    #[test]
    fn test_ordering_by_ticks() {
        let mut times = vec![MidiTime::new(1, 0), MidiTime::from_ticks(3), MidiTime::new(0, 63)];
        times.sort();
        assert_eq!(
            times,
            vec![MidiTime::from_ticks(3), MidiTime::new(0, 63), MidiTime::new(1, 0)]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(MidiTime::new(4, 8).to_string(), "4:08");
    }
}
