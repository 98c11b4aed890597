use std::fs::File;
use std::path::{Path, PathBuf};

use stepline_transport::{AudioArc, SampleFrame};
use symphonia::core::audio::SampleBuffer as DecodeBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub const SAMPLES_ROOT: &str = "samples";

/// Resolve a sample path to something that exists on disk.
/// Accepts paths relative to the samples root (e.g., `cr78/hihat.wav`)
/// or paths that already include the samples root (e.g., `samples/cr78/hihat.wav`).
pub fn resolve_sample_path(path: &Path, samples_root: &Path) -> Option<PathBuf> {
    if path.exists() {
        return Some(path.to_path_buf());
    }

    let with_root = samples_root.join(path);
    if with_root.exists() {
        return Some(with_root);
    }

    None
}

/// Strip the samples root prefix from a path if present.
/// Use this when saving paths to project files.
pub fn strip_samples_root(path: &Path, samples_root: &Path) -> PathBuf {
    path.strip_prefix(samples_root)
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|_| path.to_path_buf())
}

pub fn decode_file(path: &Path, samples_root: &Path) -> anyhow::Result<AudioArc> {
    let resolved = resolve_sample_path(path, samples_root)
        .ok_or_else(|| anyhow::anyhow!("sample not found: {}", path.display()))?;
    decode_file_direct(&resolved)
}

pub fn decode_file_direct(path: &Path) -> anyhow::Result<AudioArc> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track"))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2) as u16;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;
        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;

        let mut sample_buf = DecodeBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(AudioArc::new(samples, sample_rate, channels.max(1)))
}

/// A sample file bound to a clip: the path it came from and its decoded data.
///
/// A buffer whose file is missing or cannot be decoded stays empty; callers
/// treat it as a zero-length sample rather than failing the whole load.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    audio_file: PathBuf,
    audio: Option<AudioArc>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_audio(audio_file: impl Into<PathBuf>, audio: AudioArc) -> Self {
        Self {
            audio_file: audio_file.into(),
            audio: Some(audio),
        }
    }

    /// Load `path` and resample it to `sample_rate`. The stored path is
    /// relative to `samples_root` when it lies under it.
    pub fn open(path: &Path, samples_root: &Path, sample_rate: u32) -> Self {
        if path.as_os_str().is_empty() {
            return Self::new();
        }

        let audio_file = strip_samples_root(path, samples_root);
        let audio = decode_file(path, samples_root).and_then(|audio| audio.resample(sample_rate));
        match audio {
            Ok(audio) => {
                log::debug!("loaded sample {} ({} frames)", path.display(), audio.frames());
                Self::from_audio(audio_file, audio)
            }
            Err(e) => {
                log::warn!("could not load sample {}: {e}", path.display());
                Self {
                    audio_file,
                    audio: None,
                }
            }
        }
    }

    pub fn audio_file(&self) -> &Path {
        &self.audio_file
    }

    pub fn audio(&self) -> Option<&AudioArc> {
        self.audio.as_ref()
    }

    pub fn frames(&self) -> usize {
        self.audio.as_ref().map_or(0, AudioArc::frames)
    }

    /// Copy frames from `start_frame` on into `dest`. An empty buffer
    /// produces silence and returns false.
    pub fn play(&self, dest: &mut [SampleFrame], start_frame: usize) -> bool {
        match &self.audio {
            Some(audio) => audio.play_into(dest, start_frame),
            None => {
                dest.fill([0.0; 2]);
                false
            }
        }
    }
}
