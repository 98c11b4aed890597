use std::path::Path;

use stepline_decode::SampleBuffer;
use stepline_project::{CLIPBOARD_POSITION, ClipData, SampleClipData};
use stepline_transport::{MidiTime, SampleFrame};

use crate::clip::{SaveTarget, TrackContentObject};
use crate::time::TempoContext;

/// A clip that plays an audio file from its start position on.
///
/// Its length follows the sample's duration at the current tempo, but never
/// drops below one tact.
#[derive(Debug, Clone)]
pub struct SampleClip {
    start: MidiTime,
    length: MidiTime,
    buffer: SampleBuffer,
}

impl SampleClip {
    pub fn new() -> Self {
        Self {
            start: MidiTime::ZERO,
            length: MidiTime::ONE_TACT,
            buffer: SampleBuffer::new(),
        }
    }

    pub fn sample_file(&self) -> &Path {
        self.buffer.audio_file()
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Load `path` (relative paths resolve against `samples_root`). A file
    /// that cannot be decoded leaves the clip silent.
    pub fn set_sample_file(&mut self, path: &Path, samples_root: &Path, tempo: &TempoContext) {
        self.buffer = SampleBuffer::open(path, samples_root, tempo.sample_rate);
        self.update_length(tempo);
    }

    pub fn set_sample_buffer(&mut self, buffer: SampleBuffer, tempo: &TempoContext) {
        self.buffer = buffer;
        self.update_length(tempo);
    }

    /// Duration of the sample in ticks at `tempo`.
    pub fn sample_length(&self, tempo: &TempoContext) -> MidiTime {
        tempo.frames_to_ticks(self.buffer.frames() as u64)
    }

    pub fn change_length(&mut self, length: MidiTime) {
        self.length = length.max(MidiTime::ONE_TACT);
    }

    pub fn save_data(&self, target: SaveTarget) -> SampleClipData {
        SampleClipData {
            pos: match target {
                SaveTarget::Timeline => self.start.ticks(),
                SaveTarget::Clipboard => CLIPBOARD_POSITION,
            },
            len: self.length.ticks(),
            src: self.buffer.audio_file().to_path_buf(),
        }
    }

    pub fn load(&mut self, data: &SampleClipData, samples_root: &Path, tempo: &TempoContext) {
        if data.pos >= 0 {
            self.move_position(MidiTime::from_ticks(data.pos));
        }
        self.change_length(MidiTime::from_ticks(data.len));
        self.set_sample_file(&data.src, samples_root, tempo);
    }
}

impl Default for SampleClip {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackContentObject for SampleClip {
    fn start_position(&self) -> MidiTime {
        self.start
    }

    fn length(&self) -> MidiTime {
        self.length
    }

    fn move_position(&mut self, pos: MidiTime) {
        self.start = pos.max(MidiTime::ZERO);
    }

    fn play(&self, dest: &mut [SampleFrame], start_frame: u64, tempo: &TempoContext) -> bool {
        let offset = start_frame.saturating_sub(tempo.ticks_to_frames(self.start));
        self.buffer.play(dest, offset as usize)
    }

    fn update_length(&mut self, tempo: &TempoContext) {
        let length = self.sample_length(tempo);
        self.change_length(length);
    }

    fn save(&self, target: SaveTarget) -> ClipData {
        ClipData::Sample(self.save_data(target))
    }
}
