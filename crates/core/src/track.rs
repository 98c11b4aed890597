use std::path::Path;
use std::sync::Arc;

use stepline_project::{TrackData, TrackKind as TrackKindData};
use stepline_transport::{MidiTime, SampleFrame, VolumeVector};

use crate::clip::{Clip, SaveTarget, TrackContentObject};
use crate::instrument::{Instrument, SineInstrument, instrument_by_name};
use crate::mixer::Mixer;
use crate::modified::ModifiedFlag;
use crate::time::TempoContext;

#[derive(Clone)]
pub enum TrackKind {
    Instrument(Arc<dyn Instrument>),
    Sample,
}

impl std::fmt::Debug for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Instrument(instrument) => {
                f.debug_tuple("Instrument").field(&instrument.name()).finish()
            }
            TrackKind::Sample => f.write_str("Sample"),
        }
    }
}

#[derive(Debug)]
pub struct Track {
    pub name: String,
    pub kind: TrackKind,
    pub muted: bool,
    pub volume: f32,
    /// -1.0 (left) to 1.0 (right).
    pub pan: f32,
    clips: Vec<Clip>,
    scratch: Vec<SampleFrame>,
}

impl Track {
    pub fn new(name: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            name: name.into(),
            kind,
            muted: false,
            volume: 1.0,
            pan: 0.0,
            clips: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn instrument(name: impl Into<String>, instrument: Arc<dyn Instrument>) -> Self {
        Self::new(name, TrackKind::Instrument(instrument))
    }

    pub fn sample(name: impl Into<String>) -> Self {
        Self::new(name, TrackKind::Sample)
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clip(&self, index: usize) -> Option<&Clip> {
        self.clips.get(index)
    }

    pub fn clip_mut(&mut self, index: usize) -> Option<&mut Clip> {
        self.clips.get_mut(index)
    }

    pub fn add_clip(&mut self, clip: impl Into<Clip>) -> usize {
        self.clips.push(clip.into());
        self.clips.len() - 1
    }

    pub fn remove_clip(&mut self, index: usize) -> Option<Clip> {
        (index < self.clips.len()).then(|| self.clips.remove(index))
    }

    /// Indices of every clip overlapping `[start, end)`.
    pub fn clips_in_range(&self, start: MidiTime, end: MidiTime) -> Vec<usize> {
        self.clips
            .iter()
            .enumerate()
            .filter(|(_, clip)| clip.intersects(start, end))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn gain(&self) -> VolumeVector {
        let pan = self.pan.clamp(-1.0, 1.0);
        [
            self.volume * (1.0 - pan).min(1.0),
            self.volume * (1.0 + pan).min(1.0),
        ]
    }

    pub fn update_lengths(&mut self, tempo: &TempoContext) {
        for clip in &mut self.clips {
            clip.update_length(tempo);
        }
    }

    /// Drop the frozen render of every pattern on this track.
    pub fn unfreeze_patterns(&self) {
        for pattern in self.clips.iter().filter_map(Clip::as_pattern) {
            pattern.unfreeze();
        }
    }

    /// Mix the period of `frames` frames starting at song frame
    /// `start_frame` into `mixer`. Returns false when no clip is in range.
    pub fn play(
        &mut self,
        start_frame: u64,
        frames: usize,
        mixer: &mut Mixer,
        tempo: &TempoContext,
    ) -> bool {
        let start = tempo.frames_to_ticks(start_frame);
        let end = start + tempo.period_ticks(frames as u64);
        let in_range = self.clips_in_range(start, end);
        if in_range.is_empty() {
            return false;
        }

        let gain = self.gain();
        let period_end = start_frame + frames as u64;
        for index in in_range {
            let clip_start = tempo.ticks_to_frames(self.clips[index].start_position());
            if clip_start >= period_end {
                continue;
            }
            let offset = clip_start.saturating_sub(start_frame) as usize;
            let from = start_frame.max(clip_start);

            self.scratch.clear();
            self.scratch.resize(frames - offset, [0.0; 2]);
            render_clip(
                &self.clips[index],
                &self.kind,
                &mut self.scratch,
                from,
                clip_start,
                tempo,
            );
            mixer.add_buffer(&self.scratch, offset, gain);
        }
        true
    }

    /// Play clip `index` on its own, as if it started at frame zero. Used
    /// to render a single pattern.
    pub fn play_clip_local(
        &mut self,
        index: usize,
        local_frame: u64,
        frames: usize,
        mixer: &mut Mixer,
        tempo: &TempoContext,
    ) -> bool {
        let Some(clip) = self.clips.get(index) else {
            return false;
        };
        let clip_start = tempo.ticks_to_frames(clip.start_position());

        self.scratch.clear();
        self.scratch.resize(frames, [0.0; 2]);
        let played = render_clip(
            clip,
            &self.kind,
            &mut self.scratch,
            clip_start + local_frame,
            clip_start,
            tempo,
        );
        mixer.add_buffer(&self.scratch, 0, self.gain());
        played
    }

    pub fn to_data(&self) -> TrackData {
        let (kind, instrument) = match &self.kind {
            TrackKind::Instrument(instrument) => {
                (TrackKindData::Instrument, Some(instrument.name().to_string()))
            }
            TrackKind::Sample => (TrackKindData::Sample, None),
        };
        TrackData {
            name: self.name.clone(),
            kind,
            instrument,
            muted: self.muted,
            volume: self.volume,
            pan: self.pan,
            clips: self
                .clips
                .iter()
                .map(|clip| clip.save(SaveTarget::Timeline))
                .collect(),
        }
    }

    pub fn from_data(
        data: &TrackData,
        modified: &ModifiedFlag,
        samples_root: &Path,
        tempo: &TempoContext,
    ) -> Self {
        let kind = match data.kind {
            TrackKindData::Sample => TrackKind::Sample,
            TrackKindData::Instrument => {
                let name = data.instrument.as_deref().unwrap_or(SineInstrument::NAME);
                let instrument = instrument_by_name(name).unwrap_or_else(|| {
                    log::warn!("unknown instrument '{name}' on track '{}', using sine", data.name);
                    Arc::new(SineInstrument::new())
                });
                TrackKind::Instrument(instrument)
            }
        };

        let mut track = Self::new(data.name.clone(), kind);
        track.muted = data.muted;
        track.volume = data.volume;
        track.pan = data.pan;
        track.clips = data
            .clips
            .iter()
            .map(|clip| Clip::from_data(clip, modified, samples_root, tempo))
            .collect();
        track
    }
}

/// Render one clip into `dest`, which covers song frames from `from` on.
/// Patterns use their frozen render when there is one.
fn render_clip(
    clip: &Clip,
    kind: &TrackKind,
    dest: &mut [SampleFrame],
    from: u64,
    clip_start: u64,
    tempo: &TempoContext,
) -> bool {
    match clip {
        Clip::Sample(sample) => sample.play(dest, from, tempo),
        Clip::Pattern(pattern) => {
            if pattern.play(dest, from, tempo) {
                return true;
            }
            match kind {
                TrackKind::Instrument(instrument) => {
                    pattern.render_notes(instrument.as_ref(), dest, from - clip_start, tempo)
                }
                TrackKind::Sample => false,
            }
        }
    }
}
