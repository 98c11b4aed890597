use std::path::Path;

use stepline_project::ClipData;
use stepline_transport::{MidiTime, SampleFrame};

use crate::modified::ModifiedFlag;
use crate::pattern::Pattern;
use crate::sample_clip::SampleClip;
use crate::time::TempoContext;

/// Where a clip is being serialized to. Clipboard copies carry no position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    Timeline,
    Clipboard,
}

/// Anything that can be placed on a track's timeline.
pub trait TrackContentObject {
    fn start_position(&self) -> MidiTime;

    fn length(&self) -> MidiTime;

    fn end_position(&self) -> MidiTime {
        self.start_position() + self.length()
    }

    /// Move the clip, applying whatever snapping the clip type requires.
    fn move_position(&mut self, pos: MidiTime);

    /// Whether the clip overlaps the half-open range `[start, end)`.
    fn intersects(&self, start: MidiTime, end: MidiTime) -> bool {
        self.start_position() < end && start < self.end_position()
    }

    /// Write audio for song frame `start_frame` on into `dest`. Returns
    /// false when the clip had nothing to play.
    fn play(&self, dest: &mut [SampleFrame], start_frame: u64, tempo: &TempoContext) -> bool;

    /// Re-derive the length after a tempo change.
    fn update_length(&mut self, tempo: &TempoContext);

    fn save(&self, target: SaveTarget) -> ClipData;
}

impl TrackContentObject for Pattern {
    fn start_position(&self) -> MidiTime {
        Pattern::start_position(self)
    }

    fn length(&self) -> MidiTime {
        Pattern::length(self)
    }

    fn move_position(&mut self, pos: MidiTime) {
        Pattern::move_position(self, pos)
    }

    fn play(&self, dest: &mut [SampleFrame], start_frame: u64, tempo: &TempoContext) -> bool {
        Pattern::play(self, dest, start_frame, tempo)
    }

    // pattern length is counted in ticks and does not follow the tempo
    fn update_length(&mut self, _tempo: &TempoContext) {}

    fn save(&self, target: SaveTarget) -> ClipData {
        ClipData::Pattern(Pattern::save(self, target))
    }
}

/// What a track stores.
#[derive(Debug)]
pub enum Clip {
    Pattern(Pattern),
    Sample(SampleClip),
}

impl Clip {
    pub fn from_data(
        data: &ClipData,
        modified: &ModifiedFlag,
        samples_root: &Path,
        tempo: &TempoContext,
    ) -> Self {
        match data {
            ClipData::Pattern(data) => Clip::Pattern(Pattern::from_data(data, modified.clone())),
            ClipData::Sample(data) => {
                let mut clip = SampleClip::new();
                clip.load(data, samples_root, tempo);
                Clip::Sample(clip)
            }
        }
    }

    pub fn as_pattern(&self) -> Option<&Pattern> {
        match self {
            Clip::Pattern(pattern) => Some(pattern),
            Clip::Sample(_) => None,
        }
    }

    pub fn as_pattern_mut(&mut self) -> Option<&mut Pattern> {
        match self {
            Clip::Pattern(pattern) => Some(pattern),
            Clip::Sample(_) => None,
        }
    }

    pub fn as_sample(&self) -> Option<&SampleClip> {
        match self {
            Clip::Sample(clip) => Some(clip),
            Clip::Pattern(_) => None,
        }
    }

    fn inner(&self) -> &dyn TrackContentObject {
        match self {
            Clip::Pattern(pattern) => pattern,
            Clip::Sample(clip) => clip,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn TrackContentObject {
        match self {
            Clip::Pattern(pattern) => pattern,
            Clip::Sample(clip) => clip,
        }
    }
}

impl From<Pattern> for Clip {
    fn from(pattern: Pattern) -> Self {
        Clip::Pattern(pattern)
    }
}

impl From<SampleClip> for Clip {
    fn from(clip: SampleClip) -> Self {
        Clip::Sample(clip)
    }
}

impl TrackContentObject for Clip {
    fn start_position(&self) -> MidiTime {
        self.inner().start_position()
    }

    fn length(&self) -> MidiTime {
        self.inner().length()
    }

    fn move_position(&mut self, pos: MidiTime) {
        self.inner_mut().move_position(pos)
    }

    fn play(&self, dest: &mut [SampleFrame], start_frame: u64, tempo: &TempoContext) -> bool {
        self.inner().play(dest, start_frame, tempo)
    }

    fn update_length(&mut self, tempo: &TempoContext) {
        self.inner_mut().update_length(tempo)
    }

    fn save(&self, target: SaveTarget) -> ClipData {
        self.inner().save(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersects_is_half_open() {
        let mut pattern = Pattern::new("", ModifiedFlag::new());
        pattern.move_position(MidiTime::ONE_TACT);
        let clip = Clip::from(pattern);

        assert_eq!(clip.end_position(), MidiTime::from_ticks(128));
        assert!(clip.intersects(MidiTime::from_ticks(100), MidiTime::from_ticks(110)));
        assert!(clip.intersects(MidiTime::ZERO, MidiTime::from_ticks(65)));
        assert!(!clip.intersects(MidiTime::ZERO, MidiTime::from_ticks(64)));
        assert!(!clip.intersects(MidiTime::from_ticks(128), MidiTime::from_ticks(200)));
    }

    #[test]
    fn test_move_position_snapping_per_type() {
        let mut pattern = Clip::from(Pattern::new("", ModifiedFlag::new()));
        pattern.move_position(MidiTime::from_ticks(70));
        assert_eq!(pattern.start_position(), MidiTime::ONE_TACT);

        let mut sample = Clip::from(SampleClip::new());
        sample.move_position(MidiTime::from_ticks(70));
        assert_eq!(sample.start_position(), MidiTime::from_ticks(70));
    }

    #[test]
    fn test_save_dispatches_by_kind() {
        let pattern = Clip::from(Pattern::new("P", ModifiedFlag::new()));
        assert!(matches!(pattern.save(SaveTarget::Timeline), ClipData::Pattern(_)));

        let sample = Clip::from(SampleClip::new());
        let ClipData::Sample(data) = sample.save(SaveTarget::Clipboard) else {
            panic!("expected a sample clip");
        };
        assert_eq!(data.pos, stepline_project::CLIPBOARD_POSITION);
    }

    #[test]
    fn test_from_data_roundtrip() {
        let tempo = TempoContext::default();
        let flag = ModifiedFlag::new();
        let mut pattern = Pattern::new("Keys", flag.clone());
        pattern.add_note(crate::note::Note::new(
            MidiTime::ZERO,
            MidiTime::from_ticks(80),
            60,
        ));
        pattern.move_position(MidiTime::from_ticks(192));

        let data = Clip::from(pattern).save(SaveTarget::Timeline);
        let clip = Clip::from_data(&data, &flag, Path::new("samples"), &tempo);
        let restored = clip.as_pattern().expect("pattern");

        assert_eq!(restored.name(), "Keys");
        assert_eq!(restored.start_position(), MidiTime::from_ticks(192));
        assert_eq!(restored.length(), MidiTime::from_ticks(128));
        assert!(clip.as_sample().is_none());
    }
}
