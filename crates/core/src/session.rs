use std::path::Path;
use std::sync::Arc;

use stepline_engine::AudioEngineHandle;
use stepline_project::{Project, ProjectError, load_project, save_project};
use stepline_render::{SampleRecorder, write_wav};
use rayon::prelude::*;
use stepline_transport::{AudioArc, MidiTime};

use crate::clip::TrackContentObject;
use crate::config::Config;
use crate::freeze::{FreezeError, FreezeEvents, FreezeJob};
use crate::mixer::Mixer;
use crate::modified::ModifiedFlag;
use crate::pattern::Pattern;
use crate::time::TempoContext;
use crate::track::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    /// The whole arrangement plays.
    Song,
    /// One pattern plays on its own, from its first tact.
    Pattern { track: usize, clip: usize },
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        !matches!(self, PlaybackState::Stopped)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SongError {
    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Freeze(#[from] FreezeError),

    #[error("render failed: {0}")]
    Render(#[from] anyhow::Error),
}

struct ActiveFreeze {
    job: FreezeJob,
    track: usize,
    clip: usize,
}

/// The arrangement and its transport: tracks, tempo, the mixer they play
/// through and the pattern freeze in progress, if any.
pub struct Song {
    name: String,
    config: Config,
    tempo: TempoContext,
    tracks: Vec<Track>,
    mixer: Mixer,
    playback_state: PlaybackState,
    /// Song frame in song mode, pattern-local frame in pattern mode.
    position: u64,
    modified: ModifiedFlag,
    freeze: Option<ActiveFreeze>,
}

impl Song {
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        Self {
            name: name.into(),
            tempo: config.tempo(),
            mixer: Mixer::with_null_device(config.sample_rate),
            config,
            tracks: Vec::new(),
            playback_state: PlaybackState::Stopped,
            position: 0,
            modified: ModifiedFlag::new(),
            freeze: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tempo(&self) -> &TempoContext {
        &self.tempo
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut Mixer {
        &mut self.mixer
    }

    /// Handle for clips created outside the song, so their edits count as
    /// song changes.
    pub fn modified_flag(&self) -> ModifiedFlag {
        self.modified.clone()
    }

    pub fn is_modified(&self) -> bool {
        self.modified.is_set()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Mutable access to a track. Taking it counts as an edit and marks the
    /// song modified, since track fields can change without going through
    /// the song.
    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.modified.set();
        self.tracks.get_mut(index)
    }

    pub fn add_track(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.modified.set();
        self.tracks.len() - 1
    }

    /// End of the last clip on any track.
    pub fn length(&self) -> MidiTime {
        self.tracks
            .iter()
            .flat_map(|track| track.clips())
            .map(|clip| clip.end_position())
            .max()
            .unwrap_or(MidiTime::ZERO)
    }

    /// Change the tempo. Frozen renders were made at the old tempo, so
    /// every pattern is unfrozen and a freeze in progress is aborted.
    pub fn set_bpm(&mut self, bpm: u32) {
        self.retime(TempoContext::new(bpm, self.tempo.sample_rate));
        self.modified.set();
        log::debug!("tempo set to {} bpm", self.tempo.bpm);
    }

    fn retime(&mut self, tempo: TempoContext) {
        if self.freeze.is_some() {
            log::warn!("tempo changed during a freeze, aborting it");
            self.abort_freeze();
        }
        self.tempo = tempo;
        for track in &mut self.tracks {
            track.update_lengths(&self.tempo);
            track.unfreeze_patterns();
        }
    }

    /// Route the mixer to the sound card. The returned handle keeps the
    /// stream running and must stay alive on the calling thread.
    pub fn open_output_device(&mut self) -> anyhow::Result<AudioEngineHandle> {
        if self.mixer.is_redirected() {
            anyhow::bail!("cannot change the output device while it is redirected");
        }
        let (handle, output) = stepline_engine::start()?;
        if handle.sample_rate != self.tempo.sample_rate {
            log::info!(
                "switching sample rate from {} to {} Hz to match the output device",
                self.tempo.sample_rate,
                handle.sample_rate
            );
            self.retime(TempoContext::new(self.tempo.bpm, handle.sample_rate));
        }
        self.mixer = Mixer::new(handle.sample_rate, Box::new(output));
        Ok(handle)
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback_state
    }

    pub fn is_playing(&self) -> bool {
        self.playback_state.is_playing()
    }

    pub fn is_freezing(&self) -> bool {
        self.freeze.is_some()
    }

    pub fn play(&mut self) {
        if self.freeze.is_some() {
            log::warn!("ignoring play request while a pattern is being frozen");
            return;
        }
        self.playback_state = PlaybackState::Song;
    }

    /// Play a single pattern on its own, looping at its end.
    pub fn play_pattern(&mut self, track: usize, clip: usize) -> Result<(), FreezeError> {
        if self.freeze.is_some() {
            return Err(FreezeError::FreezeInProgress);
        }
        self.pattern_at(track, clip)?;
        self.playback_state = PlaybackState::Pattern { track, clip };
        self.position = 0;
        Ok(())
    }

    /// Stop playback. A freeze in progress is aborted.
    pub fn stop(&mut self) {
        if self.freeze.is_some() {
            self.abort_freeze();
        }
        self.playback_state = PlaybackState::Stopped;
        self.position = 0;
    }

    pub fn play_position(&self) -> MidiTime {
        self.tempo.frames_to_ticks(self.position)
    }

    pub fn set_play_position(&mut self, pos: MidiTime) {
        self.position = self.tempo.ticks_to_frames(pos);
    }

    fn pattern_at(&self, track: usize, clip: usize) -> Result<&Pattern, FreezeError> {
        let clip_ref = self
            .tracks
            .get(track)
            .and_then(|t| t.clip(clip))
            .ok_or(FreezeError::NoSuchClip { track, clip })?;
        clip_ref
            .as_pattern()
            .ok_or(FreezeError::NotAPattern { track, clip })
    }

    /// Render one mixer period. Returns false when the transport is stopped.
    pub fn next_period(&mut self) -> bool {
        let frames = self.config.period_frames.max(1);
        match self.playback_state {
            PlaybackState::Stopped => false,
            PlaybackState::Song => {
                self.mixer.begin_period(frames);
                for track in self.tracks.iter_mut().filter(|track| !track.muted) {
                    track.play(self.position, frames, &mut self.mixer, &self.tempo);
                }
                self.mixer.flush();
                self.position += frames as u64;
                true
            }
            PlaybackState::Pattern { track, clip } => {
                self.mixer.begin_period(frames);
                if let Some(track) = self.tracks.get_mut(track) {
                    track.play_clip_local(clip, self.position, frames, &mut self.mixer, &self.tempo);
                }
                self.mixer.flush();
                self.position += frames as u64;
                self.after_pattern_period(track, clip);
                true
            }
        }
    }

    fn after_pattern_period(&mut self, track: usize, clip: usize) {
        let position = self.play_position();
        if let Some(active) = &self.freeze {
            if active.job.is_complete(position) {
                self.finish_freeze();
            }
            return;
        }
        let length = self
            .pattern_at(track, clip)
            .map(|pattern| pattern.length())
            .unwrap_or(MidiTime::ZERO);
        if position >= length {
            self.position = 0;
        }
    }

    /// Start pre-rendering the pattern at `clip` on `track`.
    ///
    /// `confirm_muted` is asked whether to go on when the track is muted;
    /// declining returns `Ok(None)`. On success the song plays the pattern
    /// on its own until [`Song::next_period`] reaches its end, and the
    /// returned queue reports progress.
    pub fn freeze_pattern(
        &mut self,
        track: usize,
        clip: usize,
        confirm_muted: impl FnOnce(&Track) -> bool,
    ) -> Result<Option<FreezeEvents>, FreezeError> {
        if self.freeze.is_some() {
            return Err(FreezeError::FreezeInProgress);
        }
        if self.is_playing() {
            return Err(FreezeError::TransportPlaying);
        }

        let pattern = self.pattern_at(track, clip)?;
        let cache = Arc::clone(pattern.freeze_cache());
        let length = pattern.length();

        let owner = &self.tracks[track];
        if owner.muted && !confirm_muted(owner) {
            log::debug!("freeze of muted track {track} declined");
            return Ok(None);
        }

        let (job, events) = FreezeJob::start(cache, length, &self.tempo, &mut self.mixer)?;
        self.freeze = Some(ActiveFreeze { job, track, clip });
        self.playback_state = PlaybackState::Pattern { track, clip };
        self.position = 0;
        Ok(Some(events))
    }

    /// Report freeze progress in percent. Meant to be called on a timer
    /// every `freeze_progress_interval_ms`.
    pub fn poll_freeze(&mut self) -> Option<u8> {
        let position = self.play_position();
        self.freeze.as_mut().map(|active| active.job.poll(position))
    }

    fn finish_freeze(&mut self) {
        if let Some(active) = self.freeze.take() {
            let position = self.play_position();
            let mut job = active.job;
            job.poll(position);
            job.finish(&mut self.mixer);
            log::debug!("freeze of track {} clip {} done", active.track, active.clip);
        }
        self.playback_state = PlaybackState::Stopped;
        self.position = 0;
    }

    /// Cancel the freeze in progress. The mixer gets its output back and
    /// the pattern is left unfrozen.
    pub fn abort_freeze(&mut self) {
        if let Some(active) = self.freeze.take() {
            active.job.abort(&mut self.mixer);
        }
        self.playback_state = PlaybackState::Stopped;
        self.position = 0;
    }

    /// Render the whole arrangement offline into a WAV file. Tracks are
    /// rendered in parallel, each through its own mixer, then summed.
    pub fn render_to_file(&mut self, path: &Path) -> Result<(), SongError> {
        if self.freeze.is_some() {
            return Err(FreezeError::FreezeInProgress.into());
        }
        let total = self.tempo.ticks_to_frames(self.length());
        let period = self.config.period_frames.max(1) as u64;
        let tempo = self.tempo;

        let stems: Vec<AudioArc> = self
            .tracks
            .par_iter_mut()
            .filter(|track| !track.muted)
            .map(|track| render_stem(track, total, period, &tempo))
            .collect();

        let mut mix = vec![[0.0f32; 2]; total as usize];
        for stem in &stems {
            for (i, out) in mix.iter_mut().enumerate().take(stem.frames()) {
                let frame = stem.frame(i);
                out[0] += frame[0];
                out[1] += frame[1];
            }
        }

        let buffer = AudioArc::from_frames(&mix, tempo.sample_rate);
        write_wav(&buffer, path)?;
        log::info!("rendered {} frames to {}", buffer.frames(), path.display());
        Ok(())
    }

    pub fn to_project(&self) -> Project {
        Project {
            name: self.name.clone(),
            bpm: self.tempo.bpm,
            tracks: self.tracks.iter().map(Track::to_data).collect(),
        }
    }

    pub fn from_project(project: &Project, config: Config) -> Self {
        let mut song = Self::new(project.name.clone(), config);
        song.tempo = TempoContext::new(project.bpm, song.tempo.sample_rate);
        song.tracks = project
            .tracks
            .iter()
            .map(|track| {
                Track::from_data(track, &song.modified, &song.config.samples_root, &song.tempo)
            })
            .collect();
        song.modified.clear();
        song
    }

    pub fn save(&self, path: &Path) -> Result<(), SongError> {
        save_project(path, &self.to_project())?;
        self.modified.clear();
        Ok(())
    }

    pub fn load(path: &Path, config: Config) -> Result<Self, SongError> {
        let project = load_project(path)?;
        Ok(Self::from_project(&project, config))
    }
}

fn render_stem(track: &mut Track, total: u64, period: u64, tempo: &TempoContext) -> AudioArc {
    let (recorder, capture) = SampleRecorder::new(tempo.sample_rate);
    let mut mixer = Mixer::new(tempo.sample_rate, Box::new(recorder));

    let mut position = 0;
    while position < total {
        let frames = period.min(total - position) as usize;
        mixer.begin_period(frames);
        track.play(position, frames, &mut mixer, tempo);
        mixer.flush();
        position += frames as u64;
    }
    capture.create_sample_buffer(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freeze::{FreezeEvent, FreezeState};
    use crate::instrument::SineInstrument;
    use crate::note::Note;
    use crate::sample_clip::SampleClip;
    use stepline_decode::SampleBuffer;
    use stepline_transport::SampleFrame;
    use tempfile::tempdir;

    // 240 bpm at 64 Hz: one frame per tick
    fn config() -> Config {
        Config {
            sample_rate: 64,
            bpm: 240,
            period_frames: 16,
            ..Config::default()
        }
    }

    fn song_with_melody() -> Song {
        let mut song = Song::new("Test", config());
        let mut pattern = Pattern::new("Lead", song.modified_flag());
        pattern.add_note(Note::new(MidiTime::ZERO, MidiTime::from_ticks(100), 69));
        pattern.move_position(MidiTime::ONE_TACT);

        let mut track = Track::instrument("Lead", Arc::new(SineInstrument::new()));
        track.add_clip(pattern);
        song.add_track(track);
        song
    }

    fn pattern(song: &Song) -> &Pattern {
        song.tracks()[0].clip(0).and_then(|c| c.as_pattern()).expect("pattern")
    }

    fn run_until_stopped(song: &mut Song) -> usize {
        let mut periods = 0;
        while song.next_period() {
            periods += 1;
            assert!(periods < 1000, "transport never stopped");
        }
        periods
    }

    #[test]
    fn test_freeze_end_to_end() {
        let mut song = song_with_melody();
        let mut events = song
            .freeze_pattern(0, 0, |_| panic!("track is not muted"))
            .expect("freeze")
            .expect("not declined");

        assert!(song.is_freezing());
        assert_eq!(song.mixer().device_name(), "sample recorder");
        assert_eq!(pattern(&song).freeze_cache().state(), FreezeState::Rendering);

        assert_eq!(song.poll_freeze(), Some(0));
        // two tacts at 16 frames per period
        assert_eq!(run_until_stopped(&mut song), 8);

        assert!(!song.is_freezing());
        assert!(!song.is_playing());
        assert_eq!(song.mixer().device_name(), "null");
        assert!(pattern(&song).is_frozen());
        assert_eq!(pattern(&song).freeze_cache().frozen_frames(), Some(128));

        let received = events.drain();
        assert_eq!(received.first(), Some(&FreezeEvent::Started));
        assert!(received.contains(&FreezeEvent::Progress(100)));
        assert_eq!(received.last(), Some(&FreezeEvent::Completed { frames: 128 }));
    }

    #[test]
    fn test_frozen_render_matches_live_render() {
        let mut song = song_with_melody();
        song.freeze_pattern(0, 0, |_| true).expect("freeze");
        run_until_stopped(&mut song);

        let tempo = *song.tempo();
        let p = pattern(&song);
        let mut frozen = vec![[0.0f32; 2]; 32];
        assert!(p.freeze_cache().play_frozen_data(&mut frozen, 0));

        let mut live: Vec<SampleFrame> = vec![[0.0; 2]; 32];
        p.render_notes(&SineInstrument::new(), &mut live, 0, &tempo);

        for (a, b) in frozen.iter().zip(&live) {
            assert!((a[0] - b[0]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_freeze_refused_while_playing() {
        let mut song = song_with_melody();
        song.play();
        assert!(matches!(
            song.freeze_pattern(0, 0, |_| true),
            Err(FreezeError::TransportPlaying)
        ));
        assert_eq!(pattern(&song).freeze_cache().state(), FreezeState::Idle);
    }

    #[test]
    fn test_freeze_of_muted_track_can_be_declined() {
        let mut song = song_with_melody();
        song.track_mut(0).expect("track").muted = true;

        let mut asked = false;
        let result = song.freeze_pattern(0, 0, |track| {
            asked = true;
            assert_eq!(track.name, "Lead");
            false
        });

        assert!(asked);
        assert!(matches!(result, Ok(None)));
        assert!(!song.is_playing());
        assert_eq!(song.mixer().device_name(), "null");
        assert_eq!(pattern(&song).freeze_cache().state(), FreezeState::Idle);
    }

    #[test]
    fn test_freeze_of_muted_track_when_confirmed() {
        let mut song = song_with_melody();
        song.track_mut(0).expect("track").muted = true;

        song.freeze_pattern(0, 0, |_| true).expect("freeze").expect("confirmed");
        run_until_stopped(&mut song);
        assert!(pattern(&song).is_frozen());
    }

    #[test]
    fn test_freeze_rejects_bad_targets() {
        let mut song = song_with_melody();
        let mut samples = Track::sample("Loops");
        samples.add_clip(SampleClip::new());
        song.add_track(samples);

        assert!(matches!(
            song.freeze_pattern(1, 0, |_| true),
            Err(FreezeError::NotAPattern { track: 1, clip: 0 })
        ));
        assert!(matches!(
            song.freeze_pattern(0, 3, |_| true),
            Err(FreezeError::NoSuchClip { track: 0, clip: 3 })
        ));
        assert!(matches!(
            song.freeze_pattern(7, 0, |_| true),
            Err(FreezeError::NoSuchClip { .. })
        ));
    }

    #[test]
    fn test_abort_right_after_freeze() {
        let mut song = song_with_melody();
        let mut events = song.freeze_pattern(0, 0, |_| true).expect("freeze").expect("started");

        song.abort_freeze();

        assert_eq!(pattern(&song).freeze_cache().state(), FreezeState::Idle);
        assert_eq!(song.mixer().device_name(), "null");
        assert!(!song.is_playing());
        assert_eq!(events.drain(), vec![FreezeEvent::Started, FreezeEvent::Aborted]);
    }

    #[test]
    fn test_abort_mid_render() {
        let mut song = song_with_melody();
        song.freeze_pattern(0, 0, |_| true).expect("freeze");
        song.next_period();
        song.next_period();

        song.stop();

        assert!(!pattern(&song).is_frozen());
        assert!(!song.mixer().is_redirected());
        assert!(song.poll_freeze().is_none());
    }

    #[test]
    fn test_second_freeze_while_freezing() {
        let mut song = song_with_melody();
        song.freeze_pattern(0, 0, |_| true).expect("freeze");
        assert!(matches!(
            song.freeze_pattern(0, 0, |_| true),
            Err(FreezeError::FreezeInProgress)
        ));
        song.abort_freeze();
    }

    #[test]
    fn test_refreeze_replaces_cache() {
        let mut song = song_with_melody();
        song.freeze_pattern(0, 0, |_| true).expect("freeze");
        run_until_stopped(&mut song);

        song.freeze_pattern(0, 0, |_| true).expect("refreeze");
        assert_eq!(pattern(&song).freeze_cache().state(), FreezeState::Rendering);
        run_until_stopped(&mut song);
        assert!(pattern(&song).is_frozen());
    }

    #[test]
    fn test_edit_after_freeze_unfreezes() {
        let mut song = song_with_melody();
        song.freeze_pattern(0, 0, |_| true).expect("freeze");
        run_until_stopped(&mut song);

        let pattern = song
            .track_mut(0)
            .and_then(|t| t.clip_mut(0))
            .and_then(|c| c.as_pattern_mut())
            .expect("pattern");
        pattern.toggle_step(0);
        assert!(!pattern.is_frozen());
    }

    #[test]
    fn test_set_bpm_unfreezes_patterns() {
        let mut song = song_with_melody();
        song.freeze_pattern(0, 0, |_| true).expect("freeze");
        run_until_stopped(&mut song);
        assert!(pattern(&song).is_frozen());

        song.set_bpm(120);
        assert!(!pattern(&song).is_frozen());

        // 128 frames per tact now, so the note spans frames 128..328
        let (recorder, capture) = SampleRecorder::new(64);
        *song.mixer_mut() = Mixer::new(64, Box::new(recorder));
        song.play();
        for _ in 0..21 {
            song.next_period();
        }

        let recorded = capture.create_sample_buffer(None);
        let sounding = (256..328).filter(|&i| recorded.frame(i)[0] != 0.0).count();
        assert!(sounding > 30, "only {sounding} frames sound after the tempo change");
    }

    #[test]
    fn test_set_bpm_aborts_running_freeze() {
        let mut song = song_with_melody();
        song.freeze_pattern(0, 0, |_| true).expect("freeze");
        assert!(song.next_period());

        song.set_bpm(120);
        assert!(!song.is_freezing());
        assert!(!song.is_playing());
        assert_eq!(song.mixer().device_name(), "null");
        assert_eq!(pattern(&song).freeze_cache().state(), FreezeState::Idle);
    }

    #[test]
    fn test_track_mut_marks_song_modified() {
        let mut song = song_with_melody();
        song.modified_flag().clear();

        assert!(song.track(0).is_some());
        assert!(!song.is_modified());

        song.track_mut(0).expect("track").volume = 0.5;
        assert!(song.is_modified());
    }

    #[test]
    fn test_song_playback_advances() {
        let mut song = song_with_melody();
        assert!(!song.next_period());

        song.play();
        assert!(song.next_period());
        assert!(song.next_period());
        assert_eq!(song.play_position(), MidiTime::from_ticks(32));

        song.stop();
        assert_eq!(song.play_position(), MidiTime::ZERO);
    }

    #[test]
    fn test_pattern_playback_loops() {
        let mut song = song_with_melody();
        song.play_pattern(0, 0).expect("pattern");
        for _ in 0..8 {
            song.next_period();
        }
        assert_eq!(song.play_position(), MidiTime::ZERO);
        assert!(song.is_playing());
        assert!(matches!(song.play_pattern(0, 9), Err(FreezeError::NoSuchClip { .. })));
    }

    #[test]
    fn test_set_bpm_updates_sample_clip_lengths() {
        let mut song = Song::new("Tempo", config());
        let mut clip = SampleClip::new();
        clip.set_sample_buffer(
            SampleBuffer::from_audio("loop.wav", AudioArc::from_frames(&[[0.0; 2]; 128], 64)),
            song.tempo(),
        );
        let mut track = Track::sample("Loops");
        track.add_clip(clip);
        song.add_track(track);
        assert_eq!(song.length(), MidiTime::from_ticks(128));

        song.set_bpm(480);
        assert_eq!(song.length(), MidiTime::from_ticks(256));
        assert!(song.is_modified());
    }

    #[test]
    fn test_render_to_file_places_samples() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("song.wav");

        let mut song = Song::new("Render", config());
        let mut clip = SampleClip::new();
        clip.set_sample_buffer(
            SampleBuffer::from_audio("hit.wav", AudioArc::from_frames(&[[0.5; 2]; 64], 64)),
            song.tempo(),
        );
        clip.move_position(MidiTime::from_ticks(40));
        let mut track = Track::sample("Hits");
        track.add_clip(clip);
        song.add_track(track);

        song.render_to_file(&path).expect("render");
        assert_eq!(song.mixer().device_name(), "null");

        let mut reader = hound::WavReader::open(&path).expect("open");
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.expect("sample")).collect();
        assert_eq!(samples.len(), 104 * 2);
        assert!(samples[..80].iter().all(|&s| s == 0.0));
        assert!(samples[80..].iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_muted_tracks_are_skipped() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("muted.wav");

        let mut song = Song::new("Muted", config());
        let mut clip = SampleClip::new();
        clip.set_sample_buffer(
            SampleBuffer::from_audio("hit.wav", AudioArc::from_frames(&[[0.5; 2]; 64], 64)),
            song.tempo(),
        );
        let mut track = Track::sample("Hits");
        track.muted = true;
        track.add_clip(clip);
        song.add_track(track);

        song.render_to_file(&path).expect("render");
        let mut reader = hound::WavReader::open(&path).expect("open");
        assert!(reader.samples::<f32>().all(|s| s.expect("sample") == 0.0));
    }

    #[test]
    fn test_project_file_roundtrip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("song.json");

        let mut song = song_with_melody();
        song.set_bpm(133);
        song.freeze_pattern(0, 0, |_| true).expect("freeze");
        run_until_stopped(&mut song);
        song.save(&path).expect("save");
        assert!(!song.is_modified());

        let loaded = Song::load(&path, config()).expect("load");
        assert_eq!(loaded.name(), "Test");
        assert_eq!(loaded.tempo().bpm, 133);
        assert!(!loaded.is_modified());

        let p = pattern(&loaded);
        assert_eq!(p.start_position(), MidiTime::ONE_TACT);
        assert_eq!(p.length(), MidiTime::from_ticks(128));
        assert!(!p.is_frozen());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().expect("tempdir");
        let result = Song::load(&dir.path().join("nope.json"), config());
        assert!(matches!(result, Err(SongError::Project(_))));
    }
}
