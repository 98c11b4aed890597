//! Offline pre-rendering of patterns into an audio cache.
//!
//! A [`FrozenPattern`] is the cache slot a pattern shares with the audio
//! thread. Every state change and every read of the cached buffer happens
//! under its single mutex, so playback never observes a cache that is being
//! replaced or dropped.
//!
//! A [`FreezeJob`] drives one render: it redirects the mixer into a capture
//! sink, reports progress through a ring buffer and, on completion or
//! cancellation, always hands the original output device back to the mixer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stepline_render::{CaptureHandle, SampleRecorder};
use stepline_transport::{AudioArc, MidiTime, SampleFrame};

use crate::mixer::Mixer;
use crate::time::TempoContext;

const EVENT_QUEUE_SIZE: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeState {
    Idle,
    Rendering,
    Frozen,
}

#[derive(Debug, Default)]
enum FreezeSlot {
    #[default]
    Idle,
    Rendering,
    Frozen(AudioArc),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FreezeError {
    #[error("the pattern cannot be frozen while the song is playing")]
    TransportPlaying,

    #[error("another pattern is already being frozen")]
    FreezeInProgress,

    #[error("clip {clip} on track {track} is not a pattern")]
    NotAPattern { track: usize, clip: usize },

    #[error("no clip {clip} on track {track}")]
    NoSuchClip { track: usize, clip: usize },
}

/// Notifications emitted while a pattern is being frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeEvent {
    Started,
    /// Percentage of the pattern rendered so far.
    Progress(u8),
    Completed { frames: usize },
    Aborted,
}

/// The freeze cache of one pattern.
#[derive(Debug, Default)]
pub struct FrozenPattern {
    slot: Mutex<FreezeSlot>,
}

impl FrozenPattern {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FreezeSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> FreezeState {
        match *self.lock() {
            FreezeSlot::Idle => FreezeState::Idle,
            FreezeSlot::Rendering => FreezeState::Rendering,
            FreezeSlot::Frozen(_) => FreezeState::Frozen,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.state() == FreezeState::Frozen
    }

    pub fn frozen_frames(&self) -> Option<usize> {
        match &*self.lock() {
            FreezeSlot::Frozen(buffer) => Some(buffer.frames()),
            _ => None,
        }
    }

    /// Enter `Rendering`, dropping any previous cache. Returns false when a
    /// render is already running.
    pub fn begin_rendering(&self) -> bool {
        let previous = {
            let mut slot = self.lock();
            if matches!(*slot, FreezeSlot::Rendering) {
                return false;
            }
            std::mem::replace(&mut *slot, FreezeSlot::Rendering)
        };
        drop(previous);
        true
    }

    /// Store the rendered buffer. Only accepted while `Rendering`; a render
    /// that was aborted in the meantime is discarded.
    pub fn finish(&self, buffer: AudioArc) -> bool {
        let mut slot = self.lock();
        if !matches!(*slot, FreezeSlot::Rendering) {
            return false;
        }
        *slot = FreezeSlot::Frozen(buffer);
        true
    }

    /// Cancel a running render. Returns false when nothing was rendering.
    pub fn abort(&self) -> bool {
        let mut slot = self.lock();
        if !matches!(*slot, FreezeSlot::Rendering) {
            return false;
        }
        *slot = FreezeSlot::Idle;
        true
    }

    /// Drop the cache. Safe to call in any state; a running render is left
    /// alone.
    pub fn unfreeze(&self) -> bool {
        let previous = {
            let mut slot = self.lock();
            if !matches!(*slot, FreezeSlot::Frozen(_)) {
                return false;
            }
            std::mem::take(&mut *slot)
        };
        drop(previous);
        log::debug!("pattern unfrozen");
        true
    }

    /// Copy cached frames starting at `start_frame` into `dest`.
    ///
    /// Returns false and leaves `dest` untouched unless the pattern is
    /// frozen, in which case the caller must render it live instead.
    pub fn play_frozen_data(&self, dest: &mut [SampleFrame], start_frame: u64) -> bool {
        let slot = self.lock();
        match &*slot {
            FreezeSlot::Frozen(buffer) => {
                buffer.play_into(dest, start_frame as usize);
                true
            }
            _ => false,
        }
    }
}

/// Receiving end of a freeze job's notifications.
pub struct FreezeEvents {
    consumer: rtrb::Consumer<FreezeEvent>,
}

impl FreezeEvents {
    pub fn pop(&mut self) -> Option<FreezeEvent> {
        self.consumer.pop().ok()
    }

    /// Drain everything that is queued right now.
    pub fn drain(&mut self) -> Vec<FreezeEvent> {
        std::iter::from_fn(|| self.pop()).collect()
    }
}

/// One in-progress freeze of a pattern.
pub struct FreezeJob {
    cache: Arc<FrozenPattern>,
    capture: CaptureHandle,
    length: MidiTime,
    length_frames: usize,
    events: rtrb::Producer<FreezeEvent>,
    last_progress: Option<u8>,
    done: bool,
}

impl FreezeJob {
    /// Put `cache` into `Rendering` and route the mixer into a capture sink.
    ///
    /// The caller is responsible for the preconditions (transport stopped,
    /// muted-track confirmation) and for playing the pattern afterwards.
    pub fn start(
        cache: Arc<FrozenPattern>,
        length: MidiTime,
        tempo: &TempoContext,
        mixer: &mut Mixer,
    ) -> Result<(Self, FreezeEvents), FreezeError> {
        cache.unfreeze();
        if !cache.begin_rendering() {
            return Err(FreezeError::FreezeInProgress);
        }

        let (recorder, capture) = SampleRecorder::new(mixer.sample_rate());
        mixer.set_audio_device(Box::new(recorder));

        let (producer, consumer) = rtrb::RingBuffer::new(EVENT_QUEUE_SIZE);
        let mut job = Self {
            cache,
            capture,
            length,
            length_frames: tempo.ticks_to_frames(length) as usize,
            events: producer,
            last_progress: None,
            done: false,
        };
        job.emit(FreezeEvent::Started);
        log::info!("freezing pattern ({length} long, {} frames)", job.length_frames);

        Ok((job, FreezeEvents { consumer }))
    }

    fn emit(&mut self, event: FreezeEvent) {
        if self.events.push(event).is_err() {
            log::debug!("freeze event queue full, dropping {event:?}");
        }
    }

    pub fn length(&self) -> MidiTime {
        self.length
    }

    pub fn cache(&self) -> &Arc<FrozenPattern> {
        &self.cache
    }

    /// Whether playback at `position` (relative to the pattern start) has
    /// reached the end of the pattern.
    pub fn is_complete(&self, position: MidiTime) -> bool {
        position >= self.length
    }

    /// Report progress for the current play position. Only changes are
    /// forwarded to the event queue.
    pub fn poll(&mut self, position: MidiTime) -> u8 {
        let length = self.length.ticks().max(1);
        let percent = (position.ticks().clamp(0, length) * 100 / length) as u8;
        if self.last_progress != Some(percent) {
            self.last_progress = Some(percent);
            self.emit(FreezeEvent::Progress(percent));
        }
        percent
    }

    /// Turn the captured audio into the pattern's cache and give the mixer
    /// its device back.
    pub fn finish(mut self, mixer: &mut Mixer) -> FreezeState {
        mixer.restore_audio_device();

        let buffer = self.capture.create_sample_buffer(Some(self.length_frames));
        let frames = buffer.frames();
        let stored = self.cache.finish(buffer);
        self.done = true;

        if stored {
            self.emit(FreezeEvent::Completed { frames });
            log::info!("pattern frozen ({frames} frames)");
        } else {
            self.emit(FreezeEvent::Aborted);
            log::warn!("freeze result discarded, the render was cancelled");
        }
        self.cache.state()
    }

    /// Cancel the render. Always restores the mixer output device.
    pub fn abort(mut self, mixer: &mut Mixer) {
        mixer.restore_audio_device();
        self.cache.abort();
        self.done = true;
        self.emit(FreezeEvent::Aborted);
        log::info!("freeze aborted");
    }
}

impl Drop for FreezeJob {
    fn drop(&mut self) {
        if !self.done && self.cache.abort() {
            log::warn!("freeze job dropped while rendering, cache reset");
        }
    }
}
