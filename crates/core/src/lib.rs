pub mod clip;
pub mod config;
pub mod freeze;
pub mod instrument;
pub mod mixer;
pub mod modified;
pub mod note;
pub mod pattern;
pub mod sample_clip;
pub mod session;
pub mod time;
pub mod track;

pub use clip::{Clip, SaveTarget, TrackContentObject};
pub use config::Config;
pub use freeze::{FreezeError, FreezeEvent, FreezeEvents, FreezeJob, FreezeState, FrozenPattern};
pub use instrument::{Instrument, SineInstrument, instrument_by_name};
pub use mixer::Mixer;
pub use modified::ModifiedFlag;
pub use note::{Note, NoteId};
pub use pattern::{Pattern, PatternType};
pub use sample_clip::SampleClip;
pub use session::{PlaybackState, Song, SongError};
pub use time::{MusicalPosition, TempoContext};
pub use track::{Track, TrackKind};

pub use stepline_decode::SampleBuffer;
pub use stepline_project::{ClipData, Project, ProjectError, TrackData, save_project};
pub use stepline_render::write_wav;
pub use stepline_transport::{AudioArc, AudioDevice, MidiTime, SampleFrame, TICKS_PER_TACT};
