mod load;
mod save;

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

pub use load::load_project;
pub use save::save_project;

/// Position written for clips that are serialized into a transient buffer
/// (clipboard) rather than onto the timeline.
pub const CLIPBOARD_POSITION: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub bpm: u32,
    pub tracks: Vec<TrackData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Instrument,
    Sample,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackData {
    pub name: String,
    pub kind: TrackKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub pan: f32,
    pub clips: Vec<ClipData>,
}

fn default_volume() -> f32 {
    1.0
}

/// Persisted form of anything placed on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ClipData {
    Pattern(PatternData),
    Sample(SampleClipData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternData {
    #[serde(rename = "type")]
    pub pattern_type: u8,
    pub name: String,
    pub pos: i64,
    pub len: i64,
    /// Written for information only, a frozen render is never restored.
    #[serde(default)]
    pub frozen: u8,
    #[serde(default, deserialize_with = "skip_malformed_notes")]
    pub notes: Vec<NoteData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteData {
    pub pos: i64,
    pub len: i64,
    pub key: i32,
    #[serde(default = "default_note_volume")]
    pub vol: u8,
    #[serde(default)]
    pub pan: i8,
}

fn default_note_volume() -> u8 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleClipData {
    pub pos: i64,
    pub len: i64,
    pub src: PathBuf,
}

/// Decode a note list entry by entry so one broken note does not throw away
/// the rest of the pattern.
fn skip_malformed_notes<'de, D>(deserializer: D) -> Result<Vec<NoteData>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(note) => Some(note),
            Err(e) => {
                log::warn!("skipping malformed note entry {index}: {e}");
                None
            }
        })
        .collect())
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),
}
