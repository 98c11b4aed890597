use crate::{Project, ProjectError};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn load_project_data(path: &Path) -> Result<Project, ProjectError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    // Try JSON first, fall back to MessagePack
    serde_json::from_reader(reader).or_else(|_| {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        rmp_serde::decode::from_read(reader).map_err(ProjectError::from)
    })
}

pub fn load_project(path: &Path) -> Result<Project, ProjectError> {
    let project = load_project_data(path)?;
    log::info!(
        "loaded project '{}' ({} tracks) from {}",
        project.name,
        project.tracks.len(),
        path.display()
    );
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClipData, NoteData, PatternData, SampleClipData, TrackData, TrackKind};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn project() -> Project {
        Project {
            name: "Loaded".to_string(),
            bpm: 90,
            tracks: vec![
                TrackData {
                    name: "Keys".to_string(),
                    kind: TrackKind::Instrument,
                    instrument: Some("sine".to_string()),
                    muted: false,
                    volume: 1.0,
                    pan: 0.0,
                    clips: vec![ClipData::Pattern(PatternData {
                        pattern_type: 1,
                        name: "Chords".to_string(),
                        pos: 0,
                        len: 64,
                        frozen: 1,
                        notes: vec![NoteData {
                            pos: 0,
                            len: 32,
                            key: 60,
                            vol: 100,
                            pan: 0,
                        }],
                    })],
                },
                TrackData {
                    name: "Loops".to_string(),
                    kind: TrackKind::Sample,
                    instrument: None,
                    muted: false,
                    volume: 1.0,
                    pan: 0.0,
                    clips: vec![
                        ClipData::Sample(SampleClipData {
                            pos: 0,
                            len: 64,
                            src: PathBuf::from("a.wav"),
                        }),
                        ClipData::Sample(SampleClipData {
                            pos: 64,
                            len: 64,
                            src: PathBuf::from("b.wav"),
                        }),
                    ],
                },
            ],
        }
    }

    #[test]
    fn test_load_project_file_not_found() {
        let result = load_project(Path::new("/nonexistent/project.stepline"));
        assert!(matches!(result.unwrap_err(), ProjectError::Io(_)));
    }

    #[test]
    fn test_load_project_invalid_format() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("invalid.stepline");
        std::fs::write(&path, b"not valid json or msgpack").expect("write");

        let result = load_project(&path);
        assert!(matches!(result.unwrap_err(), ProjectError::Deserialize(_)));
    }

    #[test]
    fn test_load_json_project() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("song.stepline");
        crate::save_project(&path, &project()).expect("save");

        let loaded = load_project(&path).expect("load");
        assert_eq!(loaded.name, "Loaded");
        assert_eq!(loaded.bpm, 90);
        assert_eq!(loaded.tracks[0].clips, project().tracks[0].clips);
    }

    #[test]
    fn test_load_msgpack_project() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("song.msgpack");
        let bytes = rmp_serde::encode::to_vec_named(&project()).expect("encode");
        std::fs::write(&path, bytes).expect("write");

        let loaded = load_project(&path).expect("load");
        assert_eq!(loaded.tracks.len(), 2);
        assert_eq!(loaded.tracks[1].clips, project().tracks[1].clips);
    }
}
