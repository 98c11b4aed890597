use crate::{Project, ProjectError};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub fn save_project(path: &Path, project: &Project) -> Result<(), ProjectError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, project)?;

    log::info!(
        "saved project '{}' ({} tracks) to {}",
        project.name,
        project.tracks.len(),
        path.display()
    );
    Ok(())
}
