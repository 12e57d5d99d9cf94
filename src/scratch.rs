use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use uuid::Uuid;

/// Random token shared by the scratch files of one download.
pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}

/// Temporary file owned by one in-flight download.
///
/// The file is removed when the guard drops, whatever path the download
/// took, unless it was [`persist`](ScratchFile::persist)ed first.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    armed: bool,
}

impl ScratchFile {
    /// `<dir>/<prefix>_<token>.<ext>`; nothing is created on disk yet.
    pub fn new(dir: &Path, prefix: &str, token: &str, ext: &str) -> Self {
        Self {
            path: dir.join(format!("{prefix}_{token}.{ext}")),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves the file to `target`, replacing whatever is there.
    pub fn persist(mut self, target: &Path) -> io::Result<PathBuf> {
        if target.exists() {
            fs::remove_file(target)?;
        }
        fs::rename(&self.path, target)?;
        self.armed = false;
        Ok(target.to_path_buf())
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed scratch file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove scratch file"),
        }
    }
}
