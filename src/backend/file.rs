//! Filesystem session backend
//!
//! One `sess_<id>` file per session under a base directory. Writes go to a
//! temporary file in the same directory and are renamed into place, so a
//! concurrent reader never observes a torn payload. Reads take a shared
//! advisory lock to avoid racing a rename in flight. This gives write
//! atomicity, not mutual exclusion between writers (last write wins).

use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;

use super::{BackendError, SessionBackend};

const FILE_PREFIX: &str = "sess_";

/// Filesystem session backend
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the session files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", FILE_PREFIX, id))
    }
}

impl SessionBackend for FileBackend {
    fn read(&mut self, id: &str) -> Result<String, BackendError> {
        let mut file = match File::open(self.session_path(id)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(e.into()),
        };

        file.lock_shared()?;
        let mut payload = String::new();
        file.read_to_string(&mut payload)?;
        Ok(payload)
    }

    fn write(&mut self, id: &str, payload: &str) -> Result<(), BackendError> {
        let tmp = self.dir.join(format!(
            ".{}{}.{:08x}.tmp",
            FILE_PREFIX,
            id,
            rand::rng().random::<u32>()
        ));
        fs::write(&tmp, payload)?;

        if let Err(e) = fs::rename(&tmp, self.session_path(id)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn destroy(&mut self, id: &str) -> Result<(), BackendError> {
        match fs::remove_file(self.session_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn gc(&mut self, max_lifetime: Duration) -> Result<u64, BackendError> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(FILE_PREFIX) {
                continue;
            }

            let modified = entry.metadata()?.modified()?;
            let age = match modified.elapsed() {
                Ok(age) => age,
                Err(_) => continue, // mtime in the future
            };

            if age > max_lifetime && fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }

        tracing::debug!(removed, "file backend gc finished");
        Ok(removed)
    }
}
