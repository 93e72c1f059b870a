//! Scoped temporary files.
//!
//! A [`TempResource`] owns a uniquely named file and deletes it when dropped,
//! so every exit path (success, error, panic unwind) cleans up. `release()`
//! deletes eagerly and reports the outcome.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};

/// A uniquely named local file deleted on drop
#[derive(Debug)]
pub struct TempResource {
    path: TempPath,
}

impl TempResource {
    /// Create an empty file in `dir` (or the system temp dir) and open it for writing
    pub fn create(dir: Option<&Path>, prefix: &str, suffix: &str) -> io::Result<(Self, File)> {
        let mut builder = Builder::new();
        builder.prefix(prefix).suffix(suffix);
        let named = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let (file, path) = named.into_parts();
        Ok((Self { path }, file))
    }

    /// Reserve a unique path for a file another process will write
    ///
    /// The placeholder file is created empty so the name cannot be reused.
    pub fn reserve(dir: Option<&Path>, prefix: &str, suffix: &str) -> io::Result<Self> {
        let (resource, file) = Self::create(dir, prefix, suffix)?;
        drop(file);
        Ok(resource)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.path.to_path_buf()
    }

    /// Delete the file now
    ///
    /// A file already removed by someone else is not an error.
    pub fn release(self) -> io::Result<()> {
        match self.path.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl AsRef<Path> for TempResource {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}
