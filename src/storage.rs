//! Filesystem access for a single user hash file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A hash file on disk.
///
/// `HashFile` only moves bytes around. It knows nothing about the record
/// format or which suffix means what.
#[derive(Debug, Clone)]
pub struct HashFile {
    path: PathBuf,
}

impl HashFile {
    /// Creates a new HashFile for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns the path to the hash file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if existence cannot be determined, e.g. because the
    /// base directory is not accessible.
    pub fn exists(&self) -> Result<bool> {
        Ok(self.path.try_exists()?)
    }

    /// Loads the entire file into memory.
    pub fn load(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }

    /// Creates the file and writes `line` followed by a newline.
    ///
    /// Creation is exclusive: if the file already exists (for example
    /// because a concurrent writer won the race) nothing is written and an
    /// [`ErrorKind::AlreadyExists`] IO error is returned. If writing fails
    /// after creation the file is removed again.
    pub fn create_new(&self, line: &str) -> Result<()> {
        let mut file = open_options().create_new(true).open(&self.path)?;

        if let Err(e) = write_line(&mut file, line) {
            drop(file);
            let _ = fs::remove_file(&self.path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Truncates the existing file and writes `line` followed by a newline.
    ///
    /// The file must already exist.
    pub fn overwrite(&self, line: &str) -> Result<()> {
        let mut file = open_options().truncate(true).open(&self.path)?;
        write_line(&mut file, line)?;
        Ok(())
    }

    /// Renames the file to `to`.
    ///
    /// On Unix, `rename()` is atomic when both paths are on the same filesystem.
    pub fn rename(&self, to: &HashFile) -> Result<()> {
        fs::rename(&self.path, &to.path)?;
        Ok(())
    }

    /// Deletes the file. A missing file is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

fn write_line(file: &mut File, line: &str) -> io::Result<()> {
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()
}

#[cfg(unix)]
fn open_options() -> OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;

    let mut opts = OpenOptions::new();
    opts.write(true).mode(0o600);
    opts
}

#[cfg(not(unix))]
fn open_options() -> OpenOptions {
    let mut opts = OpenOptions::new();
    opts.write(true);
    opts
}
