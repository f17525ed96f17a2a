use crate::errors::CreateError;
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

/// A file recording the ID of a newly created container
///
/// Creating the guard creates the file exclusively: if anything already
/// exists at the path, creation fails and the existing file is left alone.
/// That stops two concurrent creations from sharing one ID file.
///
/// The ID is written at most once. When the guard goes away the handle is
/// closed, and if no ID was ever written the empty file is removed, so a
/// failed creation leaves nothing behind.
#[derive(Debug)]
pub struct CidFile {
    path: PathBuf,
    file: Option<File>,
    written: bool,
}

impl CidFile {
    pub fn create(path: &Path) -> Result<Self, CreateError> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => {
                log::debug!("created container ID file {:?}", path);
                Ok(CidFile {
                    path: path.to_path_buf(),
                    file: Some(file),
                    written: false,
                })
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(CreateError::CidFileExists(path.to_path_buf()))
            }
            Err(source) => Err(CreateError::CidFileCreate {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Record the container ID
    pub fn write(&mut self, id: &str) -> Result<(), CreateError> {
        let file = match (&mut self.file, self.written) {
            (Some(file), false) => file,
            _ => {
                return Err(CreateError::CidFileWrite(io::Error::new(
                    io::ErrorKind::Other,
                    "container ID was already written",
                )))
            }
        };
        file.write_all(id.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(CreateError::CidFileWrite)?;
        self.written = true;
        Ok(())
    }
}

impl Drop for CidFile {
    fn drop(&mut self) {
        drop(self.file.take());
        if !self.written {
            if let Err(err) = fs::remove_file(&self.path) {
                log::warn!("failed to remove the container ID file {:?}: {}", self.path, err);
            }
        }
    }
}
