//! Output sinks.
//!
//! A sink owns its destination for the life of a job. Writing is optional:
//! without a destination, sinks accept output and discard it. Files are
//! closed when the sink is dropped, on every exit path.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use snac_core::{OutputRow, TableWriter};

use crate::JobError;

fn write_error(path: &Path, source: io::Error) -> JobError {
    JobError::OutputWrite {
        path: path.display().to_string(),
        source,
    }
}

/// Destination for the reconciliation table.
pub struct TableSink {
    target: Option<(PathBuf, TableWriter<BufWriter<File>>)>,
}

impl TableSink {
    /// Open the destination, if any, and write the header row.
    pub fn create(path: Option<&Path>) -> Result<Self, JobError> {
        let target = match path {
            Some(path) => {
                let file = File::create(path).map_err(|e| write_error(path, e))?;
                let mut writer = TableWriter::new(BufWriter::new(file));
                writer.write_header().map_err(|e| write_error(path, e))?;
                debug!(path = %path.display(), "output table opened");
                Some((path.to_path_buf(), writer))
            }
            None => None,
        };
        Ok(Self { target })
    }

    pub fn write_rows(&mut self, rows: &[OutputRow]) -> Result<(), JobError> {
        if let Some((path, writer)) = &mut self.target {
            for row in rows {
                writer.write_row(row).map_err(|e| write_error(path, e))?;
            }
        }
        Ok(())
    }

    /// Flush and close the destination.
    pub fn finish(self) -> Result<Option<PathBuf>, JobError> {
        match self.target {
            Some((path, writer)) => {
                let mut inner = writer.into_inner().map_err(|e| write_error(&path, e))?;
                inner.flush().map_err(|e| write_error(&path, e))?;
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }
}

/// Write a single formatted document, if a destination was given.
pub fn write_document(path: Option<&Path>, text: &str) -> Result<Option<PathBuf>, JobError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let mut file = File::create(path).map_err(|e| write_error(path, e))?;
    file.write_all(text.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| write_error(path, e))?;
    debug!(path = %path.display(), bytes = text.len(), "document written");
    Ok(Some(path.to_path_buf()))
}

/// Destination directory for downloaded constellation files.
pub struct DirectorySink {
    dir: Option<PathBuf>,
}

impl DirectorySink {
    /// Create the destination directory (and its parents), if any.
    pub fn create(dir: Option<&Path>) -> Result<Self, JobError> {
        if let Some(dir) = dir {
            fs::create_dir_all(dir).map_err(|e| write_error(dir, e))?;
            debug!(path = %dir.display(), "output directory ready");
        }
        Ok(Self {
            dir: dir.map(Path::to_path_buf),
        })
    }

    /// The destination directory, if one was given.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Write one file into the directory. `name` must be a bare file name.
    pub fn write_file(&self, name: &str, content: &[u8]) -> Result<Option<PathBuf>, JobError> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        let path = dir.join(name);
        fs::write(&path, content).map_err(|e| write_error(&path, e))?;
        debug!(path = %path.display(), bytes = content.len(), "file written");
        Ok(Some(path))
    }
}
