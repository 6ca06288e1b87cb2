use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("cannot use {dir:?} as output directory: {message}")]
    Directory { dir: PathBuf, message: String },
    #[error("failed writing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Stages `content` next to `path` and renames it into place. Readers of
/// `path` see the previous file or the complete new one; a failed write
/// leaves no stray file behind.
pub fn write_atomically(path: &Path, content: &[u8]) -> Result<PathBuf, WriteError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    prepare_dir(dir)?;

    let io_error = |source: io::Error| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut staged = Builder::new()
        .prefix(".staged-")
        .tempfile_in(dir)
        .map_err(io_error)?;
    staged.write_all(content).map_err(io_error)?;
    staged.as_file().sync_all().map_err(io_error)?;
    staged.persist(path).map_err(|err| io_error(err.error))?;
    Ok(path.to_path_buf())
}

fn prepare_dir(dir: &Path) -> Result<(), WriteError> {
    let fail = |message: String| WriteError::Directory {
        dir: dir.to_path_buf(),
        message,
    };
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(fail("not a directory".into())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|err| fail(err.to_string()))
        }
        Err(err) => Err(fail(err.to_string())),
    }
}
