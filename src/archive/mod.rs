//! Staging of dashboard documents on disk and packing them into a `.tar.gzip` archive.
//!
//! A run writes every dashboard to `<run-root>/<folder>/<title>.json`. The run root
//! is then packed with [compress], persisted next to it with [write_archive] and
//! finally removed with [remove_staging].

mod compress;
mod stage;

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

pub use compress::compress;
pub use stage::stage_dashboard;

/// Top level directory of every entry inside the archive.
pub const ARCHIVE_ROOT: &str = "dashboards";

/// Appended to the run root to name the archive.
pub const ARCHIVE_EXTENSION: &str = ".tar.gzip";

#[derive(Debug, Display, Error)]
/// Errors on staging and archiving dashboards.
pub enum ArchiveError {
    /// A folder below the run root can't be created.
    #[display("Creating folder {} failed: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    /// A dashboard or the archive can't be written.
    #[display("Writing {} failed: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    /// The dashboard file name and its uid fallback are both taken.
    #[display("{} is already staged", _0.display())]
    AlreadyStaged(#[error(ignore)] PathBuf),
    /// Traversing the run root failed.
    #[display("Walking the run root failed: {_0}")]
    Walk(walkdir::Error),
    /// An entry can't be added to the archive.
    #[display("Adding {} to the archive failed: {source}", path.display())]
    Append { path: PathBuf, source: io::Error },
    /// Flushing the tar footer or the gzip trailer failed.
    #[display("Finishing the archive failed: {_0}")]
    Finish(io::Error),
    /// The run root can't be removed.
    #[display("Removing {} failed: {source}", path.display())]
    Remove { path: PathBuf, source: io::Error },
}

/// Returns the part of the longer of `base` and `path` that follows their common prefix.
///
/// This is a plain string operation. Path separators aren't respected, so the result
/// is only meaningful if `path` was produced by walking `base`.
///
/// ```
/// use grafana_backup_lib::archive::relative_suffix;
///
/// assert_eq!(relative_suffix("/backup/1616398799", "/backup/1616398799/General"), "/General");
/// assert_eq!(relative_suffix("/backup/1616398799", "/backup/1616398799"), "");
/// ```
pub fn relative_suffix<'a>(base: &'a str, path: &'a str) -> &'a str {
    let (short, long) = if path.len() < base.len() {
        (path, base)
    } else {
        (base, path)
    };

    let cut = short
        .char_indices()
        .zip(long.chars())
        .find(|((_, a), b)| a != b)
        .map_or(short.len(), |((i, _), _)| i);

    &long[cut..]
}

/// Path of the archive belonging to the run root `root`.
pub fn archive_path(root: &Path) -> PathBuf {
    let mut name = OsString::from(root.as_os_str());
    name.push(ARCHIVE_EXTENSION);
    PathBuf::from(name)
}

/// Persists the archive `bytes` of the run root `root` at [archive_path].
///
/// The file is only accessible by the current user.
pub fn write_archive(root: &Path, bytes: &[u8]) -> Result<PathBuf, ArchiveError> {
    let path = archive_path(root);
    let write_error = |source| ArchiveError::Write {
        path: path.clone(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&path).map_err(write_error)?;
    file.write_all(bytes).map_err(write_error)?;
    file.sync_all().map_err(write_error)?;
    log::debug!(target: "archive", "Wrote {} bytes to {}", bytes.len(), path.display());

    Ok(path)
}

/// Deletes the run root and everything staged below it.
pub fn remove_staging(root: &Path) -> Result<(), ArchiveError> {
    fs::remove_dir_all(root).map_err(|source| ArchiveError::Remove {
        path: root.to_path_buf(),
        source,
    })
}
