use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::ArchiveError;
use crate::grafana::GENERAL_FOLDER;

/// Makes `name` usable as a single path component.
fn path_component(name: &str) -> String {
    let name = name.replace(['/', '\\'], "_");
    if name == "." || name == ".." {
        name.replace('.', "_")
    } else {
        name
    }
}

/// Creates `file` with `content`, returning `None` if it already exists.
fn write_new(file: &Path, content: &[u8]) -> Result<Option<PathBuf>, ArchiveError> {
    let write_error = |source| ArchiveError::Write {
        path: file.to_path_buf(),
        source,
    };

    let mut handle = match File::create_new(file) {
        Ok(handle) => handle,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => return Err(write_error(e)),
    };
    handle.write_all(content).map_err(write_error)?;

    Ok(Some(file.to_path_buf()))
}

/// Writes the dashboard `content` to `root/<folder_title>/<title>.json`.
///
/// Dashboards without a folder are staged in [GENERAL_FOLDER]. The folder is created
/// on demand; an existing folder is written into. Staged files are never replaced:
/// if the name is taken (same title, or titles equal after replacing separators) the
/// dashboard is written to `<title>-<uid>.json` instead. Returns the path of the written file.
pub fn stage_dashboard(
    root: &Path,
    folder_title: &str,
    title: &str,
    uid: &str,
    content: &[u8],
) -> Result<PathBuf, ArchiveError> {
    let folder_title = if folder_title.is_empty() {
        GENERAL_FOLDER
    } else {
        folder_title
    };
    let folder = root.join(path_component(folder_title));

    fs::create_dir_all(&folder).map_err(|source| ArchiveError::CreateDir {
        path: folder.clone(),
        source,
    })?;

    let title = path_component(title);
    let file = folder.join(format!("{title}.json"));
    if let Some(file) = write_new(&file, content)? {
        log::debug!(target: "archive", "Staged {}", file.display());
        return Ok(file);
    }

    let fallback = folder.join(format!("{title}-{}.json", path_component(uid)));
    log::warn!(target: "archive", "{} is already staged, using {}", file.display(), fallback.display());
    match write_new(&fallback, content)? {
        Some(file) => {
            log::debug!(target: "archive", "Staged {}", file.display());
            Ok(file)
        }
        None => Err(ArchiveError::AlreadyStaged(fallback)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_folder_is_general() {
        let dir = tempdir().unwrap();

        let file = stage_dashboard(dir.path(), "", "Node Exporter", "n1", b"{}").unwrap();
        assert_eq!(file, dir.path().join("General").join("Node Exporter.json"));
        assert_eq!(fs::read(file).unwrap(), b"{}");
    }

    #[test]
    fn existing_folder_is_merged() {
        let dir = tempdir().unwrap();

        stage_dashboard(dir.path(), "Infra", "CPU", "c1", b"{\"a\":1}").unwrap();
        stage_dashboard(dir.path(), "Infra", "Memory", "m1", b"{\"b\":2}").unwrap();

        let infra = dir.path().join("Infra");
        assert_eq!(fs::read(infra.join("CPU.json")).unwrap(), b"{\"a\":1}");
        assert_eq!(fs::read(infra.join("Memory.json")).unwrap(), b"{\"b\":2}");
    }

    #[test]
    fn separators_stay_inside_the_folder() {
        let dir = tempdir().unwrap();

        let file = stage_dashboard(dir.path(), "..", "In/Out", "io", b"{}").unwrap();
        assert_eq!(file, dir.path().join("__").join("In_Out.json"));
    }

    #[test]
    fn unwritable_root_fails() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("file");
        fs::write(&root, "not a directory").unwrap();

        let result = stage_dashboard(&root, "Infra", "CPU", "c1", b"{}");
        assert!(matches!(result, Err(ArchiveError::CreateDir { .. })));
    }

    #[test]
    fn taken_name_falls_back_to_uid() {
        let dir = tempdir().unwrap();

        let first = stage_dashboard(dir.path(), "Infra", "CPU/Mem", "a", b"{\"a\":1}").unwrap();
        let second = stage_dashboard(dir.path(), "Infra", "CPU_Mem", "b", b"{\"b\":2}").unwrap();

        let infra = dir.path().join("Infra");
        assert_eq!(first, infra.join("CPU_Mem.json"));
        assert_eq!(second, infra.join("CPU_Mem-b.json"));
        assert_eq!(fs::read(first).unwrap(), b"{\"a\":1}");
        assert_eq!(fs::read(second).unwrap(), b"{\"b\":2}");
    }

    #[test]
    fn taken_fallback_name_is_an_error() {
        let dir = tempdir().unwrap();

        stage_dashboard(dir.path(), "Infra", "CPU", "a", b"{}").unwrap();
        stage_dashboard(dir.path(), "Infra", "CPU", "a", b"{}").unwrap();
        let result = stage_dashboard(dir.path(), "Infra", "CPU", "a", b"{\"new\":1}");

        assert!(matches!(result, Err(ArchiveError::AlreadyStaged(_))));
        assert_eq!(fs::read(dir.path().join("Infra/CPU.json")).unwrap(), b"{}");
    }
}
