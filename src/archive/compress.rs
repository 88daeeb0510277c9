use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use walkdir::WalkDir;

use super::{relative_suffix, ArchiveError, ARCHIVE_ROOT};

/// Packs the tree below `root` into an in-memory gzip compressed tarball.
///
/// Entries are named [ARCHIVE_ROOT] followed by their path relative to `root`, so
/// `root` itself becomes `dashboards` and `root/General/CPU.json` becomes
/// `dashboards/General/CPU.json`. Entries are added in file name order.
pub fn compress(root: &Path) -> Result<Vec<u8>, ArchiveError> {
    log::info!(target: "archive", "Compress {}", root.display());

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut tar = tar::Builder::new(encoder);
    let base = root.to_string_lossy();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(ArchiveError::Walk)?;
        let path = entry.path();
        let name = format!(
            "{ARCHIVE_ROOT}{}",
            relative_suffix(&base, &path.to_string_lossy())
        );
        log::trace!(target: "archive", "Add {} as {name}", path.display());

        let appended = if entry.file_type().is_dir() {
            tar.append_dir(&name, path)
        } else {
            tar.append_path_with_name(path, &name)
        };
        appended.map_err(|source| ArchiveError::Append {
            path: path.to_path_buf(),
            source,
        })?;
    }

    // tar footer first, then the gzip trailer
    let encoder = tar.into_inner().map_err(ArchiveError::Finish)?;
    encoder.finish().map_err(ArchiveError::Finish)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use std::io::Read;

    use flate2::read::GzDecoder;
    use tempfile::tempdir;

    fn unpack(bytes: &[u8]) -> BTreeMap<String, Option<Vec<u8>>> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = entry
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .trim_end_matches('/')
                    .to_string();
                let content = if entry.header().entry_type().is_dir() {
                    None
                } else {
                    let mut content = Vec::new();
                    entry.read_to_end(&mut content).unwrap();
                    Some(content)
                };
                (name, content)
            })
            .collect()
    }

    #[test]
    fn entries_are_named_below_dashboards() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("1700000000");
        fs::create_dir_all(root.join("General")).unwrap();
        fs::create_dir_all(root.join("Infra")).unwrap();
        fs::write(root.join("General/Home.json"), b"{\"home\":true}").unwrap();
        fs::write(root.join("Infra/CPU.json"), b"{\"cpu\":1}").unwrap();

        let entries = unpack(&compress(&root).unwrap());

        let names: Vec<_> = entries.keys().cloned().collect();
        assert_eq!(
            names,
            vec![
                "dashboards",
                "dashboards/General",
                "dashboards/General/Home.json",
                "dashboards/Infra",
                "dashboards/Infra/CPU.json",
            ]
        );
        assert_eq!(entries["dashboards"], None);
        assert_eq!(
            entries["dashboards/General/Home.json"].as_deref(),
            Some(&b"{\"home\":true}"[..])
        );
        assert_eq!(
            entries["dashboards/Infra/CPU.json"].as_deref(),
            Some(&b"{\"cpu\":1}"[..])
        );
    }

    #[test]
    fn empty_root_has_only_the_top_level_entry() {
        let dir = tempdir().unwrap();

        let entries = unpack(&compress(dir.path()).unwrap());
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["dashboards"]);
    }

    #[test]
    fn missing_root_fails() {
        let dir = tempdir().unwrap();

        let result = compress(&dir.path().join("missing"));
        assert!(matches!(result, Err(ArchiveError::Walk(_))));
    }
}
