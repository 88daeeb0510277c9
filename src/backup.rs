//! One backup run: fetch, stage, compress, persist, clean up and publish.
//!
//! Only the search, the archive creation and its persistence are fatal and end the
//! run with a [BackupError]. Everything else is logged and counted in the [RunReport].

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use derive_more::{Display, Error, From};

use crate::archive::{self, ArchiveError};
use crate::config::Config;
use crate::grafana::{DashboardSource, DashboardSummary, Grafana, GrafanaError};
use crate::publish::{Publish, PublishError, PublishOutcome, S3Publisher};

#[derive(Debug, Display, Error)]
/// Errors that abort a backup run.
pub enum BackupError {
    /// The run root can't be created.
    #[display("Creating the run root {} failed: {source}", path.display())]
    RunRoot { path: PathBuf, source: io::Error },
    /// Without a search result there is nothing to back up.
    #[display("Fetching the Grafana search API failed: {_0}")]
    Search(GrafanaError),
    /// Packing the run root failed.
    #[display("Compressing the dashboards failed: {_0}")]
    Compress(ArchiveError),
    /// The archive can't be persisted.
    #[display("Saving the archive failed: {_0}")]
    WriteArchive(ArchiveError),
}

#[derive(Debug, Display, Error, From)]
/// Errors on backing up a single dashboard. These are counted, not fatal.
enum DashboardError {
    #[display("fetching failed: {_0}")]
    Fetch(GrafanaError),
    #[display("staging failed: {_0}")]
    Stage(ArchiveError),
}

/// Summary of a finished run.
#[derive(Debug)]
pub struct RunReport {
    /// Location of the written archive.
    pub archive: PathBuf,
    /// Number of dashboards attempted.
    pub total: usize,
    /// Number of dashboards missing from the archive.
    pub failed: usize,
    /// Outcome of publishing the archive.
    pub published: Result<PublishOutcome, PublishError>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Saved Grafana dashboards to {}, total {}, failed {}",
            self.archive.display(),
            self.total,
            self.failed
        )?;
        match &self.published {
            Ok(outcome) => write!(f, ", upload {outcome}"),
            Err(_) => write!(f, ", upload failed"),
        }
    }
}

/// Backup of all dashboards of a [DashboardSource] into `local_dir`.
pub struct Backup<S, P> {
    source: S,
    publisher: P,
    local_dir: PathBuf,
}

impl Backup<Grafana, S3Publisher> {
    /// Backup of the Grafana instance described by `config`.
    pub fn with_config(config: &Config) -> Result<Self, GrafanaError> {
        let grafana = Grafana::new(&config.url, &config.api_key)?;
        let publisher = S3Publisher::new(config.storage.clone());

        Ok(Self::new(grafana, publisher, config.local_dir.clone()))
    }
}

impl<S, P> Backup<S, P> {
    pub fn new(source: S, publisher: P, local_dir: PathBuf) -> Self {
        Self {
            source,
            publisher,
            local_dir,
        }
    }
}

impl<S: DashboardSource, P: Publish> Backup<S, P> {
    /// Runs a backup with a run root named by the current unix timestamp.
    pub fn run(&self) -> Result<RunReport, BackupError> {
        let root = self.local_dir.join(Utc::now().timestamp().to_string());
        self.run_in(&root)
    }

    /// Runs a backup staging the dashboards in `root`.
    ///
    /// The archive is written to `<root>.tar.gzip` and `root` is removed afterwards.
    pub fn run_in(&self, root: &Path) -> Result<RunReport, BackupError> {
        log::info!(target: "backup", "Create backup of Grafana dashboards in {}", root.display());
        let hits = self.source.fetch_search().map_err(BackupError::Search)?;

        // created even without dashboards so the archive always exists
        fs::create_dir_all(root).map_err(|source| BackupError::RunRoot {
            path: root.to_path_buf(),
            source,
        })?;

        let mut total = 0;
        let mut failed = 0;
        for summary in hits.iter().filter(|hit| hit.is_dashboard()) {
            total += 1;
            if let Err(e) = self.stage(root, summary) {
                failed += 1;
                log::error!(target: "backup", "Dashboard '{}' ({}) {e}", summary.title, summary.uid);
            }
        }
        log::debug!(target: "backup", "Staged {} of {total} dashboards", total - failed);

        let bytes = archive::compress(root).map_err(BackupError::Compress)?;
        let archive = archive::write_archive(root, &bytes).map_err(BackupError::WriteArchive)?;

        if let Err(e) = archive::remove_staging(root) {
            log::warn!(target: "backup", "{e}");
        }

        let published = self.publisher.publish(&archive);
        if let Err(e) = &published {
            log::error!(target: "backup", "Publishing {} failed: {e}", archive.display());
        }

        Ok(RunReport {
            archive,
            total,
            failed,
            published,
        })
    }

    fn stage(&self, root: &Path, summary: &DashboardSummary) -> Result<PathBuf, DashboardError> {
        let content = self.source.fetch_dashboard(summary)?;
        let path = archive::stage_dashboard(
            root,
            summary.folder(),
            &summary.title,
            &summary.uid,
            &content,
        )?;
        Ok(path)
    }
}
