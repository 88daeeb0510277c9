//! Publishing of finished archives to remote storage.
//!
//! Currently the following publishers are implemented:
//!
//! - [S3Publisher]: Upload of the archive into an S3 bucket.

pub mod s3;

use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

pub use s3::S3Publisher;

/// Result of a successful [Publish::publish].
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum PublishOutcome {
    /// Publishing isn't configured, nothing was sent.
    #[display("skipped")]
    Skipped,
    /// The archive was stored at `location`.
    #[display("uploaded to {location}")]
    Uploaded { location: String },
}

#[derive(Debug, Display, Error)]
/// Errors on publishing an archive.
pub enum PublishError {
    /// The archive path has no usable file name.
    #[display("Archive path {} has no file name", _0.display())]
    InvalidArchivePath(#[error(ignore)] PathBuf),
    /// The runtime driving the upload can't be started.
    #[display("Starting the upload runtime failed: {_0}")]
    Runtime(io::Error),
    /// The archive can't be opened for reading.
    #[display("Opening {} failed: {source}", path.display())]
    Open {
        path: PathBuf,
        source: aws_sdk_s3::primitives::ByteStreamError,
    },
    /// The storage rejected the upload or wasn't reachable.
    #[display("Uploading the archive failed: {_0}")]
    Put(aws_sdk_s3::Error),
}

/// Generic publisher of archives.
pub trait Publish {
    /// Publishes the archive at `archive`.
    ///
    /// Publishers that aren't configured return [PublishOutcome::Skipped] without
    /// contacting anything.
    fn publish(&self, archive: &Path) -> Result<PublishOutcome, PublishError>;
}
