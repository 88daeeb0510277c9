//! Library to backup the dashboards of a [Grafana][grafana] instance.
//!
//! Dashboards are listed with the search API, downloaded one by one, grouped by
//! folder into a `.tar.gzip` archive and optionally uploaded to S3. The run itself
//! is driven by [`backup::Backup`].
//!
//! [grafana]: https://grafana.com/

#![forbid(unsafe_code)]

pub mod archive;
pub mod backup;
pub mod cli;
pub mod config;
pub mod grafana;
pub mod publish;
