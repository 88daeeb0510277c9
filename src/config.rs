//! Operator supplied settings.
//!
//! The config file is read once at startup. All fields are optional in the file;
//! the local staging directory is resolved against the home directory here so the
//! rest of the crate only ever sees a complete [Config].

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

/// Directory below the home directory used when `localDir` isn't configured.
pub const DEFAULT_LOCAL_DIR: &str = "grafana-backup";

/// Settings of one backup run.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the Grafana instance.
    pub url: String,
    /// Grafana API key or service account token.
    pub api_key: String,
    /// Remote object storage to upload the archive to.
    pub storage: StorageConfig,
    /// Directory the run root and the archive are created in.
    pub local_dir: PathBuf,
}

/// S3 settings. Uploads are skipped unless every field is set.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
    /// Key prefix of the uploaded archive.
    pub prefix: String,
}

impl StorageConfig {
    /// Returns `true` if no required field is blank.
    pub fn is_complete(&self) -> bool {
        [
            &self.access_key_id,
            &self.secret_access_key,
            &self.bucket,
            &self.region,
            &self.prefix,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

pub(crate) fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("storage", &self.storage)
            .field("local_dir", &self.local_dir)
            .finish()
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Layout of the config file on disk.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_keys: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Defaults to `$HOME/grafana-backup`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_dir: Option<String>,
}

/// Serialization format of a config file, chosen by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }
}

#[derive(Debug, Display, Error)]
/// Errors on loading the [Config].
pub enum ConfigError {
    /// The config file doesn't exist.
    #[display("Config file {} doesn't exist", _0.display())]
    NotFound(#[error(ignore)] PathBuf),
    /// Reading the config file failed.
    #[display("Reading the config file failed: {_0}")]
    Read(io::Error),
    /// The YAML config file is malformed.
    #[display("Parsing the YAML config file failed: {_0}")]
    Yaml(serde_yaml::Error),
    /// The TOML config file is malformed.
    #[display("Parsing the TOML config file failed: {_0}")]
    Toml(toml::de::Error),
    /// No `localDir` configured and the home directory is unknown.
    #[display("Unable to determine the home directory, set localDir in the config")]
    NoHomeDir,
    /// Rendering the config template failed.
    #[display("Rendering the config template failed: {_0}")]
    Template(#[error(ignore)] String),
    /// Writing the config template failed.
    #[display("Writing the config template failed: {_0}")]
    WriteTemplate(io::Error),
}

impl ConfigFile {
    /// Parses a config file in the given format.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Yaml => {
                // an empty YAML document is a valid, empty config
                if content.trim().is_empty() {
                    return Ok(Self::default());
                }
                serde_yaml::from_str(content).map_err(ConfigError::Yaml)
            }
            ConfigFormat::Toml => toml::from_str(content).map_err(ConfigError::Toml),
        }
    }

    /// Placeholder config written for operators that don't have one yet.
    pub fn template() -> Self {
        Self {
            url: Some("GRAFANA_REQUEST_URL".into()),
            api_keys: Some("GRAFANA_APIKEYS".into()),
            access_key_id: Some("S3_ACCESS_KEY".into()),
            secret_access_key: Some("S3_ACCESS_SECRET".into()),
            bucket: Some("S3_BUCKET".into()),
            region: Some("S3_REGION".into()),
            prefix: Some("S3_UPLOAD_FILE_PATH_PREFIX".into()),
            local_dir: None,
        }
    }

    /// Renders the config in the given format.
    pub fn render(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        match format {
            ConfigFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|e| ConfigError::Template(e.to_string())),
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Template(e.to_string()))
            }
        }
    }

    /// Resolves the file contents into a [Config] using the home directory of the
    /// current user as base of the default `localDir`.
    pub fn resolve(self) -> Result<Config, ConfigError> {
        self.resolve_with_home(dirs::home_dir())
    }

    /// Resolves the file contents into a [Config] with an explicit home directory.
    pub fn resolve_with_home(self, home: Option<PathBuf>) -> Result<Config, ConfigError> {
        let local_dir = match self.local_dir.filter(|dir| !dir.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => home.ok_or(ConfigError::NoHomeDir)?.join(DEFAULT_LOCAL_DIR),
        };

        let storage = StorageConfig {
            access_key_id: self.access_key_id.unwrap_or_default(),
            secret_access_key: self.secret_access_key.unwrap_or_default(),
            bucket: self.bucket.unwrap_or_default(),
            region: self.region.unwrap_or_default(),
            prefix: self.prefix.unwrap_or_default(),
        };

        Ok(Config {
            url: self.url.unwrap_or_default(),
            api_key: self.api_keys.unwrap_or_default(),
            storage,
            local_dir,
        })
    }
}

impl Config {
    /// Loads and resolves the config file at `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(ConfigError::Read(e)),
        };
        log::debug!(target: "config", "Loaded config file {}", path.display());

        let file = ConfigFile::parse(&content, ConfigFormat::from_path(path))?;
        let config = file.resolve()?;
        log::trace!(target: "config", "Resolved {config:?}");

        Ok(config)
    }
}

// YAML and TOML share the comment syntax
const TEMPLATE_HEADER: &str = "# grafana-backup config, fill in the values below.\n\
# S3 upload is skipped unless accessKeyId, secretAccessKey, bucket, region and prefix are all set.\n\
# localDir defaults to $HOME/grafana-backup\n";

/// Writes the [ConfigFile::template] to `path` in the format matching its extension.
///
/// Existing files are never overwritten.
pub fn write_template(path: &Path) -> Result<(), ConfigError> {
    let format = ConfigFormat::from_path(path);
    let rendered = ConfigFile::template().render(format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(ConfigError::WriteTemplate)?;
    }
    let mut file = fs::File::create_new(path).map_err(ConfigError::WriteTemplate)?;
    io::Write::write_all(&mut file, format!("{TEMPLATE_HEADER}{rendered}").as_bytes())
        .map_err(ConfigError::WriteTemplate)?;

    Ok(())
}
