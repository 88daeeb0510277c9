use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

const CONFIG_HELP: &str = "\
YAML config file (TOML if the extension is .toml) in the following format.
A template is written to the path if the file doesn't exist yet.
--------
url: \"GRAFANA_REQUEST_URL\"
apiKeys: \"GRAFANA_APIKEYS\"
accessKeyId: \"S3_ACCESS_KEY\"
secretAccessKey: \"S3_ACCESS_SECRET\"
bucket: \"S3_BUCKET\"
region: \"S3_REGION\"
prefix: \"S3_UPLOAD_FILE_PATH_PREFIX\"
localDir: \"LOCAL_PATH_TO_SAVE_COMPRESS_FILE\" # default $HOME/grafana-backup/
--------";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbosity of the command output.
    #[arg(long)]
    pub verbose: Option<LevelFilter>,

    /// Path to the config file.
    #[arg(long, short = 'f', env = "GRAFANA_BACKUP_CONFIG", long_help = CONFIG_HELP)]
    pub file: PathBuf,
}
