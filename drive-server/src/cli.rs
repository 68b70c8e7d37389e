use clap::Parser;
use core_runtime::config::AppConfig;
use core_runtime::logging::{LogFormat, LogLevel, LoggingConfig};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "drive-server", version, about = "Browse and manage Google Drive files")]
pub struct Args {
    /// OAuth client file downloaded from the Google Cloud console
    #[arg(long, env = "DRIVE_CREDENTIALS", default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Address to listen on
    #[arg(long, env = "DRIVE_BIND")]
    pub bind: Option<SocketAddr>,

    /// Directory for staging uploads
    #[arg(long, env = "DRIVE_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Persist sessions under this directory instead of in memory
    #[arg(long, env = "DRIVE_SESSION_DIR")]
    pub session_dir: Option<PathBuf>,

    /// Upload and download ceiling in bytes
    #[arg(long, env = "DRIVE_MAX_CONTENT_LENGTH")]
    pub max_content_length: Option<u64>,

    /// pretty, json or compact
    #[arg(long, env = "DRIVE_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[arg(long, env = "DRIVE_LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Filter directives replacing the level, e.g. `core_drive=debug,info`
    #[arg(long, env = "DRIVE_LOG_FILTER")]
    pub log_filter: Option<String>,
}

impl Args {
    pub fn logging_config(&self) -> LoggingConfig {
        let config = LoggingConfig::default()
            .with_format(self.log_format.unwrap_or_default())
            .with_level(self.log_level);
        match &self.log_filter {
            Some(filter) => config.with_filter(filter.clone()),
            None => config,
        }
    }

    /// Credentials file first, then `GOOGLE_*` variables, then flags.
    ///
    /// A missing credentials file is tolerated when the environment supplies
    /// the client values; validation reports whatever is still absent.
    pub fn app_config(&self) -> core_runtime::Result<AppConfig> {
        let mut builder = AppConfig::builder();
        if self.credentials.exists() {
            builder = builder.load_credentials_file(&self.credentials)?;
        }
        builder = builder.apply_env_overrides();

        if let Some(bind) = self.bind {
            builder = builder.bind_addr(bind);
        }
        if let Some(dir) = &self.upload_dir {
            builder = builder.upload_dir(dir.clone());
        }
        if let Some(dir) = &self.session_dir {
            builder = builder.session_dir(dir.clone());
        }
        if let Some(bytes) = self.max_content_length {
            builder = builder.max_content_length(bytes);
        }

        builder.build()
    }
}
