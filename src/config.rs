use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file read when neither `--config` nor `CONFIG_FILE` is given.
pub const DEFAULT_CONFIG_FILE: &str = "coach-chat.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Backend base URL
    #[arg(long, env = "COACH_BASE_URL")]
    pub base_url: Option<String>,

    /// Chat module to open
    #[arg(short, long, env = "COACH_MODULE")]
    pub module: Option<String>,

    /// Model used for replies
    #[arg(long, env = "COACH_MODEL")]
    pub model: Option<String>,

    /// Client-side timeout for a streamed reply, in seconds
    #[arg(long, env = "COACH_STREAM_TIMEOUT_SECS")]
    pub stream_timeout_secs: Option<u64>,

    /// Local storage file
    #[arg(long, env = "COACH_STORAGE_PATH")]
    pub storage_path: Option<String>,

    /// Directory exported documents are written to
    #[arg(long, env = "COACH_EXPORT_DIR")]
    pub export_dir: Option<String>,

    /// Emit logs as JSON
    #[arg(long, env = "COACH_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub storage: StorageConfig,
    pub export: ExportConfig,
    #[serde(default)]
    pub log_json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub module: String,
    pub model: String,
    /// Absent means no client-side timeout.
    #[serde(default)]
    pub stream_timeout_secs: Option<u64>,
    pub session_ttl_days: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    pub dir: PathBuf,
}

/// `<data_local_dir>/coach-chat/storage.json`, or a relative fallback when
/// the platform has no data directory.
pub fn default_storage_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coach-chat")
        .join("storage.json")
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.base_url", "http://127.0.0.1:5009")?
            .set_default("chat.module", "kpi")?
            .set_default("chat.model", "flash")?
            .set_default("chat.session_ttl_days", 7)?
            .set_default(
                "storage.path",
                default_storage_path().to_string_lossy().into_owned(),
            )?
            .set_default("export.dir", ".")?;

        // 2. Config file: explicit path must exist, the default one is optional
        match &cli.config {
            Some(path) => builder = builder.add_source(File::with_name(path).required(true)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
            }
            None => {}
        }

        // 3. Environment variables, e.g. COACH_SERVER__BASE_URL
        builder = builder.add_source(
            Environment::with_prefix("COACH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI flags (and their clap env fallbacks) win over everything
        if let Some(url) = cli.base_url {
            builder = builder.set_override("server.base_url", url)?;
        }
        if let Some(module) = cli.module {
            builder = builder.set_override("chat.module", module)?;
        }
        if let Some(model) = cli.model {
            builder = builder.set_override("chat.model", model)?;
        }
        if let Some(secs) = cli.stream_timeout_secs {
            builder = builder.set_override("chat.stream_timeout_secs", secs)?;
        }
        if let Some(path) = cli.storage_path {
            builder = builder.set_override("storage.path", path)?;
        }
        if let Some(dir) = cli.export_dir {
            builder = builder.set_override("export.dir", dir)?;
        }
        if cli.log_json {
            builder = builder.set_override("log_json", true)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.server.base_url.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "server.base_url cannot be empty".into(),
            ));
        }
        if self.chat.module.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "chat.module cannot be empty".into(),
            ));
        }
        Ok(())
    }

    /// Stream timeout as a duration; zero disables it.
    #[must_use]
    pub fn stream_timeout(&self) -> Option<std::time::Duration> {
        self.chat
            .stream_timeout_secs
            .filter(|s| *s > 0)
            .map(std::time::Duration::from_secs)
    }
}
