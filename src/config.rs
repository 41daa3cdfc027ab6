use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// Sample e-commerce database, relative paths resolve under `data_dir`
    pub sample_db: String,
    /// Database holding uploaded tables
    pub uploads_db: String,
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "openai" or "ollama"
    pub model: String,   // Model name
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    pub max_bytes: usize,
    pub preview_rows: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HistoryConfig {
    pub backend: String, // "memory" or "duckdb"
    pub path: String,
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub upload: UploadConfig,
    pub history: HistoryConfig,
    pub data_dir: String,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory for data storage
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Language model to request completions from
    #[arg(long)]
    pub model: Option<String>,

    /// Completion endpoint URL
    #[arg(long)]
    pub llm_url: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Start with default configuration
        let mut config_builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/nl-sql/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // NL_SQL__LLM__MODEL=... and friends
        config_builder = config_builder.add_source(
            Environment::with_prefix("NL_SQL")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("web.cors_origins")
                .try_parsing(true),
        );

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(data_dir) = &args.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(model) = &args.model {
            config.llm.model = model.clone();
        }
        if let Some(url) = &args.llm_url {
            config.llm.api_url = Some(url.clone());
        }

        Ok(config)
    }

    /// Resolves a configured database path against the data directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.data_dir).join(path)
        }
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                sample_db: "ecommerce.duckdb".to_string(),
                uploads_db: "uploaded_data.duckdb".to_string(),
                pool_size: 5,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 8001,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ],
            },
            llm: LlmConfig {
                backend: "openai".to_string(),
                model: "qwen2.5:0.5b".to_string(),
                api_key: None,
                api_url: None,
                temperature: 0.1,
                max_tokens: 500,
                timeout_secs: 60,
            },
            upload: UploadConfig {
                max_bytes: 10 * 1024 * 1024,
                preview_rows: 5,
            },
            history: HistoryConfig {
                backend: "duckdb".to_string(),
                path: "history.duckdb".to_string(),
                capacity: 50,
            },
            data_dir: "data".to_string(),
        }
    }
}
