use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::InputSource;
use crate::recording::RecorderOptions;

/// Environment prefix for overrides (`PODCAST_STUDIO__SERVICE__HTTP__PORT=9000`)
pub const ENV_PREFIX: &str = "PODCAST_STUDIO";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub cosmic: Option<CosmicConfig>,
    pub recording: RecordingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "podcast-studio".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Hosted bucket credentials
#[derive(Debug, Clone, Deserialize)]
pub struct CosmicConfig {
    pub bucket_slug: String,
    pub read_key: String,
    #[serde(default)]
    pub write_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Encoder, meter and capture settings for every recorder
    pub options: RecorderOptions,
    pub input: InputSource,
}

impl Config {
    /// Load `<path>.toml` (optional) with environment overrides on top
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        let mut cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.apply_cosmic_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Fill bucket credentials from `COSMIC_BUCKET_SLUG`, `COSMIC_READ_KEY`
    /// and `COSMIC_WRITE_KEY` when the file does not set them
    pub fn apply_cosmic_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.is_empty());

        match self.cosmic.as_mut() {
            Some(cosmic) => {
                if cosmic.write_key.is_none() {
                    cosmic.write_key = non_empty("COSMIC_WRITE_KEY");
                }
            }
            None => {
                if let (Some(bucket_slug), Some(read_key)) =
                    (non_empty("COSMIC_BUCKET_SLUG"), non_empty("COSMIC_READ_KEY"))
                {
                    self.cosmic = Some(CosmicConfig {
                        bucket_slug,
                        read_key,
                        write_key: non_empty("COSMIC_WRITE_KEY"),
                    });
                }
            }
        }
    }
}
