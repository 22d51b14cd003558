//! `AppConfig` struct and TOML read/write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono_tz::Tz;
use cinesched_core::{CinemaId, NormalizeConfig, ValidationConfig};
use cinesched_publish::{BaseDir, resolve_path};
use cinesched_sources::{DEFAULT_DAYS_AHEAD, SourceClient, SourceSettings, default_url};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default per-source timeout in seconds.
const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;

/// Default minimum interval between requests to one source.
const DEFAULT_MIN_INTERVAL_MS: u64 = 500;

/// Default timezone listed times are read in; every cinema is in London.
const DEFAULT_TIMEZONE: &str = "Europe/London";

/// Top-level application configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Run settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Normalizer settings.
    #[serde(default)]
    pub normalize: NormalizeConfig,
    /// Validator thresholds.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Per-cinema overrides keyed by cinema id.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Artifact path; defaults to the data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// Upper bound on one source's fetch, in seconds.
    pub source_timeout_secs: u64,
    /// User-Agent sent to every cinema.
    pub user_agent: String,
    /// IANA timezone the cinemas list their times in.
    pub timezone: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output: None,
            source_timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
            user_agent: String::from(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            )),
            timezone: String::from(DEFAULT_TIMEZONE),
        }
    }
}

/// `[sources.<cinemaId>]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    /// Disabled sources are not fetched and are reported failed.
    pub enabled: bool,
    /// Listing URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Minimum interval between requests, in milliseconds.
    pub min_interval_ms: u64,
    /// Days fetched by day-paged sources.
    pub days_ahead: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            days_ahead: DEFAULT_DAYS_AHEAD,
        }
    }
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if a value is out of range (unknown cinema or timezone, cutoff hour,
    /// zero source timeout).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config
            .check()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Saves config to a TOML file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or file write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config to TOML")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }

    /// A config listing every cinema with its default settings.
    #[must_use]
    pub fn with_all_sources() -> Self {
        Self {
            sources: CinemaId::ALL
                .into_iter()
                .map(|c| {
                    let source = SourceConfig {
                        url: Some(String::from(default_url(c))),
                        ..SourceConfig::default()
                    };
                    (String::from(c.as_str()), source)
                })
                .collect(),
            ..Self::default()
        }
    }

    fn check(&self) -> Result<()> {
        for key in self.sources.keys() {
            if key.parse::<CinemaId>().is_err() {
                bail!("unknown cinema in [sources]: {key:?}");
            }
        }
        if self.pipeline.source_timeout_secs == 0 {
            bail!("pipeline.source_timeout_secs must be positive");
        }
        self.timezone()?;
        if self.normalize.late_night_cutoff_hour > 23 {
            bail!(
                "normalize.late_night_cutoff_hour must be 0..=23, got {}",
                self.normalize.late_night_cutoff_hour
            );
        }
        Ok(())
    }

    /// Settings for `cinema`, defaults where not configured.
    #[must_use]
    pub fn source(&self, cinema: CinemaId) -> SourceConfig {
        self.sources
            .get(cinema.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Resolved listing URL for `cinema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL does not parse.
    pub fn source_url(&self, cinema: CinemaId) -> Result<Url> {
        let source = self.source(cinema);
        let raw = source.url.as_deref().unwrap_or_else(|| default_url(cinema));
        Url::parse(raw).with_context(|| format!("invalid URL for {cinema}: {raw}"))
    }

    /// Extractor settings for `cinema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL does not parse.
    pub fn source_settings(&self, cinema: CinemaId) -> Result<SourceSettings> {
        let source = self.source(cinema);
        Ok(SourceSettings {
            url: self.source_url(cinema)?,
            user_agent: self.pipeline.user_agent.clone(),
            min_interval: Duration::from_millis(source.min_interval_ms),
            request_timeout: SourceClient::request_timeout_within(self.source_timeout()),
            days_ahead: source.days_ahead,
        })
    }

    /// Timezone of the listed times and of the run's reference date.
    ///
    /// # Errors
    ///
    /// Returns an error if `[pipeline] timezone` is not an IANA name.
    pub fn timezone(&self) -> Result<Tz> {
        let name = &self.pipeline.timezone;
        name.parse::<Tz>()
            .map_err(|e| anyhow!("invalid pipeline.timezone {name:?}: {e}"))
    }

    /// Upper bound on one source's fetch.
    #[must_use]
    pub const fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.source_timeout_secs)
    }

    /// Artifact path: `flag`, then `[pipeline] output`, then the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be resolved.
    pub fn artifact_path(&self, flag: Option<&PathBuf>, dir: Option<&PathBuf>) -> Result<PathBuf> {
        if let Some(path) = flag.or(self.pipeline.output.as_ref()) {
            return Ok(path.clone());
        }
        resolve_path(BaseDir::Data, dir)
    }
}
