use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::MirrorError;
use crate::index::{DEFAULT_DATA_URL, DEFAULT_INDEX_URL};
use crate::listing::{DEFAULT_NAVIGATION_LINKS, NavigationFilter};
use crate::remote::HttpSettings;
use crate::scheduler::Pacing;
use crate::tree::TraversalPolicy;

pub const CONFIG_FILE_NAME: &str = "ocads-mirror.json";
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub index_url: Option<String>,
    #[serde(default)]
    pub data_url: Option<String>,
    #[serde(default)]
    pub navigation: Option<NavigationMode>,
    #[serde(default)]
    pub navigation_links: Option<usize>,
    #[serde(default)]
    pub pacing_min_secs: Option<f64>,
    #[serde(default)]
    pub pacing_max_secs: Option<f64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub continue_on_error: Option<bool>,
    #[serde(default)]
    pub state_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMode {
    SkipLeading,
    Heuristic,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub index_url: String,
    pub data_url: String,
    pub navigation: NavigationFilter,
    pub pacing: Pacing,
    pub http: HttpSettings,
    pub traversal: TraversalPolicy,
    pub state_file: Option<Utf8PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            index_url: DEFAULT_INDEX_URL.to_string(),
            data_url: DEFAULT_DATA_URL.to_string(),
            navigation: NavigationFilter::default(),
            pacing: Pacing::default(),
            http: HttpSettings::default(),
            traversal: TraversalPolicy::default(),
            state_file: None,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `ocads-mirror.json` from the current directory when
    /// present. Without either, built-in defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, MirrorError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE_NAME),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MirrorError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| MirrorError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, MirrorError> {
        let defaults = ResolvedConfig::default();

        let schema_version = config.schema_version.unwrap_or(defaults.schema_version);
        if schema_version != CONFIG_SCHEMA_VERSION {
            return Err(MirrorError::ConfigParse(format!(
                "unsupported schema_version {schema_version}, expected {CONFIG_SCHEMA_VERSION}"
            )));
        }

        let navigation = match config.navigation {
            Some(NavigationMode::Heuristic) => NavigationFilter::Heuristic,
            Some(NavigationMode::SkipLeading) | None => NavigationFilter::SkipLeading(
                config.navigation_links.unwrap_or(DEFAULT_NAVIGATION_LINKS),
            ),
        };

        let default_pacing = Pacing::default();
        let pacing = Pacing::new(
            secs(config.pacing_min_secs, "pacing_min_secs")?.unwrap_or(default_pacing.min()),
            secs(config.pacing_max_secs, "pacing_max_secs")?.unwrap_or(default_pacing.max()),
        )?;

        let http = HttpSettings {
            timeout: config
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.http.timeout),
            max_retries: config.max_retries.unwrap_or(defaults.http.max_retries),
        };

        let traversal = if config.continue_on_error.unwrap_or(false) {
            TraversalPolicy::Continue
        } else {
            TraversalPolicy::Abort
        };

        Ok(ResolvedConfig {
            schema_version,
            index_url: config.index_url.unwrap_or(defaults.index_url),
            data_url: config.data_url.unwrap_or(defaults.data_url),
            navigation,
            pacing,
            http,
            traversal,
            state_file: config.state_file.map(Utf8PathBuf::from),
        })
    }
}

fn secs(value: Option<f64>, field: &str) -> Result<Option<Duration>, MirrorError> {
    value
        .map(|value| {
            Duration::try_from_secs_f64(value)
                .map_err(|_| MirrorError::ConfigParse(format!("{field} must be a non-negative number")))
        })
        .transpose()
}
