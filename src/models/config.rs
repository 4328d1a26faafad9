//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Upstream schedule and real-time feed settings
    #[serde(default)]
    pub feeds: FeedsConfig,

    /// Fingerprint store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Rendering settings shared by every channel
    #[serde(default)]
    pub format: FormatConfig,

    /// Interval loop and manual trigger settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Publishing destinations, attempted in this order
    #[serde(default = "defaults::destinations")]
    pub destinations: Vec<DestinationConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, or the defaults when the file does not exist.
    ///
    /// Unreadable or malformed files are errors.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Err(AppError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("No config at {:?}. Using defaults.", path);
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Override settings from process environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override settings from a key lookup.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("METROLERT_SCHEDULE_URL") {
            self.feeds.schedule_url = url;
        }
        if let Some(url) = lookup("METROLERT_ALERTS_URL") {
            self.feeds.alerts_url = url;
        }
        if let Some(dir) = lookup("METROLERT_STORE_DIR") {
            self.store.dir = PathBuf::from(dir);
        }
        if let Some(bucket) = lookup("METROLERT_S3_BUCKET") {
            self.store.s3_bucket = Some(bucket);
        }
        if let Some(interval) = lookup("METROLERT_INTERVAL_SECS") {
            match interval.parse() {
                Ok(secs) => self.scheduler.interval_secs = secs,
                Err(_) => log::warn!("Ignoring invalid METROLERT_INTERVAL_SECS={interval}"),
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.feeds.schedule_url)
            .map_err(|e| AppError::validation(format!("feeds.schedule_url: {e}")))?;
        Url::parse(&self.feeds.alerts_url)
            .map_err(|e| AppError::validation(format!("feeds.alerts_url: {e}")))?;
        if self.feeds.user_agent.trim().is_empty() {
            return Err(AppError::validation("feeds.user_agent is empty"));
        }
        if self.feeds.timeout_secs == 0 {
            return Err(AppError::validation("feeds.timeout_secs must be > 0"));
        }
        if self.store.key_prefix.is_empty() {
            return Err(AppError::validation("store.key_prefix is empty"));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(AppError::validation("scheduler.interval_secs must be > 0"));
        }
        if self.scheduler.run_timeout_secs == 0 {
            return Err(AppError::validation(
                "scheduler.run_timeout_secs must be > 0",
            ));
        }
        if self.destinations.is_empty() {
            return Err(AppError::validation("No destinations defined"));
        }

        let mut names = HashSet::new();
        for destination in &self.destinations {
            if !names.insert(destination.name()) {
                return Err(AppError::validation(format!(
                    "Duplicate destination name: {}",
                    destination.name()
                )));
            }
            destination.validate()?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: FeedsConfig::default(),
            store: StoreConfig::default(),
            format: FormatConfig::default(),
            scheduler: SchedulerConfig::default(),
            destinations: defaults::destinations(),
        }
    }
}

/// Upstream feed locations and HTTP behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// GTFS static schedule zip
    #[serde(default = "defaults::schedule_url")]
    pub schedule_url: String,

    /// GTFS-Realtime service alerts protobuf
    #[serde(default = "defaults::alerts_url")]
    pub alerts_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            schedule_url: defaults::schedule_url(),
            alerts_url: defaults::alerts_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Fingerprint store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory for the local store
    #[serde(default = "defaults::store_dir")]
    pub dir: PathBuf,

    /// Prefix prepended to alert ids to form store keys
    #[serde(default = "defaults::key_prefix")]
    pub key_prefix: String,

    /// S3 bucket; required by the Lambda entry point, optional for the CLI
    #[serde(default)]
    pub s3_bucket: Option<String>,

    /// Key prefix inside the S3 bucket
    #[serde(default = "defaults::s3_prefix")]
    pub s3_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: defaults::store_dir(),
            key_prefix: defaults::key_prefix(),
            s3_bucket: None,
            s3_prefix: defaults::s3_prefix(),
        }
    }
}

/// Rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Used when an alert has no header text
    #[serde(default = "defaults::header_fallback")]
    pub header_fallback: String,

    /// Used when an alert has no description text
    #[serde(default = "defaults::description_fallback")]
    pub description_fallback: String,

    /// Preferred translation language (BCP-47); first translation otherwise
    #[serde(default)]
    pub language: Option<String>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            header_fallback: defaults::header_fallback(),
            description_fallback: defaults::description_fallback(),
            language: None,
        }
    }
}

/// Interval loop and manual trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between scheduled runs
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Upper bound on a single run
    #[serde(default = "defaults::run_timeout")]
    pub run_timeout_secs: u64,

    /// Listen address for the manual trigger endpoint
    #[serde(default = "defaults::bind")]
    pub bind: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            run_timeout_secs: defaults::run_timeout(),
            bind: defaults::bind(),
        }
    }
}

/// A publishing destination.
///
/// Credentials are never stored in the file; each destination names the
/// environment variable holding its secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DestinationConfig {
    /// X (Twitter) API v2, single post per alert
    Twitter {
        #[serde(default = "defaults::twitter_name")]
        name: String,
        #[serde(default = "defaults::twitter_endpoint")]
        endpoint: String,
        #[serde(default = "defaults::twitter_token_env")]
        token_env: String,
        /// Limit in X's weighted units
        #[serde(default = "defaults::twitter_max_length", alias = "max_graphemes")]
        max_length: usize,
    },

    /// Bluesky, lead post plus threaded replies
    Bluesky {
        #[serde(default = "defaults::bluesky_name")]
        name: String,
        #[serde(default = "defaults::bluesky_service")]
        service: String,
        identifier: String,
        #[serde(default = "defaults::bluesky_password_env")]
        password_env: String,
        #[serde(default = "defaults::bluesky_max_graphemes")]
        max_graphemes: usize,
    },

    /// Writes payloads to the log instead of posting
    Log {
        #[serde(default = "defaults::log_name")]
        name: String,
        #[serde(default)]
        threaded: bool,
    },
}

impl DestinationConfig {
    /// Destination name used in logs and outcomes.
    pub fn name(&self) -> &str {
        match self {
            Self::Twitter { name, .. } | Self::Bluesky { name, .. } | Self::Log { name, .. } => {
                name
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let name = self.name();
        if name.trim().is_empty() {
            return Err(AppError::validation("destination name is empty"));
        }
        match self {
            Self::Twitter {
                endpoint,
                token_env,
                max_length,
                ..
            } => {
                Url::parse(endpoint)
                    .map_err(|e| AppError::validation(format!("{name}.endpoint: {e}")))?;
                check_env_name(name, token_env)?;
                check_limit(name, "max_length", *max_length)
            }
            Self::Bluesky {
                service,
                identifier,
                password_env,
                max_graphemes,
                ..
            } => {
                Url::parse(service)
                    .map_err(|e| AppError::validation(format!("{name}.service: {e}")))?;
                if identifier.trim().is_empty() {
                    return Err(AppError::validation(format!("{name}.identifier is empty")));
                }
                check_env_name(name, password_env)?;
                check_limit(name, "max_graphemes", *max_graphemes)
            }
            Self::Log { .. } => Ok(()),
        }
    }
}

fn check_env_name(name: &str, env: &str) -> Result<()> {
    if env.trim().is_empty() {
        return Err(AppError::validation(format!(
            "{name}: credential variable name is empty"
        )));
    }
    Ok(())
}

fn check_limit(name: &str, field: &str, limit: usize) -> Result<()> {
    if limit < defaults::MIN_LENGTH {
        return Err(AppError::validation(format!(
            "{name}.{field} must be >= {}",
            defaults::MIN_LENGTH
        )));
    }
    Ok(())
}

mod defaults {
    use std::path::PathBuf;

    use super::DestinationConfig;

    pub const MIN_LENGTH: usize = 40;

    // Feed defaults
    pub fn schedule_url() -> String {
        "https://metrolinktrains.com/globalassets/about/gtfs/gtfs.zip".into()
    }
    pub fn alerts_url() -> String {
        "https://cdn.simplifytransit.com/metrolink/alerts/service-alerts.pb".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; metrolert/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Store defaults
    pub fn store_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn key_prefix() -> String {
        "alert_".into()
    }
    pub fn s3_prefix() -> String {
        "metrolert".into()
    }

    // Format defaults
    pub fn header_fallback() -> String {
        "Service Alert".into()
    }
    pub fn description_fallback() -> String {
        "No additional details available".into()
    }

    // Scheduler defaults
    pub fn interval() -> u64 {
        60
    }
    pub fn run_timeout() -> u64 {
        55
    }
    pub fn bind() -> String {
        "127.0.0.1:8787".into()
    }

    // Destination defaults
    pub fn twitter_name() -> String {
        "twitter".into()
    }
    pub fn twitter_endpoint() -> String {
        "https://api.twitter.com".into()
    }
    pub fn twitter_token_env() -> String {
        "TWITTER_BEARER_TOKEN".into()
    }
    pub fn twitter_max_length() -> usize {
        280
    }
    pub fn bluesky_name() -> String {
        "bluesky".into()
    }
    pub fn bluesky_service() -> String {
        "https://bsky.social".into()
    }
    pub fn bluesky_password_env() -> String {
        "BSKY_PASSWORD".into()
    }
    pub fn bluesky_max_graphemes() -> usize {
        300
    }
    pub fn log_name() -> String {
        "log".into()
    }

    pub fn destinations() -> Vec<DestinationConfig> {
        vec![
            DestinationConfig::Twitter {
                name: twitter_name(),
                endpoint: twitter_endpoint(),
                token_env: twitter_token_env(),
                max_length: twitter_max_length(),
            },
            DestinationConfig::Bluesky {
                name: bluesky_name(),
                service: bluesky_service(),
                identifier: "metrolert.bsky.social".into(),
                password_env: bluesky_password_env(),
                max_graphemes: bluesky_max_graphemes(),
            },
        ]
    }
}
