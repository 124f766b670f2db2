//! Configuration management for the sandwich screener.
//!
//! The screener reads a single configuration file at `~/.sandwich/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (see below)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `SANDWICH_LOG_LEVEL` → observability.log_level
//! - `SANDWICH_LOG_FORMAT` → observability.log_format
//! - `TELEGRAM_BOT_TOKEN` → telegram.bot_token
//! - `TELEGRAM_CHAT_ID` → telegram.chat_id
//!   (when both are set, telegram.enabled is switched on)
//! - `SANDWICH_SHEET_ID` → watchlist.spreadsheet_id
//! - `GOOGLE_SHEETS_API_KEY` → watchlist.api_key
//! - `GOOGLE_ACCESS_TOKEN` → watchlist.access_token
//! - `GCP_SERVICE_ACCOUNT` → watchlist.service_account (key JSON)
//! - `SANDWICH_WATCHLIST_PATH` → watchlist.path (and switches kind to `file`)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ResultExt};
use crate::util::mask_secret;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".sandwich"),
        |dirs| dirs.home_dir().join(".sandwich"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Screening parameters
    #[serde(default)]
    pub screener: ScreenerConfig,

    /// Market data sources
    #[serde(default)]
    pub data_sources: DataSourcesConfig,

    /// Watchlist source
    #[serde(default)]
    pub watchlist: WatchlistConfig,

    /// Telegram delivery
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable fallbacks.
    ///
    /// When `path` is given it must exist; otherwise the default location is
    /// used and a missing file means defaults.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any variable lookup.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(level) = var("SANDWICH_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = var("SANDWICH_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        let token = var("TELEGRAM_BOT_TOKEN").filter(|t| !t.is_empty());
        let chat_id = var("TELEGRAM_CHAT_ID").filter(|c| !c.is_empty());
        if token.is_some() && chat_id.is_some() {
            self.telegram.enabled = true;
        }
        if token.is_some() {
            self.telegram.bot_token = token;
        }
        if chat_id.is_some() {
            self.telegram.chat_id = chat_id;
        }

        if let Some(sheet_id) = var("SANDWICH_SHEET_ID") {
            self.watchlist.spreadsheet_id = Some(sheet_id);
        }
        if let Some(key) = var("GOOGLE_SHEETS_API_KEY") {
            self.watchlist.api_key = Some(key);
        }
        if let Some(token) = var("GOOGLE_ACCESS_TOKEN") {
            self.watchlist.access_token = Some(token);
        }
        if let Some(account) = var("GCP_SERVICE_ACCOUNT").filter(|a| !a.trim().is_empty()) {
            self.watchlist.service_account = Some(account);
        }
        if let Some(path) = var("SANDWICH_WATCHLIST_PATH") {
            self.watchlist.kind = WatchlistKind::File;
            self.watchlist.path = Some(PathBuf::from(path));
        }
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        let s = &self.screener;
        if s.short_window == 0 || s.long_window == 0 {
            return Err(Error::Config("moving-average windows must be positive".into()));
        }
        if s.short_window >= s.long_window {
            return Err(Error::Config(format!(
                "short_window ({}) must be smaller than long_window ({})",
                s.short_window, s.long_window
            )));
        }
        if s.max_report_chars == 0 {
            return Err(Error::Config("max_report_chars must be positive".into()));
        }
        if s.resolver_max_days == 0 {
            return Err(Error::Config("resolver_max_days must be at least 1".into()));
        }

        if self.telegram.enabled
            && (self.telegram.bot_token.as_deref().unwrap_or("").is_empty()
                || self.telegram.chat_id.as_deref().unwrap_or("").is_empty())
        {
            return Err(Error::Config(
                "telegram is enabled but bot_token or chat_id is missing".into(),
            ));
        }

        match self.watchlist.kind {
            WatchlistKind::GoogleSheets if self.watchlist.spreadsheet_id.is_none() => Err(
                Error::Config("watchlist.spreadsheet_id is required for google_sheets".into()),
            ),
            WatchlistKind::File if self.watchlist.path.is_none() => Err(Error::Config(
                "watchlist.path is required for a file watchlist".into(),
            )),
            _ => Ok(()),
        }
    }

    /// A copy of this configuration with every secret masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.telegram.bot_token = copy.telegram.bot_token.as_deref().map(mask_secret);
        copy.watchlist.api_key = copy.watchlist.api_key.as_deref().map(mask_secret);
        copy.watchlist.access_token = copy.watchlist.access_token.as_deref().map(mask_secret);
        copy.watchlist.service_account = copy.watchlist.service_account.as_deref().map(mask_secret);
        copy
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to force down to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Screener
// ============================================================================

/// Parameters of one screening pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Short simple moving average window (bars)
    #[serde(default = "default_short_window")]
    pub short_window: usize,

    /// Long simple moving average window (bars); also the minimum history
    #[serde(default = "default_long_window")]
    pub long_window: usize,

    /// Calendar days of history requested before the resolution date
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Minimum delay between two price fetches, in milliseconds
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Extra attempts for a price fetch that failed with a transient error
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    /// Round both averages to two decimals before comparing with the close
    #[serde(default)]
    pub round_before_compare: bool,

    /// Maximum report length in characters (messaging limit)
    #[serde(default = "default_max_report_chars")]
    pub max_report_chars: usize,

    /// Calendar days the dated listing source walks back from today
    #[serde(default = "default_resolver_max_days")]
    pub resolver_max_days: u32,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            short_window: default_short_window(),
            long_window: default_long_window(),
            lookback_days: default_lookback_days(),
            pacing_ms: default_pacing_ms(),
            fetch_retries: default_fetch_retries(),
            round_before_compare: false,
            max_report_chars: default_max_report_chars(),
            resolver_max_days: default_resolver_max_days(),
        }
    }
}

fn default_short_window() -> usize {
    120
}

fn default_long_window() -> usize {
    224
}

fn default_lookback_days() -> u32 {
    450
}

fn default_pacing_ms() -> u64 {
    20
}

fn default_fetch_retries() -> u32 {
    2
}

fn default_max_report_chars() -> usize {
    4000
}

fn default_resolver_max_days() -> u32 {
    7
}

// ============================================================================
// Data Sources
// ============================================================================

/// Market data source configuration.
///
/// `listing` holds the ticker-listing sources tried in priority order
/// (lower = tried first). Prices always come from `price_provider`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourcesConfig {
    /// Ticker listing sources
    #[serde(default = "default_listing_sources")]
    pub listing: Vec<DataSourceEntry>,

    /// Daily OHLCV provider name ("naver")
    #[serde(default = "default_price_provider")]
    pub price_provider: String,

    /// KRX data portal base URL
    #[serde(default = "default_krx_base_url")]
    pub krx_base_url: String,

    /// Naver chart API base URL
    #[serde(default = "default_naver_base_url")]
    pub naver_base_url: String,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DataSourcesConfig {
    fn default() -> Self {
        Self {
            listing: default_listing_sources(),
            price_provider: default_price_provider(),
            krx_base_url: default_krx_base_url(),
            naver_base_url: default_naver_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl DataSourcesConfig {
    /// Enabled listing sources sorted by priority.
    pub fn enabled_listing(&self) -> Vec<&DataSourceEntry> {
        let mut entries: Vec<_> = self.listing.iter().filter(|e| e.enabled).collect();
        entries.sort_by_key(|e| e.priority);
        entries
    }
}

/// Configuration for a single listing source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceEntry {
    /// Provider name: "krx_daily", "krx_snapshot"
    pub provider: String,

    /// Whether this provider is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Priority (lower = tried first)
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_listing_sources() -> Vec<DataSourceEntry> {
    vec![
        DataSourceEntry {
            provider: "krx_daily".to_string(),
            enabled: true,
            priority: 1,
        },
        DataSourceEntry {
            provider: "krx_snapshot".to_string(),
            enabled: true,
            priority: 2,
        },
    ]
}

fn default_price_provider() -> String {
    "naver".into()
}

fn default_krx_base_url() -> String {
    "http://data.krx.co.kr".into()
}

fn default_naver_base_url() -> String {
    "https://api.finance.naver.com".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_priority() -> u8 {
    10
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Watchlist
// ============================================================================

/// Where the watchlist table lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WatchlistKind {
    /// First worksheet of a Google spreadsheet
    #[default]
    GoogleSheets,
    /// Local CSV file with a header row
    File,
}

/// Watchlist source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistConfig {
    /// Source kind
    #[serde(default)]
    pub kind: WatchlistKind,

    /// Spreadsheet id (google_sheets)
    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    /// A1 range to read; without a sheet name the first sheet is used
    #[serde(default = "default_sheet_range")]
    pub range: String,

    /// Sheets API key (google_sheets, public sheets)
    #[serde(default)]
    pub api_key: Option<String>,

    /// OAuth bearer token (google_sheets, private sheets)
    #[serde(default)]
    pub access_token: Option<String>,

    /// Service-account key JSON (google_sheets, private sheets)
    #[serde(default)]
    pub service_account: Option<String>,

    /// Sheets API base URL
    #[serde(default = "default_sheets_base_url")]
    pub sheets_base_url: String,

    /// CSV file path (file)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            kind: WatchlistKind::default(),
            spreadsheet_id: None,
            range: default_sheet_range(),
            api_key: None,
            access_token: None,
            service_account: None,
            sheets_base_url: default_sheets_base_url(),
            path: None,
        }
    }
}

fn default_sheet_range() -> String {
    "A:D".into()
}

fn default_sheets_base_url() -> String {
    "https://sheets.googleapis.com".into()
}

// ============================================================================
// Telegram
// ============================================================================

/// Telegram delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Send reports when the run asks for notification
    #[serde(default)]
    pub enabled: bool,

    /// Bot token
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Target chat id
    #[serde(default)]
    pub chat_id: Option<String>,

    /// Send attempts before giving up
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Message parse mode
    #[serde(default = "default_parse_mode")]
    pub parse_mode: String,

    /// Bot API base URL
    #[serde(default = "default_telegram_base_url")]
    pub api_base_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: None,
            chat_id: None,
            retry_count: default_retry_count(),
            parse_mode: default_parse_mode(),
            api_base_url: default_telegram_base_url(),
        }
    }
}

fn default_retry_count() -> u32 {
    3
}

fn default_parse_mode() -> String {
    "HTML".into()
}

fn default_telegram_base_url() -> String {
    "https://api.telegram.org".into()
}
