use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, deserialize_interval, serialize_duration};

pub const CONFIG_FILE_NAME: &str = "stockalloc.toml";

fn default_portfolio_file() -> PathBuf {
    PathBuf::from("portfolio.json")
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("exports")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Toggles that shape a session. Owned by the session and passed to whatever
/// needs them; CLI flags override the values from the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Start the periodic price refresh when the session opens.
    pub auto_refresh: bool,

    /// Round rebalance recommendations to whole shares.
    pub share_rounding: bool,

    pub theme: Theme,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auto_refresh: false,
            share_rounding: true,
            theme: Theme::Light,
        }
    }
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Period of the auto-refresh timer.
    #[serde(
        default = "default_refresh_interval",
        deserialize_with = "deserialize_interval",
        serialize_with = "serialize_duration"
    )]
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: default_refresh_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Yahoo,
    AlphaVantage,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Price provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    /// Providers to query, in order.
    pub providers: Vec<ProviderKind>,

    /// Per-request HTTP timeout. A timeout counts as the source being unavailable.
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub request_timeout: Duration,

    pub max_concurrent_requests: usize,

    /// Environment variable that holds the Alpha Vantage key.
    pub alpha_vantage_api_key_env: String,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderKind::Yahoo],
            request_timeout: default_request_timeout(),
            max_concurrent_requests: 4,
            alpha_vantage_api_key_env: "ALPHA_VANTAGE_API_KEY".to_string(),
        }
    }
}

/// Display formatting for the CLI table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub currency_symbol: String,

    /// Render money with thousands separators.
    pub currency_grouping: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
            currency_grouping: false,
        }
    }
}

/// Application configuration as written in `stockalloc.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to data directory. If relative, resolved from config file location.
    /// If not specified, defaults to the config file's directory.
    pub data_dir: Option<PathBuf>,

    /// Portfolio document, relative to the data directory.
    #[serde(default = "default_portfolio_file")]
    pub portfolio_file: PathBuf,

    /// Where CSV exports go, relative to the data directory.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    pub session: SessionSettings,
    pub refresh: RefreshConfig,
    pub market_data: MarketDataConfig,
    pub display: DisplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            portfolio_file: default_portfolio_file(),
            export_dir: default_export_dir(),
            session: SessionSettings::default(),
            refresh: RefreshConfig::default(),
            market_data: MarketDataConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the data directory against the directory holding the config.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }

    fn resolve(self, config_dir: &Path) -> ResolvedConfig {
        let data_dir = self.resolve_data_dir(config_dir);
        ResolvedConfig {
            portfolio_path: data_dir.join(&self.portfolio_file),
            export_dir: data_dir.join(&self.export_dir),
            data_dir,
            session: self.session,
            refresh: self.refresh,
            market_data: self.market_data,
            display: self.display,
        }
    }
}

/// Loaded configuration with every path made concrete.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub portfolio_path: PathBuf,
    pub export_dir: PathBuf,
    pub session: SessionSettings,
    pub refresh: RefreshConfig,
    pub market_data: MarketDataConfig,
    pub display: DisplayConfig,
}

/// Returns the default config file path.
///
/// `./stockalloc.toml` if it exists, else `<data dir>/stockalloc/stockalloc.toml`.
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from(CONFIG_FILE_NAME);
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("stockalloc").join(CONFIG_FILE_NAME);
    }

    local_config
}

impl ResolvedConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;
        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        Ok(Config::load(&config_path)?.resolve(config_dir))
    }

    /// Load config, falling back to defaults rooted at the config file's
    /// intended directory when it does not exist.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };
        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?;

        Ok(Config::default().resolve(config_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_data_dir_is_config_dir() {
        let config = Config::default();
        let config_dir = Path::new("/home/user/stocks");
        assert_eq!(
            config.resolve_data_dir(config_dir),
            PathBuf::from("/home/user/stocks")
        );
    }

    #[test]
    fn test_relative_and_absolute_data_dir() {
        let mut config = Config {
            data_dir: Some(PathBuf::from("data")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_data_dir(Path::new("/home/user")),
            PathBuf::from("/home/user/data")
        );

        config.data_dir = Some(PathBuf::from("/var/stocks"));
        assert_eq!(
            config.resolve_data_dir(Path::new("/home/user")),
            PathBuf::from("/var/stocks")
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.portfolio_file, PathBuf::from("portfolio.json"));
        assert!(!config.session.auto_refresh);
        assert!(config.session.share_rounding);
        assert_eq!(config.session.theme, Theme::Light);
        assert_eq!(config.refresh.interval, Duration::from_secs(60));
        assert_eq!(config.market_data.providers, vec![ProviderKind::Yahoo]);
        assert_eq!(config.market_data.max_concurrent_requests, 4);
        assert_eq!(config.display.currency_symbol, "$");
    }

    #[test]
    fn test_load_full_config() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = std::fs::File::create(&path)?;
        writeln!(
            file,
            r#"
data_dir = "state"
export_dir = "/tmp/stock-exports"

[session]
auto_refresh = true
share_rounding = false
theme = "dark"

[refresh]
interval = "5m"

[market_data]
providers = ["alpha_vantage", "yahoo"]
request_timeout = "3s"
max_concurrent_requests = 2

[display]
currency_grouping = true
"#
        )?;

        let resolved = ResolvedConfig::load(&path)?;
        let root = dir.path().canonicalize()?;
        assert_eq!(resolved.data_dir, root.join("state"));
        assert_eq!(resolved.portfolio_path, root.join("state").join("portfolio.json"));
        assert_eq!(resolved.export_dir, PathBuf::from("/tmp/stock-exports"));
        assert!(resolved.session.auto_refresh);
        assert!(!resolved.session.share_rounding);
        assert_eq!(resolved.session.theme, Theme::Dark);
        assert_eq!(resolved.refresh.interval, Duration::from_secs(300));
        assert_eq!(
            resolved.market_data.providers,
            vec![ProviderKind::AlphaVantage, ProviderKind::Yahoo]
        );
        assert_eq!(resolved.market_data.request_timeout, Duration::from_secs(3));
        assert_eq!(resolved.market_data.max_concurrent_requests, 2);
        assert!(resolved.display.currency_grouping);
        Ok(())
    }

    #[test]
    fn test_zero_refresh_interval_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[refresh]\ninterval = \"0s\"\n")?;
        assert!(Config::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_load_or_default_missing_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let resolved = ResolvedConfig::load_or_default(&path)?;
        assert_eq!(resolved.data_dir, dir.path().join("nested"));
        assert_eq!(
            resolved.export_dir,
            dir.path().join("nested").join("exports")
        );
        Ok(())
    }

    #[test]
    fn test_serializes_durations_readably() -> Result<()> {
        let rendered = toml::to_string(&Config::default())?;
        assert!(rendered.contains(r#"interval = "1m""#));
        assert!(rendered.contains(r#"request_timeout = "10s""#));
        Ok(())
    }
}
