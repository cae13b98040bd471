use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Where the serialized authentication cookies live.
    #[serde(default = "default_cookies_path")]
    pub cookies_path: String,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub relay: RelaySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserSettings {
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Upper bound on per-page navigation and element waits, in seconds.
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Extra wait after load for the live page to hydrate, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelaySettings {
    /// Bounded wait for the logged-in marker when reusing cookies.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Bounded wait for the logged-in marker after a fresh login.
    #[serde(default = "default_login_probe_timeout")]
    pub login_probe_timeout_secs: u64,

    /// Bounded wait for the login interstitial before giving up on it.
    #[serde(default = "default_interstitial_timeout")]
    pub interstitial_timeout_secs: u64,

    /// How often the relay drains the in-page event buffer, in milliseconds.
    #[serde(default = "default_drain_interval")]
    pub drain_interval_ms: u64,
}

fn default_cookies_path() -> String {
    "tiktok_cookies.json".to_string()
}
fn default_true() -> bool {
    true
}
fn default_window_width() -> u32 {
    1920
}
fn default_window_height() -> u32 {
    1080
}
fn default_page_timeout() -> u64 {
    30
}
fn default_settle_ms() -> u64 {
    2500
}
fn default_probe_timeout() -> u64 {
    10
}
fn default_login_probe_timeout() -> u64 {
    15
}
fn default_interstitial_timeout() -> u64 {
    3
}
fn default_drain_interval() -> u64 {
    1000
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            page_timeout_secs: 30,
            settle_ms: 2500,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 10,
            login_probe_timeout_secs: 15,
            interstitial_timeout_secs: 3,
            drain_interval_ms: 1000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cookies_path: default_cookies_path(),
            browser: BrowserSettings::default(),
            relay: RelaySettings::default(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let path = Path::new("config.toml");
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                if let Ok(cfg) = toml::from_str::<Config>(&content) {
                    return cfg;
                }
            }
        }
        Self::default()
    }
}

impl BrowserSettings {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl RelaySettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn login_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.login_probe_timeout_secs)
    }

    pub fn interstitial_timeout(&self) -> Duration {
        Duration::from_secs(self.interstitial_timeout_secs)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}

/// Login secrets for the interactive fallback. Supplied via the process
/// environment only; the config file never carries them.
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub fn login_credentials() -> Option<Credentials> {
    let username = std::env::var("TIKTOK_USERNAME").ok()?;
    let password = std::env::var("TIKTOK_PASSWORD").ok()?;
    if username.is_empty() || password.is_empty() {
        return None;
    }
    Some(Credentials { username, password })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.cookies_path, "tiktok_cookies.json");
        assert!(cfg.browser.headless);
        assert_eq!(cfg.relay.probe_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.relay.login_probe_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.relay.drain_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            cookies_path = "custom_cookies.json"

            [browser]
            headless = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.cookies_path, "custom_cookies.json");
        assert!(!cfg.browser.headless);
        assert_eq!(cfg.browser.window_width, 1920);
        assert_eq!(cfg.relay.drain_interval_ms, 1000);
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.browser.page_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.relay.interstitial_timeout(), Duration::from_secs(3));
    }
}
