//! Persisted authentication cookies.
//!
//! The credential store is a JSON array of cookie records on disk. It is
//! read once at session-manager startup and rewritten after a fresh login;
//! a missing or malformed file is not fatal, it just forces the login
//! fallback.

use headless_chrome::protocol::cdp::Network;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// One persisted cookie. Only the fields needed to rehydrate a TikTok
/// session are kept; everything else the browser reports is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, rename = "httpOnly")]
    pub http_only: bool,
}

fn default_path() -> String {
    "/".to_string()
}

impl CookieRecord {
    /// Maps a cookie reported by the browser into its persisted form.
    /// Session cookies come back with a negative expiry; store those as
    /// expiry-less so they round-trip cleanly.
    pub fn from_cdp(cookie: &Network::Cookie) -> Self {
        CookieRecord {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
            expires: if cookie.expires >= 0.0 {
                Some(cookie.expires)
            } else {
                None
            },
            secure: cookie.secure,
            http_only: cookie.http_only,
        }
    }

    /// Builds the injection parameter for a fresh browsing context.
    pub fn to_cookie_param(&self) -> Network::CookieParam {
        Network::CookieParam {
            name: self.name.clone(),
            value: self.value.clone(),
            url: None,
            domain: Some(self.domain.clone()),
            path: Some(self.path.clone()),
            secure: Some(self.secure),
            http_only: Some(self.http_only),
            same_site: None,
            expires: self.expires,
            priority: None,
            same_party: None,
            source_scheme: None,
            source_port: None,
            partition_key: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cookie store unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("cookie store malformed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// File-backed credential store.
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CookieStore { path: path.into() }
    }

    pub fn load(&self) -> Result<Vec<CookieRecord>, StoreError> {
        let content = fs::read_to_string(&self.path)?;
        let cookies: Vec<CookieRecord> = serde_json::from_str(&content)?;
        Ok(cookies)
    }

    pub fn save(&self, cookies: &[CookieRecord]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(cookies)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cookie() -> CookieRecord {
        CookieRecord {
            name: "sessionid".to_string(),
            value: "abc123".to_string(),
            domain: ".tiktok.com".to_string(),
            path: "/".to_string(),
            expires: Some(1_900_000_000.0),
            secure: true,
            http_only: true,
        }
    }

    #[test]
    fn test_store_roundtrip() {
        let path = std::env::temp_dir().join("live_scraper_cookie_roundtrip.json");
        let store = CookieStore::new(&path);
        let cookies = vec![sample_cookie()];

        store.save(&cookies).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, cookies);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_store_is_an_error_not_a_panic() {
        let store = CookieStore::new("/nonexistent/dir/cookies.json");
        assert!(matches!(store.load(), Err(StoreError::Io(_))));
    }

    #[test]
    fn test_malformed_store_is_a_parse_error() {
        let path = std::env::temp_dir().join("live_scraper_cookie_malformed.json");
        fs::write(&path, "{ not json").unwrap();
        let store = CookieStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Parse(_))));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_record_defaults_fill_optional_fields() {
        let minimal = r#"[{"name": "tt_csrf", "value": "x", "domain": ".tiktok.com"}]"#;
        let cookies: Vec<CookieRecord> = serde_json::from_str(minimal).unwrap();
        assert_eq!(cookies[0].path, "/");
        assert_eq!(cookies[0].expires, None);
        assert!(!cookies[0].secure);
        assert!(!cookies[0].http_only);
    }

    #[test]
    fn test_cookie_param_carries_domain_and_expiry() {
        let param = sample_cookie().to_cookie_param();
        assert_eq!(param.name, "sessionid");
        assert_eq!(param.domain.as_deref(), Some(".tiktok.com"));
        assert_eq!(param.expires, Some(1_900_000_000.0));
        assert_eq!(param.http_only, Some(true));
    }
}
