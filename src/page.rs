//! One isolated browsing context per requested live stream.
//!
//! A `LivePage` owns exactly one tab for the lifetime of one stream
//! request: navigation, liveness detection, extractor installation, and
//! periodic draining all happen against that tab, and releasing it is the
//! owner's responsibility (backed up by `Drop`).

use crate::config::Config;
use crate::events::LiveEvent;
use crate::extractor;
use crate::session::SessionManager;
use headless_chrome::Tab;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

const LIVE_URL_PREFIX: &str = "https://www.tiktok.com/@";

const LIVENESS_CHECK: &str = r#"!document.querySelector('[data-e2e="live-ended-modal"]')"#;
const AVATAR_SNAPSHOT: &str =
    r#"(document.querySelector('[data-e2e="live-user-avatar"] img') || {}).src || ''"#;
const LOGIN_INTERSTITIAL_CLOSE: &str = r#"[data-e2e="modal-close-inner-button"]"#;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("target is not live or the stream has ended")]
    NotLive,

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("page evaluation failed: {0}")]
    Dom(String),
}

pub struct LivePage {
    target: String,
    tab: Option<Arc<Tab>>,
    avatar_url: String,
}

impl LivePage {
    /// Opens the target's live page in a fresh authenticated tab. On any
    /// failure the tab is released before the error propagates.
    pub fn open(
        session: &SessionManager,
        target: &str,
        config: &Config,
    ) -> Result<Self, PageError> {
        let tab = session
            .new_page_tab()
            .map_err(|e| PageError::Navigation(e.to_string()))?;

        match connect(&tab, target, config) {
            Ok(avatar_url) => Ok(LivePage {
                target: target.to_string(),
                tab: Some(tab),
                avatar_url,
            }),
            Err(e) => {
                if let Err(close_err) = tab.close(true) {
                    log::debug!("Tab close after failed open: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Presenter avatar captured at open time, for the connected event.
    pub fn avatar_url(&self) -> &str {
        &self.avatar_url
    }

    /// Installs the in-page stats sampler and chat observer.
    pub fn install_extractor(&self) -> Result<(), PageError> {
        if let Some(tab) = &self.tab {
            tab.evaluate(extractor::INSTALL_SCRIPT, false)
                .map_err(dom_err)?;
        }
        Ok(())
    }

    /// Empties the in-page buffer and returns the normalized events. A
    /// closed page yields nothing.
    pub fn drain_events(&self) -> Result<Vec<LiveEvent>, PageError> {
        let tab = match &self.tab {
            Some(tab) => tab,
            None => return Ok(Vec::new()),
        };
        let result = tab.evaluate(extractor::DRAIN_SCRIPT, false).map_err(dom_err)?;
        let payload = result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .unwrap_or("[]");
        Ok(extractor::parse_drained(payload))
    }

    /// Releases the browsing context. Safe to call more than once; later
    /// calls are no-ops. Returns whether this call performed the release.
    pub fn close(&mut self) -> bool {
        match self.tab.take() {
            Some(tab) => {
                match tab.close(true) {
                    Ok(_) => log::info!("Closed live page for @{}", self.target),
                    Err(e) => log::warn!("Error closing live page for @{}: {}", self.target, e),
                }
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn detached(target: &str) -> Self {
        LivePage {
            target: target.to_string(),
            tab: None,
            avatar_url: String::new(),
        }
    }
}

impl Drop for LivePage {
    fn drop(&mut self) {
        self.close();
    }
}

fn connect(tab: &Arc<Tab>, target: &str, config: &Config) -> Result<String, PageError> {
    let url = format!("{}{}/live", LIVE_URL_PREFIX, target);
    log::info!("Navigating to @{}'s live page...", target);

    tab.navigate_to(&url)
        .map_err(nav_err)?
        .wait_until_navigated()
        .map_err(nav_err)?;
    tab.wait_for_element_with_custom_timeout("body", config.browser.page_timeout())
        .map_err(nav_err)?;

    // The live page hydrates client-side after the document loads.
    std::thread::sleep(config.browser.settle());

    // A login prompt sometimes covers the stream; dismissing it is
    // best-effort and its absence is the normal case.
    if let Ok(close_button) =
        tab.wait_for_element_with_custom_timeout(LOGIN_INTERSTITIAL_CLOSE, config.relay.interstitial_timeout())
    {
        if close_button.click().is_ok() {
            log::debug!("Dismissed login interstitial for @{}", target);
        }
    }

    let liveness = tab.evaluate(LIVENESS_CHECK, false).map_err(dom_err)?;
    if !matches!(liveness.value, Some(serde_json::Value::Bool(true))) {
        return Err(PageError::NotLive);
    }

    let avatar = tab.evaluate(AVATAR_SNAPSHOT, false).map_err(dom_err)?;
    let avatar_url = avatar
        .value
        .as_ref()
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    log::info!("Successfully connected to @{}'s live stream", target);
    Ok(avatar_url)
}

fn nav_err<E: fmt::Display>(e: E) -> PageError {
    PageError::Navigation(e.to_string())
}

fn dom_err<E: fmt::Display>(e: E) -> PageError {
    PageError::Dom(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_is_idempotent_once_released() {
        let mut page = LivePage::detached("someone");
        assert!(!page.close());
        assert!(!page.close());
    }

    #[test]
    fn test_drain_on_closed_page_is_empty() {
        let mut page = LivePage::detached("someone");
        page.close();
        assert!(page.drain_events().unwrap().is_empty());
    }

    #[test]
    fn test_not_live_error_is_user_safe() {
        // The message may end up in logs read next to client output; it
        // must not carry selectors or internal URLs.
        let message = PageError::NotLive.to_string();
        assert!(!message.contains("data-e2e"));
        assert!(!message.contains("http"));
    }
}
