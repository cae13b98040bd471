//! Shared browser lifecycle and TikTok authentication.
//!
//! One Chrome instance serves every stream request in the process. It is
//! launched eagerly at startup, authenticated once (cookie fast path with an
//! interactive login fallback), and only torn down when the process exits.
//! Failure to reach an authenticated state is fatal: without it no stream
//! can ever be served.

use crate::config::{self, Config, Credentials};
use crate::cookies::{CookieRecord, CookieStore};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const HOME_URL: &str = "https://www.tiktok.com";
const LOGIN_URL: &str = "https://www.tiktok.com/login/phone-or-email/email";

const LOGGED_IN_MARKER: &str = r#"[data-e2e="header-avatar"]"#;
const USERNAME_INPUT: &str = r#"input[name="username"]"#;
const PASSWORD_INPUT: &str = r#"input[name="password"]"#;
const LOGIN_BUTTON: &str = r#"button[data-e2e="login-button"]"#;

// Override navigator properties to avoid detection
const STEALTH_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined
    });
    Object.defineProperty(navigator, 'plugins', {
        get: () => [1, 2, 3, 4, 5]
    });
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en']
    });
"#;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("TIKTOK_USERNAME / TIKTOK_PASSWORD not set and no valid cookie session exists")]
    MissingCredentials,

    #[error("Login flow failed: {0}")]
    Login(String),

    #[error("Tab creation failed: {0}")]
    TabCreation(String),
}

/// Authentication progress. Transitions are logged so the fallback path is
/// auditable: NoSession -> Probing -> Authenticated on the cookie fast
/// path, NoSession/Probing -> LoggingIn -> Authenticated on the fallback,
/// and Fatal when neither route works.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NoSession,
    Probing,
    LoggingIn,
    Authenticated,
    Fatal,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthState::NoSession => "no-session",
            AuthState::Probing => "probing",
            AuthState::LoggingIn => "logging-in",
            AuthState::Authenticated => "authenticated",
            AuthState::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Owns the process-wide browser and the authenticated cookie snapshot.
/// The snapshot is read-only after initialization; page sessions get a
/// copy injected into their own isolated tab.
pub struct SessionManager {
    browser: Browser,
    cookies: Vec<CookieRecord>,
}

impl SessionManager {
    /// Launches the browser and walks the authentication state machine.
    /// Any error here means the process has no serving capacity.
    pub fn initialize(config: &Config) -> Result<Self, SessionError> {
        let browser = launch_browser(config)?;
        let store = CookieStore::new(&config.cookies_path);
        let cookies = authenticate(&browser, &store, config)?;
        Ok(SessionManager { browser, cookies })
    }

    /// Fresh isolated tab with the realistic user agent, the stealth
    /// overrides, and the shared auth cookies already applied. The caller
    /// owns the tab and must release it.
    pub fn new_page_tab(&self) -> Result<Arc<Tab>, SessionError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| SessionError::TabCreation(e.to_string()))?;
        prepare_tab(&tab)?;
        tab.set_cookies(
            self.cookies
                .iter()
                .map(CookieRecord::to_cookie_param)
                .collect(),
        )
        .map_err(|e| SessionError::TabCreation(e.to_string()))?;
        Ok(tab)
    }
}

fn launch_browser(config: &Config) -> Result<Browser, SessionError> {
    let args: Vec<&OsStr> = vec![
        OsStr::new("--disable-blink-features=AutomationControlled"),
        OsStr::new("--disable-dev-shm-usage"),
        OsStr::new("--no-sandbox"),
        OsStr::new("--disable-setuid-sandbox"),
    ];

    let launch_options = LaunchOptions::default_builder()
        .headless(config.browser.headless)
        .window_size(Some((config.browser.window_width, config.browser.window_height)))
        // The default idle timeout would reap the browser between requests.
        .idle_browser_timeout(Duration::from_secs(31_536_000))
        .args(args)
        .build()
        .map_err(|e| SessionError::Launch(e.to_string()))?;

    Browser::new(launch_options).map_err(|e| SessionError::Launch(e.to_string()))
}

fn prepare_tab(tab: &Arc<Tab>) -> Result<(), SessionError> {
    tab.set_user_agent(USER_AGENT, Some("en-US,en;q=0.9"), Some("Win32"))
        .map_err(|e| SessionError::TabCreation(e.to_string()))?;
    tab.evaluate(STEALTH_SCRIPT, false)
        .map_err(|e| SessionError::TabCreation(e.to_string()))?;
    Ok(())
}

fn authenticate(
    browser: &Browser,
    store: &CookieStore,
    config: &Config,
) -> Result<Vec<CookieRecord>, SessionError> {
    let mut state = AuthState::NoSession;
    log::info!("Auth state: {}", state);

    let tab = browser
        .new_tab()
        .map_err(|e| SessionError::TabCreation(e.to_string()))?;
    prepare_tab(&tab)?;

    let persisted = match store.load() {
        Ok(cookies) if !cookies.is_empty() => Some(cookies),
        Ok(_) => None,
        Err(e) => {
            log::info!("No reusable cookie session: {}", e);
            None
        }
    };

    if let Some(cookies) = persisted {
        state = AuthState::Probing;
        log::info!("Auth state: {} ({} persisted cookies)", state, cookies.len());
        match probe_session(&tab, &cookies, config.relay.probe_timeout()) {
            Ok(()) => {
                state = AuthState::Authenticated;
                log::info!("Auth state: {} (cookie session reused)", state);
                close_scratch_tab(&tab);
                return Ok(cookies);
            }
            Err(e) => log::warn!("Cookie session probe failed: {}", e),
        }
    }

    state = AuthState::LoggingIn;
    log::info!("Auth state: {}", state);

    let credentials = match config::login_credentials() {
        Some(credentials) => credentials,
        None => {
            log::error!("Auth state: {}", AuthState::Fatal);
            close_scratch_tab(&tab);
            return Err(SessionError::MissingCredentials);
        }
    };

    match perform_login(&tab, &credentials, config) {
        Ok(cookies) => {
            if let Err(e) = store.save(&cookies) {
                log::warn!("Could not persist cookie session: {}", e);
            }
            state = AuthState::Authenticated;
            log::info!(
                "Auth state: {} (fresh login, {} cookies persisted)",
                state,
                cookies.len()
            );
            close_scratch_tab(&tab);
            Ok(cookies)
        }
        Err(e) => {
            log::error!("Auth state: {}", AuthState::Fatal);
            close_scratch_tab(&tab);
            Err(e)
        }
    }
}

/// Injects the persisted cookies and checks for the logged-in marker on
/// the home page within the bounded probe window.
fn probe_session(
    tab: &Arc<Tab>,
    cookies: &[CookieRecord],
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    tab.set_cookies(cookies.iter().map(CookieRecord::to_cookie_param).collect())?;
    tab.navigate_to(HOME_URL)?.wait_until_navigated()?;
    tab.wait_for_element_with_custom_timeout(LOGGED_IN_MARKER, timeout)?;
    Ok(())
}

fn perform_login(
    tab: &Arc<Tab>,
    credentials: &Credentials,
    config: &Config,
) -> Result<Vec<CookieRecord>, SessionError> {
    log::info!("Performing full login...");

    tab.navigate_to(LOGIN_URL)
        .map_err(login_err)?
        .wait_until_navigated()
        .map_err(login_err)?;

    tab.wait_for_element(USERNAME_INPUT)
        .map_err(login_err)?
        .click()
        .map_err(login_err)?;
    tab.type_str(&credentials.username).map_err(login_err)?;

    tab.wait_for_element(PASSWORD_INPUT)
        .map_err(login_err)?
        .click()
        .map_err(login_err)?;
    tab.type_str(&credentials.password).map_err(login_err)?;

    tab.wait_for_element(LOGIN_BUTTON)
        .map_err(login_err)?
        .click()
        .map_err(login_err)?;
    tab.wait_until_navigated().map_err(login_err)?;

    tab.wait_for_element_with_custom_timeout(
        LOGGED_IN_MARKER,
        config.relay.login_probe_timeout(),
    )
    .map_err(login_err)?;

    let cookies = tab.get_cookies().map_err(login_err)?;
    Ok(cookies.iter().map(CookieRecord::from_cdp).collect())
}

fn login_err<E: fmt::Display>(e: E) -> SessionError {
    SessionError::Login(e.to_string())
}

fn close_scratch_tab(tab: &Arc<Tab>) {
    if let Err(e) = tab.close(true) {
        log::debug!("Scratch tab close failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_state_display() {
        assert_eq!(AuthState::NoSession.to_string(), "no-session");
        assert_eq!(AuthState::Probing.to_string(), "probing");
        assert_eq!(AuthState::LoggingIn.to_string(), "logging-in");
        assert_eq!(AuthState::Authenticated.to_string(), "authenticated");
        assert_eq!(AuthState::Fatal.to_string(), "fatal");
    }

    #[test]
    fn test_user_agent_is_a_desktop_chrome() {
        assert!(USER_AGENT.contains("Chrome/"));
        assert!(USER_AGENT.contains("Windows NT"));
    }
}
