//! In-page event extraction for TikTok live pages.
//!
//! The install script runs once inside the page context: it samples the
//! viewer/like counters on a fixed interval and watches the chat container
//! for inserted messages, queuing everything in a bounded in-page buffer.
//! The relay drains that buffer from outside the sandbox and converts the
//! raw records into [`LiveEvent`]s here, where the suffix notation used by
//! the counters (`12.3K`, `1.5M`) is normalized to plain integers.

use crate::events::{ChatUser, LiveEvent};
use serde::Deserialize;

/// Installed once per successful page open. Idempotent: a second evaluation
/// is a no-op. The chat observer only attaches when the message container
/// exists at install time; a container rendered later is never picked up.
pub const INSTALL_SCRIPT: &str = r#"
(() => {
    if (window.__liveRelayInstalled) return;
    window.__liveRelayInstalled = true;
    window.__liveRelayQueue = [];

    const push = (record) => {
        window.__liveRelayQueue.push(record);
        if (window.__liveRelayQueue.length > 500) {
            window.__liveRelayQueue.shift();
        }
    };

    const sampleStats = () => {
        const viewers = document.querySelector('[data-e2e="live-viewer-count"]')?.textContent || '0';
        const likes = document.querySelector('[data-e2e="like-count"]')?.textContent || '0';
        push({ kind: 'stats', viewers: viewers, likes: likes });
    };

    sampleStats();
    setInterval(sampleStats, 5000);

    const container = document.querySelector('[class*="webcast-im-message_container"]');
    if (container) {
        const observer = new MutationObserver((mutations) => {
            for (const mutation of mutations) {
                for (const node of mutation.addedNodes) {
                    if (node.nodeType !== Node.ELEMENT_NODE) continue;
                    const userEl = node.querySelector('[data-e2e="chat-message-username"]');
                    const textEl = node.querySelector('[data-e2e="chat-message-content"]');
                    if (!userEl || !textEl) continue;
                    const avatarEl = node.querySelector('img[class*="webcast-im-user-avatar"]');
                    push({
                        kind: 'comment',
                        id: 'c' + Date.now() + Math.random().toString(16).slice(2),
                        name: userEl.innerText.trim(),
                        avatar: avatarEl ? avatarEl.src : '',
                        text: textEl.innerText.trim()
                    });
                }
            }
        });
        observer.observe(container, { childList: true, subtree: true });
    }
})()
"#;

/// Empties the in-page buffer and returns its contents as a JSON string.
pub const DRAIN_SCRIPT: &str = r#"
(() => {
    const queue = window.__liveRelayQueue || [];
    window.__liveRelayQueue = [];
    return JSON.stringify(queue);
})()
"#;

/// Raw records as queued by the install script, before normalization.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum RawPageEvent {
    Stats {
        viewers: String,
        likes: String,
    },
    Comment {
        id: String,
        name: String,
        avatar: String,
        text: String,
    },
}

impl RawPageEvent {
    fn into_event(self) -> LiveEvent {
        match self {
            RawPageEvent::Stats { viewers, likes } => LiveEvent::Stats {
                viewers: parse_stat_count(&viewers),
                likes: parse_stat_count(&likes),
                shares: 0,
            },
            RawPageEvent::Comment {
                id,
                name,
                avatar,
                text,
            } => LiveEvent::Comment {
                id,
                user: ChatUser { name, avatar },
                comment: text,
            },
        }
    }
}

/// Converts one drained buffer payload into domain events. Unrecognized
/// records are skipped rather than failing the whole batch.
pub fn parse_drained(json: &str) -> Vec<LiveEvent> {
    let items: Vec<serde_json::Value> = match serde_json::from_str(json) {
        Ok(items) => items,
        Err(e) => {
            log::warn!("Discarding malformed extractor batch: {}", e);
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawPageEvent>(item) {
            Ok(raw) => Some(raw.into_event()),
            Err(e) => {
                log::debug!("Skipping unrecognized page record: {}", e);
                None
            }
        })
        .collect()
}

/// Normalizes a counter as displayed on the page: `K` scales by 1,000 and
/// `M` by 1,000,000 (truncating), plain integers parse directly, anything
/// unparsable is 0.
pub fn parse_stat_count(text: &str) -> u64 {
    let normalized = text.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return 0;
    }
    if let Some(mantissa) = normalized.strip_suffix('K') {
        return scale(mantissa, 1_000.0);
    }
    if let Some(mantissa) = normalized.strip_suffix('M') {
        return scale(mantissa, 1_000_000.0);
    }
    match normalized.parse::<u64>() {
        Ok(count) => count,
        // Fractional counts truncate; negatives and garbage clamp to 0.
        Err(_) => normalized.parse::<f64>().map(|f| f as u64).unwrap_or(0),
    }
}

fn scale(mantissa: &str, factor: f64) -> u64 {
    match mantissa.trim().parse::<f64>() {
        Ok(value) if value >= 0.0 => (value * factor) as u64,
        _ => 0,
    }
}
