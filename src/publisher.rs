//! Cancellable relay between a live page and one SSE client.
//!
//! Each stream request gets its own blocking pump: open the page, emit the
//! connected acknowledgment, install the extractor, then drain-and-forward
//! until the client disconnects or the page dies. Events cross into the
//! async world over an unbounded channel; the HTTP layer turns the
//! receiving side into the SSE response body.
//!
//! Lifecycle per stream: Idle -> Opening -> (Streaming -> Closed) or
//! (Failed -> Closed). Closed is terminal; a stream is never reopened.

use crate::config::Config;
use crate::events::LiveEvent;
use crate::metrics::RelayMetrics;
use crate::page::LivePage;
use crate::session::SessionManager;
use actix_web::web::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};

/// Spawns the scrape-and-relay pump for one stream request and hands back
/// the event channel. The pump runs on the blocking pool; dropping the
/// receiver is the cancellation signal.
pub fn spawn_stream(
    session: Arc<SessionManager>,
    target: String,
    metrics: RelayMetrics,
    config: Config,
) -> UnboundedReceiver<LiveEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || run_pump(session, target, tx, metrics, config));
    rx
}

/// Queues one event for the client. A send racing a client disconnect is
/// swallowed; the pump notices the closed channel on its next cycle.
pub fn enqueue(tx: &UnboundedSender<LiveEvent>, event: LiveEvent) -> bool {
    tx.send(event).is_ok()
}

/// One `data: <json>\n\n` frame per event, flushed as produced.
pub fn sse_frame(event: &LiveEvent) -> Bytes {
    match serde_json::to_string(event) {
        Ok(json) => Bytes::from(format!("data: {}\n\n", json)),
        Err(e) => {
            log::error!("Event serialization failed: {}", e);
            Bytes::new()
        }
    }
}

/// Adapts the pump's channel into a streaming SSE body.
pub fn sse_body(
    rx: UnboundedReceiver<LiveEvent>,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    UnboundedReceiverStream::new(rx).map(|event| Ok(sse_frame(&event)))
}

fn run_pump(
    session: Arc<SessionManager>,
    target: String,
    tx: UnboundedSender<LiveEvent>,
    metrics: RelayMetrics,
    config: Config,
) {
    metrics.record_stream_started(&target);

    let mut page = match LivePage::open(&session, &target, &config) {
        Ok(page) => page,
        Err(e) => {
            log::warn!("Could not open live page for @{}: {}", target, e);
            metrics.record_stream_failed(&target, &e.to_string());
            enqueue(&tx, LiveEvent::stream_error());
            return;
        }
    };

    enqueue(&tx, LiveEvent::connected(&target, page.avatar_url()));

    if let Err(e) = page.install_extractor() {
        log::error!("Extractor install failed for @{}: {}", target, e);
        metrics.record_stream_failed(&target, &e.to_string());
        enqueue(&tx, LiveEvent::stream_error());
        page.close();
        metrics.record_stream_closed(&target);
        return;
    }

    log::info!("Streaming events for @{}", target);

    loop {
        std::thread::sleep(config.relay.drain_interval());

        if tx.is_closed() {
            log::info!("Client for @{} disconnected", target);
            break;
        }

        match page.drain_events() {
            Ok(events) => {
                metrics.record_events_relayed(&target, events.len() as u64);
                for event in events {
                    if !enqueue(&tx, event) {
                        // Disconnect race; the next cycle exits the loop.
                        break;
                    }
                }
            }
            Err(e) => {
                log::error!("Event drain failed for @{}: {}", target, e);
                metrics.record_stream_failed(&target, &e.to_string());
                enqueue(&tx, LiveEvent::stream_error());
                break;
            }
        }
    }

    page.close();
    metrics.record_stream_closed(&target);
}
