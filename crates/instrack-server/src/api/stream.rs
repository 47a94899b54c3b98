//! Live scrape progress over SSE.
//!
//! One long-lived connection per session id. Every bus event addressed to the
//! session is relayed as a named SSE message (event name = the event type,
//! payload = the JSON-encoded event); a synthetic `ping` keeps intermediaries
//! from closing the idle connection. The connection is capped at one hour.
//! Client disconnect drops the stream, whose guard deregisters the listener;
//! an in-flight scrape keeps running and persisting regardless.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use futures::Stream;

use crate::events::{EventBus, ScrapeEvent, Subscription};

use super::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const STREAM_TTL: Duration = Duration::from_secs(60 * 60);

/// `GET /api/v1/scrape/stream/{session_id}`
pub async fn scrape_stream(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(session_id = %session_id, "scrape stream opened");
    let subscription = state.events.subscribe(&session_id);
    Sse::new(event_stream(state.events.clone(), session_id, subscription))
}

fn event_stream(
    bus: EventBus,
    session_id: String,
    subscription: Subscription,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let Subscription {
        listener_id,
        mut rx,
    } = subscription;
    // Owned by the generator from construction on, so a stream dropped
    // before its first poll still deregisters.
    let guard = StreamGuard {
        bus,
        session_id: session_id.clone(),
        listener_id,
    };

    async_stream::stream! {
        let _guard = guard;

        let deadline = tokio::time::sleep(STREAM_TTL);
        tokio::pin!(deadline);
        // First tick only after a full interval; the connection starts silent.
        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
            HEARTBEAT_INTERVAL,
        );

        loop {
            tokio::select! {
                () = &mut deadline => {
                    tracing::debug!(session_id = %session_id, "scrape stream hit its lifetime cap");
                    break;
                }
                _ = heartbeat.tick() => {
                    yield Ok(Event::default().event("ping").data("ping"));
                }
                maybe = rx.recv() => match maybe {
                    Some(event) => yield Ok(sse_event(&event)),
                    // Sender gone: the registration was expired by the bus.
                    None => break,
                },
            }
        }
    }
}

fn sse_event(event: &ScrapeEvent) -> Event {
    let payload = serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to encode scrape event");
        "{}".to_string()
    });
    Event::default().event(event.kind.as_str()).data(payload)
}

/// Deregisters the listener when the stream is dropped: on client
/// disconnect, the lifetime cap, or server shutdown.
struct StreamGuard {
    bus: EventBus,
    session_id: String,
    listener_id: u64,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.session_id, self.listener_id);
        tracing::debug!(session_id = %self.session_id, "scrape stream listener removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ScrapeEventKind, LISTENER_TTL};
    use futures::StreamExt;

    fn stream_for(
        bus: &EventBus,
        session_id: &str,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> {
        let subscription = bus.subscribe(session_id);
        Box::pin(event_stream(
            bus.clone(),
            session_id.to_string(),
            subscription,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn relays_bus_events_in_emission_order() {
        let bus = EventBus::new();
        let mut stream = stream_for(&bus, "s1");

        bus.emit("s1", ScrapeEventKind::Start, "one", None);
        bus.emit("s1", ScrapeEventKind::Progress, "two", None);

        let first = stream.next().await.expect("item").expect("event");
        let second = stream.next().await.expect("item").expect("event");
        // Event exposes no accessors; assert on its Debug rendering.
        assert!(format!("{first:?}").contains("start"));
        assert!(format!("{second:?}").contains("progress"));
    }

    #[tokio::test(start_paused = true)]
    async fn emits_ping_heartbeats_while_idle() {
        let bus = EventBus::new();
        let mut stream = stream_for(&bus, "s1");

        // Nothing emitted: the first item must be the 30-second heartbeat.
        let item = stream.next().await.expect("item").expect("event");
        assert!(format!("{item:?}").contains("ping"));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_ends_at_the_lifetime_cap() {
        let bus = EventBus::new();
        let mut stream = stream_for(&bus, "s1");

        // Consume heartbeats until the deadline wins; the stream must finish
        // rather than run forever. 1 hour / 30 s = 120 heartbeats at most.
        let mut items = 0;
        while stream.next().await.is_some() {
            items += 1;
            assert!(items <= 121, "stream failed to terminate at the cap");
        }
        assert!(!bus.has_listeners("s1"), "guard deregisters on stream end");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_stream_deregisters_the_listener() {
        let bus = EventBus::new();
        let stream = stream_for(&bus, "s1");

        // The subscription happens on construction, before any polling.
        assert!(bus.has_listeners("s1"));
        drop(stream);
        assert!(!bus.has_listeners("s1"));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_ends_when_the_registration_expires() {
        let bus = EventBus::new();
        let mut stream = stream_for(&bus, "s1");

        // Both the stream cap and the bus-side TTL are one hour; advance past
        // them and drain until the stream terminates by whichever fired.
        tokio::time::sleep(LISTENER_TTL + Duration::from_secs(2)).await;
        let mut saw_end = false;
        for _ in 0..200 {
            if stream.next().await.is_none() {
                saw_end = true;
                break;
            }
        }
        assert!(saw_end, "stream must terminate once its hour is up");
        assert!(!bus.has_listeners("s1"));
    }
}
