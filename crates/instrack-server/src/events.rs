//! Per-session scrape progress events and the bus that fans them out.
//!
//! Producers (scrape requests) and the single live consumer (the SSE stream)
//! are decoupled per session key. The bus holds no history: an event emitted
//! with nobody listening is dropped, and late subscribers see nothing from
//! before their registration. Durable state lives in `scrape_logs`, not here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Stale registrations are dropped after this long, a safety net for
/// listeners whose stream never deregistered.
pub const LISTENER_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeEventKind {
    Start,
    Progress,
    Success,
    Error,
}

impl ScrapeEventKind {
    /// Wire name, also used as the SSE event name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScrapeEventKind::Start => "start",
            ScrapeEventKind::Progress => "progress",
            ScrapeEventKind::Success => "success",
            ScrapeEventKind::Error => "error",
        }
    }
}

/// Optional counters attached to a progress or terminal event.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeEventData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posts_scraped: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_posts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_post: Option<String>,
}

/// One progress event, stamped at emission time.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeEvent {
    #[serde(rename = "type")]
    pub kind: ScrapeEventKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ScrapeEventData>,
}

struct Listener {
    id: u64,
    tx: mpsc::UnboundedSender<ScrapeEvent>,
}

/// Handle returned by [`EventBus::subscribe`]. Dropping the receiver alone
/// does not deregister — call [`EventBus::unsubscribe`] with `listener_id`
/// (the SSE stream does this from a drop guard).
pub struct Subscription {
    pub listener_id: u64,
    pub rx: mpsc::UnboundedReceiver<ScrapeEvent>,
}

struct BusInner {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
}

/// Session-keyed fan-out of [`ScrapeEvent`]s.
///
/// Constructed once at startup and cloned into the router state; clones share
/// the same registry. The map supports concurrent registration, removal, and
/// emission; the lock is never held across an await point.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers a listener for `session_id` and schedules its automatic
    /// removal after [`LISTENER_TTL`] in case it is never deregistered.
    pub fn subscribe(&self, session_id: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        self.lock()
            .entry(session_id.to_owned())
            .or_default()
            .push(Listener { id, tx });

        // Weak handle so a dormant expiry task never keeps the bus alive.
        let bus = Arc::downgrade(&self.inner);
        let expiry_session = session_id.to_owned();
        tokio::spawn(async move {
            tokio::time::sleep(LISTENER_TTL).await;
            if let Some(inner) = bus.upgrade() {
                if Self::remove_listener(&inner, &expiry_session, id) {
                    tracing::warn!(session_id = %expiry_session, "expired stale scrape listener");
                }
            }
        });

        Subscription {
            listener_id: id,
            rx,
        }
    }

    /// Removes one listener. The session entry is evicted entirely once its
    /// listener set empties. Returns whether the listener was still present.
    pub fn unsubscribe(&self, session_id: &str, listener_id: u64) -> bool {
        Self::remove_listener(&self.inner, session_id, listener_id)
    }

    /// Stamps `message` with the current time and delivers it to every
    /// listener currently registered for `session_id`. With no listeners the
    /// event is silently dropped; the bus never buffers. A failed delivery
    /// to one listener is logged and does not affect the others.
    pub fn emit(
        &self,
        session_id: &str,
        kind: ScrapeEventKind,
        message: impl Into<String>,
        data: Option<ScrapeEventData>,
    ) {
        let event = ScrapeEvent {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
            data,
        };

        let listeners = self.lock();
        let Some(session) = listeners.get(session_id) else {
            return;
        };

        for listener in session {
            if listener.tx.send(event.clone()).is_err() {
                tracing::warn!(
                    session_id = %session_id,
                    listener_id = listener.id,
                    "failed to deliver scrape event; receiver dropped"
                );
            }
        }
    }

    /// `true` iff at least one listener is registered for `session_id`.
    #[must_use]
    pub fn has_listeners(&self, session_id: &str) -> bool {
        self.lock().get(session_id).is_some_and(|s| !s.is_empty())
    }

    fn remove_listener(inner: &BusInner, session_id: &str, listener_id: u64) -> bool {
        let mut listeners = inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(session) = listeners.get_mut(session_id) else {
            return false;
        };

        let before = session.len();
        session.retain(|l| l.id != listener_id);
        let removed = session.len() < before;
        if session.is_empty() {
            listeners.remove(session_id);
        }
        removed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Listener>>> {
        // A poisoning panic inside these short critical sections would be a
        // bug elsewhere; recover the guard rather than cascading the panic.
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
