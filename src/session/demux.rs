//! Inbound message classification and event fan-out

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use serde_json::Value;

use super::pending::PendingCalls;
use crate::error::ClientError;
use crate::protocol::{BinaryFrame, Envelope, PopupRect};

/// Event kind of full-viewport frames.
pub const FRAME_KIND: &str = "Frame";

/// Event kind of popup overlay frames.
pub const POPUP_KIND: &str = "Popup";

/// A server-initiated event, not correlated to any request.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Textual event: `kind` is the envelope's `type` tag.
    Message { kind: String, data: Value },
    Frame(Bytes),
    Popup { rect: PopupRect, data: Bytes },
}

impl Event {
    pub fn kind(&self) -> &str {
        match self {
            Self::Message { kind, .. } => kind,
            Self::Frame(_) => FRAME_KIND,
            Self::Popup { .. } => POPUP_KIND,
        }
    }
}

impl From<BinaryFrame> for Event {
    fn from(frame: BinaryFrame) -> Self {
        match frame {
            BinaryFrame::Full(data) => Self::Frame(data),
            BinaryFrame::Popup { rect, data } => Self::Popup { rect, data },
        }
    }
}

/// A raw message as it came off the wire.
#[derive(Debug, Clone)]
pub enum Inbound {
    Text(String),
    Binary(Bytes),
}

pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Handle returned by [`Listeners::on`]; pass it back to [`Listeners::off`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    kind: String,
    id: ListenerId,
}

impl Subscription {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }
}

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    by_kind: HashMap<String, Vec<(ListenerId, Listener)>>,
}

/// Event kind → listeners, in registration order.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<Mutex<ListenerTable>>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.lock();
        let counts: HashMap<&str, usize> = table
            .by_kind
            .iter()
            .map(|(kind, listeners)| (kind.as_str(), listeners.len()))
            .collect();
        f.debug_struct("Listeners").field("by_kind", &counts).finish()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener for `kind`. Earlier listeners for the same kind are kept.
    pub fn on<F>(&self, kind: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let kind = kind.into();
        let mut table = self.lock();
        table.next_id += 1;
        let id = ListenerId(table.next_id);
        table
            .by_kind
            .entry(kind.clone())
            .or_default()
            .push((id, Arc::new(listener)));
        Subscription { kind, id }
    }

    /// Remove exactly the listener behind `subscription`.
    pub fn off(&self, subscription: &Subscription) -> bool {
        let mut table = self.lock();
        let Some(listeners) = table.by_kind.get_mut(&subscription.kind) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription.id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            table.by_kind.remove(&subscription.kind);
        }
        removed
    }

    /// Invoke every listener for the event's kind; returns how many ran.
    pub fn emit(&self, event: &Event) -> usize {
        // Snapshot so listeners may subscribe or unsubscribe while running.
        let listeners: Vec<Listener> = match self.lock().by_kind.get(event.kind()) {
            Some(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return 0,
        };
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.lock().by_kind.get(kind).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, ListenerTable> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Routes each inbound message to a pending call or to event listeners.
#[derive(Debug, Clone)]
pub struct Demultiplexer {
    pending: PendingCalls,
    listeners: Listeners,
}

impl Demultiplexer {
    pub fn new(pending: PendingCalls, listeners: Listeners) -> Self {
        Self { pending, listeners }
    }

    pub fn on_message(&self, raw: Inbound) {
        match raw {
            Inbound::Text(text) => self.on_text(&text),
            Inbound::Binary(bytes) => self.on_binary(bytes),
        }
    }

    fn on_text(&self, text: &str) {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed text message");
                return;
            }
        };

        let Envelope {
            id,
            result,
            error,
            kind,
            data,
        } = envelope;

        if let Some(id) = id {
            let outcome = match error {
                Some(error) => Err(ClientError::Remote {
                    message: error.message,
                    data: error.data,
                }),
                None => Ok(result.unwrap_or(Value::Null)),
            };
            if self.pending.settle(&id, outcome) {
                return;
            }
            if kind.is_none() {
                tracing::debug!(id = %id, "dropping response for unknown or expired call");
                return;
            }
        }

        let Some(kind) = kind else {
            tracing::debug!("dropping text message with neither id nor type");
            return;
        };
        self.dispatch(Event::Message {
            kind,
            data: data.unwrap_or(Value::Null),
        });
    }

    fn on_binary(&self, raw: Bytes) {
        match BinaryFrame::decode(raw) {
            Ok(frame) => self.dispatch(frame.into()),
            Err(e) => tracing::warn!(error = %e, "discarding binary message"),
        }
    }

    fn dispatch(&self, event: Event) {
        if self.listeners.emit(&event) == 0 {
            tracing::trace!(kind = event.kind(), "no listeners for event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::POPUP_FRAME;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn recorder() -> (Arc<StdMutex<Vec<String>>>, impl Fn(&'static str) -> Listener) {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let make = move |name: &'static str| -> Listener {
            let log = Arc::clone(&log_clone);
            Arc::new(move |event: &Event| {
                log.lock().unwrap().push(format!("{name}:{}", event.kind()));
            })
        };
        (log, make)
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let listeners = Listeners::new();
        let (log, make) = recorder();
        let first = make("first");
        let second = make("second");
        listeners.on("Title", move |e| first(e));
        let sub = listeners.on("Title", move |e| second(e));

        let event = Event::Message {
            kind: "Title".to_string(),
            data: json!("Google"),
        };
        assert_eq!(listeners.emit(&event), 2);
        assert_eq!(*log.lock().unwrap(), vec!["first:Title", "second:Title"]);

        assert!(listeners.off(&sub));
        assert_eq!(listeners.emit(&event), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:Title", "second:Title", "first:Title"]
        );
    }

    #[test]
    fn test_off_removes_only_given_listener() {
        let listeners = Listeners::new();
        let a = listeners.on("Url", |_| {});
        let b = listeners.on("Url", |_| {});
        let other = listeners.on("Title", |_| {});

        assert!(listeners.off(&a));
        assert!(!listeners.off(&a));
        assert_eq!(listeners.count("Url"), 1);
        assert_eq!(listeners.count("Title"), 1);

        assert!(listeners.off(&b));
        assert!(listeners.off(&other));
        assert_eq!(listeners.count("Url"), 0);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let listeners = Listeners::new();
        let slot: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));
        let (handle, slot_clone) = (listeners.clone(), Arc::clone(&slot));
        let sub = listeners.on("Closed", move |_| {
            if let Some(sub) = slot_clone.lock().unwrap().take() {
                handle.off(&sub);
            }
        });
        *slot.lock().unwrap() = Some(sub);

        let event = Event::Message {
            kind: "Closed".to_string(),
            data: Value::Null,
        };
        assert_eq!(listeners.emit(&event), 1);
        assert_eq!(listeners.emit(&event), 0);
    }

    #[tokio::test]
    async fn test_response_settles_pending_call_not_listeners() {
        let pending = PendingCalls::new();
        let listeners = Listeners::new();
        let demux = Demultiplexer::new(pending.clone(), listeners.clone());
        let (log, make) = recorder();
        let listener = make("any");
        listeners.on("Title", move |e| listener(e));

        let rx = pending.register("c-1", "getTitle");
        demux.on_message(Inbound::Text(
            r#"{"id": "c-1", "result": {"title": "Links"}}"#.to_string(),
        ));

        assert_eq!(rx.await.unwrap().unwrap(), json!({ "title": "Links" }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_response_becomes_remote_error() {
        let pending = PendingCalls::new();
        let demux = Demultiplexer::new(pending.clone(), Listeners::new());
        let rx = pending.register("c-1", "closeTab");

        demux.on_message(Inbound::Text(
            r#"{"id": "c-1", "error": {"message": "tab not found", "data": 4}}"#.to_string(),
        ));

        match rx.await.unwrap() {
            Err(ClientError::Remote { message, data }) => {
                assert_eq!(message, "tab not found");
                assert_eq!(data, Some(json!(4)));
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn test_unmatched_response_has_no_effect() {
        let pending = PendingCalls::new();
        let listeners = Listeners::new();
        let demux = Demultiplexer::new(pending.clone(), listeners.clone());
        let _rx = pending.register("c-1", "getUrl");
        let (log, make) = recorder();
        let listener = make("any");
        listeners.on("Url", move |e| listener(e));

        demux.on_message(Inbound::Text(r#"{"id": "stale", "result": 1}"#.to_string()));
        demux.on_message(Inbound::Text("{not json".to_string()));

        assert!(pending.contains("c-1"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_events_and_unknown_kinds() {
        let listeners = Listeners::new();
        let demux = Demultiplexer::new(PendingCalls::new(), listeners.clone());
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        listeners.on("Url", move |e| seen_clone.lock().unwrap().push(e.clone()));

        demux.on_message(Inbound::Text(r#"{"type": "Url", "data": "https://a.b"}"#.to_string()));
        demux.on_message(Inbound::Text(r#"{"type": "SomethingNew", "data": {}}"#.to_string()));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Event::Message {
                kind: "Url".to_string(),
                data: json!("https://a.b")
            }]
        );
    }

    #[test]
    fn test_binary_frames_reach_frame_and_popup_listeners() {
        let listeners = Listeners::new();
        let demux = Demultiplexer::new(PendingCalls::new(), listeners.clone());
        let seen = Arc::new(StdMutex::new(Vec::new()));
        for kind in [FRAME_KIND, POPUP_KIND] {
            let seen = Arc::clone(&seen);
            listeners.on(kind, move |e| seen.lock().unwrap().push(e.clone()));
        }

        demux.on_message(Inbound::Binary(Bytes::from_static(&[0, 1, 2, 3])));
        let mut popup = vec![POPUP_FRAME];
        for field in [10i32, 20, 100, 50] {
            popup.extend_from_slice(&field.to_le_bytes());
        }
        popup.extend_from_slice(&[0xee, 0xff]);
        demux.on_message(Inbound::Binary(Bytes::from(popup)));
        demux.on_message(Inbound::Binary(Bytes::from_static(&[1, 2])));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], Event::Frame(Bytes::from_static(&[1, 2, 3])));
        assert_eq!(
            seen[1],
            Event::Popup {
                rect: PopupRect {
                    x: 10,
                    y: 20,
                    width: 100,
                    height: 50
                },
                data: Bytes::from_static(&[0xee, 0xff]),
            }
        );
    }
}
