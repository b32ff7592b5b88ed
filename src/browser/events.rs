//! Typed view over a tab's event stream

use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use super::types::LoadState;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::protocol::PopupRect;
use crate::session::{Client, CloseReason, Event, Subscription, FRAME_KIND, POPUP_KIND};

pub const TITLE: &str = "Title";
pub const URL: &str = "Url";
pub const FAVICON: &str = "Favicon";
pub const CURSOR: &str = "Cursor";
pub const NEW_TAB: &str = "NewTab";
pub const LOAD_STATE: &str = "LoadState";
pub const URL_HOVERED: &str = "UrlHovered";
pub const CLOSED: &str = "Closed";

/// Every event kind a tab stream carries.
pub const ALL_KINDS: [&str; 10] = [
    TITLE,
    URL,
    FAVICON,
    CURSOR,
    NEW_TAB,
    LOAD_STATE,
    URL_HOVERED,
    CLOSED,
    FRAME_KIND,
    POPUP_KIND,
];

#[derive(Debug, Clone, PartialEq)]
pub enum TabEvent {
    Title(String),
    Url(String),
    Favicon(String),
    Cursor(String),
    NewTab(String),
    LoadState(LoadState),
    UrlHovered { url: String, hovered: bool },
    Closed,
    Frame(Bytes),
    Popup { rect: PopupRect, data: Bytes },
}

#[derive(Deserialize)]
struct HoveredUrl {
    url: String,
    hovered: bool,
}

impl TabEvent {
    /// `Ok(None)` for kinds this client does not know.
    pub fn from_event(event: &Event) -> Result<Option<Self>> {
        let (kind, data) = match event {
            Event::Frame(data) => return Ok(Some(Self::Frame(data.clone()))),
            Event::Popup { rect, data } => {
                return Ok(Some(Self::Popup {
                    rect: *rect,
                    data: data.clone(),
                }))
            }
            Event::Message { kind, data } => (kind.as_str(), data),
        };

        let event = match kind {
            TITLE => Self::Title(decode(data)?),
            URL => Self::Url(decode(data)?),
            FAVICON => Self::Favicon(decode(data)?),
            CURSOR => Self::Cursor(decode(data)?),
            NEW_TAB => Self::NewTab(decode(data)?),
            LOAD_STATE => Self::LoadState(decode(data)?),
            URL_HOVERED => {
                let HoveredUrl { url, hovered } = decode(data)?;
                Self::UrlHovered { url, hovered }
            }
            CLOSED => Self::Closed,
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: &Value) -> Result<T> {
    T::deserialize(data).map_err(ClientError::from)
}

/// Event stream URL of a tab: the control URL with its `/browser` suffix
/// replaced by `/tab/<id>`.
pub fn tab_stream_url(control_url: &str, tab_id: i32) -> String {
    let base = control_url.trim_end_matches('/');
    let base = base.strip_suffix("/browser").unwrap_or(base);
    format!("{base}/tab/{tab_id}")
}

/// Subscriptions on one tab's event session.
#[derive(Debug, Clone)]
pub struct TabEvents {
    tab_id: i32,
    client: Client,
}

impl TabEvents {
    /// Open the event session for `tab_id`, derived from the control URL in `config`.
    pub async fn connect(config: &ClientConfig, tab_id: i32) -> Result<Self> {
        let mut config = config.clone();
        config.url = tab_stream_url(&config.url, tab_id);
        let client = Client::connect(config).await?;
        Ok(Self { tab_id, client })
    }

    /// Wrap an already running session.
    pub fn from_client(tab_id: i32, client: Client) -> Self {
        Self { tab_id, client }
    }

    pub fn tab_id(&self) -> i32 {
        self.tab_id
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Every known event, typed. Returns one subscription per kind.
    pub fn on<F>(&self, listener: F) -> Vec<Subscription>
    where
        F: Fn(TabEvent) + Send + Sync + Clone + 'static,
    {
        ALL_KINDS
            .iter()
            .map(|kind| self.typed(kind, listener.clone(), Some))
            .collect()
    }

    pub fn off(&self, subscription: &Subscription) -> bool {
        self.client.off(subscription)
    }

    pub fn on_title<F>(&self, listener: F) -> Subscription
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.typed(TITLE, listener, |event| match event {
            TabEvent::Title(title) => Some(title),
            _ => None,
        })
    }

    pub fn on_url<F>(&self, listener: F) -> Subscription
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.typed(URL, listener, |event| match event {
            TabEvent::Url(url) => Some(url),
            _ => None,
        })
    }

    pub fn on_favicon<F>(&self, listener: F) -> Subscription
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.typed(FAVICON, listener, |event| match event {
            TabEvent::Favicon(url) => Some(url),
            _ => None,
        })
    }

    pub fn on_cursor<F>(&self, listener: F) -> Subscription
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.typed(CURSOR, listener, |event| match event {
            TabEvent::Cursor(cursor) => Some(cursor),
            _ => None,
        })
    }

    pub fn on_new_tab<F>(&self, listener: F) -> Subscription
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.typed(NEW_TAB, listener, |event| match event {
            TabEvent::NewTab(url) => Some(url),
            _ => None,
        })
    }

    pub fn on_load_state<F>(&self, listener: F) -> Subscription
    where
        F: Fn(LoadState) + Send + Sync + 'static,
    {
        self.typed(LOAD_STATE, listener, |event| match event {
            TabEvent::LoadState(state) => Some(state),
            _ => None,
        })
    }

    /// Called with `(url, hovered)`.
    pub fn on_url_hovered<F>(&self, listener: F) -> Subscription
    where
        F: Fn(String, bool) + Send + Sync + 'static,
    {
        self.typed(
            URL_HOVERED,
            move |(url, hovered)| listener(url, hovered),
            |event| match event {
                TabEvent::UrlHovered { url, hovered } => Some((url, hovered)),
                _ => None,
            },
        )
    }

    pub fn on_closed<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.typed(CLOSED, move |()| listener(), |event| match event {
            TabEvent::Closed => Some(()),
            _ => None,
        })
    }

    pub fn on_frame<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        self.typed(FRAME_KIND, listener, |event| match event {
            TabEvent::Frame(data) => Some(data),
            _ => None,
        })
    }

    pub fn on_popup<F>(&self, listener: F) -> Subscription
    where
        F: Fn(PopupRect, Bytes) + Send + Sync + 'static,
    {
        self.typed(
            POPUP_KIND,
            move |(rect, data)| listener(rect, data),
            |event| match event {
                TabEvent::Popup { rect, data } => Some((rect, data)),
                _ => None,
            },
        )
    }

    /// Resolves when the event session closes for good.
    pub async fn closed(&self) -> CloseReason {
        self.client.closed().await
    }

    pub async fn close(&self) {
        self.client.close().await;
    }

    fn typed<T, F, P>(&self, kind: &str, listener: F, project: P) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
        P: Fn(TabEvent) -> Option<T> + Send + Sync + 'static,
    {
        let tab_id = self.tab_id;
        self.client.on(kind, move |event| match TabEvent::from_event(event) {
            Ok(Some(typed)) => {
                if let Some(value) = project(typed) {
                    listener(value);
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(tab_id, kind = event.kind(), error = %e, "malformed tab event");
            }
        })
    }
}
