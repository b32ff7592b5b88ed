//! Browser and tab commands on top of a protocol session

mod events;
mod tab;
mod types;

pub use events::{tab_stream_url, TabEvent, TabEvents, ALL_KINDS};
pub use tab::Tab;
pub use types::{ClickableElement, KeyInput, LoadState, LoadStatus, MouseButton, OpenTabOptions};

use serde_json::json;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::protocol::Scope;
use crate::session::{Client, CloseReason};
use types::{OpenedTab, SessionUrls, TabList};

/// The remote browser as a whole.
#[derive(Debug, Clone)]
pub struct Browser {
    client: Client,
}

impl Browser {
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let client = Client::connect(config).await?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn open_tab(&self, options: OpenTabOptions) -> Result<Tab> {
        let config = self.client.config();
        let url = options.url.unwrap_or_else(|| config.default_url.clone());
        let (width, height) = options
            .size
            .unwrap_or((config.default_width, config.default_height));

        let opened: OpenedTab = self
            .client
            .call_as(
                Scope::Global,
                "openTab",
                json!({
                    "url": url,
                    "wait_until_loaded": options.wait_until_loaded,
                    "width": width,
                    "height": height,
                }),
            )
            .await?;
        tracing::debug!(tab_id = opened.id, url = %url, "tab opened");
        Ok(self.tab(opened.id))
    }

    /// Handle for an existing tab id. No request is made.
    pub fn tab(&self, id: i32) -> Tab {
        Tab::new(id, self.client.clone())
    }

    pub async fn tabs(&self) -> Result<Vec<i32>> {
        let list: TabList = self.client.call_as(Scope::Global, "getTabs", json!({})).await?;
        Ok(list.tabs)
    }

    pub async fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.client
            .call(Scope::Global, "resize", json!({ "width": width, "height": height }))
            .await?;
        Ok(())
    }

    /// URLs of the tabs restored from the server's previous session.
    pub async fn restore_session(&self) -> Result<Vec<String>> {
        let restored: SessionUrls = self
            .client
            .call_as(Scope::Global, "restoreSession", json!({}))
            .await?;
        Ok(restored.urls)
    }

    /// Ask the server to shut the browser down, then end the session.
    pub async fn close(&self) -> Result<()> {
        let sent = self.client.tell(Scope::Global, "close", json!({}));
        self.client.close().await;
        sent
    }

    pub async fn closed(&self) -> CloseReason {
        self.client.closed().await
    }
}
