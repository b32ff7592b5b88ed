use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use super::events::TabEvents;
use super::types::{
    ClickableElement, ClickableElements, DomResult, KeyInput, MouseButton, ScreenshotResult,
    TitleResult, UrlResult,
};
use crate::error::{ClientError, Result};
use crate::protocol::Scope;
use crate::session::Client;

/// One remote tab, addressed through the browser's control session.
#[derive(Debug, Clone)]
pub struct Tab {
    id: i32,
    client: Client,
}

impl Tab {
    pub(crate) fn new(id: i32, client: Client) -> Self {
        Self { id, client }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub async fn title(&self) -> Result<String> {
        let result: TitleResult = self.call_as("getTitle", json!({})).await?;
        Ok(result.title)
    }

    pub async fn url(&self) -> Result<String> {
        let result: UrlResult = self.call_as("getUrl", json!({})).await?;
        Ok(result.url)
    }

    pub async fn navigate(&self, url: &str, wait_until_loaded: bool) -> Result<()> {
        self.call(
            "navigate",
            json!({ "url": url, "wait_until_loaded": wait_until_loaded }),
        )
        .await
    }

    /// PNG bytes of the current viewport, optionally rendered at `size`.
    pub async fn screenshot(&self, size: Option<(u32, u32)>) -> Result<Vec<u8>> {
        let params = match size {
            Some((width, height)) => json!({ "size": [width, height] }),
            None => json!({}),
        };
        let result: ScreenshotResult = self.call_as("screenshot", params).await?;
        STANDARD
            .decode(result.screenshot.as_bytes())
            .map_err(|e| ClientError::Protocol(format!("screenshot is not valid base64: {e}")))
    }

    pub async fn click(&self, x: i32, y: i32, button: MouseButton, down: bool) -> Result<()> {
        self.call(
            "click",
            json!({ "x": x, "y": y, "button": button, "down": down }),
        )
        .await
    }

    pub fn mouse_move(&self, x: i32, y: i32) -> Result<()> {
        self.client
            .tell(self.scope(), "mouseMove", json!({ "x": x, "y": y }))
    }

    pub fn wheel(&self, x: i32, y: i32, dx: i32, dy: i32) -> Result<()> {
        self.client.tell(
            self.scope(),
            "wheel",
            json!({ "x": x, "y": y, "dx": dx, "dy": dy }),
        )
    }

    pub async fn key(&self, key: KeyInput) -> Result<()> {
        self.call("key", serde_json::to_value(key)?).await
    }

    pub async fn char(&self, unicode: u16) -> Result<()> {
        self.call("char", json!({ "unicode": unicode })).await
    }

    pub async fn start_video(&self) -> Result<()> {
        self.call("startVideo", json!({})).await
    }

    pub async fn stop_video(&self) -> Result<()> {
        self.call("stopVideo", json!({})).await
    }

    pub async fn reload(&self) -> Result<()> {
        self.call("reload", json!({})).await
    }

    pub async fn go_back(&self) -> Result<()> {
        self.call("goBack", json!({})).await
    }

    pub async fn go_forward(&self) -> Result<()> {
        self.call("goForward", json!({})).await
    }

    pub async fn set_focus(&self, focus: bool) -> Result<()> {
        self.call("setFocus", json!({ "focus": focus })).await
    }

    pub async fn dom(&self) -> Result<String> {
        let result: DomResult = self.call_as("getDOM", json!({})).await?;
        Ok(result.dom)
    }

    pub async fn clickable_elements(&self) -> Result<Vec<ClickableElement>> {
        let result: ClickableElements = self.call_as("getClickableElements", json!({})).await?;
        Ok(result.elements)
    }

    pub async fn click_element(&self, id: i32) -> Result<()> {
        self.call("clickElement", json!({ "id": id })).await
    }

    pub async fn close(&self) -> Result<()> {
        self.call("closeTab", json!({})).await
    }

    /// Open this tab's event stream as a separate session.
    pub async fn events(&self) -> Result<TabEvents> {
        TabEvents::connect(self.client.config(), self.id).await
    }

    fn scope(&self) -> Scope {
        Scope::Tab(self.id)
    }

    async fn call(&self, method: &str, params: Value) -> Result<()> {
        self.client.call(self.scope(), method, params).await?;
        Ok(())
    }

    async fn call_as<T: serde::de::DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        self.client.call_as(self.scope(), method, params).await
    }
}
