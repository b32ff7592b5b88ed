//! Request and response payloads of the browser commands

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Serialised as its number (`0`, `1`, `2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MouseButton {
    Left = 0,
    Middle = 1,
    Right = 2,
}

impl From<MouseButton> for u8 {
    fn from(button: MouseButton) -> Self {
        button as u8
    }
}

impl TryFrom<u8> for MouseButton {
    type Error = ClientError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Left),
            1 => Ok(Self::Middle),
            2 => Ok(Self::Right),
            other => Err(ClientError::Protocol(format!("unknown mouse button {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpenTabOptions {
    /// Falls back to the configured default URL.
    pub url: Option<String>,
    pub wait_until_loaded: bool,
    /// Falls back to the configured default viewport.
    pub size: Option<(u32, u32)>,
}

impl OpenTabOptions {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn wait_until_loaded(mut self, wait: bool) -> Self {
        self.wait_until_loaded = wait;
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }
}

/// A single key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KeyInput {
    /// UTF-16 code unit, 0 for non-printing keys.
    pub character: u16,
    pub code: i32,
    pub windowscode: i32,
    pub down: bool,
    pub ctrl: bool,
    pub shift: bool,
}

impl KeyInput {
    pub fn new(code: i32, windowscode: i32, down: bool) -> Self {
        Self {
            code,
            windowscode,
            down,
            ..Self::default()
        }
    }

    pub fn character(mut self, character: u16) -> Self {
        self.character = character;
        self
    }

    pub fn ctrl(mut self, ctrl: bool) -> Self {
        self.ctrl = ctrl;
        self
    }

    pub fn shift(mut self, shift: bool) -> Self {
        self.shift = shift;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickableElement {
    pub id: i32,
    pub tag: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LoadStatus {
    Loading,
    Loaded,
    LoadError,
}

impl From<LoadStatus> for u8 {
    fn from(status: LoadStatus) -> Self {
        match status {
            LoadStatus::Loading => 0,
            LoadStatus::Loaded => 1,
            LoadStatus::LoadError => 2,
        }
    }
}

impl TryFrom<u8> for LoadStatus {
    type Error = ClientError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Loading),
            1 => Ok(Self::Loaded),
            2 => Ok(Self::LoadError),
            other => Err(ClientError::Protocol(format!("unknown load status {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadState {
    pub status: LoadStatus,
    #[serde(default)]
    pub can_go_back: bool,
    #[serde(default)]
    pub can_go_forward: bool,
    #[serde(default)]
    pub error_code: i32,
    #[serde(default)]
    pub error_message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenedTab {
    pub id: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TabList {
    pub tabs: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionUrls {
    pub urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TitleResult {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UrlResult {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScreenshotResult {
    pub screenshot: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DomResult {
    pub dom: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClickableElements {
    pub elements: Vec<ClickableElement>,
}
