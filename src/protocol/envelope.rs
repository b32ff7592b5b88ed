//! JSON envelopes for requests, responses and server events

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `tab_id` value addressing the browser as a whole rather than one tab.
pub const GLOBAL_TAB_ID: i32 = -1;

/// Routing key of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Scope {
    Global,
    Tab(i32),
}

impl Scope {
    pub fn tab_id(self) -> Option<i32> {
        match self {
            Self::Global => None,
            Self::Tab(id) => Some(id),
        }
    }
}

impl From<i32> for Scope {
    fn from(id: i32) -> Self {
        if id == GLOBAL_TAB_ID {
            Self::Global
        } else {
            Self::Tab(id)
        }
    }
}

impl From<Scope> for i32 {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Global => GLOBAL_TAB_ID,
            Scope::Tab(id) => id,
        }
    }
}

/// Outbound command. Immutable once handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    #[serde(rename = "tab_id")]
    pub scope: Scope,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(id: impl Into<String>, scope: Scope, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: id.into(),
            scope,
            method: method.into(),
            params,
        }
    }
}

/// Structured failure carried by a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Any textual message from the server.
///
/// Responses carry `id` plus `result` or `error`; events carry `type` and
/// `data`. Both shapes share one struct so a single parse classifies them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn response(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: Some(id.into()),
            result: Some(result),
            ..Self::default()
        }
    }

    pub fn failure(id: impl Into<String>, error: RemoteError) -> Self {
        Self {
            id: Some(id.into()),
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn event(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: Some(kind.into()),
            data: Some(data),
            ..Self::default()
        }
    }
}
