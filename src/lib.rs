//! cef-client - client runtime for a remote CEF browser
//!
//! The browser engine lives on a server; this crate speaks its WebSocket
//! protocol. A [`Client`] correlates JSON requests with their responses under
//! per-call timeouts, keeps the connection alive with ping probes, reconnects
//! and replays viewport/navigation/streaming state after a drop, and fans
//! server events (including binary video and popup frames) out to listeners.
//!
//! [`Browser`] and [`Tab`] wrap the raw calls in typed commands.
//!
//! # Example
//! ```ignore
//! use cef_client::{Browser, ClientConfig, OpenTabOptions};
//!
//! #[tokio::main]
//! async fn main() -> cef_client::Result<()> {
//!     let browser = Browser::connect(ClientConfig::default()).await?;
//!     let tab = browser.open_tab(OpenTabOptions::url("https://example.com")).await?;
//!     println!("{}", tab.title().await?);
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;

pub use browser::{Browser, OpenTabOptions, Tab, TabEvent, TabEvents};
pub use config::{ClientConfig, ReplayConfig};
pub use error::{ClientError, Result};
pub use protocol::{BinaryFrame, PopupRect, Scope};
pub use session::{Client, ClientBuilder, CloseReason, ConnectionState, Event, Subscription};
