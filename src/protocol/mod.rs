//! Wire format spoken with the browser server
//!
//! Text messages are JSON envelopes (requests, responses and events).
//! Binary messages carry raster data behind a one-byte discriminator:
//! - `0`: full viewport frame, payload runs to the end of the message
//! - otherwise: popup overlay, 16 bytes of little-endian geometry then payload

pub mod envelope;
pub mod frame;

pub use envelope::{Envelope, RemoteError, Request, Scope, GLOBAL_TAB_ID};
pub use frame::{BinaryFrame, FrameError, PopupRect, FULL_FRAME, POPUP_FRAME, POPUP_HEADER_LEN};
