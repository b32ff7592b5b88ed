//! Binary sub-framing for streamed raster data

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use thiserror::Error;

/// Discriminator of a full-viewport frame.
pub const FULL_FRAME: u8 = 0;

/// Discriminator written for popup overlays. Any nonzero byte decodes as a popup.
pub const POPUP_FRAME: u8 = 1;

/// Discriminator plus four `i32` geometry fields.
pub const POPUP_HEADER_LEN: usize = 1 + 4 * 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty binary message")]
    Empty,

    #[error("popup header truncated: expected {expected} bytes, got {actual}")]
    TruncatedHeader { expected: usize, actual: usize },
}

/// Placement and size of a popup overlay, in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PopupRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// A decoded binary message. Payloads are opaque raster bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryFrame {
    Full(Bytes),
    Popup { rect: PopupRect, data: Bytes },
}

impl BinaryFrame {
    /// Decode a binary message. Payload slices share the input buffer.
    pub fn decode(raw: Bytes) -> Result<Self, FrameError> {
        let discriminator = *raw.first().ok_or(FrameError::Empty)?;
        if discriminator == FULL_FRAME {
            return Ok(Self::Full(raw.slice(1..)));
        }

        if raw.len() < POPUP_HEADER_LEN {
            return Err(FrameError::TruncatedHeader {
                expected: POPUP_HEADER_LEN,
                actual: raw.len(),
            });
        }

        let rect = PopupRect {
            x: read_i32_le(&raw, 1)?,
            y: read_i32_le(&raw, 5)?,
            width: read_i32_le(&raw, 9)?,
            height: read_i32_le(&raw, 13)?,
        };

        Ok(Self::Popup {
            rect,
            data: raw.slice(POPUP_HEADER_LEN..),
        })
    }

    /// Encode in the layout [`BinaryFrame::decode`] reads.
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Full(data) => {
                let mut buf = BytesMut::with_capacity(1 + data.len());
                buf.put_u8(FULL_FRAME);
                buf.put_slice(data);
                buf.freeze()
            }
            Self::Popup { rect, data } => {
                let mut buf = BytesMut::with_capacity(POPUP_HEADER_LEN + data.len());
                buf.put_u8(POPUP_FRAME);
                buf.put_i32_le(rect.x);
                buf.put_i32_le(rect.y);
                buf.put_i32_le(rect.width);
                buf.put_i32_le(rect.height);
                buf.put_slice(data);
                buf.freeze()
            }
        }
    }

    pub fn payload(&self) -> &Bytes {
        match self {
            Self::Full(data) => data,
            Self::Popup { data, .. } => data,
        }
    }
}

fn read_i32_le(raw: &[u8], offset: usize) -> Result<i32, FrameError> {
    let word: [u8; 4] = raw
        .get(offset..offset + 4)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(FrameError::TruncatedHeader {
            expected: POPUP_HEADER_LEN,
            actual: raw.len(),
        })?;
    Ok(i32::from_le_bytes(word))
}
