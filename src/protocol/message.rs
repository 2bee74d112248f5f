//! Typed message envelope.
//!
//! A frame's kind and mode bytes pick the [`Message`] variant; the payload is
//! the variant's MsgPack struct. Kind and mode are derived from the variant
//! and never stored separately, so an envelope cannot disagree with itself.
//!
//! | Kind         | Request          | Reply             |
//! |--------------|------------------|-------------------|
//! | Registration | (empty)          | [`Assignment`]    |
//! | CellGet      | [`CellRef`]      | [`CellValue`]     |
//! | CellSet      | [`CellValue`]    | [`SetAck`]        |
//! | Barrier      | [`BarrierDone`]  | [`BarrierAck`]    |
//!
//! Any kind may carry an error-mode reply whose payload is a reason string.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::frame::{build_frame, Frame};
use super::wire_format::{Header, MessageKind, MessageMode};
use crate::board::CellState;
use crate::codec::MsgPackCodec;
use crate::error::{LifeError, Result};
use crate::partition::Area;

/// Registration reply: who the worker is and what it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub worker_id: u32,
    pub start_x: u32,
    pub start_y: u32,
    pub end_x: u32,
    pub end_y: u32,
    /// Generations the whole run lasts.
    pub total_steps: u64,
}

impl Assignment {
    /// Build from an area.
    pub fn new(worker_id: u32, area: Area, total_steps: u64) -> Self {
        Self {
            worker_id,
            start_x: area.start_x,
            start_y: area.start_y,
            end_x: area.end_x,
            end_y: area.end_y,
            total_steps,
        }
    }

    /// The assigned rectangle.
    pub fn area(&self) -> Area {
        Area {
            start_x: self.start_x,
            start_y: self.start_y,
            end_x: self.end_x,
            end_y: self.end_y,
        }
    }
}

/// Board coordinates. Signed: the coordinator wraps them toroidally, so a
/// worker may ask for row `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub x: i64,
    pub y: i64,
}

/// Coordinates plus a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellValue {
    pub x: i64,
    pub y: i64,
    pub state: CellState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAck {
    pub confirmed: bool,
}

/// A worker finished computing `finished_generation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierDone {
    pub worker_id: u32,
    pub finished_generation: u64,
}

/// The coordinator's "continue" push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierAck {
    pub worker_id: u32,
    pub continue_next: bool,
}

/// Every message of the request/reply protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    RegisterRequest,
    RegisterReply(Assignment),
    CellGetRequest(CellRef),
    CellGetReply(CellValue),
    CellSetRequest(CellValue),
    CellSetReply(SetAck),
    BarrierRequest(BarrierDone),
    BarrierReply(BarrierAck),
    /// Error-mode reply to a request of `kind`.
    Rejected { kind: MessageKind, reason: String },
}

impl Message {
    /// Kind byte this variant travels under.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::RegisterRequest | Message::RegisterReply(_) => MessageKind::Registration,
            Message::CellGetRequest(_) | Message::CellGetReply(_) => MessageKind::CellGet,
            Message::CellSetRequest(_) | Message::CellSetReply(_) => MessageKind::CellSet,
            Message::BarrierRequest(_) | Message::BarrierReply(_) => MessageKind::Barrier,
            Message::Rejected { kind, .. } => *kind,
        }
    }

    /// Mode byte this variant travels under.
    pub fn mode(&self) -> MessageMode {
        match self {
            Message::RegisterRequest
            | Message::CellGetRequest(_)
            | Message::CellSetRequest(_)
            | Message::BarrierRequest(_) => MessageMode::Request,
            Message::RegisterReply(_)
            | Message::CellGetReply(_)
            | Message::CellSetReply(_)
            | Message::BarrierReply(_) => MessageMode::Reply,
            Message::Rejected { .. } => MessageMode::Error,
        }
    }

    fn encode_payload(&self) -> Result<Vec<u8>> {
        match self {
            Message::RegisterRequest => Ok(Vec::new()),
            Message::RegisterReply(p) => MsgPackCodec::encode(p),
            Message::CellGetRequest(p) => MsgPackCodec::encode(p),
            Message::CellGetReply(p) | Message::CellSetRequest(p) => MsgPackCodec::encode(p),
            Message::CellSetReply(p) => MsgPackCodec::encode(p),
            Message::BarrierRequest(p) => MsgPackCodec::encode(p),
            Message::BarrierReply(p) => MsgPackCodec::encode(p),
            Message::Rejected { reason, .. } => MsgPackCodec::encode(reason),
        }
    }
}

/// A message with its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Per-sender sequence; replies echo the request's.
    pub sequence: u32,
    pub message: Message,
}

impl Envelope {
    pub fn new(sequence: u32, message: Message) -> Self {
        Self { sequence, message }
    }

    /// Encode header and payload into one buffer.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let (header, payload) = self.encode_parts()?;
        Ok(build_frame(&header, &payload))
    }

    /// Encode into a header and a separate payload, for the writer task.
    pub fn encode_parts(&self) -> Result<(Header, Bytes)> {
        let payload = self.message.encode_payload()?;
        let header = Header::new(
            self.message.kind(),
            self.message.mode(),
            self.sequence,
            payload.len() as u32,
        );
        Ok((header, Bytes::from(payload)))
    }

    /// Decode a frame: discriminant first, then the matching payload.
    ///
    /// # Errors
    ///
    /// `Protocol` for unknown kind/mode bytes; `MsgPackDecode` when the
    /// payload does not match the variant the header names.
    pub fn decode(frame: &Frame) -> Result<Self> {
        let kind = frame.kind().ok_or_else(|| {
            LifeError::Protocol(format!("Unknown message kind {}", frame.header.kind))
        })?;
        let mode = frame.mode().ok_or_else(|| {
            LifeError::Protocol(format!("Unknown message mode {}", frame.header.mode))
        })?;
        let payload = frame.payload();

        let message = match (kind, mode) {
            (kind, MessageMode::Error) => Message::Rejected {
                kind,
                reason: MsgPackCodec::decode(payload)?,
            },
            (MessageKind::Registration, MessageMode::Request) => Message::RegisterRequest,
            (MessageKind::Registration, MessageMode::Reply) => {
                Message::RegisterReply(MsgPackCodec::decode(payload)?)
            }
            (MessageKind::CellGet, MessageMode::Request) => {
                Message::CellGetRequest(MsgPackCodec::decode(payload)?)
            }
            (MessageKind::CellGet, MessageMode::Reply) => {
                Message::CellGetReply(MsgPackCodec::decode(payload)?)
            }
            (MessageKind::CellSet, MessageMode::Request) => {
                Message::CellSetRequest(MsgPackCodec::decode(payload)?)
            }
            (MessageKind::CellSet, MessageMode::Reply) => {
                Message::CellSetReply(MsgPackCodec::decode(payload)?)
            }
            (MessageKind::Barrier, MessageMode::Request) => {
                Message::BarrierRequest(MsgPackCodec::decode(payload)?)
            }
            (MessageKind::Barrier, MessageMode::Reply) => {
                Message::BarrierReply(MsgPackCodec::decode(payload)?)
            }
        };

        Ok(Envelope::new(frame.sequence(), message))
    }
}
