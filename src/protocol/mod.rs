//! Protocol module - wire format, framing, and typed messages.
//!
//! - 10-byte header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors
//! - [`Envelope`]/[`Message`] tagged union decoded from a frame

mod frame;
mod frame_buffer;
mod message;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use message::{
    Assignment, BarrierAck, BarrierDone, CellRef, CellValue, Envelope, Message, SetAck,
};
pub use wire_format::{Header, MessageKind, MessageMode, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
