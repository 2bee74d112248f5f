//! Codec module - payload serialization.
//!
//! - [`MsgPackCodec`] - MessagePack via `rmp-serde` for request/reply messages
//! - [`CellCodec`] - packed cells and big-endian integers for the collective variant
//!
//! Codecs are marker structs with static methods rather than trait objects;
//! each payload type has exactly one encoding.

mod cells;
mod msgpack;

pub use cells::{CellCodec, EXTENTS_SIZE};
pub use msgpack::MsgPackCodec;
