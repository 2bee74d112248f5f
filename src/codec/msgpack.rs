//! MsgPack codec using `rmp-serde`.
//!
//! Always `to_vec_named`: structs go on the wire as maps, so a worker built
//! from a newer revision can still read an older coordinator's replies as
//! long as the field names match.
//!
//! # Example
//!
//! ```
//! use lifewire::codec::MsgPackCodec;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Cell {
//!     x: u32,
//!     y: u32,
//! }
//!
//! let encoded = MsgPackCodec::encode(&Cell { x: 3, y: 4 }).unwrap();
//! let decoded: Cell = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, Cell { x: 3, y: 4 });
//! ```

use crate::error::Result;

/// MessagePack codec for message payloads.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map).
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
