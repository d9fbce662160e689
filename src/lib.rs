//! # CBOR Encoder
//!
//! A CBOR (Concise Binary Object Representation, RFC 8949) encoder for dynamic
//! value graphs, with semantic tags, value sharing and pluggable type encoders.
//!
//! ## Features
//! - Major types 0-7 with shortest-form length/argument encoding
//! - Integers of any size (bignums, tags 2 and 3)
//! - Tagged types (major type 6):
//!   - Date/time strings (tag 0) or epoch timestamps (tag 1)
//!   - Decimal fractions (tag 4)
//!   - Rational numbers (tag 30)
//!   - Regular expressions (tag 35)
//!   - MIME messages (tag 36)
//!   - UUIDs (tag 37)
//!   - Any other tag via [`Tagged`]
//! - Value sharing (tags 28/29): containers referenced more than once are
//!   written once, which also makes cyclic structures encodable
//! - Caller-defined encoders, registered per type or per capability
//!   (array-like, mapping-like), layered over the built-in table
//! - `Serialize` types via [`to_vec`] / [`to_value`]
//!
//! ## Floats
//! NaN and ±Infinity are always written as 3-byte half floats (`f97e00`,
//! `f97c00`, `f9fc00`). Other values are written as 8-byte doubles unless the
//! `compact_floats` feature is enabled, in which case the shortest lossless
//! width is used.
//!
//! ## Example
//! ```rust
//! use cbor_encoder::{EncoderOptions, Value, encode_to_vec};
//!
//! // A list that contains itself
//! let list = Value::array([Value::from(1)]);
//! list.as_array().unwrap().borrow_mut().push(list.clone());
//!
//! let options = EncoderOptions::default().with_value_sharing(true);
//! let bytes = encode_to_vec(&list, &options).unwrap();
//! assert_eq!(bytes, [0xd8, 0x1c, 0x82, 0x01, 0xd8, 0x1d, 0x00]);
//!
//! // Without value sharing the cycle is reported
//! assert!(encode_to_vec(&list, &EncoderOptions::default()).is_err());
//! ```

use serde::Serialize;
use std::io::{self, Write};

pub mod encoder;
pub mod registry;
pub mod ser;
pub mod tags;
pub mod types;
pub mod value;

pub use encoder::{Encoder, EncoderOptions};
pub use registry::{Capability, EncodeFn, EncoderTable, TypeKey};
pub use ser::to_value;
pub use tags::Tagged;
pub use types::{BigInt, Decimal, MimeMessage, ParseNumberError, Rational};
pub use value::{ContainerId, CustomRef, CustomValue, Kind, Shared, Value};

// CBOR major types
pub const MAJOR_UNSIGNED: u8 = 0;
pub const MAJOR_NEGATIVE: u8 = 1;
pub const MAJOR_BYTES: u8 = 2;
pub const MAJOR_TEXT: u8 = 3;
pub const MAJOR_ARRAY: u8 = 4;
pub const MAJOR_MAP: u8 = 5;
pub const MAJOR_TAG: u8 = 6;
pub const MAJOR_SIMPLE: u8 = 7;

// Standard CBOR tags (RFC 8949 and the IANA registry)
pub const TAG_DATETIME_STRING: u64 = 0;  // Standard date/time string (RFC 3339)
pub const TAG_EPOCH_DATETIME: u64 = 1;   // Epoch-based date/time
pub const TAG_POSITIVE_BIGNUM: u64 = 2;  // Positive bignum
pub const TAG_NEGATIVE_BIGNUM: u64 = 3;  // Negative bignum
pub const TAG_DECIMAL_FRACTION: u64 = 4; // Decimal fraction
pub const TAG_SHAREABLE: u64 = 28;       // Value that may be referenced later
pub const TAG_SHARED_REF: u64 = 29;      // Reference to a shareable value
pub const TAG_RATIONAL: u64 = 30;        // Rational number
pub const TAG_REGEX: u64 = 35;           // Regular expression
pub const TAG_MIME: u64 = 36;            // MIME message
pub const TAG_UUID: u64 = 37;            // Binary UUID

// Additional info values
const FALSE: u8 = 20;
const TRUE: u8 = 21;
const NULL: u8 = 22;
const UNDEFINED: u8 = 23;

#[derive(Debug, thiserror::Error)]
pub enum CborError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot serialize type {0}")]
    UnsupportedType(String),
    #[error("naive datetime encountered and no default timezone has been set")]
    NaiveDateTime,
    #[error("cyclic data structure detected but value sharing is disabled")]
    CyclicStructure,
    #[error("Serde error: {0}")]
    Serde(String),
}

impl serde::ser::Error for CborError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        CborError::Serde(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CborError>;

pub mod error {
    pub use super::CborError as Error;
}

/// Encode `value` into a new byte vector
pub fn encode_to_vec(value: &Value, options: &EncoderOptions) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_to_writer(value, &mut buf, options)?;
    Ok(buf)
}

/// Encode `value` into `writer`.
///
/// On error, bytes already written stay in the writer; encode into a buffer
/// first if the output must be all-or-nothing.
pub fn encode_to_writer<W: Write>(value: &Value, mut writer: W, options: &EncoderOptions) -> Result<()> {
    let mut encoder = Encoder::with_options(&mut writer, options);
    encoder.encode(value)
}

/// Serialize a `T` with the default options
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    encode_to_vec(&to_value(value)?, &EncoderOptions::default())
}

/// Serialize a `T` into `writer` with the default options
pub fn to_writer<W: Write, T: Serialize + ?Sized>(writer: W, value: &T) -> Result<()> {
    encode_to_writer(&to_value(value)?, writer, &EncoderOptions::default())
}
