//! UART line protocol
//!
//! A line looks like:
//!
//! ```text
//! [LEVEL] :m"message text" name:type=value name2:type=value :t=timestamp
//! ```
//!
//! Every component is optional. The decoder is total: any input produces a
//! [`FrameRecord`](crate::types::FrameRecord), falling back to an INFO record
//! whose text is the line's words.

pub mod convert;
pub mod decoder;
pub mod encoder;
pub mod tokenizer;

pub use convert::{convert_token, convert_value};
pub use decoder::{decode_line, FrameDecoder};
pub use encoder::{encode_record, escape_message};
pub use tokenizer::{tokenize, TokenizedLine};
