/// Message payload decoding
///
/// Converts provider JSON payload trees into a tagged [`Payload`] and
/// extracts the first readable body plus top-level headers.

pub mod decoder;
pub mod types;

pub use decoder::{decode_base64url, PayloadDecoder, DEFAULT_MAX_DEPTH};
pub use types::{Header, MessagePart, MessagePartBody, Payload};
