use thiserror::Error;

/// Fatal framing errors.
///
/// Any of these leaves the decoder in an unrecoverable state; the byte
/// stream it was fed cannot be resynchronized and the connection supplying
/// it should be discarded.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BerError {
    #[error("invalid tag octet")]
    BadTag,
    #[error("invalid length octets")]
    BadLength,
    #[error("child TLV overruns its enclosing frame")]
    LengthExceedsFrame,
    #[error("PDU of {declared} bytes exceeds the configured limit of {limit}")]
    PduTooLarge { declared: usize, limit: usize },
    #[error("stream ended in the middle of a PDU")]
    TruncatedFinal,
}
