//! The three error taxonomies of the codec: fatal framing errors, semantic
//! request errors carrying a skeleton response, and encode-time failures.
//! Nothing in the crate recovers from an error internally; everything is
//! surfaced to the caller.

use thiserror::Error;

use berstream::BerError;

use crate::message::LdapMessage;
use crate::result::ResultCode;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// BER-level framing failure. The connection cannot be resynchronized
    /// and must be discarded.
    #[error(transparent)]
    Ber(#[from] BerError),
    /// Structural impossibility in the LDAP layer (unrecognized envelope,
    /// unknown protocolOp tag, tag where none is permitted). Fatal, like a
    /// BER error.
    #[error("protocol error: {0}")]
    Protocol(&'static str),
    /// A request decoded structurally but failed a semantic check (bad DN,
    /// empty attribute list, negative limit). `response` is a skeleton of
    /// the operation's matching response type with the copied message id;
    /// the transport should send it and keep the session alive.
    #[error("{code} while decoding request {id}: {message}")]
    RequestError {
        id: i32,
        code: ResultCode,
        message: String,
        response: Box<LdapMessage>,
    },
    /// A response decoded structurally but its content is unusable.
    #[error("error in response to message {id}: {message}")]
    ResponseError { id: i32, message: String },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("message id {0} outside the protocol range")]
    MessageIdOutOfRange(i32),
    #[error("sort result code {0} is not defined by RFC 2891")]
    UnknownSortResult(u32),
    #[error("cannot encode: {0}")]
    CannotEncode(&'static str),
}

/// Raw semantic failure inside an operation grammar, before the decode
/// driver attaches the message id and skeleton response.
#[derive(Debug)]
pub(crate) enum OpError {
    Protocol(&'static str),
    Semantic { code: ResultCode, message: String },
}

impl OpError {
    pub(crate) fn semantic(code: ResultCode, message: impl Into<String>) -> OpError {
        OpError::Semantic {
            code,
            message: message.into(),
        }
    }
}
