use super::ExopPayload;
use crate::error::DecodeError;
use crate::message::ExtendedRequest;

pub const STARTTLS_OID: &str = "1.3.6.1.4.1.1466.20037";

/// StartTLS extended operation (RFC 4511 §4.14). Neither the request nor
/// the response carries a value; the TLS negotiation itself belongs to the
/// transport.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StartTls;

impl From<StartTls> for ExtendedRequest {
    fn from(_s: StartTls) -> ExtendedRequest {
        ExtendedRequest {
            name: STARTTLS_OID.to_owned(),
            value: None,
        }
    }
}

pub(crate) fn decode_request_value(val: Option<&[u8]>) -> Result<ExopPayload, DecodeError> {
    match val {
        None | Some(&[]) => Ok(ExopPayload::StartTls),
        Some(_) => Err(DecodeError::Protocol("StartTLS request with a value")),
    }
}
