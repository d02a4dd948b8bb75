use super::{ExopParser, ExopPayload};
use crate::error::DecodeError;
use crate::message::ExtendedRequest;

pub const WHOAMI_OID: &str = "1.3.6.1.4.1.4203.1.11.3";

/// Who Am I? extended operation ([RFC 4532](https://tools.ietf.org/html/rfc4532)).
/// The request carries no value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WhoAmI;

/// Who Am I? response: the authorization identity, raw in the response
/// value without further BER wrapping.
#[derive(Clone, Debug, PartialEq)]
pub struct WhoAmIResp {
    pub authz_id: String,
}

impl From<WhoAmI> for ExtendedRequest {
    fn from(_w: WhoAmI) -> ExtendedRequest {
        ExtendedRequest {
            name: WHOAMI_OID.to_owned(),
            value: None,
        }
    }
}

pub(crate) fn decode_request_value(val: Option<&[u8]>) -> Result<ExopPayload, DecodeError> {
    match val {
        None | Some(&[]) => Ok(ExopPayload::WhoAmI),
        Some(_) => Err(DecodeError::Protocol("who am I request with a value")),
    }
}

impl ExopParser for WhoAmIResp {
    fn parse(val: &[u8]) -> Result<WhoAmIResp, DecodeError> {
        let authz_id = String::from_utf8(val.to_vec())
            .map_err(|_| DecodeError::Protocol("who am I authzId is not valid UTF-8"))?;
        Ok(WhoAmIResp { authz_id })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn response_is_raw_authz_id() {
        let resp = WhoAmIResp::parse(b"dn:cn=admin,ou=system").expect("parsed");
        assert_eq!(resp.authz_id, "dn:cn=admin,ou=system");
    }
}
