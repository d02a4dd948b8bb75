use super::ControlValue;
use crate::error::DecodeError;

/// Proxied Authorization control ([RFC 4370](https://tools.ietf.org/html/rfc4370)).
///
/// The control value is the authorization identity itself, not wrapped in
/// any additional TLV. An empty identity requests anonymous authorization.
#[derive(Clone, Debug, PartialEq)]
pub struct ProxiedAuthz {
    pub authz_id: String,
}

pub const PROXIED_AUTHZ_OID: &str = "2.16.840.1.113730.3.4.18";

pub(crate) fn decode_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    const WHAT: &str = "proxied authorization value";
    let authz_id = super::expect_utf8(val.unwrap_or_default().to_vec(), WHAT)?;
    Ok(ControlValue::ProxiedAuthz(ProxiedAuthz { authz_id }))
}

pub(crate) fn encode_value(pa: &ProxiedAuthz) -> Vec<u8> {
    Vec::from(pa.authz_id.as_bytes())
}
