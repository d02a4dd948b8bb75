use super::ControlValue;
use crate::error::DecodeError;

/// ManageDsaIT control ([RFC 3296](https://tools.ietf.org/html/rfc3296)):
/// referral and other special objects are treated as ordinary entries.
/// Carries no value.
pub const MANAGE_DSA_IT_OID: &str = "2.16.840.1.113730.3.4.2";

pub(crate) fn decode_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    match val {
        None | Some(&[]) => Ok(ControlValue::ManageDsaIt),
        Some(_) => Err(DecodeError::Protocol("ManageDsaIT with a value")),
    }
}
