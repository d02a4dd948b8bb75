use berstream::structures::{Boolean, Tag};

use super::ControlValue;
use crate::error::DecodeError;

/// Subentries control ([RFC 3672](https://tools.ietf.org/html/rfc3672)).
///
/// The value is a bare BOOLEAN: visibility of subentries in the search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Subentries {
    pub visibility: bool,
}

pub const SUBENTRIES_OID: &str = "1.3.6.1.4.1.4203.1.10.1";

pub(crate) fn decode_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    const WHAT: &str = "subentries value";
    let tag = super::parse_value_tree(val, WHAT)?;
    let visibility = super::expect_bool(tag, WHAT)?;
    Ok(ControlValue::Subentries(Subentries { visibility }))
}

pub(crate) fn encode_value(sub: &Subentries) -> Vec<u8> {
    super::encode_value_tree(Tag::Boolean(Boolean {
        inner: sub.visibility,
        ..Default::default()
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        for visibility in [true, false] {
            let bytes = encode_value(&Subentries { visibility });
            match decode_value(Some(&bytes)).expect("decoded") {
                ControlValue::Subentries(back) => assert_eq!(back.visibility, visibility),
                other => panic!("unexpected payload: {:?}", other),
            }
        }
    }
}
