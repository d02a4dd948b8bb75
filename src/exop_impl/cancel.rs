use berstream::structures::{Integer, Sequence, Tag};

use super::ExopPayload;
use crate::controls_impl::{encode_value_tree, expect_int, parse_value_tree};
use crate::error::DecodeError;
use crate::message::ExtendedRequest;

pub const CANCEL_OID: &str = "1.3.6.1.1.8";

/// Cancel extended operation ([RFC 3909](https://tools.ietf.org/html/rfc3909)).
/// The value names the message id of the operation to cancel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cancel {
    pub cancel_id: i32,
}

impl From<Cancel> for ExtendedRequest {
    fn from(c: Cancel) -> ExtendedRequest {
        let value = encode_value_tree(Tag::Sequence(Sequence {
            inner: vec![Tag::Integer(Integer {
                inner: c.cancel_id as i64,
                ..Default::default()
            })],
            ..Default::default()
        }));
        ExtendedRequest {
            name: CANCEL_OID.to_owned(),
            value: Some(value),
        }
    }
}

pub(crate) fn decode_request_value(val: Option<&[u8]>) -> Result<ExopPayload, DecodeError> {
    const WHAT: &str = "cancel request value";
    let tag = parse_value_tree(val, WHAT)?;
    let cancel_id = tag
        .expect_constructed()
        .and_then(|tags| tags.into_iter().next())
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| expect_int(t, WHAT))?;
    if cancel_id <= 0 || cancel_id > i32::MAX as i64 {
        return Err(DecodeError::Protocol("cancel target id out of range"));
    }
    Ok(ExopPayload::Cancel(Cancel {
        cancel_id: cancel_id as i32,
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let req: ExtendedRequest = Cancel { cancel_id: 7 }.into();
        assert_eq!(req.name, CANCEL_OID);
        match decode_request_value(req.value.as_deref()).expect("decoded") {
            ExopPayload::Cancel(back) => assert_eq!(back.cancel_id, 7),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn nonpositive_id_rejected() {
        let req: ExtendedRequest = Cancel { cancel_id: 0 }.into();
        assert!(decode_request_value(req.value.as_deref()).is_err());
    }
}
