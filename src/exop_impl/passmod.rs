use berstream::common::TagClass;
use berstream::structures::{OctetString, Sequence, Tag};

use super::{ExopParser, ExopPayload};
use crate::controls_impl::{encode_value_tree, expect_utf8, parse_value_tree};
use crate::error::DecodeError;
use crate::message::ExtendedRequest;

pub const PASSMOD_OID: &str = "1.3.6.1.4.1.4203.1.11.1";

/// Password Modify extended operation ([RFC 3062](https://tools.ietf.org/html/rfc3062)).
///
/// The precise semantics of having a particular field present or absent
/// depend on the receiving server. Rules prescribed by the RFC:
///
/// * `user_id` names the user whose password is changed; absent means the
///   identity of the current connection. It may or may not be a DN.
/// * If `old_pass` is present, it must match the existing password.
/// * If `new_pass` is absent, the server may autogenerate the new password.
///
/// Although the specification doesn't constrain the values of old and new
/// passwords, this implementation limits them to UTF-8 strings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PasswordModify {
    pub user_id: Option<String>,
    pub old_pass: Option<String>,
    pub new_pass: Option<String>,
}

/// Password Modify response: the server-generated password, when the
/// server chose one.
#[derive(Clone, Debug, PartialEq)]
pub struct PasswordModifyResp {
    pub gen_pass: String,
}

impl From<PasswordModify> for ExtendedRequest {
    fn from(pm: PasswordModify) -> ExtendedRequest {
        let mut pm_vec = vec![];
        if let Some(user_id) = pm.user_id {
            pm_vec.push(Tag::OctetString(OctetString {
                id: 0,
                class: TagClass::Context,
                inner: user_id.into_bytes(),
            }));
        }
        if let Some(old_pass) = pm.old_pass {
            pm_vec.push(Tag::OctetString(OctetString {
                id: 1,
                class: TagClass::Context,
                inner: old_pass.into_bytes(),
            }));
        }
        if let Some(new_pass) = pm.new_pass {
            pm_vec.push(Tag::OctetString(OctetString {
                id: 2,
                class: TagClass::Context,
                inner: new_pass.into_bytes(),
            }));
        }
        let value = if pm_vec.is_empty() {
            None
        } else {
            Some(encode_value_tree(Tag::Sequence(Sequence {
                inner: pm_vec,
                ..Default::default()
            })))
        };
        ExtendedRequest {
            name: PASSMOD_OID.to_owned(),
            value,
        }
    }
}

pub(crate) fn decode_request_value(val: Option<&[u8]>) -> Result<ExopPayload, DecodeError> {
    const WHAT: &str = "password modify request value";
    let mut pm = PasswordModify::default();
    if val.is_none() {
        return Ok(ExopPayload::PasswordModify(pm));
    }
    let tag = parse_value_tree(val, WHAT)?;
    for t in tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol(WHAT))?
    {
        if t.class != TagClass::Context {
            return Err(DecodeError::Protocol(WHAT));
        }
        let field = match t.id {
            0 => &mut pm.user_id,
            1 => &mut pm.old_pass,
            2 => &mut pm.new_pass,
            _ => return Err(DecodeError::Protocol("unexpected tag in password modify")),
        };
        let content = t
            .expect_primitive()
            .ok_or(DecodeError::Protocol(WHAT))
            .and_then(|b| expect_utf8(b, WHAT))?;
        *field = Some(content);
    }
    Ok(ExopPayload::PasswordModify(pm))
}

impl ExopParser for PasswordModifyResp {
    fn parse(val: &[u8]) -> Result<PasswordModifyResp, DecodeError> {
        const WHAT: &str = "password modify response value";
        let tag = parse_value_tree(Some(val), WHAT)?;
        let gen_pass = tag
            .expect_constructed()
            .and_then(|tags| tags.into_iter().next())
            .and_then(|t| t.match_class(TagClass::Context))
            .and_then(|t| t.match_id(0))
            .and_then(|t| t.expect_primitive())
            .ok_or(DecodeError::Protocol(WHAT))
            .and_then(|b| expect_utf8(b, WHAT))?;
        Ok(PasswordModifyResp { gen_pass })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_roundtrip() {
        let pm = PasswordModify {
            user_id: Some("uid=jdoe,ou=people,dc=example,dc=com".to_owned()),
            old_pass: Some("hunter2".to_owned()),
            new_pass: Some("correct horse".to_owned()),
        };
        let req: ExtendedRequest = pm.clone().into();
        assert_eq!(req.name, PASSMOD_OID);
        match decode_request_value(req.value.as_deref()).expect("decoded") {
            ExopPayload::PasswordModify(back) => assert_eq!(back, pm),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn empty_request_has_no_value() {
        let req: ExtendedRequest = PasswordModify::default().into();
        assert!(req.value.is_none());
        match decode_request_value(None).expect("decoded") {
            ExopPayload::PasswordModify(pm) => assert_eq!(pm, PasswordModify::default()),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn response_parse() {
        // SEQUENCE { [0] "secret" }
        let bytes = [0x30, 0x08, 0x80, 0x06, b's', b'e', b'c', b'r', b'e', b't'];
        let resp = PasswordModifyResp::parse(&bytes).expect("parsed");
        assert_eq!(resp.gen_pass, "secret");
    }
}
