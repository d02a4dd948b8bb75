use berstream::common::TagClass;
use berstream::structures::{Enumerated, Integer, OctetString, Sequence, Tag};

use super::ControlValue;
use crate::dn::Dn;
use crate::error::DecodeError;

/// Change kinds reported by the Entry Change Notification control. The
/// discriminants form the Persistent Search change-type bit mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeType {
    Add = 1,
    Delete = 2,
    Modify = 4,
    ModDn = 8,
}

impl ChangeType {
    pub fn from_code(code: u64) -> Option<ChangeType> {
        match code {
            1 => Some(ChangeType::Add),
            2 => Some(ChangeType::Delete),
            4 => Some(ChangeType::Modify),
            8 => Some(ChangeType::ModDn),
            _ => None,
        }
    }
}

/// Entry Change Notification control (draft-ietf-ldapext-psearch),
/// attached to entries returned from a persistent search.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryChange {
    pub change_type: ChangeType,
    /// Present only for modDN changes.
    pub previous_dn: Option<Dn>,
    pub change_number: Option<i64>,
}

pub const ENTRY_CHANGE_OID: &str = "2.16.840.1.113730.3.4.7";

pub(crate) fn decode_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    const WHAT: &str = "entry change value";
    let tag = super::parse_value_tree(val, WHAT)?;
    let mut components = tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol(WHAT))?
        .into_iter();
    let change_type = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_enum(t, WHAT))
        .map(ChangeType::from_code)?
        .ok_or(DecodeError::Protocol("unknown entry change type"))?;
    let mut change = EntryChange {
        change_type,
        previous_dn: None,
        change_number: None,
    };
    for t in components {
        match (t.class, t.id) {
            (TagClass::Universal, 4) if change.previous_dn.is_none() => {
                let dn = t
                    .expect_primitive()
                    .ok_or(DecodeError::Protocol(WHAT))
                    .and_then(|b| super::expect_utf8(b, WHAT))?;
                let dn =
                    Dn::parse(&dn).map_err(|_| DecodeError::Protocol("entry change previous DN"))?;
                change.previous_dn = Some(dn);
            }
            (TagClass::Universal, 2) => {
                change.change_number = Some(super::expect_int(t, WHAT)?);
            }
            _ => return Err(DecodeError::Protocol("unexpected tag in entry change")),
        }
    }
    if change.previous_dn.is_some() && change_type != ChangeType::ModDn {
        return Err(DecodeError::Protocol(
            "previous DN on a non-modDN entry change",
        ));
    }
    Ok(ControlValue::EntryChange(change))
}

pub(crate) fn encode_value(ec: &EntryChange) -> Vec<u8> {
    let mut inner = vec![Tag::Enumerated(Enumerated {
        inner: ec.change_type as i64,
        ..Default::default()
    })];
    if let Some(ref dn) = ec.previous_dn {
        inner.push(Tag::OctetString(OctetString {
            inner: Vec::from(dn.to_string().as_bytes()),
            ..Default::default()
        }));
    }
    if let Some(number) = ec.change_number {
        inner.push(Tag::Integer(Integer {
            inner: number,
            ..Default::default()
        }));
    }
    super::encode_value_tree(Tag::Sequence(Sequence {
        inner,
        ..Default::default()
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn moddn_roundtrip() {
        let ec = EntryChange {
            change_type: ChangeType::ModDn,
            previous_dn: Some("cn=old,ou=system".parse().expect("dn")),
            change_number: Some(42),
        };
        let bytes = encode_value(&ec);
        match decode_value(Some(&bytes)).expect("decoded") {
            ControlValue::EntryChange(back) => assert_eq!(back, ec),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn minimal() {
        let ec = EntryChange {
            change_type: ChangeType::Add,
            previous_dn: None,
            change_number: None,
        };
        let bytes = encode_value(&ec);
        match decode_value(Some(&bytes)).expect("decoded") {
            ControlValue::EntryChange(back) => assert_eq!(back, ec),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn bad_change_type() {
        // SEQUENCE { ENUMERATED 3 } -- 3 is not a valid change type
        let bytes = [0x30, 0x03, 0x0A, 0x01, 0x03];
        assert!(decode_value(Some(&bytes)).is_err());
    }
}
