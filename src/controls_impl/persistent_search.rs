use berstream::structures::{Boolean, Integer, Sequence, Tag};

use super::ControlValue;
use crate::error::DecodeError;

/// Persistent Search control (draft-ietf-ldapext-psearch).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PersistentSearch {
    /// Bit mask over the EntryChange change types.
    pub change_types: u8,
    /// Skip the initial search result set, deliver changes only.
    pub changes_only: bool,
    /// Attach EntryChange controls to returned entries.
    pub return_ecs: bool,
}

pub const PERSISTENT_SEARCH_OID: &str = "2.16.840.1.113730.3.4.3";

/// All four change type bits: add, delete, modify, modDN.
pub const CHANGE_TYPES_ALL: u8 = 0x0F;

pub(crate) fn decode_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    const WHAT: &str = "persistent search value";
    let tag = super::parse_value_tree(val, WHAT)?;
    let mut components = tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol(WHAT))?
        .into_iter();
    let change_types = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_int(t, WHAT))?;
    if !(0..=CHANGE_TYPES_ALL as i64).contains(&change_types) {
        return Err(DecodeError::Protocol("persistent search change types"));
    }
    let changes_only = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_bool(t, WHAT))?;
    let return_ecs = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_bool(t, WHAT))?;
    Ok(ControlValue::PersistentSearch(PersistentSearch {
        change_types: change_types as u8,
        changes_only,
        return_ecs,
    }))
}

pub(crate) fn encode_value(ps: &PersistentSearch) -> Vec<u8> {
    super::encode_value_tree(Tag::Sequence(Sequence {
        inner: vec![
            Tag::Integer(Integer {
                inner: ps.change_types as i64,
                ..Default::default()
            }),
            Tag::Boolean(Boolean {
                inner: ps.changes_only,
                ..Default::default()
            }),
            Tag::Boolean(Boolean {
                inner: ps.return_ecs,
                ..Default::default()
            }),
        ],
        ..Default::default()
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let ps = PersistentSearch {
            change_types: CHANGE_TYPES_ALL,
            changes_only: true,
            return_ecs: true,
        };
        let bytes = encode_value(&ps);
        match decode_value(Some(&bytes)).expect("decoded") {
            ControlValue::PersistentSearch(back) => assert_eq!(back, ps),
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}
