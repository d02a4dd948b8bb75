//! Search result entry and reference.
//!
//! The entry grammar is shared in shape with the Add request (the attribute
//! list encoding is identical); Add adds the must-not-be-empty checks, so
//! the two keep separate tables over the same builder.

use berstream::structures::{OctetString, Sequence, Set, Tag};

use super::{ev_dn, ev_utf8, Container, OpBuild, APP, OCTS, SEQ, SET, UNI};
use crate::dn::Dn;
use crate::entry::{AttrValue, Attribute, Entry};
use crate::error::OpError;
use crate::grammar::{skip, Event, Follow, GrammarTable, On, Transition};
use crate::message::{ProtocolOp, SearchResultEntry, SearchResultReference};

#[derive(Default)]
pub(crate) struct EntryBuild {
    pub dn: Option<Dn>,
    pub attrs: Vec<Attribute>,
    pub cur: Option<Attribute>,
}

impl Container {
    pub(super) fn entry(&mut self) -> &mut EntryBuild {
        match &mut self.op {
            OpBuild::Entry(b) => b,
            _ => unreachable!("entry container"),
        }
    }

    fn search_ref(&mut self) -> &mut Vec<String> {
        match &mut self.op {
            OpBuild::SearchRef(uris) => uris,
            _ => unreachable!("search reference container"),
        }
    }
}

// SearchResultEntry ::= [APPLICATION 4] SEQUENCE {
//     objectName LDAPDN,
//     attributes PartialAttributeList }
pub(super) const START: u8 = 0;
pub(super) const SEQ_OPEN: u8 = 1;
pub(super) const DN_STORED: u8 = 2;
pub(super) const IN_ATTR_LIST: u8 = 3;
pub(super) const IN_ATTR: u8 = 4;
pub(super) const TYPE_STORED: u8 = 5;
pub(super) const IN_VALUES: u8 = 6;
pub(super) const VALUES_DONE: u8 = 7;
pub(super) const LIST_DONE: u8 = 8;
pub(super) const DONE: u8 = 9;

macro_rules! t {
    ($from:expr, $on:expr, $to:expr, $action:expr) => {
        Transition {
            from: $from,
            on: $on,
            to: $to,
            action: $action,
        }
    };
}

pub(crate) static SEARCH_RESULT_ENTRY: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in SearchResultEntry",
    start: START,
    transitions: &[
        t!(START, On::open(APP, 4), SEQ_OPEN, skip),
        t!(SEQ_OPEN, On::prim(UNI, OCTS), DN_STORED, store_dn),
        t!(DN_STORED, On::open(UNI, SEQ), IN_ATTR_LIST, skip),
        t!(IN_ATTR_LIST, On::open(UNI, SEQ), IN_ATTR, skip),
        t!(IN_ATTR, On::prim(UNI, OCTS), TYPE_STORED, store_type),
        t!(TYPE_STORED, On::open(UNI, SET), IN_VALUES, skip),
        t!(IN_VALUES, On::prim(UNI, OCTS), IN_VALUES, store_value),
        t!(IN_VALUES, On::close(), VALUES_DONE, skip),
        t!(VALUES_DONE, On::close(), IN_ATTR_LIST, finish_attr),
        t!(IN_ATTR_LIST, On::close(), LIST_DONE, skip),
        t!(LIST_DONE, On::close(), DONE, skip),
    ],
    accepting: |_, state| state == DONE,
};

type R = Result<Follow<Container>, OpError>;

pub(super) fn store_dn(c: &mut Container, ev: &Event) -> R {
    let dn = ev_dn(ev, "entry DN")?;
    c.entry().dn = Some(dn);
    Ok(Follow::Next)
}

pub(super) fn store_type(c: &mut Container, ev: &Event) -> R {
    let up_id = ev_utf8(ev, "attribute description")?;
    c.entry().cur = Some(Attribute::new(&up_id));
    Ok(Follow::Next)
}

pub(super) fn store_value(c: &mut Container, ev: &Event) -> R {
    let build = c.entry();
    let attr = build.cur.as_mut().expect("attribute in progress");
    attr.add_value(AttrValue::from_bytes(ev.value.to_vec()));
    Ok(Follow::Next)
}

pub(super) fn finish_attr(c: &mut Container, _ev: &Event) -> R {
    let build = c.entry();
    let attr = build.cur.take().expect("attribute in progress");
    build.attrs.push(attr);
    Ok(Follow::Next)
}

pub(super) fn into_entry(build: EntryBuild) -> Entry {
    let mut entry = Entry::new(build.dn.expect("grammar stored DN"));
    for attr in build.attrs {
        entry.put(attr);
    }
    entry
}

pub(crate) fn assemble_entry(mut c: Container) -> ProtocolOp {
    let build = std::mem::take(c.entry());
    ProtocolOp::SearchResultEntry(SearchResultEntry {
        entry: into_entry(build),
    })
}

// SearchResultReference ::= [APPLICATION 19] SEQUENCE SIZE (1..MAX) OF uri URI
const REF_OPEN: u8 = 1;
const REF_DONE: u8 = 2;

pub(crate) static SEARCH_RESULT_REFERENCE: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in SearchResultReference",
    start: START,
    transitions: &[
        t!(START, On::open(APP, 19), REF_OPEN, skip),
        t!(REF_OPEN, On::prim(UNI, OCTS), REF_OPEN, store_uri),
        t!(REF_OPEN, On::close(), REF_DONE, end_uris),
    ],
    accepting: |_, state| state == REF_DONE,
};

fn store_uri(c: &mut Container, ev: &Event) -> R {
    let uri = ev_utf8(ev, "reference URI")?;
    c.search_ref().push(uri);
    Ok(Follow::Next)
}

fn end_uris(c: &mut Container, _ev: &Event) -> R {
    if c.search_ref().is_empty() {
        return Err(OpError::Protocol("search reference without URIs"));
    }
    Ok(Follow::Next)
}

pub(crate) fn assemble_reference(mut c: Container) -> ProtocolOp {
    let uris = std::mem::take(c.search_ref());
    ProtocolOp::SearchResultReference(SearchResultReference { uris })
}

/// Attribute list body shared with the Add request encoder.
pub(super) fn attribute_tags(entry: &Entry) -> Vec<Tag> {
    entry
        .attributes()
        .map(|attr| {
            Tag::Sequence(Sequence {
                inner: vec![
                    Tag::OctetString(OctetString {
                        inner: Vec::from(attr.up_id().as_bytes()),
                        ..Default::default()
                    }),
                    Tag::Set(Set {
                        inner: attr
                            .values()
                            .iter()
                            .map(|v| {
                                Tag::OctetString(OctetString {
                                    inner: v.as_bytes().to_vec(),
                                    ..Default::default()
                                })
                            })
                            .collect(),
                        ..Default::default()
                    }),
                ],
                ..Default::default()
            })
        })
        .collect()
}

pub(crate) fn build_entry(sre: &SearchResultEntry) -> Tag {
    super::app_sequence(
        4,
        vec![
            Tag::OctetString(OctetString {
                inner: Vec::from(sre.entry.dn().to_string().as_bytes()),
                ..Default::default()
            }),
            Tag::Sequence(Sequence {
                inner: attribute_tags(&sre.entry),
                ..Default::default()
            }),
        ],
    )
}

pub(crate) fn build_reference(
    reference: &SearchResultReference,
) -> Result<Tag, crate::error::EncodeError> {
    if reference.uris.is_empty() {
        return Err(crate::error::EncodeError::CannotEncode(
            "search reference without URIs",
        ));
    }
    Ok(super::app_sequence(
        19,
        reference
            .uris
            .iter()
            .map(|uri| {
                Tag::OctetString(OctetString {
                    inner: Vec::from(uri.as_bytes()),
                    ..Default::default()
                })
            })
            .collect(),
    ))
}
