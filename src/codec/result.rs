//! The shared LDAPResult component grammar and encoder.

use berstream::structures::{Enumerated, OctetString, Tag};

use super::{app_sequence, ev_utf8, ev_uint, Container, CTX, ENUM, OCTS, UNI};
use crate::error::OpError;
use crate::grammar::{skip, Event, Follow, GrammarTable, On, Transition};
use crate::result::{LdapResult, ResultCode};

// LDAPResult ::= SEQUENCE {
//     resultCode    ENUMERATED,
//     matchedDN     LDAPDN,
//     diagnosticMessage LDAPString,
//     referral      [3] Referral OPTIONAL }
const CODE_EXPECTED: u8 = 0;
const MATCHED_EXPECTED: u8 = 1;
const DIAGNOSTIC_EXPECTED: u8 = 2;
const COMPLETE: u8 = 3;
const IN_REFERRAL: u8 = 4;
const REFERRAL_DONE: u8 = 5;

/// Entered with `Follow::Enter` by every response grammar; fills
/// `Container::result`.
pub(crate) static RESULT: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in LDAPResult",
    start: CODE_EXPECTED,
    transitions: &[
        Transition {
            from: CODE_EXPECTED,
            on: On::prim(UNI, ENUM),
            to: MATCHED_EXPECTED,
            action: store_code,
        },
        Transition {
            from: MATCHED_EXPECTED,
            on: On::prim(UNI, OCTS),
            to: DIAGNOSTIC_EXPECTED,
            action: store_matched,
        },
        Transition {
            from: DIAGNOSTIC_EXPECTED,
            on: On::prim(UNI, OCTS),
            to: COMPLETE,
            action: store_diagnostic,
        },
        Transition {
            from: COMPLETE,
            on: On::open(CTX, 3),
            to: IN_REFERRAL,
            action: skip,
        },
        Transition {
            from: IN_REFERRAL,
            on: On::prim(UNI, OCTS),
            to: IN_REFERRAL,
            action: store_referral_url,
        },
        Transition {
            from: IN_REFERRAL,
            on: On::close(),
            to: REFERRAL_DONE,
            action: end_referral,
        },
    ],
    accepting: |_, state| matches!(state, COMPLETE | REFERRAL_DONE),
};

fn store_code(c: &mut Container, ev: &Event) -> Result<Follow<Container>, OpError> {
    let code = ev_uint(ev, "result code")?;
    let code = u32::try_from(code).map_err(|_| OpError::Protocol("result code"))?;
    c.result.result_code = ResultCode::from_code(code);
    Ok(Follow::Next)
}

fn store_matched(c: &mut Container, ev: &Event) -> Result<Follow<Container>, OpError> {
    c.result.matched_dn = super::ev_dn(ev, "matched DN")?;
    Ok(Follow::Next)
}

fn store_diagnostic(c: &mut Container, ev: &Event) -> Result<Follow<Container>, OpError> {
    c.result.diagnostic_message = ev_utf8(ev, "diagnostic message")?;
    Ok(Follow::Next)
}

fn store_referral_url(c: &mut Container, ev: &Event) -> Result<Follow<Container>, OpError> {
    c.result.referral.push(ev_utf8(ev, "referral URL")?);
    Ok(Follow::Next)
}

fn end_referral(c: &mut Container, _ev: &Event) -> Result<Follow<Container>, OpError> {
    if c.result.referral.is_empty() {
        return Err(OpError::Protocol("empty referral sequence"));
    }
    Ok(Follow::Next)
}

// the six responses whose whole body is an LDAPResult
const START: u8 = 0;
const BODY: u8 = 1;
const DONE: u8 = 2;

fn enter_result(_c: &mut Container, _ev: &Event) -> Result<Follow<Container>, OpError> {
    Ok(Follow::Enter(&RESULT))
}

macro_rules! open_result_only {
    ($id:expr) => {
        Transition {
            from: START,
            on: On::open(super::APP, $id),
            to: BODY,
            action: enter_result,
        }
    };
}

/// SearchResultDone, ModifyResponse, AddResponse, DelResponse,
/// ModDNResponse and CompareResponse all decode through this table.
pub(crate) static RESULT_ONLY: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in result-only response",
    start: START,
    transitions: &[
        open_result_only!(5),
        open_result_only!(7),
        open_result_only!(9),
        open_result_only!(11),
        open_result_only!(13),
        open_result_only!(15),
        Transition {
            from: BODY,
            on: On::close(),
            to: DONE,
            action: skip,
        },
    ],
    accepting: |_, state| state == DONE,
};

/// Serialize an LDAPResult body. The referral sequence is written whenever
/// it is non-empty, even for result codes other than `referral`; deployed
/// peers rely on seeing it back.
pub(crate) fn result_tags(result: &LdapResult) -> Vec<Tag> {
    let mut tags = vec![
        Tag::Enumerated(Enumerated {
            inner: result.result_code.code() as i64,
            ..Default::default()
        }),
        Tag::OctetString(OctetString {
            inner: Vec::from(result.matched_dn.to_string().as_bytes()),
            ..Default::default()
        }),
        Tag::OctetString(OctetString {
            inner: Vec::from(result.diagnostic_message.as_bytes()),
            ..Default::default()
        }),
    ];
    if !result.referral.is_empty() {
        tags.push(Tag::Sequence(berstream::structures::Sequence {
            class: CTX,
            id: 3,
            inner: result
                .referral
                .iter()
                .map(|url| {
                    Tag::OctetString(OctetString {
                        inner: Vec::from(url.as_bytes()),
                        ..Default::default()
                    })
                })
                .collect(),
        }));
    }
    tags
}

pub(crate) fn build_result_only(app_tag: u64, result: &LdapResult) -> Tag {
    app_sequence(app_tag, result_tags(result))
}
