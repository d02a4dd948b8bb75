//! The wire grammar and encoder for search filters.
//!
//! The grammar is self-recursive through a frame stack held in the
//! container: `and`, `or` and `not` push a composite frame which collects
//! completed children and closes with its own TLV. Leaf shapes (AVA
//! matches, substrings, presence, extensible) run through dedicated states
//! and attach to the innermost open frame, or become the finished filter
//! when the stack is empty.

use berstream::structures::{Boolean, ExplicitTag, OctetString, Sequence, Tag};

use super::{ev_utf8, Container, CTX, OCTS, SEQ, UNI};
use crate::error::OpError;
use crate::filter::{AttributeValueAssertion, Filter, MatchingRuleAssertion, SubstringFilter};
use crate::grammar::{skip, Event, Follow, GrammarTable, On, Transition};

// filter node tags, RFC 4511 §4.5.1.7
const AND_FILT: u64 = 0;
const OR_FILT: u64 = 1;
const NOT_FILT: u64 = 2;
const EQ_MATCH: u64 = 3;
const SUBSTR_MATCH: u64 = 4;
const GTE_MATCH: u64 = 5;
const LTE_MATCH: u64 = 6;
const PRES_MATCH: u64 = 7;
const APPROX_MATCH: u64 = 8;
const EXT_MATCH: u64 = 9;

const SUB_INITIAL: u64 = 0;
const SUB_ANY: u64 = 1;
const SUB_FINAL: u64 = 2;

const MRA_RULE: u64 = 1;
const MRA_TYPE: u64 = 2;
const MRA_VALUE: u64 = 3;
const MRA_DN_ATTRS: u64 = 4;

#[derive(Clone, Copy, PartialEq, Eq)]
enum AvaKind {
    Eq,
    Gte,
    Lte,
    Approx,
}

enum Frame {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Option<Filter>),
}

/// Leaf node under construction; the grammar states serialize access, so a
/// single slot suffices.
enum Pending {
    None,
    Ava {
        kind: AvaKind,
        attr: String,
        value: Vec<u8>,
    },
    Substr(SubstringFilter),
    Ext(MatchingRuleAssertion),
}

pub(crate) struct FilterBuilder {
    stack: Vec<Frame>,
    pending: Pending,
    done: Option<Filter>,
}

impl FilterBuilder {
    pub(crate) fn new() -> FilterBuilder {
        FilterBuilder {
            stack: Vec::new(),
            pending: Pending::None,
            done: None,
        }
    }

    pub(crate) fn take(&mut self) -> Option<Filter> {
        self.done.take()
    }

    /// Attach a completed node; reports the follow-up grammar state.
    fn attach(&mut self, f: Filter) -> Result<Follow<Container>, OpError> {
        match self.stack.last_mut() {
            Some(Frame::And(children)) | Some(Frame::Or(children)) => {
                children.push(f);
                Ok(Follow::Goto(NODE))
            }
            Some(Frame::Not(slot)) => {
                if slot.is_some() {
                    return Err(OpError::Protocol("more than one filter under a not"));
                }
                *slot = Some(f);
                Ok(Follow::Goto(NODE))
            }
            None => {
                if self.done.is_some() {
                    return Err(OpError::Protocol("more than one top-level filter"));
                }
                self.done = Some(f);
                Ok(Follow::Goto(DONE))
            }
        }
    }
}

const NODE: u8 = 0;
const DONE: u8 = 1;
const AVA_ATTR: u8 = 2;
const AVA_VALUE: u8 = 3;
const AVA_END: u8 = 4;
const SUB_ATTR: u8 = 5;
const SUB_SEQ: u8 = 6;
const SUB_ELEMS: u8 = 7;
const SUB_END: u8 = 8;
const EXT_FIELDS: u8 = 9;
const EXT_AFTER_RULE: u8 = 10;
const EXT_AFTER_TYPE: u8 = 11;
const EXT_AFTER_VALUE: u8 = 12;
const EXT_AFTER_DN: u8 = 13;

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

pub(crate) static FILTER: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in filter",
    start: NODE,
    transitions: &[
        // composites
        t!(NODE, On::open(CTX, AND_FILT), NODE, push_and),
        t!(NODE, On::open(CTX, OR_FILT), NODE, push_or),
        t!(NODE, On::open(CTX, NOT_FILT), NODE, push_not),
        t!(NODE, On::close(), NODE, pop_composite),
        // AVA-shaped leaves
        t!(NODE, On::open(CTX, EQ_MATCH), AVA_ATTR, begin_eq),
        t!(NODE, On::open(CTX, GTE_MATCH), AVA_ATTR, begin_gte),
        t!(NODE, On::open(CTX, LTE_MATCH), AVA_ATTR, begin_lte),
        t!(NODE, On::open(CTX, APPROX_MATCH), AVA_ATTR, begin_approx),
        t!(AVA_ATTR, On::prim(UNI, OCTS), AVA_VALUE, ava_attr),
        t!(AVA_VALUE, On::prim(UNI, OCTS), AVA_END, ava_value),
        t!(AVA_END, On::close(), NODE, attach_ava),
        // presence
        t!(NODE, On::prim(CTX, PRES_MATCH), NODE, attach_present),
        // substrings
        t!(NODE, On::open(CTX, SUBSTR_MATCH), SUB_ATTR, begin_substr),
        t!(SUB_ATTR, On::prim(UNI, OCTS), SUB_SEQ, sub_attr),
        t!(SUB_SEQ, On::open(UNI, SEQ), SUB_ELEMS, skip),
        t!(SUB_ELEMS, On::prim(CTX, SUB_INITIAL), SUB_ELEMS, sub_initial),
        t!(SUB_ELEMS, On::prim(CTX, SUB_ANY), SUB_ELEMS, sub_any),
        t!(SUB_ELEMS, On::prim(CTX, SUB_FINAL), SUB_ELEMS, sub_final),
        t!(SUB_ELEMS, On::close(), SUB_END, end_sub_elems),
        t!(SUB_END, On::close(), NODE, attach_substr),
        // extensible match
        t!(NODE, On::open(CTX, EXT_MATCH), EXT_FIELDS, begin_ext),
        t!(EXT_FIELDS, On::prim(CTX, MRA_RULE), EXT_AFTER_RULE, ext_rule),
        t!(EXT_FIELDS, On::prim(CTX, MRA_TYPE), EXT_AFTER_TYPE, ext_type),
        t!(EXT_FIELDS, On::prim(CTX, MRA_VALUE), EXT_AFTER_VALUE, ext_value),
        t!(EXT_AFTER_RULE, On::prim(CTX, MRA_TYPE), EXT_AFTER_TYPE, ext_type),
        t!(EXT_AFTER_RULE, On::prim(CTX, MRA_VALUE), EXT_AFTER_VALUE, ext_value),
        t!(EXT_AFTER_TYPE, On::prim(CTX, MRA_VALUE), EXT_AFTER_VALUE, ext_value),
        t!(EXT_AFTER_VALUE, On::prim(CTX, MRA_DN_ATTRS), EXT_AFTER_DN, ext_dn_attrs),
        t!(EXT_AFTER_VALUE, On::close(), NODE, attach_ext),
        t!(EXT_AFTER_DN, On::close(), NODE, attach_ext),
    ],
    accepting: |_, state| state == DONE,
};

type R = Result<Follow<Container>, OpError>;

fn push_and(c: &mut Container, _ev: &Event) -> R {
    c.filter.stack.push(Frame::And(Vec::new()));
    Ok(Follow::Next)
}

fn push_or(c: &mut Container, _ev: &Event) -> R {
    c.filter.stack.push(Frame::Or(Vec::new()));
    Ok(Follow::Next)
}

fn push_not(c: &mut Container, _ev: &Event) -> R {
    c.filter.stack.push(Frame::Not(None));
    Ok(Follow::Next)
}

fn pop_composite(c: &mut Container, _ev: &Event) -> R {
    let node = match c.filter.stack.pop() {
        Some(Frame::And(children)) => Filter::And(children),
        Some(Frame::Or(children)) => Filter::Or(children),
        Some(Frame::Not(Some(inner))) => Filter::Not(Box::new(inner)),
        Some(Frame::Not(None)) => return Err(OpError::Protocol("not filter without operand")),
        None => return Err(OpError::Protocol("unbalanced filter nesting")),
    };
    c.filter.attach(node)
}

fn begin_ava(c: &mut Container, kind: AvaKind) -> R {
    c.filter.pending = Pending::Ava {
        kind,
        attr: String::new(),
        value: Vec::new(),
    };
    Ok(Follow::Next)
}

fn begin_eq(c: &mut Container, _ev: &Event) -> R {
    begin_ava(c, AvaKind::Eq)
}

fn begin_gte(c: &mut Container, _ev: &Event) -> R {
    begin_ava(c, AvaKind::Gte)
}

fn begin_lte(c: &mut Container, _ev: &Event) -> R {
    begin_ava(c, AvaKind::Lte)
}

fn begin_approx(c: &mut Container, _ev: &Event) -> R {
    begin_ava(c, AvaKind::Approx)
}

fn ava_attr(c: &mut Container, ev: &Event) -> R {
    match &mut c.filter.pending {
        Pending::Ava { attr, .. } => *attr = ev_utf8(ev, "filter attribute description")?,
        _ => return Err(OpError::Protocol("filter state mismatch")),
    }
    Ok(Follow::Next)
}

fn ava_value(c: &mut Container, ev: &Event) -> R {
    match &mut c.filter.pending {
        Pending::Ava { value, .. } => *value = ev.value.to_vec(),
        _ => return Err(OpError::Protocol("filter state mismatch")),
    }
    Ok(Follow::Next)
}

fn attach_ava(c: &mut Container, _ev: &Event) -> R {
    let (kind, attr, value) = match std::mem::replace(&mut c.filter.pending, Pending::None) {
        Pending::Ava { kind, attr, value } => (kind, attr, value),
        _ => return Err(OpError::Protocol("filter state mismatch")),
    };
    let ava = AttributeValueAssertion {
        attribute: attr,
        value,
    };
    let node = match kind {
        AvaKind::Eq => Filter::Equality(ava),
        AvaKind::Gte => Filter::GreaterOrEqual(ava),
        AvaKind::Lte => Filter::LessOrEqual(ava),
        AvaKind::Approx => Filter::Approx(ava),
    };
    c.filter.attach(node)
}

fn attach_present(c: &mut Container, ev: &Event) -> R {
    let attr = ev_utf8(ev, "presence filter attribute")?;
    c.filter.attach(Filter::Present(attr))
}

fn begin_substr(c: &mut Container, _ev: &Event) -> R {
    c.filter.pending = Pending::Substr(SubstringFilter {
        attribute: String::new(),
        initial: None,
        any: Vec::new(),
        final_: None,
    });
    Ok(Follow::Next)
}

fn substr_mut(c: &mut Container) -> Result<&mut SubstringFilter, OpError> {
    match &mut c.filter.pending {
        Pending::Substr(sub) => Ok(sub),
        _ => Err(OpError::Protocol("filter state mismatch")),
    }
}

fn sub_attr(c: &mut Container, ev: &Event) -> R {
    let attr = ev_utf8(ev, "substrings filter attribute")?;
    substr_mut(c)?.attribute = attr;
    Ok(Follow::Next)
}

fn sub_initial(c: &mut Container, ev: &Event) -> R {
    let sub = substr_mut(c)?;
    if sub.initial.is_some() || !sub.any.is_empty() || sub.final_.is_some() {
        return Err(OpError::Protocol("initial substring out of order"));
    }
    sub.initial = Some(ev.value.to_vec());
    Ok(Follow::Next)
}

fn sub_any(c: &mut Container, ev: &Event) -> R {
    let sub = substr_mut(c)?;
    if sub.final_.is_some() {
        return Err(OpError::Protocol("any substring after final"));
    }
    sub.any.push(ev.value.to_vec());
    Ok(Follow::Next)
}

fn sub_final(c: &mut Container, ev: &Event) -> R {
    let sub = substr_mut(c)?;
    if sub.final_.is_some() {
        return Err(OpError::Protocol("more than one final substring"));
    }
    sub.final_ = Some(ev.value.to_vec());
    Ok(Follow::Next)
}

fn end_sub_elems(c: &mut Container, _ev: &Event) -> R {
    let sub = substr_mut(c)?;
    if sub.initial.is_none() && sub.any.is_empty() && sub.final_.is_none() {
        return Err(OpError::Protocol("substrings filter without substrings"));
    }
    Ok(Follow::Next)
}

fn attach_substr(c: &mut Container, _ev: &Event) -> R {
    let sub = match std::mem::replace(&mut c.filter.pending, Pending::None) {
        Pending::Substr(sub) => sub,
        _ => return Err(OpError::Protocol("filter state mismatch")),
    };
    c.filter.attach(Filter::Substrings(sub))
}

fn begin_ext(c: &mut Container, _ev: &Event) -> R {
    c.filter.pending = Pending::Ext(MatchingRuleAssertion {
        matching_rule: None,
        attribute: None,
        value: Vec::new(),
        dn_attributes: false,
    });
    Ok(Follow::Next)
}

fn ext_mut(c: &mut Container) -> Result<&mut MatchingRuleAssertion, OpError> {
    match &mut c.filter.pending {
        Pending::Ext(mra) => Ok(mra),
        _ => Err(OpError::Protocol("filter state mismatch")),
    }
}

fn ext_rule(c: &mut Container, ev: &Event) -> R {
    let rule = ev_utf8(ev, "extensible match rule")?;
    ext_mut(c)?.matching_rule = Some(rule);
    Ok(Follow::Next)
}

fn ext_type(c: &mut Container, ev: &Event) -> R {
    let attr = ev_utf8(ev, "extensible match type")?;
    ext_mut(c)?.attribute = Some(attr);
    Ok(Follow::Next)
}

fn ext_value(c: &mut Container, ev: &Event) -> R {
    ext_mut(c)?.value = ev.value.to_vec();
    Ok(Follow::Next)
}

fn ext_dn_attrs(c: &mut Container, ev: &Event) -> R {
    let dn = super::ev_bool(ev, "extensible match dnAttributes")?;
    ext_mut(c)?.dn_attributes = dn;
    Ok(Follow::Next)
}

fn attach_ext(c: &mut Container, _ev: &Event) -> R {
    let mra = match std::mem::replace(&mut c.filter.pending, Pending::None) {
        Pending::Ext(mra) => mra,
        _ => return Err(OpError::Protocol("filter state mismatch")),
    };
    if mra.matching_rule.is_none() && mra.attribute.is_none() {
        return Err(OpError::Protocol(
            "extensible match needs a rule or a type",
        ));
    }
    c.filter.attach(Filter::Extensible(mra))
}

/// Serialize a filter tree into its wire form.
pub(crate) fn build_filter(f: &Filter) -> Tag {
    match f {
        Filter::And(children) => composite(AND_FILT, children),
        Filter::Or(children) => composite(OR_FILT, children),
        Filter::Not(inner) => Tag::ExplicitTag(ExplicitTag {
            class: CTX,
            id: NOT_FILT,
            inner: Box::new(build_filter(inner)),
        }),
        Filter::Equality(ava) => ava_tag(EQ_MATCH, ava),
        Filter::GreaterOrEqual(ava) => ava_tag(GTE_MATCH, ava),
        Filter::LessOrEqual(ava) => ava_tag(LTE_MATCH, ava),
        Filter::Approx(ava) => ava_tag(APPROX_MATCH, ava),
        Filter::Present(attr) => Tag::OctetString(OctetString {
            class: CTX,
            id: PRES_MATCH,
            inner: Vec::from(attr.as_bytes()),
        }),
        Filter::Substrings(sub) => {
            let mut pieces = Vec::new();
            if let Some(ref initial) = sub.initial {
                pieces.push(Tag::OctetString(OctetString {
                    class: CTX,
                    id: SUB_INITIAL,
                    inner: initial.clone(),
                }));
            }
            for any in &sub.any {
                pieces.push(Tag::OctetString(OctetString {
                    class: CTX,
                    id: SUB_ANY,
                    inner: any.clone(),
                }));
            }
            if let Some(ref fin) = sub.final_ {
                pieces.push(Tag::OctetString(OctetString {
                    class: CTX,
                    id: SUB_FINAL,
                    inner: fin.clone(),
                }));
            }
            Tag::Sequence(Sequence {
                class: CTX,
                id: SUBSTR_MATCH,
                inner: vec![
                    Tag::OctetString(OctetString {
                        inner: Vec::from(sub.attribute.as_bytes()),
                        ..Default::default()
                    }),
                    Tag::Sequence(Sequence {
                        inner: pieces,
                        ..Default::default()
                    }),
                ],
            })
        }
        Filter::Extensible(mra) => {
            let mut inner = Vec::new();
            if let Some(ref rule) = mra.matching_rule {
                inner.push(Tag::OctetString(OctetString {
                    class: CTX,
                    id: MRA_RULE,
                    inner: Vec::from(rule.as_bytes()),
                }));
            }
            if let Some(ref attr) = mra.attribute {
                inner.push(Tag::OctetString(OctetString {
                    class: CTX,
                    id: MRA_TYPE,
                    inner: Vec::from(attr.as_bytes()),
                }));
            }
            inner.push(Tag::OctetString(OctetString {
                class: CTX,
                id: MRA_VALUE,
                inner: mra.value.clone(),
            }));
            if mra.dn_attributes {
                inner.push(Tag::Boolean(Boolean {
                    class: CTX,
                    id: MRA_DN_ATTRS,
                    inner: true,
                }));
            }
            Tag::Sequence(Sequence {
                class: CTX,
                id: EXT_MATCH,
                inner,
            })
        }
    }
}

fn composite(id: u64, children: &[Filter]) -> Tag {
    Tag::Sequence(Sequence {
        class: CTX,
        id,
        inner: children.iter().map(build_filter).collect(),
    })
}

fn ava_tag(id: u64, ava: &AttributeValueAssertion) -> Tag {
    Tag::Sequence(Sequence {
        class: CTX,
        id,
        inner: vec![
            Tag::OctetString(OctetString {
                inner: Vec::from(ava.attribute.as_bytes()),
                ..Default::default()
            }),
            Tag::OctetString(OctetString {
                inner: ava.value.clone(),
                ..Default::default()
            }),
        ],
    })
}
