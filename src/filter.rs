//! Search filters: the algebraic tree and the RFC 4515 string form.
//!
//! The same [`Filter`] tree is produced by this module's text parser and by
//! the wire codec in [`crate::codec`]; semantically equal inputs on either
//! side yield equal trees.

use std::fmt;
use std::str;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{char, digit1};
use nom::number::complete::u8 as be_u8;
use nom::combinator::{map, map_res, opt, recognize, verify};
use nom::multi::{fold_many0, many0};
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("invalid search filter: {0:?}")]
    Invalid(String),
}

/// An attribute/assertion-value pair used by the comparison filters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributeValueAssertion {
    pub attribute: String,
    pub value: Vec<u8>,
}

/// The pieces of a substrings filter. At most one initial and one final
/// piece may be present; `any` pieces keep their order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubstringFilter {
    pub attribute: String,
    pub initial: Option<Vec<u8>>,
    pub any: Vec<Vec<u8>>,
    pub final_: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MatchingRuleAssertion {
    pub matching_rule: Option<String>,
    pub attribute: Option<String>,
    pub value: Vec<u8>,
    pub dn_attributes: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equality(AttributeValueAssertion),
    Substrings(SubstringFilter),
    GreaterOrEqual(AttributeValueAssertion),
    LessOrEqual(AttributeValueAssertion),
    Present(String),
    Approx(AttributeValueAssertion),
    Extensible(MatchingRuleAssertion),
}

impl Filter {
    pub fn parse(input: &str) -> Result<Filter, FilterParseError> {
        match filtexpr(input.as_bytes()) {
            Ok((rest, f)) if rest.is_empty() => Ok(f),
            _ => Err(FilterParseError::Invalid(input.to_owned())),
        }
    }

    /// A filter matching every entry, used where RFC 4511 requires a filter
    /// but the caller supplies none.
    pub fn present_object_class() -> Filter {
        Filter::Present("objectClass".to_owned())
    }
}

impl str::FromStr for Filter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Filter, FilterParseError> {
        Filter::parse(s)
    }
}

fn fmt_value(f: &mut fmt::Formatter, value: &[u8]) -> fmt::Result {
    for &b in value {
        // parentheses, asterisk, backslash and NUL must be escaped; other
        // non-UTF-8-safe bytes are escaped for printability
        if b == b'(' || b == b')' || b == b'*' || b == b'\\' || b >= 0x80 || b < 0x20 {
            write!(f, "\\{:02x}", b)?;
        } else {
            write!(f, "{}", b as char)?;
        }
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Filter::And(list) => {
                f.write_str("(&")?;
                for sub in list {
                    write!(f, "{}", sub)?;
                }
                f.write_str(")")
            }
            Filter::Or(list) => {
                f.write_str("(|")?;
                for sub in list {
                    write!(f, "{}", sub)?;
                }
                f.write_str(")")
            }
            Filter::Not(inner) => write!(f, "(!{})", inner),
            Filter::Equality(ava) => {
                write!(f, "({}=", ava.attribute)?;
                fmt_value(f, &ava.value)?;
                f.write_str(")")
            }
            Filter::GreaterOrEqual(ava) => {
                write!(f, "({}>=", ava.attribute)?;
                fmt_value(f, &ava.value)?;
                f.write_str(")")
            }
            Filter::LessOrEqual(ava) => {
                write!(f, "({}<=", ava.attribute)?;
                fmt_value(f, &ava.value)?;
                f.write_str(")")
            }
            Filter::Approx(ava) => {
                write!(f, "({}~=", ava.attribute)?;
                fmt_value(f, &ava.value)?;
                f.write_str(")")
            }
            Filter::Present(attr) => write!(f, "({}=*)", attr),
            Filter::Substrings(sub) => {
                write!(f, "({}=", sub.attribute)?;
                if let Some(ref initial) = sub.initial {
                    fmt_value(f, initial)?;
                }
                for any in &sub.any {
                    f.write_str("*")?;
                    fmt_value(f, any)?;
                }
                f.write_str("*")?;
                if let Some(ref fin) = sub.final_ {
                    fmt_value(f, fin)?;
                }
                f.write_str(")")
            }
            Filter::Extensible(mra) => {
                f.write_str("(")?;
                if let Some(ref attr) = mra.attribute {
                    f.write_str(attr)?;
                }
                if mra.dn_attributes {
                    f.write_str(":dn")?;
                }
                if let Some(ref rule) = mra.matching_rule {
                    write!(f, ":{}", rule)?;
                }
                f.write_str(":=")?;
                fmt_value(f, &mra.value)?;
                f.write_str(")")
            }
        }
    }
}

fn filtexpr(i: &[u8]) -> IResult<&[u8], Filter> {
    alt((filter, item))(i)
}

fn filter(i: &[u8]) -> IResult<&[u8], Filter> {
    delimited(char('('), filtercomp, char(')'))(i)
}

fn filtercomp(i: &[u8]) -> IResult<&[u8], Filter> {
    alt((and, or, not, item))(i)
}

fn and(i: &[u8]) -> IResult<&[u8], Filter> {
    map(preceded(char('&'), many0(filter)), Filter::And)(i)
}

fn or(i: &[u8]) -> IResult<&[u8], Filter> {
    map(preceded(char('|'), many0(filter)), Filter::Or)(i)
}

fn not(i: &[u8]) -> IResult<&[u8], Filter> {
    map(preceded(char('!'), filter), |f| Filter::Not(Box::new(f)))(i)
}

fn item(i: &[u8]) -> IResult<&[u8], Filter> {
    alt((eq, non_eq, extensible))(i)
}

pub(crate) enum Unescaper {
    WantFirst,
    WantSecond(u8),
    Value(u8),
    Error,
}

impl Unescaper {
    pub(crate) fn feed(&self, c: u8) -> Unescaper {
        match *self {
            Unescaper::Error => Unescaper::Error,
            Unescaper::WantFirst => {
                if c.is_ascii_hexdigit() {
                    Unescaper::WantSecond(hex_value(c))
                } else {
                    Unescaper::Error
                }
            }
            Unescaper::WantSecond(partial) => {
                if c.is_ascii_hexdigit() {
                    Unescaper::Value((partial << 4) + hex_value(c))
                } else {
                    Unescaper::Error
                }
            }
            Unescaper::Value(_v) => {
                if c != b'\\' {
                    Unescaper::Value(c)
                } else {
                    Unescaper::WantFirst
                }
            }
        }
    }
}

fn hex_value(c: u8) -> u8 {
    c - if c <= b'9' { b'0' } else { (c & 0x20) + b'A' - 10 }
}

fn is_value_char(c: u8) -> bool {
    c != 0 && c != b'(' && c != b')' && c != b'*'
}

// Any byte in the assertion value may be represented by \NN, where N is a
// hex digit. Some characters must be represented in this way: parentheses,
// asterisk and backslash itself.
fn unescaped(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map_res(
        fold_many0(
            verify(be_u8, |&c| is_value_char(c)),
            || (Unescaper::Value(0), Vec::new()),
            |(u, mut vec): (Unescaper, Vec<_>), c: u8| {
                let u = u.feed(c);
                if let Unescaper::Value(c) = u {
                    vec.push(c);
                }
                (u, vec)
            },
        ),
        |(u, vec): (Unescaper, Vec<_>)| -> Result<Vec<u8>, ()> {
            if let Unescaper::Value(_) = u {
                Ok(vec)
            } else {
                Err(())
            }
        },
    )(i)
}

fn non_eq(i: &[u8]) -> IResult<&[u8], Filter> {
    map(
        tuple((
            attributedescription,
            alt((tag(">="), tag("<="), tag("~="))),
            unescaped,
        )),
        |(attr, filterop, value)| {
            let ava = AttributeValueAssertion {
                attribute: String::from_utf8_lossy(attr).into_owned(),
                value,
            };
            match filterop {
                b">=" => Filter::GreaterOrEqual(ava),
                b"<=" => Filter::LessOrEqual(ava),
                _ => Filter::Approx(ava),
            }
        },
    )(i)
}

fn eq(i: &[u8]) -> IResult<&[u8], Filter> {
    map_res(
        tuple((
            attributedescription,
            char('='),
            unescaped,
            many0(preceded(tag("*"), unescaped)),
        )),
        |(attr, _, initial, mid_final)| -> Result<Filter, ()> {
            // an empty element may exist only at the very end; otherwise, we
            // have two adjacent asterisks
            if mid_final
                .iter()
                .enumerate()
                .any(|(n, v)| v.is_empty() && n + 1 != mid_final.len())
            {
                return Err(());
            }
            let attr = String::from_utf8_lossy(attr).into_owned();
            if mid_final.is_empty() {
                // simple equality, no asterisks in assertion value
                return Ok(Filter::Equality(AttributeValueAssertion {
                    attribute: attr,
                    value: initial,
                }));
            }
            if initial.is_empty() && mid_final.len() == 1 && mid_final[0].is_empty() {
                // presence, single asterisk in assertion value
                return Ok(Filter::Present(attr));
            }
            let mut sub = SubstringFilter {
                attribute: attr,
                initial: if initial.is_empty() { None } else { Some(initial) },
                any: Vec::new(),
                final_: None,
            };
            let n = mid_final.len();
            for (ix, piece) in mid_final.into_iter().enumerate() {
                if piece.is_empty() {
                    break;
                }
                if ix + 1 != n {
                    sub.any.push(piece);
                } else {
                    sub.final_ = Some(piece);
                }
            }
            Ok(Filter::Substrings(sub))
        },
    )(i)
}

fn extensible(i: &[u8]) -> IResult<&[u8], Filter> {
    alt((attr_dn_mrule, dn_mrule))(i)
}

fn attr_dn_mrule(i: &[u8]) -> IResult<&[u8], Filter> {
    map(
        tuple((
            attributedescription,
            opt(tag(":dn")),
            opt(preceded(char(':'), attributetype)),
            tag(":="),
            unescaped,
        )),
        |(attr, dn, mrule, _, value)| extensible_filter(mrule, Some(attr), value, dn.is_some()),
    )(i)
}

fn dn_mrule(i: &[u8]) -> IResult<&[u8], Filter> {
    map(
        tuple((
            opt(tag(":dn")),
            preceded(char(':'), attributetype),
            tag(":="),
            unescaped,
        )),
        |(dn, mrule, _, value)| extensible_filter(Some(mrule), None, value, dn.is_some()),
    )(i)
}

fn extensible_filter(
    mrule: Option<&[u8]>,
    attr: Option<&[u8]>,
    value: Vec<u8>,
    dn: bool,
) -> Filter {
    Filter::Extensible(MatchingRuleAssertion {
        matching_rule: mrule.map(|m| String::from_utf8_lossy(m).into_owned()),
        attribute: attr.map(|a| String::from_utf8_lossy(a).into_owned()),
        value,
        dn_attributes: dn,
    })
}

fn attributedescription(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(pair(
        attributetype,
        many0(preceded(char(';'), take_while1(is_alnum_hyphen))),
    ))(i)
}

fn attributetype(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((numericoid, descr))(i)
}

fn numericoid(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(pair(number, many0(preceded(char('.'), number))))(i)
}

// A number may be zero, but must not have superfluous leading zeroes
fn number(i: &[u8]) -> IResult<&[u8], &[u8]> {
    verify(digit1, |d: &[u8]| d.len() == 1 || d[0] != b'0')(i)
}

fn descr(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(pair(
        verify(be_u8, |c| c.is_ascii_alphabetic()),
        take_while(is_alnum_hyphen),
    ))(i)
}

fn is_alnum_hyphen(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-'
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equality() {
        let f = Filter::parse("(cn=test)").expect("filter");
        assert_eq!(
            f,
            Filter::Equality(AttributeValueAssertion {
                attribute: "cn".into(),
                value: b"test".to_vec(),
            })
        );
        assert_eq!(f.to_string(), "(cn=test)");
    }

    #[test]
    fn composite() {
        let f = Filter::parse("(&(objectClass=person)(!(cn=x))(|(sn=a)(sn=b)))").expect("filter");
        match &f {
            Filter::And(list) => {
                assert_eq!(list.len(), 3);
                assert!(matches!(list[1], Filter::Not(_)));
                assert!(matches!(&list[2], Filter::Or(l) if l.len() == 2));
            }
            _ => panic!("expected and"),
        }
        assert_eq!(f.to_string(), "(&(objectClass=person)(!(cn=x))(|(sn=a)(sn=b)))");
    }

    #[test]
    fn presence_and_substrings() {
        assert_eq!(
            Filter::parse("(cn=*)").expect("filter"),
            Filter::Present("cn".into())
        );
        let f = Filter::parse("(cn=ab*cd*ef)").expect("filter");
        assert_eq!(
            f,
            Filter::Substrings(SubstringFilter {
                attribute: "cn".into(),
                initial: Some(b"ab".to_vec()),
                any: vec![b"cd".to_vec()],
                final_: Some(b"ef".to_vec()),
            })
        );
        assert_eq!(f.to_string(), "(cn=ab*cd*ef)");
        let f = Filter::parse("(cn=*mid*)").expect("filter");
        assert_eq!(
            f,
            Filter::Substrings(SubstringFilter {
                attribute: "cn".into(),
                initial: None,
                any: vec![b"mid".to_vec()],
                final_: None,
            })
        );
        assert_eq!(f.to_string(), "(cn=*mid*)");
    }

    #[test]
    fn adjacent_asterisks_rejected() {
        assert!(Filter::parse("(cn=a**b)").is_err());
    }

    #[test]
    fn inequalities() {
        assert!(matches!(
            Filter::parse("(uidNumber>=100)").expect("filter"),
            Filter::GreaterOrEqual(_)
        ));
        assert!(matches!(
            Filter::parse("(uidNumber<=100)").expect("filter"),
            Filter::LessOrEqual(_)
        ));
        assert!(matches!(
            Filter::parse("(cn~=tets)").expect("filter"),
            Filter::Approx(_)
        ));
    }

    #[test]
    fn extensible_forms() {
        let f = Filter::parse("(cn:dn:1.2.840.48018.1.2.2:=aok)").expect("filter");
        assert_eq!(
            f,
            Filter::Extensible(MatchingRuleAssertion {
                matching_rule: Some("1.2.840.48018.1.2.2".into()),
                attribute: Some("cn".into()),
                value: b"aok".to_vec(),
                dn_attributes: true,
            })
        );
        let f = Filter::parse("(:caseExactMatch:=mv)").expect("filter");
        assert_eq!(
            f,
            Filter::Extensible(MatchingRuleAssertion {
                matching_rule: Some("caseExactMatch".into()),
                attribute: None,
                value: b"mv".to_vec(),
                dn_attributes: false,
            })
        );
    }

    #[test]
    fn escaped_value_bytes() {
        let f = Filter::parse(r"(cn=a\2ab)").expect("filter");
        assert_eq!(
            f,
            Filter::Equality(AttributeValueAssertion {
                attribute: "cn".into(),
                value: b"a*b".to_vec(),
            })
        );
        assert_eq!(f.to_string(), r"(cn=a\2ab)");
    }

    #[test]
    fn unbalanced_rejected() {
        assert!(Filter::parse("(cn=test").is_err());
        assert!(Filter::parse("cn=test)").is_err());
    }
}
