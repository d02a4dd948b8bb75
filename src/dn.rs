//! Distinguished names: RFC 4514 string form and the structured model.
//!
//! A [`Dn`] is a leaf-first sequence of [`Rdn`]s; each RDN holds one or more
//! [`Ava`]s joined by `+` in the string form. Parsing preserves the exact
//! user-supplied string so that decoded names re-encode byte-for-byte, while
//! equality and hashing go through a normalized form: attribute types are
//! lowercased and, lacking schema-driven matching rules, values fall back to
//! ASCII lowercasing with whitespace runs collapsed.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

use crate::entry::AttrValue;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DnParseError {
    #[error("invalid distinguished name: {0:?}")]
    Invalid(String),
    #[error("invalid attribute type in: {0:?}")]
    BadType(String),
    #[error("invalid escape sequence in: {0:?}")]
    BadEscape(String),
    #[error("odd or malformed hex string in: {0:?}")]
    BadHexString(String),
}

/// One attribute type and value assertion.
#[derive(Clone, Debug, Eq)]
pub struct Ava {
    up_type: String,
    value: AttrValue,
}

impl Ava {
    pub fn new(up_type: &str, value: AttrValue) -> Ava {
        Ava {
            up_type: up_type.to_owned(),
            value,
        }
    }

    pub fn attr_type(&self) -> &str {
        &self.up_type
    }

    pub fn value(&self) -> &AttrValue {
        &self.value
    }

    fn norm_type(&self) -> String {
        self.up_type.to_ascii_lowercase()
    }

    fn norm_value(&self) -> Vec<u8> {
        match &self.value {
            AttrValue::Text(s) => {
                let mut out = String::with_capacity(s.len());
                let mut in_space = false;
                for c in s.trim().chars() {
                    if c.is_whitespace() {
                        if !in_space {
                            out.push(' ');
                        }
                        in_space = true;
                    } else {
                        out.push(c.to_ascii_lowercase());
                        in_space = false;
                    }
                }
                out.into_bytes()
            }
            AttrValue::Binary(b) => b.clone(),
        }
    }
}

impl PartialEq for Ava {
    fn eq(&self, other: &Self) -> bool {
        self.norm_type() == other.norm_type() && self.norm_value() == other.norm_value()
    }
}

impl Hash for Ava {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.norm_type().hash(state);
        self.norm_value().hash(state);
    }
}

impl fmt::Display for Ava {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.value {
            AttrValue::Text(s) => write!(f, "{}={}", self.up_type, escape_value(s)),
            AttrValue::Binary(b) => {
                write!(f, "{}=#", self.up_type)?;
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// A relative distinguished name: a non-empty set of AVAs.
#[derive(Clone, Debug, Eq)]
pub struct Rdn {
    avas: Vec<Ava>,
}

impl Rdn {
    pub fn new(avas: Vec<Ava>) -> Rdn {
        assert!(!avas.is_empty(), "RDN needs at least one AVA");
        Rdn { avas }
    }

    pub fn parse(s: &str) -> Result<Rdn, DnParseError> {
        let mut cursor = Cursor::new(s);
        let rdn = cursor.rdn()?;
        if !cursor.at_end() {
            return Err(DnParseError::Invalid(s.to_owned()));
        }
        Ok(rdn)
    }

    pub fn avas(&self) -> &[Ava] {
        &self.avas
    }

    /// True when the RDN consists of a single AVA.
    pub fn is_simple(&self) -> bool {
        self.avas.len() == 1
    }

    pub fn contains(&self, ava: &Ava) -> bool {
        self.avas.iter().any(|a| a == ava)
    }

    fn norm_pairs(&self) -> Vec<(String, Vec<u8>)> {
        let mut pairs: Vec<_> = self
            .avas
            .iter()
            .map(|a| (a.norm_type(), a.norm_value()))
            .collect();
        pairs.sort();
        pairs
    }
}

impl PartialEq for Rdn {
    fn eq(&self, other: &Self) -> bool {
        self.norm_pairs() == other.norm_pairs()
    }
}

impl Hash for Rdn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.norm_pairs().hash(state);
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for ava in &self.avas {
            if !first {
                f.write_str("+")?;
            }
            write!(f, "{}", ava)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Rdn {
    type Err = DnParseError;

    fn from_str(s: &str) -> Result<Rdn, DnParseError> {
        Rdn::parse(s)
    }
}

/// A distinguished name, leaf RDN first. The empty DN is valid.
#[derive(Clone, Debug, Eq)]
pub struct Dn {
    user: String,
    rdns: Vec<Rdn>,
}

impl Dn {
    pub fn empty() -> Dn {
        Dn {
            user: String::new(),
            rdns: Vec::new(),
        }
    }

    pub fn parse(s: &str) -> Result<Dn, DnParseError> {
        if s.is_empty() {
            return Ok(Dn::empty());
        }
        let mut cursor = Cursor::new(s);
        let mut rdns = vec![cursor.rdn()?];
        while cursor.eat_separator() {
            rdns.push(cursor.rdn()?);
        }
        if !cursor.at_end() {
            return Err(DnParseError::Invalid(s.to_owned()));
        }
        Ok(Dn {
            user: s.to_owned(),
            rdns,
        })
    }

    /// Build a DN from structured parts; the user form becomes the
    /// canonical join of the RDN string forms.
    pub fn from_rdns(rdns: Vec<Rdn>) -> Dn {
        let user = rdns
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Dn { user, rdns }
    }

    /// Prepend a leaf RDN to a parent DN.
    pub fn child_of(rdn: Rdn, parent: &Dn) -> Dn {
        let mut rdns = Vec::with_capacity(parent.rdns.len() + 1);
        rdns.push(rdn);
        rdns.extend(parent.rdns.iter().cloned());
        Dn::from_rdns(rdns)
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// The leaf (leftmost) RDN.
    pub fn rdn(&self) -> Option<&Rdn> {
        self.rdns.first()
    }

    /// Everything but the leaf RDN.
    pub fn parent(&self) -> Dn {
        if self.rdns.is_empty() {
            Dn::empty()
        } else {
            Dn::from_rdns(self.rdns[1..].to_vec())
        }
    }

    /// The exact string this DN was parsed from, or the canonical join for
    /// a DN built from parts.
    pub fn as_user_str(&self) -> &str {
        &self.user
    }

    /// Normalized string form used for equality and hashing.
    pub fn to_normalized(&self) -> String {
        self.rdns
            .iter()
            .map(|rdn| {
                rdn.norm_pairs()
                    .into_iter()
                    .map(|(t, v)| format!("{}={}", t, String::from_utf8_lossy(&v)))
                    .collect::<Vec<_>>()
                    .join("+")
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl PartialEq for Dn {
    fn eq(&self, other: &Self) -> bool {
        self.rdns == other.rdns
    }
}

impl Hash for Dn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rdns.hash(state);
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.user)
    }
}

impl FromStr for Dn {
    type Err = DnParseError;

    fn from_str(s: &str) -> Result<Dn, DnParseError> {
        Dn::parse(s)
    }
}

/// Escape a value for the RFC 4514 string form.
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    for (ix, c) in value.char_indices() {
        let escape = match c {
            '"' | '+' | ',' | ';' | '<' | '>' | '\\' | '=' => true,
            '#' => ix == 0,
            ' ' => ix == 0 || ix == bytes.len() - 1,
            '\0' => {
                out.push_str("\\00");
                continue;
            }
            _ => false,
        };
        if escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

struct Cursor<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Cursor<'a> {
        Cursor {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn err(&self) -> DnParseError {
        DnParseError::Invalid(self.src.to_owned())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn eat_separator(&mut self) -> bool {
        match self.peek() {
            Some(b',') | Some(b';') => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn rdn(&mut self) -> Result<Rdn, DnParseError> {
        let mut avas = vec![self.ava()?];
        while self.peek() == Some(b'+') {
            self.pos += 1;
            avas.push(self.ava()?);
        }
        Ok(Rdn { avas })
    }

    fn ava(&mut self) -> Result<Ava, DnParseError> {
        self.skip_spaces();
        let up_type = self.attr_type()?;
        self.skip_spaces();
        if self.peek() != Some(b'=') {
            return Err(self.err());
        }
        self.pos += 1;
        self.skip_spaces();
        let value = self.value()?;
        Ok(Ava {
            up_type: up_type.to_owned(),
            value,
        })
    }

    /// descr (leading alpha, then alphanumeric or hyphen) or numeric OID.
    fn attr_type(&mut self) -> Result<&'a str, DnParseError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() => {
                while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'-') {
                    self.pos += 1;
                }
            }
            Some(c) if c.is_ascii_digit() => {
                while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == b'.') {
                    self.pos += 1;
                }
                let oid = &self.src[start..self.pos];
                if oid.split('.').any(|arc| arc.is_empty()) {
                    return Err(DnParseError::BadType(self.src.to_owned()));
                }
            }
            _ => return Err(DnParseError::BadType(self.src.to_owned())),
        }
        Ok(&self.src[start..self.pos])
    }

    fn value(&mut self) -> Result<AttrValue, DnParseError> {
        match self.peek() {
            Some(b'#') => self.hex_value(),
            Some(b'"') => self.quoted_value(),
            _ => self.escaped_value(),
        }
    }

    fn hex_value(&mut self) -> Result<AttrValue, DnParseError> {
        self.pos += 1;
        let mut out = Vec::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
            let hi = self.bytes[self.pos];
            let lo = match self.bytes.get(self.pos + 1) {
                Some(&c) if c.is_ascii_hexdigit() => c,
                _ => return Err(DnParseError::BadHexString(self.src.to_owned())),
            };
            out.push(hex_nibble(hi) << 4 | hex_nibble(lo));
            self.pos += 2;
        }
        if out.is_empty() {
            return Err(DnParseError::BadHexString(self.src.to_owned()));
        }
        Ok(AttrValue::Binary(out))
    }

    /// Legacy RFC 1779 quoted form, still accepted on input.
    fn quoted_value(&mut self) -> Result<AttrValue, DnParseError> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.err()),
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    out.push(self.escape_tail()?);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(AttrValue::from_bytes(out))
    }

    fn escaped_value(&mut self) -> Result<AttrValue, DnParseError> {
        let mut out = Vec::new();
        let mut trailing_spaces = 0usize;
        loop {
            match self.peek() {
                None | Some(b',') | Some(b';') | Some(b'+') => break,
                Some(b'\\') => {
                    self.pos += 1;
                    out.push(self.escape_tail()?);
                    trailing_spaces = 0;
                }
                Some(0) => return Err(self.err()),
                Some(c) => {
                    out.push(c);
                    trailing_spaces = if c == b' ' { trailing_spaces + 1 } else { 0 };
                    self.pos += 1;
                }
            }
        }
        out.truncate(out.len() - trailing_spaces);
        Ok(AttrValue::from_bytes(out))
    }

    /// The byte designated by an escape, cursor past the backslash.
    fn escape_tail(&mut self) -> Result<u8, DnParseError> {
        let first = self.peek().ok_or_else(|| self.err())?;
        if first.is_ascii_hexdigit() {
            let second = match self.bytes.get(self.pos + 1) {
                Some(&c) if c.is_ascii_hexdigit() => c,
                _ => return Err(DnParseError::BadEscape(self.src.to_owned())),
            };
            self.pos += 2;
            return Ok(hex_nibble(first) << 4 | hex_nibble(second));
        }
        match first {
            b' ' | b'"' | b'#' | b'+' | b',' | b';' | b'<' | b'=' | b'>' | b'\\' => {
                self.pos += 1;
                Ok(first)
            }
            _ => Err(DnParseError::BadEscape(self.src.to_owned())),
        }
    }
}

fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => c - b'A' + 10,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn simple_dn() {
        let dn = Dn::parse("uid=akarasulu,dc=example,dc=com").expect("dn");
        assert_eq!(dn.len(), 3);
        assert_eq!(dn.rdn().expect("rdn").to_string(), "uid=akarasulu");
        assert_eq!(dn.to_string(), "uid=akarasulu,dc=example,dc=com");
    }

    #[test]
    fn empty_dn() {
        let dn = Dn::parse("").expect("dn");
        assert!(dn.is_empty());
        assert_eq!(dn.to_string(), "");
    }

    #[test]
    fn multi_valued_rdn() {
        let dn = Dn::parse("sn=small+cn=test,ou=system").expect("dn");
        assert_eq!(dn.len(), 2);
        let leaf = dn.rdn().expect("rdn");
        assert!(!leaf.is_simple());
        assert_eq!(leaf.avas().len(), 2);
        assert_eq!(leaf.avas()[0].attr_type(), "sn");
        assert_eq!(leaf.avas()[1].attr_type(), "cn");
    }

    #[test]
    fn equality_normalizes_case_and_space() {
        let a = Dn::parse("CN=Foo  Bar,OU=System").expect("dn");
        let b = Dn::parse("cn=foo bar,ou=system").expect("dn");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "CN=Foo  Bar,OU=System");
    }

    #[test]
    fn rdn_order_within_sets() {
        let a = Rdn::parse("sn=small+cn=test").expect("rdn");
        let b = Rdn::parse("cn=test+sn=small").expect("rdn");
        assert_eq!(a, b);
    }

    #[test]
    fn escapes() {
        let dn = Dn::parse(r"cn=Doe\, John,ou=x").expect("dn");
        assert_eq!(
            dn.rdn().expect("rdn").avas()[0].value().as_str(),
            Some("Doe, John")
        );
        let dn = Dn::parse(r"cn=ab\2c cd,ou=x").expect("dn");
        assert_eq!(
            dn.rdn().expect("rdn").avas()[0].value().as_str(),
            Some("ab, cd")
        );
    }

    #[test]
    fn hex_string_value() {
        let dn = Dn::parse("cn=#0401AA,ou=x").expect("dn");
        match dn.rdn().expect("rdn").avas()[0].value() {
            AttrValue::Binary(b) => assert_eq!(b, &[0x04, 0x01, 0xAA]),
            AttrValue::Text(_) => panic!("expected binary"),
        }
    }

    #[test]
    fn trailing_space_trimmed_unless_escaped() {
        let dn = Dn::parse(r"cn=trail ,ou=x").expect("dn");
        assert_eq!(dn.rdn().expect("rdn").avas()[0].value().as_str(), Some("trail"));
        let dn = Dn::parse(r"cn=trail\ ,ou=x").expect("dn");
        assert_eq!(dn.rdn().expect("rdn").avas()[0].value().as_str(), Some("trail "));
    }

    #[test]
    fn colon_form_rejected() {
        assert!(Dn::parse("cn:testModify,ou=users,ou=system").is_err());
    }

    #[test]
    fn display_escapes_special_chars() {
        let ava = Ava::new("cn", AttrValue::Text("a,b".into()));
        assert_eq!(ava.to_string(), r"cn=a\,b");
    }

    #[test]
    fn parent_and_child() {
        let dn = Dn::parse("cn=test,ou=system").expect("dn");
        let parent = dn.parent();
        assert_eq!(parent.to_string(), "ou=system");
        let back = Dn::child_of(dn.rdn().expect("rdn").clone(), &parent);
        assert_eq!(back, dn);
    }
}
