//! Entries, attributes and values.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::dn::Dn;

/// One attribute value.
///
/// String-ness is decided heuristically when no schema information is
/// available: valid UTF-8 becomes [`AttrValue::Text`], anything else is
/// carried as raw bytes. Equality and hashing always work on the byte
/// representation, so a text value and its byte-identical binary twin
/// compare equal.
#[derive(Clone, Debug, Eq)]
pub enum AttrValue {
    Text(String),
    Binary(Vec<u8>),
}

impl AttrValue {
    pub fn from_bytes(bytes: Vec<u8>) -> AttrValue {
        match String::from_utf8(bytes) {
            Ok(s) => AttrValue::Text(s),
            Err(e) => AttrValue::Binary(e.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AttrValue::Text(s) => s.as_bytes(),
            AttrValue::Binary(b) => b,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Binary(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Hash for AttrValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> AttrValue {
        AttrValue::Text(s.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> AttrValue {
        AttrValue::Text(s)
    }
}

impl From<&[u8]> for AttrValue {
    fn from(b: &[u8]) -> AttrValue {
        AttrValue::from_bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for AttrValue {
    fn from(b: Vec<u8>) -> AttrValue {
        AttrValue::from_bytes(b)
    }
}

/// An attribute description with its values.
///
/// The description keeps the exact case the source supplied (`up_id`), while
/// lookups and comparisons use the lowercased form. The value collection is
/// ordered for faithful re-encoding but semantically a set: duplicates are
/// rejected, and equality/hashing ignore order.
#[derive(Clone, Debug, Eq)]
pub struct Attribute {
    up_id: String,
    id: String,
    values: Vec<AttrValue>,
}

impl Attribute {
    pub fn new(up_id: &str) -> Attribute {
        Attribute {
            up_id: up_id.to_owned(),
            id: up_id.to_ascii_lowercase(),
            values: Vec::new(),
        }
    }

    pub fn with_values<V: Into<AttrValue>, I: IntoIterator<Item = V>>(
        up_id: &str,
        values: I,
    ) -> Attribute {
        let mut attr = Attribute::new(up_id);
        for v in values {
            attr.add_value(v.into());
        }
        attr
    }

    /// User-supplied attribute description, original case.
    pub fn up_id(&self) -> &str {
        &self.up_id
    }

    /// Lowercased attribute description used for lookups.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn values(&self) -> &[AttrValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Add a value, keeping insertion order. Returns false without adding
    /// when the value is already present.
    pub fn add_value(&mut self, value: AttrValue) -> bool {
        if self.values.contains(&value) {
            return false;
        }
        self.values.push(value);
        true
    }

    pub fn remove_value(&mut self, value: &AttrValue) -> bool {
        match self.values.iter().position(|v| v == value) {
            Some(ix) => {
                self.values.remove(ix);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, value: &AttrValue) -> bool {
        self.values.contains(value)
    }

    fn sorted_bytes(&self) -> Vec<&[u8]> {
        let mut vals: Vec<&[u8]> = self.values.iter().map(|v| v.as_bytes()).collect();
        vals.sort_unstable();
        vals
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.sorted_bytes() == other.sorted_bytes()
    }
}

impl Hash for Attribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        for v in self.sorted_bytes() {
            v.hash(state);
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for v in &self.values {
            match v.as_str() {
                Some(s) => writeln!(f, "{}: {}", self.up_id, s)?,
                None => writeln!(f, "{}:: <{} bytes>", self.up_id, v.as_bytes().len())?,
            }
        }
        Ok(())
    }
}

/// An entry: a DN plus a case-insensitive collection of attributes.
///
/// Attribute insertion order is preserved for re-encoding, but equality
/// treats the collection as unordered.
#[derive(Clone, Debug, Eq)]
pub struct Entry {
    dn: Dn,
    attributes: Vec<Attribute>,
    index: HashMap<String, usize>,
}

impl Entry {
    pub fn new(dn: Dn) -> Entry {
        Entry {
            dn,
            attributes: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    pub fn set_dn(&mut self, dn: Dn) {
        self.dn = dn;
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Attribute> {
        self.index
            .get(&id.to_ascii_lowercase())
            .map(|&ix| &self.attributes[ix])
    }

    /// Add values to an attribute, creating it under `up_id` if absent.
    pub fn add<V: Into<AttrValue>, I: IntoIterator<Item = V>>(&mut self, up_id: &str, values: I) {
        let key = up_id.to_ascii_lowercase();
        let ix = match self.index.get(&key) {
            Some(&ix) => ix,
            None => {
                self.attributes.push(Attribute::new(up_id));
                self.index.insert(key, self.attributes.len() - 1);
                self.attributes.len() - 1
            }
        };
        for v in values {
            self.attributes[ix].add_value(v.into());
        }
    }

    /// Insert a fully built attribute, replacing any existing one with the
    /// same description.
    pub fn put(&mut self, attr: Attribute) {
        let key = attr.id().to_owned();
        match self.index.get(&key) {
            Some(&ix) => self.attributes[ix] = attr,
            None => {
                self.attributes.push(attr);
                self.index.insert(key, self.attributes.len() - 1);
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Attribute> {
        let key = id.to_ascii_lowercase();
        let ix = self.index.remove(&key)?;
        let attr = self.attributes.remove(ix);
        for v in self.index.values_mut() {
            if *v > ix {
                *v -= 1;
            }
        }
        Some(attr)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.dn == other.dn
            && self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .iter()
                .all(|a| other.get(a.id()) == Some(a))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dn(s: &str) -> Dn {
        s.parse().expect("dn")
    }

    #[test]
    fn duplicate_values_rejected() {
        let mut attr = Attribute::new("cn");
        assert!(attr.add_value("foo".into()));
        assert!(!attr.add_value("foo".into()));
        assert_eq!(attr.len(), 1);
    }

    #[test]
    fn value_order_ignored_for_equality() {
        let a = Attribute::with_values("cn", ["foo", "bar"]);
        let b = Attribute::with_values("CN", ["bar", "foo"]);
        assert_eq!(a, b);
    }

    #[test]
    fn case_insensitive_lookup_preserves_up_id() {
        let mut e = Entry::new(dn("cn=test,ou=system"));
        e.add("objectClass", ["top", "person"]);
        let attr = e.get("OBJECTCLASS").expect("attribute");
        assert_eq!(attr.up_id(), "objectClass");
        assert_eq!(attr.len(), 2);
    }

    #[test]
    fn entry_equality_ignores_attribute_order() {
        let mut a = Entry::new(dn("cn=x,ou=system"));
        a.add("cn", ["x"]);
        a.add("sn", ["y"]);
        let mut b = Entry::new(dn("cn=x,ou=system"));
        b.add("sn", ["y"]);
        b.add("cn", ["x"]);
        assert_eq!(a, b);
    }

    #[test]
    fn binary_heuristic() {
        assert!(matches!(AttrValue::from_bytes(b"text".to_vec()), AttrValue::Text(_)));
        assert!(matches!(
            AttrValue::from_bytes(vec![0xFF, 0xFE]),
            AttrValue::Binary(_)
        ));
    }
}
