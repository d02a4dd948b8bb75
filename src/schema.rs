//! OpenLDAP-style schema definitions and their meta-schema LDIF projection.
//!
//! The parser understands the RFC 4512 description syntax as written in
//! OpenLDAP `.schema` files (`attributetype ( ... )`, `objectclass ( ... )`
//! and friends) and produces plain holder structs. `schema_to_ldif` emits
//! one meta-schema entry per element under
//! `m-oid=<oid>,ou=<kind>,cn=<schemaName>,ou=schema`, serialized through
//! the LDIF writer.

use std::fmt::Write as _;

use thiserror::Error;

use crate::dn::Dn;
use crate::entry::Entry;
use crate::ldif::{LdifError, LdifWriter};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema parse error: {0}")]
    Parse(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeTypeHolder {
    pub oid: String,
    pub names: Vec<String>,
    pub description: Option<String>,
    pub obsolete: bool,
    pub superior: Option<String>,
    pub equality: Option<String>,
    pub ordering: Option<String>,
    pub substring: Option<String>,
    pub syntax: Option<String>,
    pub syntax_length: Option<usize>,
    pub single_value: bool,
    pub collective: bool,
    pub no_user_modification: bool,
    pub usage: Option<String>,
    pub extensions: Vec<(String, Vec<String>)>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ObjectClassKind {
    Abstract,
    #[default]
    Structural,
    Auxiliary,
}

impl ObjectClassKind {
    fn as_str(&self) -> &'static str {
        match self {
            ObjectClassKind::Abstract => "ABSTRACT",
            ObjectClassKind::Structural => "STRUCTURAL",
            ObjectClassKind::Auxiliary => "AUXILIARY",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectClassHolder {
    pub oid: String,
    pub names: Vec<String>,
    pub description: Option<String>,
    pub obsolete: bool,
    pub superiors: Vec<String>,
    pub kind: ObjectClassKind,
    pub must: Vec<String>,
    pub may: Vec<String>,
    pub extensions: Vec<(String, Vec<String>)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchingRuleHolder {
    pub oid: String,
    pub names: Vec<String>,
    pub description: Option<String>,
    pub obsolete: bool,
    pub syntax: Option<String>,
    pub extensions: Vec<(String, Vec<String>)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyntaxHolder {
    pub oid: String,
    pub description: Option<String>,
    pub extensions: Vec<(String, Vec<String>)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DitContentRuleHolder {
    pub oid: String,
    pub names: Vec<String>,
    pub description: Option<String>,
    pub obsolete: bool,
    pub aux: Vec<String>,
    pub must: Vec<String>,
    pub may: Vec<String>,
    pub not: Vec<String>,
    pub extensions: Vec<(String, Vec<String>)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchingRuleUseHolder {
    pub oid: String,
    pub names: Vec<String>,
    pub description: Option<String>,
    pub obsolete: bool,
    pub applies: Vec<String>,
    pub extensions: Vec<(String, Vec<String>)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NameFormHolder {
    pub oid: String,
    pub names: Vec<String>,
    pub description: Option<String>,
    pub obsolete: bool,
    pub object_class: Option<String>,
    pub must: Vec<String>,
    pub may: Vec<String>,
    pub extensions: Vec<(String, Vec<String>)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DitStructureRuleHolder {
    pub rule_id: String,
    pub names: Vec<String>,
    pub description: Option<String>,
    pub obsolete: bool,
    pub form: Option<String>,
    pub superior_rules: Vec<String>,
    pub extensions: Vec<(String, Vec<String>)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SchemaElement {
    AttributeType(AttributeTypeHolder),
    ObjectClass(ObjectClassHolder),
    MatchingRule(MatchingRuleHolder),
    Syntax(SyntaxHolder),
    DitContentRule(DitContentRuleHolder),
    MatchingRuleUse(MatchingRuleUseHolder),
    NameForm(NameFormHolder),
    DitStructureRule(DitStructureRuleHolder),
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Dollar,
    Quoted(String),
    Word(String),
}

fn tokenize(text: &str) -> Result<Vec<Token>, SchemaError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '$' => {
                chars.next();
                tokens.push(Token::Dollar);
            }
            '\'' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => s.push(c),
                        None => return Err(SchemaError::Parse("unterminated quote".into())),
                    }
                }
                tokens.push(Token::Quoted(s));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '$' | '\'') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

struct Tokens {
    toks: Vec<Token>,
    pos: usize,
}

impl Tokens {
    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, tok: Token, what: &str) -> Result<(), SchemaError> {
        match self.next() {
            Some(t) if t == tok => Ok(()),
            other => Err(SchemaError::Parse(format!(
                "expected {} but found {:?}",
                what, other
            ))),
        }
    }

    fn word(&mut self, what: &str) -> Result<String, SchemaError> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            other => Err(SchemaError::Parse(format!(
                "expected {} but found {:?}",
                what, other
            ))),
        }
    }

    fn quoted(&mut self, what: &str) -> Result<String, SchemaError> {
        match self.next() {
            Some(Token::Quoted(s)) => Ok(s),
            other => Err(SchemaError::Parse(format!(
                "expected {} but found {:?}",
                what, other
            ))),
        }
    }

    /// `'a'` or `( 'a' 'b' )`.
    fn quoted_list(&mut self) -> Result<Vec<String>, SchemaError> {
        match self.next() {
            Some(Token::Quoted(s)) => Ok(vec![s]),
            Some(Token::Open) => {
                let mut out = Vec::new();
                loop {
                    match self.next() {
                        Some(Token::Quoted(s)) => out.push(s),
                        Some(Token::Close) => break,
                        other => {
                            return Err(SchemaError::Parse(format!(
                                "expected quoted name but found {:?}",
                                other
                            )))
                        }
                    }
                }
                Ok(out)
            }
            other => Err(SchemaError::Parse(format!(
                "expected name(s) but found {:?}",
                other
            ))),
        }
    }

    /// `a` or `( a $ b $ c )`.
    fn oid_list(&mut self) -> Result<Vec<String>, SchemaError> {
        match self.next() {
            Some(Token::Word(w)) => Ok(vec![w]),
            Some(Token::Open) => {
                let mut out = Vec::new();
                loop {
                    match self.next() {
                        Some(Token::Word(w)) => out.push(w),
                        Some(Token::Dollar) => continue,
                        Some(Token::Close) => break,
                        other => {
                            return Err(SchemaError::Parse(format!(
                                "expected oid but found {:?}",
                                other
                            )))
                        }
                    }
                }
                Ok(out)
            }
            other => Err(SchemaError::Parse(format!(
                "expected oid(s) but found {:?}",
                other
            ))),
        }
    }

    /// Collect `X-*` extension clauses; returns None for other keywords.
    fn extension(&mut self, keyword: &str) -> Result<Option<(String, Vec<String>)>, SchemaError> {
        if !keyword.starts_with("X-") {
            return Ok(None);
        }
        Ok(Some((keyword.to_owned(), self.quoted_list()?)))
    }
}

/// Parse a whole schema text into its elements.
pub fn parse_schema(text: &str) -> Result<Vec<SchemaElement>, SchemaError> {
    let mut tokens = Tokens {
        toks: tokenize(text)?,
        pos: 0,
    };
    let mut elements = Vec::new();
    while let Some(tok) = tokens.next() {
        let keyword = match tok {
            Token::Word(w) => w.to_ascii_lowercase(),
            other => {
                return Err(SchemaError::Parse(format!(
                    "expected element keyword but found {:?}",
                    other
                )))
            }
        };
        tokens.expect(Token::Open, "'('")?;
        let element = match keyword.as_str() {
            "attributetype" | "attributetypes" => {
                SchemaElement::AttributeType(parse_attribute_type(&mut tokens)?)
            }
            "objectclass" | "objectclasses" => {
                SchemaElement::ObjectClass(parse_object_class(&mut tokens)?)
            }
            "matchingrule" | "matchingrules" => {
                SchemaElement::MatchingRule(parse_matching_rule(&mut tokens)?)
            }
            "ldapsyntax" | "ldapsyntaxes" => SchemaElement::Syntax(parse_syntax(&mut tokens)?),
            "ditcontentrule" | "ditcontentrules" => {
                SchemaElement::DitContentRule(parse_dit_content_rule(&mut tokens)?)
            }
            "matchingruleuse" | "matchingruleuses" => {
                SchemaElement::MatchingRuleUse(parse_matching_rule_use(&mut tokens)?)
            }
            "nameform" | "nameforms" => SchemaElement::NameForm(parse_name_form(&mut tokens)?),
            "ditstructurerule" | "ditstructurerules" => {
                SchemaElement::DitStructureRule(parse_dit_structure_rule(&mut tokens)?)
            }
            other => {
                return Err(SchemaError::Parse(format!(
                    "unknown schema element {:?}",
                    other
                )))
            }
        };
        elements.push(element);
    }
    Ok(elements)
}

fn parse_attribute_type(t: &mut Tokens) -> Result<AttributeTypeHolder, SchemaError> {
    let mut at = AttributeTypeHolder {
        oid: t.word("attribute type OID")?,
        ..Default::default()
    };
    loop {
        match t.next() {
            Some(Token::Close) => break,
            Some(Token::Word(kw)) => match kw.as_str() {
                "NAME" => at.names = t.quoted_list()?,
                "DESC" => at.description = Some(t.quoted("description")?),
                "OBSOLETE" => at.obsolete = true,
                "SUP" => at.superior = Some(t.word("superior type")?),
                "EQUALITY" => at.equality = Some(t.word("equality rule")?),
                "ORDERING" => at.ordering = Some(t.word("ordering rule")?),
                "SUBSTR" | "SUBSTRINGS" => at.substring = Some(t.word("substring rule")?),
                "SYNTAX" => {
                    let syntax = t.word("syntax OID")?;
                    match syntax.find('{') {
                        Some(brace) => {
                            let len = syntax[brace + 1..]
                                .trim_end_matches('}')
                                .parse()
                                .map_err(|_| {
                                    SchemaError::Parse(format!("bad syntax bound in {:?}", syntax))
                                })?;
                            at.syntax = Some(syntax[..brace].to_owned());
                            at.syntax_length = Some(len);
                        }
                        None => at.syntax = Some(syntax),
                    }
                }
                "SINGLE-VALUE" => at.single_value = true,
                "COLLECTIVE" => at.collective = true,
                "NO-USER-MODIFICATION" => at.no_user_modification = true,
                "USAGE" => at.usage = Some(t.word("usage")?),
                other => match t.extension(other)? {
                    Some(ext) => at.extensions.push(ext),
                    None => {
                        return Err(SchemaError::Parse(format!(
                            "unexpected keyword {:?} in attribute type",
                            other
                        )))
                    }
                },
            },
            other => {
                return Err(SchemaError::Parse(format!(
                    "unexpected token {:?} in attribute type",
                    other
                )))
            }
        }
    }
    Ok(at)
}

fn parse_object_class(t: &mut Tokens) -> Result<ObjectClassHolder, SchemaError> {
    let mut oc = ObjectClassHolder {
        oid: t.word("object class OID")?,
        ..Default::default()
    };
    loop {
        match t.next() {
            Some(Token::Close) => break,
            Some(Token::Word(kw)) => match kw.as_str() {
                "NAME" => oc.names = t.quoted_list()?,
                "DESC" => oc.description = Some(t.quoted("description")?),
                "OBSOLETE" => oc.obsolete = true,
                "SUP" => oc.superiors = t.oid_list()?,
                "ABSTRACT" => oc.kind = ObjectClassKind::Abstract,
                "STRUCTURAL" => oc.kind = ObjectClassKind::Structural,
                "AUXILIARY" => oc.kind = ObjectClassKind::Auxiliary,
                "MUST" => oc.must = t.oid_list()?,
                "MAY" => oc.may = t.oid_list()?,
                other => match t.extension(other)? {
                    Some(ext) => oc.extensions.push(ext),
                    None => {
                        return Err(SchemaError::Parse(format!(
                            "unexpected keyword {:?} in object class",
                            other
                        )))
                    }
                },
            },
            other => {
                return Err(SchemaError::Parse(format!(
                    "unexpected token {:?} in object class",
                    other
                )))
            }
        }
    }
    Ok(oc)
}

fn parse_matching_rule(t: &mut Tokens) -> Result<MatchingRuleHolder, SchemaError> {
    let mut mr = MatchingRuleHolder {
        oid: t.word("matching rule OID")?,
        ..Default::default()
    };
    loop {
        match t.next() {
            Some(Token::Close) => break,
            Some(Token::Word(kw)) => match kw.as_str() {
                "NAME" => mr.names = t.quoted_list()?,
                "DESC" => mr.description = Some(t.quoted("description")?),
                "OBSOLETE" => mr.obsolete = true,
                "SYNTAX" => mr.syntax = Some(t.word("syntax OID")?),
                other => match t.extension(other)? {
                    Some(ext) => mr.extensions.push(ext),
                    None => {
                        return Err(SchemaError::Parse(format!(
                            "unexpected keyword {:?} in matching rule",
                            other
                        )))
                    }
                },
            },
            other => {
                return Err(SchemaError::Parse(format!(
                    "unexpected token {:?} in matching rule",
                    other
                )))
            }
        }
    }
    Ok(mr)
}

fn parse_syntax(t: &mut Tokens) -> Result<SyntaxHolder, SchemaError> {
    let mut syn = SyntaxHolder {
        oid: t.word("syntax OID")?,
        ..Default::default()
    };
    loop {
        match t.next() {
            Some(Token::Close) => break,
            Some(Token::Word(kw)) => match kw.as_str() {
                "DESC" => syn.description = Some(t.quoted("description")?),
                other => match t.extension(other)? {
                    Some(ext) => syn.extensions.push(ext),
                    None => {
                        return Err(SchemaError::Parse(format!(
                            "unexpected keyword {:?} in syntax",
                            other
                        )))
                    }
                },
            },
            other => {
                return Err(SchemaError::Parse(format!(
                    "unexpected token {:?} in syntax",
                    other
                )))
            }
        }
    }
    Ok(syn)
}

fn parse_dit_content_rule(t: &mut Tokens) -> Result<DitContentRuleHolder, SchemaError> {
    let mut dcr = DitContentRuleHolder {
        oid: t.word("content rule OID")?,
        ..Default::default()
    };
    loop {
        match t.next() {
            Some(Token::Close) => break,
            Some(Token::Word(kw)) => match kw.as_str() {
                "NAME" => dcr.names = t.quoted_list()?,
                "DESC" => dcr.description = Some(t.quoted("description")?),
                "OBSOLETE" => dcr.obsolete = true,
                "AUX" => dcr.aux = t.oid_list()?,
                "MUST" => dcr.must = t.oid_list()?,
                "MAY" => dcr.may = t.oid_list()?,
                "NOT" => dcr.not = t.oid_list()?,
                other => match t.extension(other)? {
                    Some(ext) => dcr.extensions.push(ext),
                    None => {
                        return Err(SchemaError::Parse(format!(
                            "unexpected keyword {:?} in content rule",
                            other
                        )))
                    }
                },
            },
            other => {
                return Err(SchemaError::Parse(format!(
                    "unexpected token {:?} in content rule",
                    other
                )))
            }
        }
    }
    Ok(dcr)
}

fn parse_matching_rule_use(t: &mut Tokens) -> Result<MatchingRuleUseHolder, SchemaError> {
    let mut mru = MatchingRuleUseHolder {
        oid: t.word("matching rule use OID")?,
        ..Default::default()
    };
    loop {
        match t.next() {
            Some(Token::Close) => break,
            Some(Token::Word(kw)) => match kw.as_str() {
                "NAME" => mru.names = t.quoted_list()?,
                "DESC" => mru.description = Some(t.quoted("description")?),
                "OBSOLETE" => mru.obsolete = true,
                "APPLIES" => mru.applies = t.oid_list()?,
                other => match t.extension(other)? {
                    Some(ext) => mru.extensions.push(ext),
                    None => {
                        return Err(SchemaError::Parse(format!(
                            "unexpected keyword {:?} in matching rule use",
                            other
                        )))
                    }
                },
            },
            other => {
                return Err(SchemaError::Parse(format!(
                    "unexpected token {:?} in matching rule use",
                    other
                )))
            }
        }
    }
    Ok(mru)
}

fn parse_name_form(t: &mut Tokens) -> Result<NameFormHolder, SchemaError> {
    let mut nf = NameFormHolder {
        oid: t.word("name form OID")?,
        ..Default::default()
    };
    loop {
        match t.next() {
            Some(Token::Close) => break,
            Some(Token::Word(kw)) => match kw.as_str() {
                "NAME" => nf.names = t.quoted_list()?,
                "DESC" => nf.description = Some(t.quoted("description")?),
                "OBSOLETE" => nf.obsolete = true,
                "OC" => nf.object_class = Some(t.word("structural class")?),
                "MUST" => nf.must = t.oid_list()?,
                "MAY" => nf.may = t.oid_list()?,
                other => match t.extension(other)? {
                    Some(ext) => nf.extensions.push(ext),
                    None => {
                        return Err(SchemaError::Parse(format!(
                            "unexpected keyword {:?} in name form",
                            other
                        )))
                    }
                },
            },
            other => {
                return Err(SchemaError::Parse(format!(
                    "unexpected token {:?} in name form",
                    other
                )))
            }
        }
    }
    Ok(nf)
}

fn parse_dit_structure_rule(t: &mut Tokens) -> Result<DitStructureRuleHolder, SchemaError> {
    let mut dsr = DitStructureRuleHolder {
        rule_id: t.word("structure rule id")?,
        ..Default::default()
    };
    loop {
        match t.next() {
            Some(Token::Close) => break,
            Some(Token::Word(kw)) => match kw.as_str() {
                "NAME" => dsr.names = t.quoted_list()?,
                "DESC" => dsr.description = Some(t.quoted("description")?),
                "OBSOLETE" => dsr.obsolete = true,
                "FORM" => dsr.form = Some(t.word("name form")?),
                "SUP" => dsr.superior_rules = t.oid_list()?,
                other => match t.extension(other)? {
                    Some(ext) => dsr.extensions.push(ext),
                    None => {
                        return Err(SchemaError::Parse(format!(
                            "unexpected keyword {:?} in structure rule",
                            other
                        )))
                    }
                },
            },
            other => {
                return Err(SchemaError::Parse(format!(
                    "unexpected token {:?} in structure rule",
                    other
                )))
            }
        }
    }
    Ok(dsr)
}

// --- LDIF projection ---

fn element_dn(oid: &str, kind: &str, schema_name: &str) -> Dn {
    Dn::parse(&format!(
        "m-oid={},ou={},cn={},ou=schema",
        oid, kind, schema_name
    ))
    .expect("schema element DN")
}

fn base_entry(oid: &str, kind: &str, meta_class: &str, schema_name: &str) -> Entry {
    let mut e = Entry::new(element_dn(oid, kind, schema_name));
    e.add("objectclass", [meta_class, "metaTop", "top"]);
    e.add("m-oid", [oid]);
    e
}

fn add_common(
    e: &mut Entry,
    names: &[String],
    description: &Option<String>,
    obsolete: bool,
) {
    for name in names {
        e.add("m-name", [name.as_str()]);
    }
    if let Some(desc) = description {
        e.add("m-description", [desc.as_str()]);
    }
    if obsolete {
        e.add("m-obsolete", ["TRUE"]);
    }
}

fn add_extensions(e: &mut Entry, extensions: &[(String, Vec<String>)]) {
    for (name, values) in extensions {
        let mut attr = String::from("m-extension");
        for part in name.trim_start_matches("X-").split('-') {
            let mut chars = part.chars();
            if let Some(first) = chars.next() {
                write!(attr, "{}{}", first.to_ascii_uppercase(), chars.as_str().to_ascii_lowercase())
                    .expect("string write");
            }
        }
        for v in values {
            e.add(&attr, [v.as_str()]);
        }
    }
}

/// Project schema elements into their meta-schema LDIF under
/// `cn=<schema_name>,ou=schema`.
pub fn schema_to_ldif(
    schema_name: &str,
    elements: &[SchemaElement],
) -> Result<String, LdifError> {
    let mut writer = LdifWriter::new(Vec::new());
    writer.write_version()?;
    for element in elements {
        let entry = match element {
            SchemaElement::AttributeType(at) => {
                let mut e = base_entry(&at.oid, "attributeTypes", "metaAttributeType", schema_name);
                add_common(&mut e, &at.names, &at.description, at.obsolete);
                if let Some(ref sup) = at.superior {
                    e.add("m-supAttributeType", [sup.as_str()]);
                }
                if let Some(ref equality) = at.equality {
                    e.add("m-equality", [equality.as_str()]);
                }
                if let Some(ref ordering) = at.ordering {
                    e.add("m-ordering", [ordering.as_str()]);
                }
                if let Some(ref substring) = at.substring {
                    e.add("m-substring", [substring.as_str()]);
                }
                if let Some(ref syntax) = at.syntax {
                    match at.syntax_length {
                        Some(len) => e.add("m-syntax", [format!("{}{{{}}}", syntax, len)]),
                        None => e.add("m-syntax", [syntax.as_str()]),
                    }
                }
                if at.single_value {
                    e.add("m-singleValue", ["TRUE"]);
                }
                if at.collective {
                    e.add("m-collective", ["TRUE"]);
                }
                if at.no_user_modification {
                    e.add("m-noUserModification", ["TRUE"]);
                }
                if let Some(ref usage) = at.usage {
                    e.add("m-usage", [usage.as_str()]);
                }
                add_extensions(&mut e, &at.extensions);
                e
            }
            SchemaElement::ObjectClass(oc) => {
                let mut e = base_entry(&oc.oid, "objectClasses", "metaObjectClass", schema_name);
                add_common(&mut e, &oc.names, &oc.description, oc.obsolete);
                for sup in &oc.superiors {
                    e.add("m-supObjectClass", [sup.as_str()]);
                }
                e.add("m-typeObjectClass", [oc.kind.as_str()]);
                for must in &oc.must {
                    e.add("m-must", [must.as_str()]);
                }
                for may in &oc.may {
                    e.add("m-may", [may.as_str()]);
                }
                add_extensions(&mut e, &oc.extensions);
                e
            }
            SchemaElement::MatchingRule(mr) => {
                let mut e = base_entry(&mr.oid, "matchingRules", "metaMatchingRule", schema_name);
                add_common(&mut e, &mr.names, &mr.description, mr.obsolete);
                if let Some(ref syntax) = mr.syntax {
                    e.add("m-syntax", [syntax.as_str()]);
                }
                add_extensions(&mut e, &mr.extensions);
                e
            }
            SchemaElement::Syntax(syn) => {
                let mut e = base_entry(&syn.oid, "syntaxes", "metaSyntax", schema_name);
                if let Some(ref desc) = syn.description {
                    e.add("m-description", [desc.as_str()]);
                }
                add_extensions(&mut e, &syn.extensions);
                e
            }
            SchemaElement::DitContentRule(dcr) => {
                let mut e = base_entry(&dcr.oid, "ditContentRules", "metaDITContentRule", schema_name);
                add_common(&mut e, &dcr.names, &dcr.description, dcr.obsolete);
                for aux in &dcr.aux {
                    e.add("m-aux", [aux.as_str()]);
                }
                for must in &dcr.must {
                    e.add("m-must", [must.as_str()]);
                }
                for may in &dcr.may {
                    e.add("m-may", [may.as_str()]);
                }
                for not in &dcr.not {
                    e.add("m-not", [not.as_str()]);
                }
                add_extensions(&mut e, &dcr.extensions);
                e
            }
            SchemaElement::MatchingRuleUse(mru) => {
                let mut e = base_entry(
                    &mru.oid,
                    "matchingRuleUses",
                    "metaMatchingRuleUse",
                    schema_name,
                );
                add_common(&mut e, &mru.names, &mru.description, mru.obsolete);
                for applies in &mru.applies {
                    e.add("m-applies", [applies.as_str()]);
                }
                add_extensions(&mut e, &mru.extensions);
                e
            }
            SchemaElement::NameForm(nf) => {
                let mut e = base_entry(&nf.oid, "nameForms", "metaNameForm", schema_name);
                add_common(&mut e, &nf.names, &nf.description, nf.obsolete);
                if let Some(ref oc) = nf.object_class {
                    e.add("m-oc", [oc.as_str()]);
                }
                for must in &nf.must {
                    e.add("m-must", [must.as_str()]);
                }
                for may in &nf.may {
                    e.add("m-may", [may.as_str()]);
                }
                add_extensions(&mut e, &nf.extensions);
                e
            }
            SchemaElement::DitStructureRule(dsr) => {
                let mut e = base_entry(
                    &dsr.rule_id,
                    "ditStructureRules",
                    "metaDITStructureRule",
                    schema_name,
                );
                add_common(&mut e, &dsr.names, &dsr.description, dsr.obsolete);
                if let Some(ref form) = dsr.form {
                    e.add("m-form", [form.as_str()]);
                }
                for sup in &dsr.superior_rules {
                    e.add("m-supDITStructureRule", [sup.as_str()]);
                }
                add_extensions(&mut e, &dsr.extensions);
                e
            }
        };
        writer.write_entry(&entry)?;
    }
    Ok(String::from_utf8(writer.into_inner()).expect("LDIF output is UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORE: &str = r#"
# from the OpenLDAP core schema
attributetype ( 2.5.4.4 NAME ( 'sn' 'surname' )
    DESC 'RFC2256: last (family) name(s) for which the entity is known by'
    SUP name
    EQUALITY caseIgnoreMatch
    SUBSTR caseIgnoreSubstringsMatch
    SYNTAX 1.3.6.1.4.1.1466.115.121.1.15{32768} )

objectclass ( 2.5.6.6 NAME 'person'
    DESC 'RFC2256: a person'
    SUP top STRUCTURAL
    MUST ( sn $ cn )
    MAY ( userPassword $ telephoneNumber $ seeAlso $ description ) )

matchingrule ( 2.5.13.2 NAME 'caseIgnoreMatch'
    SYNTAX 1.3.6.1.4.1.1466.115.121.1.15 )

ldapsyntax ( 1.3.6.1.4.1.1466.115.121.1.15 DESC 'Directory String'
    X-NOT-HUMAN-READABLE 'FALSE' )
"#;

    #[test]
    fn parses_core_sample() {
        let elements = parse_schema(CORE).expect("parsed");
        assert_eq!(elements.len(), 4);
        match &elements[0] {
            SchemaElement::AttributeType(at) => {
                assert_eq!(at.oid, "2.5.4.4");
                assert_eq!(at.names, vec!["sn", "surname"]);
                assert_eq!(at.superior.as_deref(), Some("name"));
                assert_eq!(at.equality.as_deref(), Some("caseIgnoreMatch"));
                assert_eq!(at.syntax.as_deref(), Some("1.3.6.1.4.1.1466.115.121.1.15"));
                assert_eq!(at.syntax_length, Some(32768));
            }
            other => panic!("unexpected element: {:?}", other),
        }
        match &elements[1] {
            SchemaElement::ObjectClass(oc) => {
                assert_eq!(oc.names, vec!["person"]);
                assert_eq!(oc.kind, ObjectClassKind::Structural);
                assert_eq!(oc.superiors, vec!["top"]);
                assert_eq!(oc.must, vec!["sn", "cn"]);
                assert_eq!(oc.may.len(), 4);
            }
            other => panic!("unexpected element: {:?}", other),
        }
        match &elements[3] {
            SchemaElement::Syntax(syn) => {
                assert_eq!(syn.extensions.len(), 1);
                assert_eq!(syn.extensions[0].0, "X-NOT-HUMAN-READABLE");
            }
            other => panic!("unexpected element: {:?}", other),
        }
    }

    #[test]
    fn ldif_projection_layout() {
        let elements = parse_schema(CORE).expect("parsed");
        let ldif = schema_to_ldif("core", &elements).expect("ldif");
        assert!(ldif.contains("dn: m-oid=2.5.4.4,ou=attributeTypes,cn=core,ou=schema"));
        assert!(ldif.contains("objectclass: metaAttributeType"));
        assert!(ldif.contains("m-supAttributeType: name"));
        assert!(ldif.contains("m-equality: caseIgnoreMatch"));
        assert!(ldif.contains("m-substring: caseIgnoreSubstringsMatch"));
        assert!(ldif.contains("m-syntax: 1.3.6.1.4.1.1466.115.121.1.15{32768}"));
        assert!(ldif.contains("dn: m-oid=2.5.6.6,ou=objectClasses,cn=core,ou=schema"));
        assert!(ldif.contains("m-typeObjectClass: STRUCTURAL"));
        assert!(ldif.contains("m-must: sn"));
        assert!(ldif.contains("m-extensionNotHumanReadable: FALSE"));
    }

    #[test]
    fn roundtrips_through_ldif_reader() {
        let elements = parse_schema(CORE).expect("parsed");
        let ldif = schema_to_ldif("core", &elements).expect("ldif");
        let reader = crate::ldif::LdifReader::new(std::io::Cursor::new(ldif.into_bytes()));
        let records: Vec<_> = reader.collect::<Result<_, _>>().expect("records");
        assert_eq!(records.len(), 4);
    }

    #[test]
    fn obsolete_and_flags() {
        let elements = parse_schema(
            "attributetype ( 1.2.3 NAME 'x' OBSOLETE SINGLE-VALUE NO-USER-MODIFICATION USAGE directoryOperation )",
        )
        .expect("parsed");
        match &elements[0] {
            SchemaElement::AttributeType(at) => {
                assert!(at.obsolete);
                assert!(at.single_value);
                assert!(at.no_user_modification);
                assert_eq!(at.usage.as_deref(), Some("directoryOperation"));
            }
            other => panic!("unexpected element: {:?}", other),
        }
        let ldif = schema_to_ldif("test", &elements).expect("ldif");
        assert!(ldif.contains("m-obsolete: TRUE"));
        assert!(ldif.contains("m-singleValue: TRUE"));
    }

    #[test]
    fn unterminated_definition_rejected() {
        assert!(parse_schema("attributetype ( 1.2.3 NAME 'x'").is_err());
        assert!(parse_schema("attributetype ( 1.2.3 FROB 'x' )").is_err());
    }
}
