//! The LDIF reader: logical-line assembly, value decoding, record parsing.

use std::io::BufRead;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::{Change, ChangeRecord, LdifError, LdifRecord};
use crate::controls_impl::{control_from_parts, Control};
use crate::dn::{Dn, Rdn};
use crate::entry::{AttrValue, Attribute, Entry};
use crate::message::{Modification, ModifyOperation};

/// Streaming RFC 2849 reader over any buffered input.
///
/// Records are yielded one at a time via [`LdifReader::read_record`] or the
/// `Iterator` impl. Comment lines, line folding, base64 (`::`) and
/// `file://` URL (`:<`) values, leading `version: 1`, and `control:` lines
/// in change records are all handled here.
pub struct LdifReader<R> {
    input: R,
    line_no: usize,
    pending: Option<String>,
    version_checked: bool,
}

enum Val<'a> {
    Plain(&'a str),
    Base64(&'a str),
    Url(&'a str),
}

impl<R: BufRead> LdifReader<R> {
    pub fn new(input: R) -> LdifReader<R> {
        LdifReader {
            input,
            line_no: 0,
            pending: None,
            version_checked: false,
        }
    }

    fn parse_err(&self, message: impl Into<String>) -> LdifError {
        LdifError::Parse {
            line: self.line_no,
            message: message.into(),
        }
    }

    fn next_physical(&mut self) -> Result<Option<String>, LdifError> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        let mut raw = String::new();
        if self.input.read_line(&mut raw)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        while raw.ends_with('\n') || raw.ends_with('\r') {
            raw.pop();
        }
        Ok(Some(raw))
    }

    /// One logical line: physical line plus folded continuations. `None` at
    /// EOF; an empty string for a record separator. Comments are skipped.
    fn next_logical(&mut self) -> Result<Option<String>, LdifError> {
        loop {
            let mut logical = match self.next_physical()? {
                None => return Ok(None),
                Some(line) => line,
            };
            let comment = logical.starts_with('#');
            loop {
                match self.next_physical()? {
                    Some(cont) if cont.starts_with(' ') => logical.push_str(&cont[1..]),
                    Some(other) => {
                        self.pending = Some(other);
                        break;
                    }
                    None => break,
                }
            }
            if comment {
                continue;
            }
            return Ok(Some(logical));
        }
    }

    fn split_line<'a>(&self, line: &'a str) -> Result<(&'a str, Val<'a>), LdifError> {
        let colon = line
            .find(':')
            .ok_or_else(|| self.parse_err(format!("missing colon in {:?}", line)))?;
        let name = &line[..colon];
        if name.is_empty() || name.contains(' ') || name.contains('\0') {
            return Err(self.parse_err(format!("bad attribute description {:?}", name)));
        }
        let rest = &line[colon + 1..];
        let val = if let Some(b64) = rest.strip_prefix(':') {
            Val::Base64(b64.trim_start_matches(' '))
        } else if let Some(url) = rest.strip_prefix('<') {
            Val::Url(url.trim_start_matches(' '))
        } else {
            Val::Plain(rest.strip_prefix(' ').unwrap_or(rest))
        };
        Ok((name, val))
    }

    fn value_bytes(&self, val: Val) -> Result<Vec<u8>, LdifError> {
        match val {
            Val::Plain(s) => Ok(Vec::from(s.as_bytes())),
            Val::Base64(s) => BASE64
                .decode(s.as_bytes())
                .map_err(|_| LdifError::Base64(self.line_no)),
            Val::Url(url) => {
                let path = url
                    .strip_prefix("file://")
                    .ok_or(LdifError::UnsupportedUrl(self.line_no))?;
                Ok(std::fs::read(path)?)
            }
        }
    }

    fn value_string(&self, val: Val) -> Result<String, LdifError> {
        let bytes = self.value_bytes(val)?;
        String::from_utf8(bytes).map_err(|_| self.parse_err("value is not valid UTF-8"))
    }

    /// Read the next record, `None` at end of input.
    pub fn read_record(&mut self) -> Result<Option<LdifRecord>, LdifError> {
        // skip separators, handle the version line once
        let first = loop {
            match self.next_logical()? {
                None => return Ok(None),
                Some(line) if line.is_empty() => continue,
                Some(line) => {
                    if !self.version_checked && line.starts_with("version:") {
                        self.version_checked = true;
                        let (_, val) = self.split_line(&line)?;
                        if self.value_string(val)? != "1" {
                            return Err(self.parse_err("unsupported LDIF version"));
                        }
                        continue;
                    }
                    self.version_checked = true;
                    break line;
                }
            }
        };

        let (name, val) = self.split_line(&first)?;
        if !name.eq_ignore_ascii_case("dn") {
            return Err(self.parse_err("record does not start with dn:"));
        }
        let dn = self.value_string(val)?;
        let dn = Dn::parse(&dn).map_err(|e| self.parse_err(e.to_string()))?;

        // control lines may precede changetype
        let mut controls: Vec<Control> = Vec::new();
        let mut line = self.next_logical()?;
        loop {
            let is_control = matches!(
                &line,
                Some(l) if l.to_ascii_lowercase().starts_with("control:")
            );
            if !is_control {
                break;
            }
            let l = line.take().expect("control line present");
            let (_, val) = self.split_line(&l)?;
            controls.push(self.parse_control(val)?);
            line = self.next_logical()?;
        }

        let line = match line {
            Some(l) if !l.is_empty() => l,
            _ => {
                if !controls.is_empty() {
                    return Err(self.parse_err("control: outside a change record"));
                }
                // an entry with no attributes
                return Ok(Some(LdifRecord::Entry(Entry::new(dn))));
            }
        };
        let (name, val) = self.split_line(&line)?;
        if name.eq_ignore_ascii_case("changetype") {
            let kind = self.value_string(val)?;
            let change = match kind.as_str() {
                "add" => Change::Add(self.read_attrval_body(dn.clone())?),
                "delete" => {
                    self.expect_record_end()?;
                    Change::Delete
                }
                "modify" => Change::Modify(self.read_modify_body()?),
                "moddn" | "modrdn" => self.read_moddn_body()?,
                other => return Err(self.parse_err(format!("invalid changetype {:?}", other))),
            };
            Ok(Some(LdifRecord::Change(ChangeRecord {
                dn,
                controls,
                change,
            })))
        } else {
            if !controls.is_empty() {
                return Err(self.parse_err("control: outside a change record"));
            }
            let mut entry = Entry::new(dn);
            let bytes = self.value_bytes(val)?;
            entry.add(name, [AttrValue::from_bytes(bytes)]);
            let rest = self.read_attrval_rest(entry)?;
            Ok(Some(LdifRecord::Entry(rest)))
        }
    }

    /// `control: <oid> [true|false] [value]` with the usual `:`/`::` value
    /// markers embedded in the line remainder.
    fn parse_control(&self, val: Val) -> Result<Control, LdifError> {
        let spec = match val {
            Val::Plain(s) => s,
            _ => return Err(LdifError::BadControl(self.line_no)),
        };
        let spec = spec.trim_start_matches(' ');
        let (oid, rest) = match spec.find(|c: char| c == ' ' || c == ':') {
            Some(ix) => (&spec[..ix], &spec[ix..]),
            None => (spec, ""),
        };
        if oid.is_empty() {
            return Err(LdifError::BadControl(self.line_no));
        }
        let mut rest = rest.trim_start_matches(' ');
        let mut crit = false;
        for word in ["true", "false"] {
            if let Some(tail) = rest.strip_prefix(word) {
                if tail.is_empty() || tail.starts_with(':') || tail.starts_with(' ') {
                    crit = word == "true";
                    rest = tail.trim_start_matches(' ');
                    break;
                }
            }
        }
        let value = if rest.is_empty() {
            None
        } else if let Some(b64) = rest.strip_prefix("::") {
            Some(
                BASE64
                    .decode(b64.trim_start_matches(' ').as_bytes())
                    .map_err(|_| LdifError::Base64(self.line_no))?,
            )
        } else if let Some(plain) = rest.strip_prefix(':') {
            Some(Vec::from(plain.strip_prefix(' ').unwrap_or(plain).as_bytes()))
        } else {
            return Err(LdifError::BadControl(self.line_no));
        };
        control_from_parts(oid.to_owned(), crit, value)
            .map_err(|_| LdifError::BadControl(self.line_no))
    }

    fn expect_record_end(&mut self) -> Result<(), LdifError> {
        match self.next_logical()? {
            None => Ok(()),
            Some(line) if line.is_empty() => Ok(()),
            Some(line) => Err(self.parse_err(format!("garbage at end of record: {:?}", line))),
        }
    }

    fn read_attrval_body(&mut self, dn: Dn) -> Result<Entry, LdifError> {
        self.read_attrval_rest(Entry::new(dn))
    }

    fn read_attrval_rest(&mut self, mut entry: Entry) -> Result<Entry, LdifError> {
        loop {
            match self.next_logical()? {
                None => return Ok(entry),
                Some(line) if line.is_empty() => return Ok(entry),
                Some(line) => {
                    let (name, val) = self.split_line(&line)?;
                    let bytes = self.value_bytes(val)?;
                    entry.add(name, [AttrValue::from_bytes(bytes)]);
                }
            }
        }
    }

    fn read_modify_body(&mut self) -> Result<Vec<Modification>, LdifError> {
        let mut mods = Vec::new();
        loop {
            let header = match self.next_logical()? {
                None => return Ok(mods),
                Some(line) if line.is_empty() => return Ok(mods),
                Some(line) => line,
            };
            let (name, val) = self.split_line(&header)?;
            let op = match name.to_ascii_lowercase().as_str() {
                "add" => ModifyOperation::Add,
                "delete" => ModifyOperation::Delete,
                "replace" => ModifyOperation::Replace,
                "increment" => ModifyOperation::Increment,
                other => {
                    return Err(self.parse_err(format!("invalid change marker {:?}", other)))
                }
            };
            let attr_name = self.value_string(val)?;
            let mut attr = Attribute::new(&attr_name);
            loop {
                match self.next_logical()? {
                    None => return Err(self.parse_err("modify block not terminated by '-'")),
                    Some(line) if line.is_empty() => {
                        return Err(self.parse_err("modify block not terminated by '-'"))
                    }
                    Some(line) if line == "-" => break,
                    Some(line) => {
                        let (name, val) = self.split_line(&line)?;
                        if !name.eq_ignore_ascii_case(&attr_name) {
                            return Err(
                                self.parse_err("attribute name mismatch in modify block")
                            );
                        }
                        let bytes = self.value_bytes(val)?;
                        attr.add_value(AttrValue::from_bytes(bytes));
                    }
                }
            }
            mods.push(Modification {
                op,
                attribute: attr,
            });
        }
    }

    fn read_moddn_body(&mut self) -> Result<Change, LdifError> {
        let line = self
            .next_logical()?
            .filter(|l| !l.is_empty())
            .ok_or_else(|| self.parse_err("expected newrdn"))?;
        let (name, val) = self.split_line(&line)?;
        if !name.eq_ignore_ascii_case("newrdn") {
            return Err(self.parse_err("expected newrdn"));
        }
        let new_rdn = self.value_string(val)?;
        let new_rdn = Rdn::parse(&new_rdn).map_err(|e| self.parse_err(e.to_string()))?;

        let line = self
            .next_logical()?
            .filter(|l| !l.is_empty())
            .ok_or_else(|| self.parse_err("expected deleteoldrdn"))?;
        let (name, val) = self.split_line(&line)?;
        if !name.eq_ignore_ascii_case("deleteoldrdn") {
            return Err(self.parse_err("expected deleteoldrdn"));
        }
        let delete_old_rdn = match self.value_string(val)?.as_str() {
            "0" => false,
            "1" => true,
            _ => return Err(self.parse_err("deleteoldrdn must be 0 or 1")),
        };

        let new_superior = match self.next_logical()? {
            None => None,
            Some(line) if line.is_empty() => None,
            Some(line) => {
                let (name, val) = self.split_line(&line)?;
                if !name.eq_ignore_ascii_case("newsuperior") {
                    return Err(self.parse_err("garbage at end of moddn record"));
                }
                let superior = self.value_string(val)?;
                self.expect_record_end()?;
                if superior.is_empty() {
                    None
                } else {
                    Some(Dn::parse(&superior).map_err(|e| self.parse_err(e.to_string()))?)
                }
            }
        };

        Ok(Change::ModDn {
            new_rdn,
            delete_old_rdn,
            new_superior,
        })
    }
}

impl<R: BufRead> Iterator for LdifReader<R> {
    type Item = Result<LdifRecord, LdifError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(data: &str) -> LdifReader<Cursor<&[u8]>> {
        LdifReader::new(Cursor::new(data.as_bytes()))
    }

    fn one_record(data: &str) -> LdifRecord {
        let mut r = reader(data);
        let rec = r.read_record().expect("parse").expect("record");
        assert!(r.read_record().expect("parse rest").is_none());
        rec
    }

    #[test]
    fn empty_input() {
        assert!(reader("").read_record().expect("parse").is_none());
        assert!(reader("\n\n\n").read_record().expect("parse").is_none());
    }

    #[test]
    fn simple_entry() {
        let rec = one_record(
            "version: 1\n\
             dn: cn=foo,dc=example,dc=com\n\
             cn: foo\n\
             sn: bar\n\
             sn: baz\n\n",
        );
        match rec {
            LdifRecord::Entry(entry) => {
                assert_eq!(entry.dn().to_string(), "cn=foo,dc=example,dc=com");
                assert_eq!(entry.len(), 2);
                assert_eq!(entry.get("sn").expect("sn").len(), 2);
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn folded_and_commented_lines() {
        let rec = one_record(
            "# a comment\n# folded\n  comment\n\
             dn: cn=foo,dc=exam\n ple,dc=com\n\
             description: hello\n world\n\n",
        );
        match rec {
            LdifRecord::Entry(entry) => {
                assert_eq!(entry.dn().to_string(), "cn=foo,dc=example,dc=com");
                assert_eq!(
                    entry.get("description").expect("attr").values()[0].as_str(),
                    Some("helloworld")
                );
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn base64_value_and_dn() {
        let rec = one_record(
            "dn:: Y249Zm9vLGRjPWV4YW1wbGUsZGM9Y29t\n\
             cn:: aGVsbG8=\n\n",
        );
        match rec {
            LdifRecord::Entry(entry) => {
                assert_eq!(entry.dn().to_string(), "cn=foo,dc=example,dc=com");
                assert_eq!(entry.get("cn").expect("cn").values()[0].as_bytes(), b"hello");
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn invalid_base64_rejected() {
        let mut r = reader("dn: cn=x,dc=y\ncn:: !!!bad!!!\n\n");
        assert!(matches!(r.read_record(), Err(LdifError::Base64(_))));
    }

    #[test]
    fn changetype_add() {
        let rec = one_record(
            "dn: cn=foo,dc=example,dc=com\n\
             changetype: add\n\
             objectClass: person\n\
             cn: foo\n\n",
        );
        match rec {
            LdifRecord::Change(change) => {
                assert!(matches!(change.change, Change::Add(ref e) if e.len() == 2));
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn changetype_delete() {
        let rec = one_record("dn: cn=foo,dc=example,dc=com\nchangetype: delete\n\n");
        match rec {
            LdifRecord::Change(change) => assert_eq!(change.change, Change::Delete),
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn delete_with_garbage_rejected() {
        let mut r = reader("dn: cn=foo,dc=x\nchangetype: delete\ncn: foo\n\n");
        assert!(r.read_record().is_err());
    }

    #[test]
    fn modify_with_increment() {
        let rec = one_record(
            "dn: cn=foo,dc=example,dc=com\n\
             changetype: modify\n\
             increment: uidNumber\n\
             uidNumber: 3\n\
             -\n\n",
        );
        match rec {
            LdifRecord::Change(change) => match change.change {
                Change::Modify(mods) => {
                    assert_eq!(mods.len(), 1);
                    assert_eq!(mods[0].op, ModifyOperation::Increment);
                    assert_eq!(mods[0].attribute.up_id(), "uidNumber");
                    assert_eq!(mods[0].attribute.values()[0].as_str(), Some("3"));
                }
                other => panic!("unexpected change: {:?}", other),
            },
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn modify_multiple_blocks() {
        let rec = one_record(
            "dn: cn=foo,dc=example,dc=com\n\
             changetype: modify\n\
             add: mail\n\
             mail: a@example.com\n\
             mail: b@example.com\n\
             -\n\
             delete: phone\n\
             -\n\
             replace: sn\n\
             sn: Smith\n\
             -\n\n",
        );
        match rec {
            LdifRecord::Change(change) => match change.change {
                Change::Modify(mods) => {
                    assert_eq!(mods.len(), 3);
                    assert_eq!(mods[0].op, ModifyOperation::Add);
                    assert_eq!(mods[0].attribute.len(), 2);
                    assert_eq!(mods[1].op, ModifyOperation::Delete);
                    assert!(mods[1].attribute.is_empty());
                    assert_eq!(mods[2].op, ModifyOperation::Replace);
                }
                other => panic!("unexpected change: {:?}", other),
            },
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn modify_block_without_dash_rejected() {
        let mut r = reader(
            "dn: cn=foo,dc=x\nchangetype: modify\nadd: mail\nmail: a@b\n\n",
        );
        assert!(r.read_record().is_err());
    }

    #[test]
    fn modify_attribute_mismatch_rejected() {
        let mut r = reader(
            "dn: cn=foo,dc=x\nchangetype: modify\nadd: mail\nphone: 123\n-\n\n",
        );
        assert!(r.read_record().is_err());
    }

    #[test]
    fn moddn_record() {
        let rec = one_record(
            "dn: cn=old,dc=example,dc=com\n\
             changetype: modrdn\n\
             newrdn: cn=new\n\
             deleteoldrdn: 1\n\
             newsuperior: dc=other,dc=com\n\n",
        );
        match rec {
            LdifRecord::Change(change) => match change.change {
                Change::ModDn {
                    new_rdn,
                    delete_old_rdn,
                    new_superior,
                } => {
                    assert_eq!(new_rdn.to_string(), "cn=new");
                    assert!(delete_old_rdn);
                    assert_eq!(new_superior.expect("superior").to_string(), "dc=other,dc=com");
                }
                other => panic!("unexpected change: {:?}", other),
            },
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn moddn_bad_deleteoldrdn_rejected() {
        let mut r = reader(
            "dn: cn=old,dc=x\nchangetype: modrdn\nnewrdn: cn=new\ndeleteoldrdn: 2\n\n",
        );
        assert!(r.read_record().is_err());
    }

    #[test]
    fn control_lines() {
        let rec = one_record(
            "dn: cn=foo,dc=example,dc=com\n\
             control: 1.2.3.4.5 true\n\
             control: 1.2.3.4.6: sval\n\
             changetype: delete\n\n",
        );
        match rec {
            LdifRecord::Change(change) => {
                assert_eq!(change.controls.len(), 2);
                assert!(change.controls[0].crit);
                assert_eq!(change.controls[0].oid(), "1.2.3.4.5");
                assert!(!change.controls[1].crit);
                match &change.controls[1].value {
                    crate::controls_impl::ControlValue::Raw(rc) => {
                        assert_eq!(rc.val.as_deref(), Some(&b"sval"[..]))
                    }
                    other => panic!("unexpected control value: {:?}", other),
                }
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn control_on_plain_entry_rejected() {
        let mut r = reader("dn: cn=foo,dc=x\ncontrol: 1.2.3 true\ncn: foo\n\n");
        assert!(r.read_record().is_err());
    }

    #[test]
    fn sequential_records() {
        let mut r = reader(
            "dn: cn=a,dc=x\ncn: a\n\n\
             dn: cn=b,dc=x\nchangetype: delete\n\n",
        );
        assert!(matches!(
            r.read_record().expect("first"),
            Some(LdifRecord::Entry(_))
        ));
        assert!(matches!(
            r.read_record().expect("second"),
            Some(LdifRecord::Change(_))
        ));
        assert!(r.read_record().expect("end").is_none());
    }

    #[test]
    fn invalid_version_rejected() {
        let mut r = reader("version: 2\ndn: cn=x,dc=y\ncn: x\n\n");
        assert!(r.read_record().is_err());
    }
}
