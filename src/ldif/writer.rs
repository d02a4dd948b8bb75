//! The LDIF writer: folding, base64 escaping, entry and change records.

use std::io::Write;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::{Change, ChangeRecord, LdifError};
use crate::controls_impl::{control_value_bytes, Control};
use crate::entry::Entry;

/// Column at which logical lines fold, per RFC 2849's recommendation.
const WRAP: usize = 76;

pub struct LdifWriter<W: Write> {
    out: W,
    wrap: usize,
}

impl<W: Write> LdifWriter<W> {
    pub fn new(out: W) -> LdifWriter<W> {
        LdifWriter { out, wrap: WRAP }
    }

    pub fn with_wrap(out: W, wrap: usize) -> LdifWriter<W> {
        LdifWriter {
            out,
            wrap: wrap.max(2),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn write_version(&mut self) -> Result<(), LdifError> {
        self.fold("version: 1")?;
        Ok(())
    }

    /// Write one entry record followed by the separating blank line.
    pub fn write_entry(&mut self, entry: &Entry) -> Result<(), LdifError> {
        self.attr_line("dn", entry.dn().to_string().as_bytes())?;
        self.entry_attrs(entry)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Write one change record followed by the separating blank line.
    pub fn write_change(&mut self, record: &ChangeRecord) -> Result<(), LdifError> {
        self.attr_line("dn", record.dn.to_string().as_bytes())?;
        for ctrl in &record.controls {
            self.control_line(ctrl)?;
        }
        match &record.change {
            Change::Add(entry) => {
                self.attr_line("changetype", b"add")?;
                self.entry_attrs(entry)?;
            }
            Change::Delete => {
                self.attr_line("changetype", b"delete")?;
            }
            Change::Modify(mods) => {
                self.attr_line("changetype", b"modify")?;
                for m in mods {
                    self.attr_line(m.op.ldif_keyword(), m.attribute.up_id().as_bytes())?;
                    for v in m.attribute.values() {
                        self.attr_line(m.attribute.up_id(), v.as_bytes())?;
                    }
                    self.out.write_all(b"-\n")?;
                }
            }
            Change::ModDn {
                new_rdn,
                delete_old_rdn,
                new_superior,
            } => {
                self.attr_line("changetype", b"moddn")?;
                self.attr_line("newrdn", new_rdn.to_string().as_bytes())?;
                self.attr_line(
                    "deleteoldrdn",
                    if *delete_old_rdn { b"1" } else { b"0" },
                )?;
                if let Some(superior) = new_superior {
                    self.attr_line("newsuperior", superior.to_string().as_bytes())?;
                }
            }
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn entry_attrs(&mut self, entry: &Entry) -> Result<(), LdifError> {
        for attr in entry.attributes() {
            for v in attr.values() {
                self.attr_line(attr.up_id(), v.as_bytes())?;
            }
        }
        Ok(())
    }

    fn control_line(&mut self, ctrl: &Control) -> Result<(), LdifError> {
        let mut line = format!("control: {}", ctrl.oid());
        if ctrl.crit {
            line.push_str(" true");
        }
        if let Some(val) = control_value_bytes(&ctrl.value)? {
            line.push_str(":: ");
            line.push_str(&BASE64.encode(&val));
        }
        self.fold(&line)
    }

    /// `name: value`, `name:: base64` when the value is not a safe string,
    /// folded at the wrap column.
    fn attr_line(&mut self, name: &str, value: &[u8]) -> Result<(), LdifError> {
        let line = if value.is_empty() {
            format!("{}:", name)
        } else if is_safe_string(value) {
            format!(
                "{}: {}",
                name,
                std::str::from_utf8(value).expect("safe string is ASCII")
            )
        } else {
            format!("{}:: {}", name, BASE64.encode(value))
        };
        self.fold(&line)
    }

    fn fold(&mut self, line: &str) -> Result<(), LdifError> {
        let bytes = line.as_bytes();
        if bytes.len() <= self.wrap {
            self.out.write_all(bytes)?;
            self.out.write_all(b"\n")?;
            return Ok(());
        }
        self.out.write_all(&bytes[..self.wrap])?;
        self.out.write_all(b"\n")?;
        let mut rest = &bytes[self.wrap..];
        while !rest.is_empty() {
            let take = rest.len().min(self.wrap - 1);
            self.out.write_all(b" ")?;
            self.out.write_all(&rest[..take])?;
            self.out.write_all(b"\n")?;
            rest = &rest[take..];
        }
        Ok(())
    }
}

/// RFC 2849 SAFE-STRING: ASCII, no NUL/CR/LF, and not starting with space,
/// colon or '<'.
fn is_safe_string(value: &[u8]) -> bool {
    if matches!(value.first(), Some(b' ') | Some(b':') | Some(b'<')) {
        return false;
    }
    value
        .iter()
        .all(|&b| b < 0x80 && b != 0 && b != b'\r' && b != b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dn::Dn;
    use crate::entry::Attribute;
    use crate::ldif::{LdifReader, LdifRecord};
    use crate::message::{Modification, ModifyOperation};
    use std::io::Cursor;

    fn dn(s: &str) -> Dn {
        s.parse().expect("dn")
    }

    fn written<F: FnOnce(&mut LdifWriter<Vec<u8>>)>(f: F) -> String {
        let mut w = LdifWriter::new(Vec::new());
        f(&mut w);
        String::from_utf8(w.into_inner()).expect("utf8 output")
    }

    #[test]
    fn entry_output() {
        let mut entry = Entry::new(dn("cn=foo,dc=example,dc=com"));
        entry.add("objectClass", ["person"]);
        entry.add("cn", ["foo"]);
        let out = written(|w| w.write_entry(&entry).expect("written"));
        assert_eq!(
            out,
            "dn: cn=foo,dc=example,dc=com\nobjectClass: person\ncn: foo\n\n"
        );
    }

    #[test]
    fn binary_value_goes_base64() {
        let mut entry = Entry::new(dn("cn=b,dc=x"));
        entry.add("jpegPhoto", [&[0xFFu8, 0xD8, 0x00][..]]);
        let out = written(|w| w.write_entry(&entry).expect("written"));
        assert!(out.contains("jpegPhoto:: /9gA\n"));
    }

    #[test]
    fn leading_space_goes_base64() {
        let mut entry = Entry::new(dn("cn=s,dc=x"));
        entry.add("description", [" leading"]);
        let out = written(|w| w.write_entry(&entry).expect("written"));
        assert!(out.contains("description:: "));
    }

    #[test]
    fn long_line_folds_and_reads_back() {
        let value = "x".repeat(200);
        let mut entry = Entry::new(dn("cn=long,dc=x"));
        entry.add("description", [value.as_str()]);
        let out = written(|w| w.write_entry(&entry).expect("written"));
        for line in out.lines() {
            assert!(line.len() <= WRAP);
        }
        let mut reader = LdifReader::new(Cursor::new(out.as_bytes()));
        match reader.read_record().expect("parse").expect("record") {
            LdifRecord::Entry(back) => {
                assert_eq!(
                    back.get("description").expect("attr").values()[0].as_str(),
                    Some(value.as_str())
                );
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn modify_roundtrip() {
        let record = ChangeRecord::new(
            dn("cn=foo,dc=x"),
            Change::Modify(vec![
                Modification {
                    op: ModifyOperation::Add,
                    attribute: Attribute::with_values("mail", ["a@b.example"]),
                },
                Modification {
                    op: ModifyOperation::Increment,
                    attribute: Attribute::with_values("uidNumber", ["3"]),
                },
            ]),
        );
        let out = written(|w| w.write_change(&record).expect("written"));
        let mut reader = LdifReader::new(Cursor::new(out.as_bytes()));
        match reader.read_record().expect("parse").expect("record") {
            LdifRecord::Change(back) => assert_eq!(back, record),
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn moddn_roundtrip() {
        let record = ChangeRecord::new(
            dn("cn=old,dc=x"),
            Change::ModDn {
                new_rdn: "cn=new".parse().expect("rdn"),
                delete_old_rdn: true,
                new_superior: Some(dn("ou=moved,dc=x")),
            },
        );
        let out = written(|w| w.write_change(&record).expect("written"));
        let mut reader = LdifReader::new(Cursor::new(out.as_bytes()));
        match reader.read_record().expect("parse").expect("record") {
            LdifRecord::Change(back) => assert_eq!(back, record),
            other => panic!("unexpected record: {:?}", other),
        }
    }
}
