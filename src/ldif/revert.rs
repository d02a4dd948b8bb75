//! Computing the inverse of a change record.
//!
//! `revert_change` produces the records that undo a change; where the
//! inverse depends on state the change destroyed (deleted entries, replaced
//! values, renamed RDNs) the pre-change entry must be supplied.
//! `apply_change` is the matching forward interpreter, used both in tests
//! of the revert identity and by callers replaying LDIF.

use super::{Change, ChangeRecord, LdifError};
use crate::dn::{Ava, Dn};
use crate::entry::{AttrValue, Attribute, Entry};
use crate::message::{Modification, ModifyOperation};

/// Apply a change record to an entry. `None` means the entry is gone. The
/// entry argument is ignored for `add` records, which carry their content.
pub fn apply_change(entry: Option<&Entry>, record: &ChangeRecord) -> Result<Option<Entry>, LdifError> {
    match &record.change {
        Change::Add(new) => Ok(Some(new.clone())),
        Change::Delete => Ok(None),
        Change::Modify(mods) => {
            let mut entry = entry.ok_or(LdifError::MissingPreState)?.clone();
            for m in mods {
                apply_modification(&mut entry, m)?;
            }
            Ok(Some(entry))
        }
        Change::ModDn {
            new_rdn,
            delete_old_rdn,
            new_superior,
        } => {
            let entry = entry.ok_or(LdifError::MissingPreState)?;
            let old_rdn = record
                .dn
                .rdn()
                .ok_or_else(|| LdifError::CannotRevert("rename of the empty DN".into()))?
                .clone();
            let parent = match new_superior {
                Some(superior) => superior.clone(),
                None => record.dn.parent(),
            };
            let mut renamed = entry.clone();
            renamed.set_dn(Dn::child_of(new_rdn.clone(), &parent));
            if *delete_old_rdn {
                for ava in old_rdn.avas() {
                    if !new_rdn.contains(ava) {
                        remove_ava(&mut renamed, ava);
                    }
                }
            }
            for ava in new_rdn.avas() {
                renamed.add(ava.attr_type(), [ava.value().clone()]);
            }
            Ok(Some(renamed))
        }
    }
}

fn apply_modification(entry: &mut Entry, m: &Modification) -> Result<(), LdifError> {
    let id = m.attribute.up_id();
    match m.op {
        ModifyOperation::Add => {
            entry.add(id, m.attribute.values().iter().cloned());
        }
        ModifyOperation::Delete => {
            if m.attribute.is_empty() {
                entry.remove(id);
            } else if let Some(attr) = entry.get(id) {
                let mut attr = attr.clone();
                for v in m.attribute.values() {
                    attr.remove_value(v);
                }
                if attr.is_empty() {
                    entry.remove(id);
                } else {
                    entry.put(attr);
                }
            }
        }
        ModifyOperation::Replace => {
            if m.attribute.is_empty() {
                entry.remove(id);
            } else {
                entry.put(m.attribute.clone());
            }
        }
        ModifyOperation::Increment => {
            let delta = increment_delta(&m.attribute)?;
            let attr = entry
                .get(id)
                .ok_or_else(|| LdifError::CannotRevert(format!("increment of absent {}", id)))?;
            let mut out = Attribute::new(attr.up_id());
            for v in attr.values() {
                let n: i64 = v
                    .as_str()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| LdifError::CannotRevert("increment of non-integer".into()))?;
                out.add_value(AttrValue::Text((n + delta).to_string()));
            }
            entry.put(out);
        }
    }
    Ok(())
}

fn increment_delta(attribute: &Attribute) -> Result<i64, LdifError> {
    if attribute.len() != 1 {
        return Err(LdifError::CannotRevert(
            "increment needs exactly one value".into(),
        ));
    }
    attribute.values()[0]
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| LdifError::CannotRevert("increment of non-integer".into()))
}

fn remove_ava(entry: &mut Entry, ava: &Ava) {
    if let Some(attr) = entry.get(ava.attr_type()) {
        let mut attr = attr.clone();
        attr.remove_value(ava.value());
        if attr.is_empty() {
            entry.remove(ava.attr_type());
        } else {
            entry.put(attr);
        }
    }
}

fn entry_has_ava(entry: &Entry, ava: &Ava) -> bool {
    entry
        .get(ava.attr_type())
        .map(|attr| attr.contains(ava.value()))
        .unwrap_or(false)
}

/// Compute the records that undo `record`.
///
/// `pre` is the entry as it stood before the change; it is required for
/// deletes, modifies and renames, whose inverses depend on destroyed state.
pub fn revert_change(
    pre: Option<&Entry>,
    record: &ChangeRecord,
) -> Result<Vec<ChangeRecord>, LdifError> {
    match &record.change {
        Change::Add(_) => Ok(vec![ChangeRecord::new(record.dn.clone(), Change::Delete)]),
        Change::Delete => {
            let pre = pre.ok_or(LdifError::MissingPreState)?;
            Ok(vec![ChangeRecord::new(
                record.dn.clone(),
                Change::Add(pre.clone()),
            )])
        }
        Change::Modify(mods) => {
            let pre = pre.ok_or(LdifError::MissingPreState)?;
            revert_modify(pre, &record.dn, mods)
        }
        Change::ModDn {
            new_rdn,
            delete_old_rdn: _,
            new_superior,
        } => {
            let pre = pre.ok_or(LdifError::MissingPreState)?;
            revert_moddn(pre, record, new_rdn, new_superior)
        }
    }
}

/// Inverses are computed against the progressively updated state, since a
/// later modification sees the effects of earlier ones, then emitted in
/// reverse order.
fn revert_modify(
    pre: &Entry,
    dn: &Dn,
    mods: &[Modification],
) -> Result<Vec<ChangeRecord>, LdifError> {
    let mut state = pre.clone();
    let mut inverses: Vec<Modification> = Vec::new();
    for m in mods {
        let id = m.attribute.up_id();
        let inverse = match m.op {
            ModifyOperation::Add => Modification {
                op: ModifyOperation::Delete,
                attribute: m.attribute.clone(),
            },
            ModifyOperation::Delete => {
                let restored = if m.attribute.is_empty() {
                    state
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| Attribute::new(id))
                } else {
                    m.attribute.clone()
                };
                Modification {
                    op: ModifyOperation::Add,
                    attribute: restored,
                }
            }
            ModifyOperation::Replace => Modification {
                op: ModifyOperation::Replace,
                attribute: state
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| Attribute::new(id)),
            },
            ModifyOperation::Increment => {
                let delta = increment_delta(&m.attribute)?;
                Modification {
                    op: ModifyOperation::Increment,
                    attribute: Attribute::with_values(id, [(-delta).to_string()]),
                }
            }
        };
        inverses.push(inverse);
        apply_modification(&mut state, m)?;
    }
    inverses.reverse();
    Ok(vec![ChangeRecord::new(dn.clone(), Change::Modify(inverses))])
}

/// Undo a rename. The reverse record renames the entry back under its old
/// RDN; `deleteoldrdn` on the way back is chosen so that RDN attribute
/// values introduced by the forward rename disappear while values that
/// predate it survive. When the new RDN mixes both kinds, the rename keeps
/// everything and a trailing modify deletes the introduced values.
fn revert_moddn(
    pre: &Entry,
    record: &ChangeRecord,
    new_rdn: &crate::dn::Rdn,
    new_superior: &Option<Dn>,
) -> Result<Vec<ChangeRecord>, LdifError> {
    let old_rdn = record
        .dn
        .rdn()
        .ok_or_else(|| LdifError::CannotRevert("rename of the empty DN".into()))?;
    let old_parent = record.dn.parent();
    let new_parent = new_superior.clone().unwrap_or_else(|| old_parent.clone());
    let new_dn = Dn::child_of(new_rdn.clone(), &new_parent);

    let keep_any = new_rdn
        .avas()
        .iter()
        .any(|ava| old_rdn.contains(ava) || entry_has_ava(pre, ava));
    let introduced: Vec<&Ava> = new_rdn
        .avas()
        .iter()
        .filter(|ava| !old_rdn.contains(ava) && !entry_has_ava(pre, ava))
        .collect();

    let mut out = vec![ChangeRecord::new(
        new_dn,
        Change::ModDn {
            new_rdn: old_rdn.clone(),
            delete_old_rdn: !keep_any,
            new_superior: new_superior.as_ref().map(|_| old_parent),
        },
    )];
    if keep_any && !introduced.is_empty() {
        let mods = introduced
            .into_iter()
            .map(|ava| Modification {
                op: ModifyOperation::Delete,
                attribute: Attribute::with_values(ava.attr_type(), [ava.value().clone()]),
            })
            .collect();
        out.push(ChangeRecord::new(record.dn.clone(), Change::Modify(mods)));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dn(s: &str) -> Dn {
        s.parse().expect("dn")
    }

    fn entry(dn_s: &str, attrs: &[(&str, &[&str])]) -> Entry {
        let mut e = Entry::new(dn(dn_s));
        for (id, values) in attrs {
            e.add(id, values.iter().copied());
        }
        e
    }

    /// Applying the reverted records to the post-change state restores the
    /// pre-change entry.
    fn assert_revert_identity(pre: &Entry, record: &ChangeRecord) {
        let post = apply_change(Some(pre), record).expect("apply");
        let reverted = revert_change(Some(pre), record).expect("revert");
        let mut state = post;
        for rec in &reverted {
            state = apply_change(state.as_ref(), rec).expect("apply revert");
        }
        assert_eq!(state.as_ref(), Some(pre));
    }

    #[test]
    fn revert_add_is_delete() {
        let e = entry("cn=new,ou=system", &[("cn", &["new"])]);
        let record = ChangeRecord::new(e.dn().clone(), Change::Add(e.clone()));
        let reverted = revert_change(None, &record).expect("revert");
        assert_eq!(reverted, vec![ChangeRecord::new(e.dn().clone(), Change::Delete)]);
    }

    #[test]
    fn revert_delete_restores_entry() {
        let pre = entry("cn=gone,ou=system", &[("cn", &["gone"]), ("sn", &["x"])]);
        let record = ChangeRecord::new(pre.dn().clone(), Change::Delete);
        assert_revert_identity(&pre, &record);
    }

    #[test]
    fn revert_modify_add_delete_replace() {
        let pre = entry(
            "cn=foo,ou=system",
            &[("cn", &["foo"]), ("mail", &["old@example.com"])],
        );
        let record = ChangeRecord::new(
            pre.dn().clone(),
            Change::Modify(vec![
                Modification {
                    op: ModifyOperation::Add,
                    attribute: Attribute::with_values("description", ["d1"]),
                },
                Modification {
                    op: ModifyOperation::Replace,
                    attribute: Attribute::with_values("mail", ["new@example.com"]),
                },
                Modification {
                    op: ModifyOperation::Delete,
                    attribute: Attribute::new("cn"),
                },
            ]),
        );
        assert_revert_identity(&pre, &record);
    }

    #[test]
    fn revert_modify_increment() {
        let pre = entry("cn=foo,ou=system", &[("uidNumber", &["41"])]);
        let record = ChangeRecord::new(
            pre.dn().clone(),
            Change::Modify(vec![Modification {
                op: ModifyOperation::Increment,
                attribute: Attribute::with_values("uidNumber", ["3"]),
            }]),
        );
        let post = apply_change(Some(&pre), &record).expect("apply").expect("entry");
        assert_eq!(
            post.get("uidNumber").expect("attr").values()[0].as_str(),
            Some("44")
        );
        assert_revert_identity(&pre, &record);
    }

    #[test]
    fn revert_simple_rename() {
        // simple old RDN, simple new RDN, no overlap, delete-old true
        let pre = entry("cn=old,ou=system", &[("cn", &["old"]), ("sn", &["s"])]);
        let record = ChangeRecord::new(
            pre.dn().clone(),
            Change::ModDn {
                new_rdn: "cn=new".parse().expect("rdn"),
                delete_old_rdn: true,
                new_superior: None,
            },
        );
        let reverted = revert_change(Some(&pre), &record).expect("revert");
        assert_eq!(reverted.len(), 1);
        assert_eq!(reverted[0].dn.to_string(), "cn=new,ou=system");
        match &reverted[0].change {
            Change::ModDn {
                new_rdn,
                delete_old_rdn,
                new_superior,
            } => {
                assert_eq!(new_rdn.to_string(), "cn=old");
                assert!(*delete_old_rdn);
                assert!(new_superior.is_none());
            }
            other => panic!("unexpected change: {:?}", other),
        }
        assert_revert_identity(&pre, &record);
    }

    #[test]
    fn revert_rename_overlapping_composite_old_rdn() {
        // old RDN sn=small+cn=test, new RDN cn=test overlaps it; the value
        // sn=small must come back through the reverse rename, so the
        // reverse deleteoldrdn is false
        let pre = entry(
            "sn=small+cn=test,ou=system",
            &[("sn", &["small"]), ("cn", &["test"])],
        );
        let record = ChangeRecord::new(
            pre.dn().clone(),
            Change::ModDn {
                new_rdn: "cn=test".parse().expect("rdn"),
                delete_old_rdn: true,
                new_superior: None,
            },
        );
        let reverted = revert_change(Some(&pre), &record).expect("revert");
        assert_eq!(reverted.len(), 1);
        assert_eq!(reverted[0].dn.to_string(), "cn=test,ou=system");
        match &reverted[0].change {
            Change::ModDn {
                new_rdn,
                delete_old_rdn,
                ..
            } => {
                assert_eq!(new_rdn, &"sn=small+cn=test".parse::<crate::dn::Rdn>().expect("rdn"));
                assert!(!*delete_old_rdn);
            }
            other => panic!("unexpected change: {:?}", other),
        }
        assert_revert_identity(&pre, &record);
    }

    #[test]
    fn revert_rename_keeping_old_rdn() {
        // delete-old false: cn=old survives as an attribute value
        let pre = entry("cn=old,ou=system", &[("cn", &["old"])]);
        let record = ChangeRecord::new(
            pre.dn().clone(),
            Change::ModDn {
                new_rdn: "cn=new".parse().expect("rdn"),
                delete_old_rdn: false,
                new_superior: None,
            },
        );
        assert_revert_identity(&pre, &record);
    }

    #[test]
    fn revert_rename_to_existing_value() {
        // the new RDN names a value the entry already holds; reverting must
        // not delete it
        let pre = entry(
            "cn=first,ou=system",
            &[("cn", &["first", "second"])],
        );
        let record = ChangeRecord::new(
            pre.dn().clone(),
            Change::ModDn {
                new_rdn: "cn=second".parse().expect("rdn"),
                delete_old_rdn: false,
                new_superior: None,
            },
        );
        let reverted = revert_change(Some(&pre), &record).expect("revert");
        match &reverted[0].change {
            Change::ModDn { delete_old_rdn, .. } => assert!(!*delete_old_rdn),
            other => panic!("unexpected change: {:?}", other),
        }
        assert_revert_identity(&pre, &record);
    }

    #[test]
    fn revert_rename_composite_new_rdn_mixed() {
        // composite new RDN: one AVA pre-existing, one introduced; rename
        // back keeps both, a fixup modify removes the introduced value
        let pre = entry(
            "cn=old,ou=system",
            &[("cn", &["old"]), ("sn", &["kept"])],
        );
        let record = ChangeRecord::new(
            pre.dn().clone(),
            Change::ModDn {
                new_rdn: "sn=kept+uid=u1".parse().expect("rdn"),
                delete_old_rdn: true,
                new_superior: None,
            },
        );
        let reverted = revert_change(Some(&pre), &record).expect("revert");
        assert_eq!(reverted.len(), 2);
        match &reverted[1].change {
            Change::Modify(mods) => {
                assert_eq!(mods.len(), 1);
                assert_eq!(mods[0].op, ModifyOperation::Delete);
                assert_eq!(mods[0].attribute.up_id(), "uid");
            }
            other => panic!("unexpected change: {:?}", other),
        }
        assert_revert_identity(&pre, &record);
    }

    #[test]
    fn revert_rename_with_new_superior() {
        let pre = entry("cn=move,ou=a,ou=system", &[("cn", &["move"])]);
        let record = ChangeRecord::new(
            pre.dn().clone(),
            Change::ModDn {
                new_rdn: "cn=move".parse().expect("rdn"),
                delete_old_rdn: true,
                new_superior: Some(dn("ou=b,ou=system")),
            },
        );
        let reverted = revert_change(Some(&pre), &record).expect("revert");
        assert_eq!(reverted.len(), 1);
        assert_eq!(reverted[0].dn.to_string(), "cn=move,ou=b,ou=system");
        match &reverted[0].change {
            Change::ModDn { new_superior, .. } => {
                assert_eq!(
                    new_superior.as_ref().expect("superior").to_string(),
                    "ou=a,ou=system"
                );
            }
            other => panic!("unexpected change: {:?}", other),
        }
        assert_revert_identity(&pre, &record);
    }

    #[test]
    fn revert_delete_without_prestate_fails() {
        let record = ChangeRecord::new(dn("cn=x,ou=system"), Change::Delete);
        assert!(matches!(
            revert_change(None, &record),
            Err(LdifError::MissingPreState)
        ));
    }
}
