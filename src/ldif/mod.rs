//! LDIF (RFC 2849): record model, reader, writer, and the change-record
//! revertor.

use thiserror::Error;

use crate::controls_impl::Control;
use crate::dn::{Dn, Rdn};
use crate::entry::Entry;
use crate::message::Modification;

mod reader;
mod revert;
mod writer;

pub use self::reader::LdifReader;
pub use self::revert::{apply_change, revert_change};
pub use self::writer::LdifWriter;

#[derive(Debug, Error)]
pub enum LdifError {
    #[error("I/O reading LDIF: {0}")]
    Io(#[from] std::io::Error),
    #[error("LDIF parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("invalid base64 value at line {0}")]
    Base64(usize),
    #[error("unsupported value URL scheme at line {0}")]
    UnsupportedUrl(usize),
    #[error("malformed control line at line {0}")]
    BadControl(usize),
    #[error(transparent)]
    Encode(#[from] crate::error::EncodeError),
    #[error("reverting this change needs the pre-change entry")]
    MissingPreState,
    #[error("cannot revert: {0}")]
    CannotRevert(String),
}

/// One LDIF record: a plain entry or a change record.
#[derive(Clone, Debug, PartialEq)]
pub enum LdifRecord {
    Entry(Entry),
    Change(ChangeRecord),
}

/// A change record: target DN, optional request controls, the change.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeRecord {
    pub dn: Dn,
    pub controls: Vec<Control>,
    pub change: Change,
}

impl ChangeRecord {
    pub fn new(dn: Dn, change: Change) -> ChangeRecord {
        ChangeRecord {
            dn,
            controls: Vec::new(),
            change,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    /// `changetype: add`; the entry's DN duplicates the record DN.
    Add(Entry),
    /// `changetype: delete`.
    Delete,
    /// `changetype: modify`.
    Modify(Vec<Modification>),
    /// `changetype: moddn` / `modrdn`.
    ModDn {
        new_rdn: Rdn,
        delete_old_rdn: bool,
        new_superior: Option<Dn>,
    },
}
