/// Universal tag numbers used by this crate.
///
/// This is not the full universal class; only the types occurring in
/// LDAP-family protocols are listed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Types {
    Boolean = 1,
    Integer = 2,
    OctetString = 4,
    Null = 5,
    Enumerated = 10,
    Sequence = 16,
    Set = 17,
}
