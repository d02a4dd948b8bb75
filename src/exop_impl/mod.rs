//! Extended operation value codecs and the OID registry.
//!
//! Requests are built through `From<...> for ExtendedRequest` conversions;
//! response values are decoded on demand with [`parse_exop`]. Servers
//! decoding request values go through the registry, which maps request OIDs
//! to payload factories and accepts runtime registrations.

use std::collections::HashMap;
use std::sync::RwLock;

use lazy_static::lazy_static;

use crate::error::DecodeError;
use crate::message::ExtendedRequest;

mod cancel;
mod passmod;
mod starttls;
mod whoami;

pub use self::cancel::{Cancel, CANCEL_OID};
pub use self::passmod::{PasswordModify, PasswordModifyResp, PASSMOD_OID};
pub use self::starttls::{StartTls, STARTTLS_OID};
pub use self::whoami::{WhoAmI, WhoAmIResp, WHOAMI_OID};

/// Decoded payload of a known extended request.
#[derive(Clone, Debug, PartialEq)]
pub enum ExopPayload {
    PasswordModify(PasswordModify),
    WhoAmI,
    StartTls,
    Cancel(Cancel),
}

/// Parse a response value into a typed payload.
pub trait ExopParser: Sized {
    fn parse(val: &[u8]) -> Result<Self, DecodeError>;
}

pub fn parse_exop<T: ExopParser>(val: &[u8]) -> Result<T, DecodeError> {
    T::parse(val)
}

/// Decodes the request value octets of an extended operation.
pub type ExopFactory = fn(Option<&[u8]>) -> Result<ExopPayload, DecodeError>;

lazy_static! {
    static ref EXOPS: RwLock<HashMap<String, ExopFactory>> = {
        let mut map: HashMap<String, ExopFactory> = HashMap::new();
        map.insert(PASSMOD_OID.to_owned(), passmod::decode_request_value);
        map.insert(WHOAMI_OID.to_owned(), whoami::decode_request_value);
        map.insert(STARTTLS_OID.to_owned(), starttls::decode_request_value);
        map.insert(CANCEL_OID.to_owned(), cancel::decode_request_value);
        RwLock::new(map)
    };
}

/// Register (or replace) the decoding factory for an extended request OID.
pub fn register_extended_factory(oid: &str, factory: ExopFactory) {
    EXOPS
        .write()
        .expect("exop registry")
        .insert(oid.to_owned(), factory);
}

/// Decode the value of an extended request with a known OID. Returns
/// `Ok(None)` when no factory is registered; the caller keeps the opaque
/// bytes in that case.
pub fn decode_request(req: &ExtendedRequest) -> Result<Option<ExopPayload>, DecodeError> {
    let factory = EXOPS
        .read()
        .expect("exop registry")
        .get(&req.name)
        .copied();
    match factory {
        Some(f) => f(req.value.as_deref()).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_oid_is_opaque() {
        let req = ExtendedRequest {
            name: "1.2.3.4".to_owned(),
            value: Some(vec![0xDE, 0xAD]),
        };
        assert!(decode_request(&req).expect("lookup").is_none());
    }

    #[test]
    fn dynamic_registration() {
        fn factory(_val: Option<&[u8]>) -> Result<ExopPayload, DecodeError> {
            Ok(ExopPayload::StartTls)
        }
        register_extended_factory("1.2.3.4.5", factory);
        let req = ExtendedRequest {
            name: "1.2.3.4.5".to_owned(),
            value: None,
        };
        assert_eq!(
            decode_request(&req).expect("lookup"),
            Some(ExopPayload::StartTls)
        );
    }
}
