//! Operation result structures.
//!
//! Every LDAP response except Search result entries/references and
//! Intermediate responses carries an [`LdapResult`]. The structure
//! faithfully replicates the components dictated by the standard; outcome
//! indication stays numeric-code-shaped rather than being forced into a
//! `Result`-like interface, since error conditions are often intentional
//! parts of query design.

use std::fmt;

use crate::dn::Dn;

/// RFC 4511 result codes, plus the extension codes carried by the cancel
/// (RFC 3909) and proxied authorization (RFC 4370) specifications.
///
/// Values outside the known set round-trip through [`ResultCode::OtherCode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    OperationsError,
    ProtocolError,
    TimeLimitExceeded,
    SizeLimitExceeded,
    CompareFalse,
    CompareTrue,
    AuthMethodNotSupported,
    StrongerAuthRequired,
    Referral,
    AdminLimitExceeded,
    UnavailableCriticalExtension,
    ConfidentialityRequired,
    SaslBindInProgress,
    NoSuchAttribute,
    UndefinedAttributeType,
    InappropriateMatching,
    ConstraintViolation,
    AttributeOrValueExists,
    InvalidAttributeSyntax,
    NoSuchObject,
    AliasProblem,
    InvalidDnSyntax,
    AliasDereferencingProblem,
    InappropriateAuthentication,
    InvalidCredentials,
    InsufficientAccessRights,
    Busy,
    Unavailable,
    UnwillingToPerform,
    LoopDetect,
    NamingViolation,
    ObjectClassViolation,
    NotAllowedOnNonLeaf,
    NotAllowedOnRdn,
    EntryAlreadyExists,
    ObjectClassModsProhibited,
    AffectsMultipleDsas,
    Other,
    Canceled,
    NoSuchOperation,
    TooLate,
    CannotCancel,
    AssertionFailed,
    AuthorizationDenied,
    /// A code from one of the reserved or private bands.
    OtherCode(u32),
}

impl ResultCode {
    pub fn from_code(code: u32) -> ResultCode {
        use ResultCode::*;
        match code {
            0 => Success,
            1 => OperationsError,
            2 => ProtocolError,
            3 => TimeLimitExceeded,
            4 => SizeLimitExceeded,
            5 => CompareFalse,
            6 => CompareTrue,
            7 => AuthMethodNotSupported,
            8 => StrongerAuthRequired,
            10 => Referral,
            11 => AdminLimitExceeded,
            12 => UnavailableCriticalExtension,
            13 => ConfidentialityRequired,
            14 => SaslBindInProgress,
            16 => NoSuchAttribute,
            17 => UndefinedAttributeType,
            18 => InappropriateMatching,
            19 => ConstraintViolation,
            20 => AttributeOrValueExists,
            21 => InvalidAttributeSyntax,
            32 => NoSuchObject,
            33 => AliasProblem,
            34 => InvalidDnSyntax,
            36 => AliasDereferencingProblem,
            48 => InappropriateAuthentication,
            49 => InvalidCredentials,
            50 => InsufficientAccessRights,
            51 => Busy,
            52 => Unavailable,
            53 => UnwillingToPerform,
            54 => LoopDetect,
            64 => NamingViolation,
            65 => ObjectClassViolation,
            66 => NotAllowedOnNonLeaf,
            67 => NotAllowedOnRdn,
            68 => EntryAlreadyExists,
            69 => ObjectClassModsProhibited,
            71 => AffectsMultipleDsas,
            80 => Other,
            118 => Canceled,
            119 => NoSuchOperation,
            120 => TooLate,
            121 => CannotCancel,
            122 => AssertionFailed,
            123 => AuthorizationDenied,
            n => OtherCode(n),
        }
    }

    pub fn code(&self) -> u32 {
        use ResultCode::*;
        match *self {
            Success => 0,
            OperationsError => 1,
            ProtocolError => 2,
            TimeLimitExceeded => 3,
            SizeLimitExceeded => 4,
            CompareFalse => 5,
            CompareTrue => 6,
            AuthMethodNotSupported => 7,
            StrongerAuthRequired => 8,
            Referral => 10,
            AdminLimitExceeded => 11,
            UnavailableCriticalExtension => 12,
            ConfidentialityRequired => 13,
            SaslBindInProgress => 14,
            NoSuchAttribute => 16,
            UndefinedAttributeType => 17,
            InappropriateMatching => 18,
            ConstraintViolation => 19,
            AttributeOrValueExists => 20,
            InvalidAttributeSyntax => 21,
            NoSuchObject => 32,
            AliasProblem => 33,
            InvalidDnSyntax => 34,
            AliasDereferencingProblem => 36,
            InappropriateAuthentication => 48,
            InvalidCredentials => 49,
            InsufficientAccessRights => 50,
            Busy => 51,
            Unavailable => 52,
            UnwillingToPerform => 53,
            LoopDetect => 54,
            NamingViolation => 64,
            ObjectClassViolation => 65,
            NotAllowedOnNonLeaf => 66,
            NotAllowedOnRdn => 67,
            EntryAlreadyExists => 68,
            ObjectClassModsProhibited => 69,
            AffectsMultipleDsas => 71,
            Other => 80,
            Canceled => 118,
            NoSuchOperation => 119,
            TooLate => 120,
            CannotCancel => 121,
            AssertionFailed => 122,
            AuthorizationDenied => 123,
            OtherCode(n) => n,
        }
    }

    pub fn name(&self) -> &'static str {
        use ResultCode::*;
        match *self {
            Success => "success",
            OperationsError => "operationsError",
            ProtocolError => "protocolError",
            TimeLimitExceeded => "timeLimitExceeded",
            SizeLimitExceeded => "sizeLimitExceeded",
            CompareFalse => "compareFalse",
            CompareTrue => "compareTrue",
            AuthMethodNotSupported => "authMethodNotSupported",
            StrongerAuthRequired => "strongerAuthRequired",
            Referral => "referral",
            AdminLimitExceeded => "adminLimitExceeded",
            UnavailableCriticalExtension => "unavailableCriticalExtension",
            ConfidentialityRequired => "confidentialityRequired",
            SaslBindInProgress => "saslBindInProgress",
            NoSuchAttribute => "noSuchAttribute",
            UndefinedAttributeType => "undefinedAttributeType",
            InappropriateMatching => "inappropriateMatching",
            ConstraintViolation => "constraintViolation",
            AttributeOrValueExists => "attributeOrValueExists",
            InvalidAttributeSyntax => "invalidAttributeSyntax",
            NoSuchObject => "noSuchObject",
            AliasProblem => "aliasProblem",
            InvalidDnSyntax => "invalidDNSyntax",
            AliasDereferencingProblem => "aliasDereferencingProblem",
            InappropriateAuthentication => "inappropriateAuthentication",
            InvalidCredentials => "invalidCredentials",
            InsufficientAccessRights => "insufficientAccessRights",
            Busy => "busy",
            Unavailable => "unavailable",
            UnwillingToPerform => "unwillingToPerform",
            LoopDetect => "loopDetect",
            NamingViolation => "namingViolation",
            ObjectClassViolation => "objectClassViolation",
            NotAllowedOnNonLeaf => "notAllowedOnNonLeaf",
            NotAllowedOnRdn => "notAllowedOnRDN",
            EntryAlreadyExists => "entryAlreadyExists",
            ObjectClassModsProhibited => "objectClassModsProhibited",
            AffectsMultipleDsas => "affectsMultipleDSAs",
            Other => "other",
            Canceled => "canceled",
            NoSuchOperation => "noSuchOperation",
            TooLate => "tooLate",
            CannotCancel => "cannotCancel",
            AssertionFailed => "assertionFailed",
            AuthorizationDenied => "authorizationDenied",
            OtherCode(_) => "unknown",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.name())
    }
}

/// Common components of an LDAP operation result.
#[derive(Clone, Debug, PartialEq)]
pub struct LdapResult {
    /// Result code. Zero indicates successful completion, but a number of
    /// other non-error codes arise from various operations.
    pub result_code: ResultCode,
    /// Matched component DN, where applicable; often empty.
    pub matched_dn: Dn,
    /// Additional diagnostic text.
    pub diagnostic_message: String,
    /// Referral URLs. Present on the wire whenever non-empty; normally
    /// accompanies the `referral` result code.
    pub referral: Vec<String>,
}

impl LdapResult {
    pub fn new(result_code: ResultCode) -> LdapResult {
        LdapResult {
            result_code,
            matched_dn: Dn::empty(),
            diagnostic_message: String::new(),
            referral: Vec::new(),
        }
    }

    pub fn with_diagnostic(result_code: ResultCode, diagnostic: &str) -> LdapResult {
        LdapResult {
            result_code,
            matched_dn: Dn::empty(),
            diagnostic_message: diagnostic.to_owned(),
            referral: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result_code == ResultCode::Success
    }
}

impl Default for LdapResult {
    fn default() -> LdapResult {
        LdapResult::new(ResultCode::Success)
    }
}

impl fmt::Display for LdapResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "rc={}, dn: \"{}\", text: \"{}\"",
            self.result_code, self.matched_dn, self.diagnostic_message
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn code_roundtrip() {
        for n in 0..=200u32 {
            assert_eq!(ResultCode::from_code(n).code(), n);
        }
    }

    #[test]
    fn reserved_band_is_other_code() {
        assert_eq!(ResultCode::from_code(9), ResultCode::OtherCode(9));
        assert_eq!(ResultCode::from_code(4096), ResultCode::OtherCode(4096));
    }
}
