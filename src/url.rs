//! LDAP URLs (RFC 4516), used in referrals and LDIF URL-referenced values.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;

use crate::dn::Dn;
use crate::filter::Filter;
use crate::message::SearchScope;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UrlParseError {
    #[error("unsupported URL scheme in: {0:?}")]
    BadScheme(String),
    #[error("invalid port in: {0:?}")]
    BadPort(String),
    #[error("invalid DN component in: {0:?}")]
    BadDn(String),
    #[error("invalid scope component in: {0:?}")]
    BadScope(String),
    #[error("invalid filter component in: {0:?}")]
    BadFilter(String),
    #[error("invalid percent-encoding in: {0:?}")]
    BadEncoding(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Ldap,
    Ldaps,
}

impl Scheme {
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Ldap => 389,
            Scheme::Ldaps => 636,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Scheme::Ldap => "ldap",
            Scheme::Ldaps => "ldaps",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UrlExtension {
    pub critical: bool,
    pub name: String,
    pub value: Option<String>,
}

/// A parsed `ldap[s]://` URL.
///
/// The empty string is accepted on input and produces the all-default URL
/// (an "empty referral"), as some deployed servers send exactly that.
#[derive(Clone, Debug, PartialEq)]
pub struct LdapUrl {
    pub scheme: Scheme,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dn: Dn,
    pub attributes: Vec<String>,
    pub scope: Option<SearchScope>,
    pub filter: Option<Filter>,
    pub extensions: Vec<UrlExtension>,
}

impl Default for LdapUrl {
    fn default() -> LdapUrl {
        LdapUrl {
            scheme: Scheme::Ldap,
            host: None,
            port: None,
            dn: Dn::empty(),
            attributes: Vec::new(),
            scope: None,
            filter: None,
            extensions: Vec::new(),
        }
    }
}

impl LdapUrl {
    pub fn parse(input: &str) -> Result<LdapUrl, UrlParseError> {
        if input.is_empty() {
            return Ok(LdapUrl::default());
        }
        let lower = input.to_ascii_lowercase();
        let (scheme, rest) = if let Some(rest) = lower.strip_prefix("ldaps://") {
            (Scheme::Ldaps, &input[input.len() - rest.len()..])
        } else if let Some(rest) = lower.strip_prefix("ldap://") {
            (Scheme::Ldap, &input[input.len() - rest.len()..])
        } else {
            return Err(UrlParseError::BadScheme(input.to_owned()));
        };

        let (authority, tail) = match rest.find('/') {
            Some(ix) => (&rest[..ix], &rest[ix + 1..]),
            None => (rest, ""),
        };
        let (host, port) = parse_authority(authority, input)?;

        let mut url = LdapUrl {
            scheme,
            host,
            port,
            ..LdapUrl::default()
        };

        let mut components = tail.splitn(5, '?');
        if let Some(dn) = components.next() {
            let dn = decode_component(dn, input)?;
            url.dn = Dn::parse(&dn).map_err(|_| UrlParseError::BadDn(input.to_owned()))?;
        }
        if let Some(attrs) = components.next() {
            let attrs = decode_component(attrs, input)?;
            url.attributes = attrs
                .split(',')
                .filter(|a| !a.is_empty())
                .map(|a| a.to_owned())
                .collect();
        }
        if let Some(scope) = components.next() {
            url.scope = match decode_component(scope, input)?.to_ascii_lowercase().as_str() {
                "" => None,
                "base" => Some(SearchScope::BaseObject),
                "one" => Some(SearchScope::SingleLevel),
                "sub" => Some(SearchScope::WholeSubtree),
                _ => return Err(UrlParseError::BadScope(input.to_owned())),
            };
        }
        if let Some(filter) = components.next() {
            let filter = decode_component(filter, input)?;
            if !filter.is_empty() {
                url.filter = Some(
                    Filter::parse(&filter).map_err(|_| UrlParseError::BadFilter(input.to_owned()))?,
                );
            }
        }
        if let Some(exts) = components.next() {
            for ext in exts.split(',').filter(|e| !e.is_empty()) {
                let (critical, body) = match ext.strip_prefix('!') {
                    Some(body) => (true, body),
                    None => (false, ext),
                };
                let (name, value) = match body.find('=') {
                    Some(ix) => (
                        body[..ix].to_owned(),
                        Some(decode_component(&body[ix + 1..], input)?),
                    ),
                    None => (body.to_owned(), None),
                };
                url.extensions.push(UrlExtension {
                    critical,
                    name,
                    value,
                });
            }
        }
        Ok(url)
    }
}

fn parse_authority(
    authority: &str,
    whole: &str,
) -> Result<(Option<String>, Option<u16>), UrlParseError> {
    if authority.is_empty() {
        return Ok((None, None));
    }
    // IPv6 literals are bracketed, so the port colon is the one after ']'
    let split = if authority.starts_with('[') {
        authority.find(']').map(|end| {
            let tail = &authority[end + 1..];
            (&authority[..end + 1], tail.strip_prefix(':'))
        })
    } else {
        match authority.rfind(':') {
            Some(ix) => Some((&authority[..ix], Some(&authority[ix + 1..]))),
            None => Some((authority, None)),
        }
    };
    match split {
        Some((host, Some(port))) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| UrlParseError::BadPort(whole.to_owned()))?;
            Ok((Some(host.to_owned()), Some(port)))
        }
        Some((host, None)) => Ok((Some(host.to_owned()), None)),
        None => Err(UrlParseError::BadPort(whole.to_owned())),
    }
}

fn decode_component(component: &str, whole: &str) -> Result<String, UrlParseError> {
    percent_decode_str(component)
        .decode_utf8()
        .map(|c| c.into_owned())
        .map_err(|_| UrlParseError::BadEncoding(whole.to_owned()))
}

/// Bytes escaped when formatting URL components.
const COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'?')
    .add(b'<')
    .add(b'>')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'`');

impl fmt::Display for LdapUrl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}://", self.scheme.as_str())?;
        if let Some(ref host) = self.host {
            f.write_str(host)?;
            if let Some(port) = self.port {
                write!(f, ":{}", port)?;
            }
        }
        // trailing components are omitted right-to-left when empty
        let dn = self.dn.to_string();
        let attrs = self.attributes.join(",");
        let scope = match self.scope {
            None => "",
            Some(SearchScope::BaseObject) => "base",
            Some(SearchScope::SingleLevel) => "one",
            Some(SearchScope::WholeSubtree) => "sub",
        };
        let filter = self
            .filter
            .as_ref()
            .map(|flt| flt.to_string())
            .unwrap_or_default();
        let exts = self
            .extensions
            .iter()
            .map(|e| {
                let mut s = String::new();
                if e.critical {
                    s.push('!');
                }
                s.push_str(&e.name);
                if let Some(ref v) = e.value {
                    s.push('=');
                    s.push_str(&utf8_percent_encode(v, COMPONENT).to_string());
                }
                s
            })
            .collect::<Vec<_>>()
            .join(",");

        let components = [
            utf8_percent_encode(&dn, COMPONENT).to_string(),
            attrs,
            scope.to_owned(),
            utf8_percent_encode(&filter, COMPONENT).to_string(),
            exts,
        ];
        let last = components.iter().rposition(|c| !c.is_empty());
        if let Some(last) = last {
            f.write_str("/")?;
            for (ix, component) in components[..=last].iter().enumerate() {
                if ix > 0 {
                    f.write_str("?")?;
                }
                f.write_str(component)?;
            }
        } else if self.host.is_none() {
            f.write_str("/")?;
        }
        Ok(())
    }
}

impl FromStr for LdapUrl {
    type Err = UrlParseError;

    fn from_str(s: &str) -> Result<LdapUrl, UrlParseError> {
        LdapUrl::parse(s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn full_url() {
        let url = LdapUrl::parse("ldap://ldap.example.com:10389/dc=example,dc=com?cn,sn?sub?(objectClass=person)")
            .expect("url");
        assert_eq!(url.scheme, Scheme::Ldap);
        assert_eq!(url.host.as_deref(), Some("ldap.example.com"));
        assert_eq!(url.port, Some(10389));
        assert_eq!(url.dn.to_string(), "dc=example,dc=com");
        assert_eq!(url.attributes, vec!["cn", "sn"]);
        assert_eq!(url.scope, Some(SearchScope::WholeSubtree));
        assert!(url.filter.is_some());
    }

    #[test]
    fn minimal_forms() {
        let url = LdapUrl::parse("ldap://host").expect("url");
        assert_eq!(url.host.as_deref(), Some("host"));
        assert!(url.dn.is_empty());

        let url = LdapUrl::parse("ldaps://host/").expect("url");
        assert_eq!(url.scheme, Scheme::Ldaps);

        let url = LdapUrl::parse("").expect("url");
        assert_eq!(url, LdapUrl::default());
    }

    #[test]
    fn percent_decoding() {
        let url = LdapUrl::parse("ldap://h/cn=foo%20bar,dc=x").expect("url");
        assert_eq!(url.dn.to_string(), "cn=foo bar,dc=x");
    }

    #[test]
    fn ipv6_host() {
        let url = LdapUrl::parse("ldap://[2001:db8::7]:6389/dc=x").expect("url");
        assert_eq!(url.host.as_deref(), Some("[2001:db8::7]"));
        assert_eq!(url.port, Some(6389));
    }

    #[test]
    fn extensions() {
        let url = LdapUrl::parse("ldap://h/dc=x????!bindname=cn=admin,e-x=1").expect("url");
        assert_eq!(url.extensions.len(), 2);
        assert!(url.extensions[0].critical);
        assert_eq!(url.extensions[0].name, "bindname");
    }

    #[test]
    fn display_roundtrip() {
        for s in [
            "ldap://ldap.example.com/dc=example,dc=com?cn,sn?sub?(cn=x)",
            "ldap://host:1389/dc=x",
            "ldaps://host/",
        ] {
            let url = LdapUrl::parse(s).expect("url");
            assert_eq!(LdapUrl::parse(&url.to_string()).expect("reparse"), url);
        }
    }

    #[test]
    fn bad_scheme() {
        assert!(LdapUrl::parse("http://host").is_err());
    }
}
