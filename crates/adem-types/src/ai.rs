//! Asset Identifiers (AI): domains, IP addresses, and IP CIDR prefixes,
//! optionally carrying a port, with a `more_general` covering relation.
//!
//! Grounded on `original_source/pkg/ident/ai.go`; the port suffix is an
//! extension the distilled spec adds on top of the Go original.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AiError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AiKind {
    /// DNS labels in order, e.g. `["www", "example", "com"]`. The leftmost
    /// label may be the literal wildcard `*`.
    Domain(Vec<String>),
    Address(IpAddr),
    Prefix(IpNet),
}

/// An asset identifier: a domain name, IP address, or IP CIDR prefix,
/// optionally qualified by a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ai {
    kind: AiKind,
    port: Option<u16>,
}

impl Ai {
    /// Parse an asset identifier from its wire string form.
    ///
    /// Domains are written bare (`example.com`, `*.example.com`); IPs and
    /// CIDR prefixes are bracketed (`[192.0.2.1]`, `[2001:db8::/64]`). Both
    /// forms may carry a trailing `:port`.
    pub fn parse(s: &str) -> Result<Ai, AiError> {
        if s.is_empty() {
            return Err(AiError::Empty);
        }

        if let Some(rest) = s.strip_prefix('[') {
            let close = rest.find(']').ok_or(AiError::IllegalAddress)?;
            let inner = &rest[..close];
            let suffix = &rest[close + 1..];
            let port = parse_port_suffix(suffix)?;

            let kind = if let Ok(ip) = IpAddr::from_str(inner) {
                AiKind::Address(ip)
            } else if let Ok(net) = IpNet::from_str(inner) {
                AiKind::Prefix(net.trunc())
            } else {
                return Err(AiError::IllegalAddress);
            };

            Ok(Ai { kind, port })
        } else {
            let (domain_part, port) = match s.rsplit_once(':') {
                Some((domain, port_str)) => match port_str.parse::<u16>() {
                    Ok(port) => (domain, Some(port)),
                    Err(_) => (s, None),
                },
                None => (s, None),
            };

            let labels = parse_domain_labels(domain_part)?;
            Ok(Ai {
                kind: AiKind::Domain(labels),
                port,
            })
        }
    }

    /// True when `other` is covered by `self` under the AI covering
    /// relation: exact domain equality, wildcard suffix match, IP equality,
    /// or CIDR prefix containment. Ports must match exactly whenever `self`
    /// specifies one.
    pub fn more_general(&self, other: &Ai) -> bool {
        if !self.ports_compatible(other) {
            return false;
        }

        match (&self.kind, &other.kind) {
            (AiKind::Domain(mine), AiKind::Domain(theirs)) => domain_more_general(mine, theirs),
            (AiKind::Address(mine), AiKind::Address(theirs)) => mine == theirs,
            (AiKind::Prefix(mine), AiKind::Address(theirs)) => mine.contains(theirs),
            (AiKind::Prefix(mine), AiKind::Prefix(theirs)) => mine.contains(&theirs.addr()),
            _ => false,
        }
    }

    fn ports_compatible(&self, other: &Ai) -> bool {
        match self.port {
            Some(p) => other.port == Some(p),
            None => true,
        }
    }
}

fn parse_port_suffix(s: &str) -> Result<Option<u16>, AiError> {
    match s.strip_prefix(':') {
        None if s.is_empty() => Ok(None),
        None => Err(AiError::IllegalPort),
        Some(port_str) => port_str
            .parse::<u16>()
            .map(Some)
            .map_err(|_| AiError::IllegalPort),
    }
}

fn parse_domain_labels(addr: &str) -> Result<Vec<String>, AiError> {
    // Only the leftmost label may be a wildcard; a '*' anywhere else in the
    // string (i.e. anywhere but the very first byte) is illegal.
    if addr[1..].contains('*') {
        return Err(AiError::Wildcard);
    }

    let labels: Vec<String> = addr.split('.').map(str::to_owned).collect();
    if labels.iter().any(|l| l.is_empty()) {
        return Err(AiError::Illegal);
    }
    if labels[0].contains('*') && labels[0].len() > 1 {
        return Err(AiError::Wildcard);
    }

    Ok(labels)
}

/// Join domain labels the way the wildcard-comparison rule wants them:
/// a wildcard leftmost label contributes nothing but a leading dot (or
/// nothing, if it is the only label).
fn join_for_wildcard_compare(labels: &[String]) -> String {
    if labels.len() == 1 && labels[0] == "*" {
        String::new()
    } else if labels.len() > 1 && labels[0] == "*" {
        format!(".{}", labels[1..].join("."))
    } else {
        labels.join(".")
    }
}

fn domain_more_general(mine: &[String], theirs: &[String]) -> bool {
    let mine_joined = join_for_wildcard_compare(mine);
    let theirs_joined = join_for_wildcard_compare(theirs);

    if mine[0] == "*" {
        theirs_joined == join_for_wildcard_compare(&mine[1..]) || theirs_joined.ends_with(&mine_joined)
    } else {
        theirs_joined == mine_joined
    }
}

impl fmt::Display for Ai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AiKind::Domain(labels) => write!(f, "{}", labels.join("."))?,
            AiKind::Address(ip) => write!(f, "[{}]", ip)?,
            AiKind::Prefix(net) => write!(f, "[{}]", net)?,
        }
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

impl FromStr for Ai {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ai::parse(s)
    }
}

impl Serialize for Ai {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ai {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ai::parse(&s).map_err(DeError::custom)
    }
}
