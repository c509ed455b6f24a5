//! Constraint masks: small closed sets represented as bitflags over a byte,
//! with explicit (un)marshalling into JSON string arrays (spec.md §9 design
//! note). Grounded on `original_source/pkg/consts/jwt.go` and
//! `pkg/tokens/constraints.go`.

use bitflags::bitflags;
use serde_json::Value;

use crate::ai::Ai;
use crate::error::ClaimsError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Purpose: u8 {
        const PROTECTIVE = 0b0000_0001;
        const INDICATIVE = 0b0000_0010;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Distribution: u8 {
        const DNS = 0b0000_0001;
        const TLS = 0b0000_0010;
        const UDP = 0b0000_0100;
    }
}

impl Purpose {
    fn from_str(s: &str) -> Result<Purpose, ClaimsError> {
        match s {
            "protective" => Ok(Purpose::PROTECTIVE),
            "indicative" => Ok(Purpose::INDICATIVE),
            _ => Err(ClaimsError::IllegalPrp),
        }
    }
}

impl Distribution {
    fn from_str(s: &str) -> Result<Distribution, ClaimsError> {
        match s {
            "dns" => Ok(Distribution::DNS),
            "tls" => Ok(Distribution::TLS),
            "udp" => Ok(Distribution::UDP),
            _ => Err(ClaimsError::IllegalDst),
        }
    }
}

fn parse_string_array<'a>(
    value: &'a Value,
    err: impl Fn() -> ClaimsError,
) -> Result<Vec<&'a str>, ClaimsError> {
    value
        .as_array()
        .ok_or_else(&err)?
        .iter()
        .map(|v| v.as_str().ok_or_else(&err))
        .collect()
}

/// The optional `emb` constraint block carried by an emblem or an
/// endorsement's `emb` claim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmblemConstraints {
    pub purpose: Option<Purpose>,
    pub distribution: Option<Distribution>,
    pub assets: Vec<Ai>,
    /// Maximum allowed `exp - nbf`, in seconds.
    pub window: Option<i64>,
}

pub fn parse_constraints(value: &Value) -> Result<EmblemConstraints, ClaimsError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ClaimsError::IllegalType("emb must be an object".into()))?;

    let purpose = match obj.get("prp") {
        None => None,
        Some(v) => {
            let mut mask = Purpose::empty();
            for s in parse_string_array(v, || ClaimsError::IllegalPrp)? {
                mask |= Purpose::from_str(s)?;
            }
            Some(mask)
        }
    };

    let distribution = match obj.get("dst") {
        None => None,
        Some(v) => {
            let mut mask = Distribution::empty();
            for s in parse_string_array(v, || ClaimsError::IllegalDst)? {
                mask |= Distribution::from_str(s)?;
            }
            Some(mask)
        }
    };

    let assets = match obj.get("assets") {
        None => Vec::new(),
        Some(v) => parse_string_array(v, || ClaimsError::IllegalType("assets must be a string array".into()))?
            .into_iter()
            .map(Ai::parse)
            .collect::<Result<Vec<_>, _>>()?,
    };

    let window = match obj.get("wnd") {
        None => None,
        Some(v) => Some(
            v.as_i64()
                .ok_or_else(|| ClaimsError::IllegalType("wnd must be an integer".into()))?,
        ),
    };

    Ok(EmblemConstraints {
        purpose,
        distribution,
        assets,
        window,
    })
}
