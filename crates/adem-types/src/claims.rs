//! Typed emblem and endorsement claim sets, parsed from the raw JWT payload.
//!
//! Grounded on `original_source/pkg/tokens/claims.go` (the common validation
//! prelude shared by both token kinds) and `pkg/tokens/organizational.go` /
//! `pkg/tokens/endorsed.go` for the claims specific to endorsements.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::ai::Ai;
use crate::constraints::{parse_constraints, EmblemConstraints};
use crate::error::ClaimsError;
use crate::jwk::Jwk;

const SUPPORTED_VERSION: &str = "v1";

/// The raw, loosely-typed JWT payload shared by emblems and endorsements.
/// Claim-specific structure (`assets` vs. `key`/`log`) is resolved by the
/// typed constructors below, which is where the precise error taxonomy
/// lives.
#[derive(Debug, Clone, Deserialize)]
pub struct RawClaims {
    pub ver: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub assets: Option<Vec<String>>,
    #[serde(default)]
    pub emb: Option<Value>,
    #[serde(default)]
    pub end: Option<Value>,
    #[serde(default)]
    pub key: Option<Value>,
    #[serde(default)]
    pub log: Option<Value>,
}

/// A validated issuer origin: `https://host`, with no path, query,
/// fragment, userinfo, or opaque component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Oi {
    raw: String,
    host: String,
}

impl Oi {
    pub fn parse(s: &str) -> Result<Oi, ClaimsError> {
        let url = Url::parse(s).map_err(|e| ClaimsError::IllegalIssuer(e.to_string()))?;

        if url.scheme() != "https" {
            return Err(ClaimsError::IllegalIssuer("scheme must be https".into()));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(ClaimsError::IllegalIssuer("must not carry userinfo".into()));
        }
        if !matches!(url.path(), "" | "/") {
            return Err(ClaimsError::IllegalIssuer("must not carry a path".into()));
        }
        if url.query().is_some() {
            return Err(ClaimsError::IllegalIssuer("must not carry a query".into()));
        }
        if url.fragment().is_some() {
            return Err(ClaimsError::IllegalIssuer("must not carry a fragment".into()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| ClaimsError::IllegalIssuer("missing host".into()))?
            .to_string();

        Ok(Oi {
            raw: s.to_string(),
            host,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

/// A CT log this token is bound against: the log's own identity plus the
/// SCT leaf hash proving inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub ver: String,
    pub id: Vec<u8>,
    pub hash: Vec<u8>,
}

fn parse_log_configs(value: &Value) -> Result<Vec<LogConfig>, ClaimsError> {
    let arr = value
        .as_array()
        .ok_or_else(|| ClaimsError::IllegalLogClaim("must be an array".into()))?;
    arr.iter().map(parse_log_config).collect()
}

fn parse_log_config(value: &Value) -> Result<LogConfig, ClaimsError> {
    let err = || ClaimsError::IllegalLogClaim("entry must have ver, id, hash".into());

    let ver = value.get("ver").and_then(Value::as_str).ok_or_else(err)?.to_string();
    let id_b64 = value.get("id").and_then(Value::as_str).ok_or_else(err)?;
    let hash_b64 = value.get("hash").and_then(Value::as_str).ok_or_else(err)?;

    let id = BASE64
        .decode(id_b64)
        .map_err(|_| ClaimsError::IllegalLogClaim("id is not valid base64".into()))?;
    let hash = BASE64
        .decode(hash_b64)
        .map_err(|_| ClaimsError::IllegalLogClaim("hash is not valid base64".into()))?;

    Ok(LogConfig { ver, id, hash })
}

/// The `key` claim of an endorsement: either the endorsed key inlined in
/// full, or a bare reference to a key identified by KID elsewhere in the
/// token bag.
#[derive(Debug, Clone)]
pub enum EndorsedKey {
    Inline(Jwk),
    ByKid(String),
}

fn parse_endorsed_key(value: &Value) -> Result<EndorsedKey, ClaimsError> {
    match value {
        Value::String(kid) => Ok(EndorsedKey::ByKid(kid.clone())),
        Value::Object(map) => {
            let fields: BTreeMap<String, Value> = map.clone().into_iter().collect();
            Ok(EndorsedKey::Inline(Jwk::from_fields(fields)))
        }
        _ => Err(ClaimsError::IllegalKeyClaim(
            "must be a JWK object or a kid string".into(),
        )),
    }
}

fn validate_common(raw: &RawClaims, now: i64) -> Result<(), ClaimsError> {
    if raw.ver != SUPPORTED_VERSION {
        return Err(ClaimsError::IllegalVersion);
    }
    if now < raw.nbf {
        return Err(ClaimsError::NotYetValid);
    }
    if now > raw.exp {
        return Err(ClaimsError::Expired);
    }
    if let Some(iss) = &raw.iss {
        Oi::parse(iss)?;
    }
    Ok(())
}

/// The typed claim set of an emblem token.
#[derive(Debug, Clone)]
pub struct EmblemClaims {
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: Option<Oi>,
    pub assets: Vec<Ai>,
    pub constraints: Option<EmblemConstraints>,
}

impl EmblemClaims {
    pub fn from_raw(raw: RawClaims, now: i64) -> Result<Self, ClaimsError> {
        validate_common(&raw, now)?;

        if raw.log.is_some() {
            return Err(ClaimsError::UnexpectedLog);
        }

        let asset_strs = raw.assets.ok_or(ClaimsError::MissingAssets)?;
        if asset_strs.is_empty() {
            return Err(ClaimsError::MissingAssets);
        }
        let assets = asset_strs
            .iter()
            .map(|s| Ai::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        let iss = raw.iss.as_deref().map(Oi::parse).transpose()?;
        let constraints = raw.emb.as_ref().map(parse_constraints).transpose()?;

        Ok(EmblemClaims {
            iat: raw.iat,
            nbf: raw.nbf,
            exp: raw.exp,
            iss,
            assets,
            constraints,
        })
    }
}

/// The typed claim set of an endorsement token.
#[derive(Debug, Clone)]
pub struct EndorsementClaims {
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: Option<Oi>,
    pub sub: Option<String>,
    pub key: Option<EndorsedKey>,
    /// The `end` claim: true when the endorsed key belongs to a different
    /// organization than the endorser.
    pub external: bool,
    pub constraints: Option<EmblemConstraints>,
    pub log: Vec<LogConfig>,
}

impl EndorsementClaims {
    pub fn from_raw(raw: RawClaims, now: i64) -> Result<Self, ClaimsError> {
        validate_common(&raw, now)?;

        let external = match &raw.end {
            None => false,
            Some(Value::Bool(true)) => true,
            _ => return Err(ClaimsError::IllegalEndClaim),
        };

        let key = raw.key.as_ref().map(parse_endorsed_key).transpose()?;
        let constraints = raw.emb.as_ref().map(parse_constraints).transpose()?;
        let log = raw.log.as_ref().map(parse_log_configs).transpose()?.unwrap_or_default();
        let iss = raw.iss.as_deref().map(Oi::parse).transpose()?;

        Ok(EndorsementClaims {
            iat: raw.iat,
            nbf: raw.nbf,
            exp: raw.exp,
            iss,
            sub: raw.sub,
            key,
            external,
            constraints,
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(extra: Value) -> RawClaims {
        let mut base = json!({
            "ver": "v1",
            "iat": 1000,
            "nbf": 1000,
            "exp": 2000,
        });
        for (k, v) in extra.as_object().unwrap() {
            base[k] = v.clone();
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn oi_rejects_non_https() {
        assert!(Oi::parse("http://example.com").is_err());
    }

    #[test]
    fn oi_rejects_path_query_fragment() {
        assert!(Oi::parse("https://example.com/path").is_err());
        assert!(Oi::parse("https://example.com?q=1").is_err());
        assert!(Oi::parse("https://example.com#frag").is_err());
    }

    #[test]
    fn oi_accepts_bare_origin() {
        let oi = Oi::parse("https://example.com").unwrap();
        assert_eq!(oi.host(), "example.com");
    }

    #[test]
    fn emblem_requires_nonempty_assets() {
        let r = raw(json!({}));
        assert!(matches!(
            EmblemClaims::from_raw(r, 1500),
            Err(ClaimsError::MissingAssets)
        ));
    }

    #[test]
    fn emblem_rejects_log_claim() {
        let r = raw(json!({ "assets": ["example.com"], "log": [] }));
        assert!(matches!(
            EmblemClaims::from_raw(r, 1500),
            Err(ClaimsError::UnexpectedLog)
        ));
    }

    #[test]
    fn emblem_checks_time_window() {
        let r = raw(json!({ "assets": ["example.com"] }));
        assert!(matches!(
            EmblemClaims::from_raw(r.clone(), 500),
            Err(ClaimsError::NotYetValid)
        ));
        assert!(matches!(
            EmblemClaims::from_raw(r, 2500),
            Err(ClaimsError::Expired)
        ));
    }

    #[test]
    fn emblem_parses_assets_and_constraints() {
        let r = raw(json!({
            "assets": ["example.com", "*.example.org"],
            "emb": { "prp": ["protective"] },
        }));
        let claims = EmblemClaims::from_raw(r, 1500).unwrap();
        assert_eq!(claims.assets.len(), 2);
        assert!(claims.constraints.is_some());
    }

    #[test]
    fn endorsement_end_claim_must_be_true_when_present() {
        let r = raw(json!({ "end": false }));
        assert!(matches!(
            EndorsementClaims::from_raw(r, 1500),
            Err(ClaimsError::IllegalEndClaim)
        ));

        let r = raw(json!({ "end": true }));
        assert!(EndorsementClaims::from_raw(r, 1500).unwrap().external);
    }

    #[test]
    fn endorsement_key_claim_accepts_kid_or_inline_jwk() {
        let r = raw(json!({ "key": "abc123" }));
        let claims = EndorsementClaims::from_raw(r, 1500).unwrap();
        assert!(matches!(claims.key, Some(EndorsedKey::ByKid(k)) if k == "abc123"));

        let r = raw(json!({ "key": { "kty": "EC", "alg": "ES256" } }));
        let claims = EndorsementClaims::from_raw(r, 1500).unwrap();
        assert!(matches!(claims.key, Some(EndorsedKey::Inline(_))));
    }

    #[test]
    fn endorsement_parses_log_configs() {
        let r = raw(json!({
            "log": [{ "ver": "v1", "id": "aWQ=", "hash": "aGFzaA==" }],
        }));
        let claims = EndorsementClaims::from_raw(r, 1500).unwrap();
        assert_eq!(claims.log.len(), 1);
        assert_eq!(claims.log[0].id, b"id");
        assert_eq!(claims.log[0].hash, b"hash");
    }

    #[test]
    fn version_must_be_v1() {
        let mut base = json!({
            "ver": "v2", "iat": 1000, "nbf": 1000, "exp": 2000, "assets": ["example.com"],
        });
        let r: RawClaims = serde_json::from_value(base.take()).unwrap();
        assert!(matches!(
            EmblemClaims::from_raw(r, 1500),
            Err(ClaimsError::IllegalVersion)
        ));
    }
}
