//! Canonical key fingerprinting. Grounded on
//! `original_source/pkg/tokens/jwk.go` (`CalcKID`/`GetKID`/`SetKID`) and
//! `original_source/pkg/util/jwk.go`.

use std::collections::BTreeMap;

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::KidError;

/// A public JSON Web Key, kept as an open field map so that unrecognized
/// members (e.g. curve-specific coordinates) survive canonicalization
/// unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jwk {
    fields: BTreeMap<String, Value>,
}

impl Jwk {
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Jwk { fields }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn alg(&self) -> Option<&str> {
        self.str_field("alg")
    }

    pub fn kid(&self) -> Option<&str> {
        self.str_field("kid")
    }

    pub fn kty(&self) -> Option<&str> {
        self.str_field("kty")
    }

    pub fn crv(&self) -> Option<&str> {
        self.str_field("crv")
    }

    pub fn set_alg(&mut self, alg: &str) {
        self.fields
            .insert("alg".to_string(), Value::String(alg.to_string()));
    }
}

/// Steps: export the public half, set `alg`, remove `kid`, JCS-canonicalize,
/// SHA-256, lowercase unpadded base32. Fails if the key carries no `alg`.
pub fn calc_kid(key: &Jwk) -> Result<String, KidError> {
    if key.alg().is_none() {
        return Err(KidError::NoAlg);
    }

    let mut canon = key.fields.clone();
    // Export the public half: strip any private-key material and the
    // existing kid, neither of which are part of the canonical form.
    canon.remove("d");
    canon.remove("kid");

    let value = Value::Object(canon.into_iter().collect());
    let canonical = serde_jcs::to_string(&value).map_err(KidError::Canonicalize)?;

    let digest = Sha256::digest(canonical.as_bytes());
    Ok(BASE32_NOPAD.encode(&digest).to_lowercase())
}

/// Returns the key's existing `kid` verbatim if present, otherwise computes
/// it. Does not mutate the key.
pub fn kid_of(key: &Jwk) -> Result<String, KidError> {
    match key.kid() {
        Some(kid) => Ok(kid.to_string()),
        None => calc_kid(key),
    }
}

/// Writes the computed KID back into the key. When `force` is false and a
/// KID is already present, it is kept verbatim instead of being recomputed.
pub fn set_kid(key: &mut Jwk, force: bool) -> Result<String, KidError> {
    if !force {
        if let Some(existing) = key.kid() {
            return Ok(existing.to_string());
        }
    }

    let computed = calc_kid(key)?;
    key.fields
        .insert("kid".to_string(), Value::String(computed.clone()));
    Ok(computed)
}
