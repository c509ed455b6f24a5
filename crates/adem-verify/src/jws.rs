//! JWS compact serialization parsing and signature verification.
//! Handles single-signature compact messages only, with `jwk`-or-`kid`
//! header dispatch for locating the verification key.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use base64::Engine;
use ed25519_dalek::Signature as EdSignature;
use ed25519_dalek::Verifier as EdVerifier;
use ed25519_dalek::VerifyingKey as EdVerifyingKey;
use serde_json::Value;
use signature::Verifier;

use crate::error::JwsError;
use adem_types::Jwk;

/// The protected header of a single-signature JWS compact token.
#[derive(Debug, Clone)]
pub struct ProtectedHeader {
    pub alg: String,
    pub cty: Option<String>,
    pub kid: Option<String>,
    pub jwk: Option<Jwk>,
}

/// A parsed, not-yet-verified JWS compact token.
#[derive(Debug, Clone)]
pub struct RawToken {
    pub header: ProtectedHeader,
    /// `<header_b64>.<payload_b64>`, exactly as it appeared on the wire —
    /// this, not a re-encoding, is what the signature covers.
    pub signing_input: Vec<u8>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

pub fn parse_compact(raw: &[u8]) -> Result<RawToken, JwsError> {
    let raw_str = std::str::from_utf8(raw).map_err(|_| JwsError::Base64)?;
    let mut parts = raw_str.split('.');
    let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(JwsError::NotCompact);
    };

    let header_bytes = B64.decode(header_b64).map_err(|_| JwsError::Base64)?;
    let payload = B64.decode(payload_b64).map_err(|_| JwsError::Base64)?;
    let signature = B64.decode(sig_b64).map_err(|_| JwsError::Base64)?;

    let header_json: Value =
        serde_json::from_slice(&header_bytes).map_err(|e| JwsError::Header(e.to_string()))?;
    let header = parse_header(&header_json)?;

    let signing_input = format!("{header_b64}.{payload_b64}").into_bytes();

    Ok(RawToken {
        header,
        signing_input,
        payload,
        signature,
    })
}

fn parse_header(value: &Value) -> Result<ProtectedHeader, JwsError> {
    let obj = value
        .as_object()
        .ok_or_else(|| JwsError::Header("header is not an object".into()))?;

    let alg = obj
        .get("alg")
        .and_then(Value::as_str)
        .ok_or_else(|| JwsError::Header("missing alg".into()))?
        .to_string();
    let cty = obj.get("cty").and_then(Value::as_str).map(str::to_string);
    let kid = obj.get("kid").and_then(Value::as_str).map(str::to_string);
    let jwk = match obj.get("jwk") {
        None => None,
        Some(v) => {
            let map = v
                .as_object()
                .ok_or_else(|| JwsError::Header("jwk is not an object".into()))?;
            let fields: BTreeMap<String, Value> = map.clone().into_iter().collect();
            Some(Jwk::from_fields(fields))
        }
    };

    Ok(ProtectedHeader { alg, cty, kid, jwk })
}

fn decode_coord(jwk: &Jwk, field: &str, alg: &str) -> Result<Vec<u8>, JwsError> {
    let s = jwk
        .str_field(field)
        .ok_or_else(|| JwsError::UnsupportedKey(alg.to_string()))?;
    B64.decode(s).map_err(|_| JwsError::UnsupportedKey(alg.to_string()))
}

fn ec_point(x: &[u8], y: &[u8]) -> Vec<u8> {
    let mut point = Vec::with_capacity(1 + x.len() + y.len());
    point.push(0x04);
    point.extend_from_slice(x);
    point.extend_from_slice(y);
    point
}

/// Verifies `signature` over `signing_input` using `key`, per the
/// algorithm named in `alg`. Supports `ES256`, `ES384`, `ES512`, and
/// `EdDSA`.
pub fn verify_signature(
    alg: &str,
    key: &Jwk,
    signing_input: &[u8],
    signature: &[u8],
) -> Result<(), JwsError> {
    match alg {
        "ES256" => {
            let x = decode_coord(key, "x", alg)?;
            let y = decode_coord(key, "y", alg)?;
            let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(&ec_point(&x, &y))
                .map_err(|_| JwsError::UnsupportedKey(alg.to_string()))?;
            let sig = p256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| JwsError::BadSignature)?;
            vk.verify(signing_input, &sig).map_err(|_| JwsError::BadSignature)
        }
        "ES384" => {
            let x = decode_coord(key, "x", alg)?;
            let y = decode_coord(key, "y", alg)?;
            let vk = p384::ecdsa::VerifyingKey::from_sec1_bytes(&ec_point(&x, &y))
                .map_err(|_| JwsError::UnsupportedKey(alg.to_string()))?;
            let sig = p384::ecdsa::Signature::from_slice(signature)
                .map_err(|_| JwsError::BadSignature)?;
            vk.verify(signing_input, &sig).map_err(|_| JwsError::BadSignature)
        }
        "ES512" => {
            let x = decode_coord(key, "x", alg)?;
            let y = decode_coord(key, "y", alg)?;
            let vk = p521::ecdsa::VerifyingKey::from_sec1_bytes(&ec_point(&x, &y))
                .map_err(|_| JwsError::UnsupportedKey(alg.to_string()))?;
            let sig = p521::ecdsa::Signature::from_slice(signature)
                .map_err(|_| JwsError::BadSignature)?;
            vk.verify(signing_input, &sig).map_err(|_| JwsError::BadSignature)
        }
        "EdDSA" => {
            let x = decode_coord(key, "x", alg)?;
            let x: [u8; 32] = x.try_into().map_err(|_| JwsError::UnsupportedKey(alg.to_string()))?;
            let vk = EdVerifyingKey::from_bytes(&x)
                .map_err(|_| JwsError::UnsupportedKey(alg.to_string()))?;
            let sig_bytes: [u8; 64] = signature
                .try_into()
                .map_err(|_| JwsError::BadSignature)?;
            let sig = EdSignature::from_bytes(&sig_bytes);
            vk.verify(signing_input, &sig).map_err(|_| JwsError::BadSignature)
        }
        other => Err(JwsError::UnsupportedKey(other.to_string())),
    }
}
