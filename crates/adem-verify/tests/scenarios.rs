//! End-to-end verification scenarios covering self-signed, trusted,
//! organizational, externally-endorsed, and constraint-violating token
//! bags, exercising the real ES256 signature path rather than mocking
//! `verify_signature`. The unsigned-emblem sentinel path is covered by
//! `lib.rs`'s own `unsigned_emblem_short_circuits_to_unsigned` unit test
//! instead, since it bypasses signing entirely.

use std::sync::Arc;

use adem_ct::{CertSubjects, CtError, Entry, InclusionProof, LogClient, LogDirectory, SignedTreeHead};
use adem_types::{Jwk, VerificationResult};
use adem_verify::verify_tokens;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use base64::Engine;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use signature::Signer;
use serde_json::{json, Value};

/// A deterministic ES256 keypair plus its public JWK (with `alg` and `kid`
/// set), for signing test tokens. Each call derives its key from a
/// distinct fixed scalar so tests are reproducible without touching an
/// RNG.
fn keypair(seed_byte: u8) -> (SigningKey, Jwk) {
    let mut scalar = [0u8; 32];
    scalar[31] = seed_byte;
    scalar[0] = 0x10; // keep the scalar comfortably inside the P-256 order
    let signing_key = SigningKey::from_slice(&scalar).expect("valid scalar");
    let verifying_key = signing_key.verifying_key();
    let point = verifying_key.to_encoded_point(false);

    let jwk = Jwk::from_fields(
        json!({
            "kty": "EC",
            "crv": "P-256",
            "alg": "ES256",
            "x": B64.encode(point.x().unwrap()),
            "y": B64.encode(point.y().unwrap()),
        })
        .as_object()
        .unwrap()
        .clone()
        .into_iter()
        .collect(),
    );

    (signing_key, jwk)
}

fn jwk_fields(jwk: &Jwk) -> Value {
    serde_json::json!({
        "kty": jwk.kty(),
        "crv": jwk.crv(),
        "alg": jwk.alg(),
        "x": jwk.field("x"),
        "y": jwk.field("y"),
    })
}

/// A protected header carrying the signer's key embedded inline
/// (`jwk`), the way a self-issued emblem or root endorsement does.
fn embedded_header(jwk: &Jwk, cty: &str) -> Value {
    json!({ "alg": jwk.alg(), "cty": cty, "jwk": jwk_fields(jwk) })
}

fn sign_compact(signing_key: &SigningKey, header: &Value, payload: &Value) -> Vec<u8> {
    let header_b64 = B64.encode(serde_json::to_vec(header).unwrap());
    let payload_b64 = B64.encode(serde_json::to_vec(payload).unwrap());
    let signing_input = format!("{header_b64}.{payload_b64}");

    let signature: Signature = signing_key.sign(signing_input.as_bytes());
    let sig_b64 = B64.encode(signature.to_bytes());

    format!("{signing_input}.{sig_b64}").into_bytes()
}

struct NoLogs;

#[async_trait]
impl LogDirectory for NoLogs {
    async fn client_for(&self, _log_id: &[u8]) -> Result<Arc<dyn LogClient>, CtError> {
        Err(CtError::UnknownLog)
    }
}

/// The fixed SCT leaf hash every test log's single entry is "logged"
/// under. A one-leaf tree's root equals its leaf, so `verify_inclusion`
/// needs no audit path — every `log` claim below encodes this same
/// 32-byte value as its `hash`.
const ROOT_HASH: [u8; 32] = [0x42; 32];

fn log_entry(id: &str) -> Value {
    use base64::engine::general_purpose::STANDARD;
    json!({ "ver": "v1", "id": id, "hash": STANDARD.encode(ROOT_HASH) })
}

/// A log whose single entry binds `issuer`/`root_kid` exactly, so any
/// `LogConfig` resolves successfully regardless of the requested log ID.
struct BindingLogDirectory {
    issuer: String,
    root_kid: String,
}

struct BindingLogClient {
    issuer: String,
    root_kid: String,
}

#[async_trait]
impl LogClient for BindingLogClient {
    async fn get_sth(&self) -> Result<SignedTreeHead, CtError> {
        Ok(SignedTreeHead {
            tree_size: 1,
            sha256_root_hash: ROOT_HASH,
        })
    }

    fn verify_sth_signature(&self, _sth: &SignedTreeHead) -> Result<(), CtError> {
        Ok(())
    }

    async fn get_proof_by_hash(
        &self,
        _leaf_hash: &[u8; 32],
        _tree_size: u64,
    ) -> Result<InclusionProof, CtError> {
        Ok(InclusionProof {
            leaf_index: 0,
            audit_path: Vec::new(),
        })
    }

    async fn get_entry_and_proof(&self, _leaf_index: u64, _tree_size: u64) -> Result<Entry, CtError> {
        Ok(Entry::X509(CertSubjects {
            dns_names: vec![
                self.issuer.clone(),
                format!("{}.adem-configuration.{}", self.root_kid, self.issuer),
            ],
            common_name: None,
        }))
    }
}

#[async_trait]
impl LogDirectory for BindingLogDirectory {
    async fn client_for(&self, _log_id: &[u8]) -> Result<Arc<dyn LogClient>, CtError> {
        Ok(Arc::new(BindingLogClient {
            issuer: self.issuer.clone(),
            root_kid: self.root_kid.clone(),
        }))
    }
}

fn emblem_token(signing_key: &SigningKey, jwk: &Jwk, iss: Option<&str>, assets: &[&str]) -> Vec<u8> {
    let header = embedded_header(jwk, "adem-emb");
    let mut payload = json!({
        "ver": "v1", "iat": 0, "nbf": 0, "exp": 9_999_999_999i64, "assets": assets,
    });
    if let Some(iss) = iss {
        payload["iss"] = json!(iss);
    }
    sign_compact(signing_key, &header, &payload)
}

#[tokio::test]
async fn s2_self_signed_emblem_with_no_chain_is_signed_only() {
    let (sk, jwk) = keypair(1);
    let token = emblem_token(&sk, &jwk, None, &["example.com"]);

    let verdict = verify_tokens(&[token], &[], &[], &NoLogs).await;
    assert!(verdict.has(VerificationResult::Signed));
    assert!(!verdict.has(VerificationResult::SignedTrusted));
    assert_eq!(verdict.protected.len(), 1);
}

#[tokio::test]
async fn s3_self_signed_emblem_with_trusted_key_is_signed_trusted() {
    let (sk, jwk) = keypair(2);
    let token = emblem_token(&sk, &jwk, None, &["example.com"]);

    let verdict = verify_tokens(&[token], std::slice::from_ref(&jwk), &[], &NoLogs).await;
    assert!(verdict.has(VerificationResult::Signed));
    assert!(verdict.has(VerificationResult::SignedTrusted));
}

#[tokio::test]
async fn s4_organizational_chain_binds_to_ct() {
    let (leaf_sk, leaf_jwk) = keypair(3);
    let (root_sk, root_jwk) = keypair(4);
    let root_kid = adem_types::kid_of(&root_jwk).unwrap();

    let emblem = emblem_token(&leaf_sk, &leaf_jwk, Some("https://acme.example"), &["acme.example"]);

    let endorsement_header = embedded_header(&root_jwk, "adem-end");
    let endorsement_payload = json!({
        "ver": "v1", "iat": 0, "nbf": 0, "exp": 9_999_999_999i64,
        "iss": "https://acme.example", "sub": "https://acme.example",
        "key": jwk_fields(&leaf_jwk),
        "log": [log_entry("bG9nLWlk")],
    });
    let endorsement = sign_compact(&root_sk, &endorsement_header, &endorsement_payload);

    let directory = BindingLogDirectory {
        issuer: "acme.example".to_string(),
        root_kid,
    };

    let verdict = verify_tokens(&[emblem, endorsement], &[], &[], &directory).await;
    assert!(verdict.has(VerificationResult::Signed), "{verdict:?}");
    assert!(verdict.has(VerificationResult::Organizational), "{verdict:?}");
    assert_eq!(verdict.issuer.as_deref(), Some("https://acme.example"));
}

#[tokio::test]
async fn s5_external_endorsement_adds_endorsed() {
    let (leaf_sk, leaf_jwk) = keypair(5);
    let (root_sk, root_jwk) = keypair(6);
    let (ext_sk, ext_jwk) = keypair(7);
    let root_kid = adem_types::kid_of(&root_jwk).unwrap();

    let emblem = emblem_token(&leaf_sk, &leaf_jwk, Some("https://acme.example"), &["acme.example"]);

    let root_header = embedded_header(&root_jwk, "adem-end");
    let root_payload = json!({
        "ver": "v1", "iat": 0, "nbf": 0, "exp": 9_999_999_999i64,
        "iss": "https://acme.example", "sub": "https://acme.example",
        "key": jwk_fields(&leaf_jwk),
        "log": [log_entry("bG9nLWlk")],
    });
    let root_endorsement = sign_compact(&root_sk, &root_header, &root_payload);

    let ext_header = embedded_header(&ext_jwk, "adem-end");
    let ext_payload = json!({
        "ver": "v1", "iat": 0, "nbf": 0, "exp": 9_999_999_999i64,
        "iss": "https://ext.example", "sub": "https://acme.example",
        "key": root_kid, "end": true,
        "log": [log_entry("ZXh0LWxvZw==")],
    });
    let external_endorsement = sign_compact(&ext_sk, &ext_header, &ext_payload);

    let directory = BindingLogDirectory {
        issuer: "acme.example".to_string(),
        root_kid,
    };

    let verdict = verify_tokens(
        &[emblem, root_endorsement, external_endorsement],
        &[],
        &[],
        &directory,
    )
    .await;
    assert!(verdict.has(VerificationResult::Organizational), "{verdict:?}");
    assert!(verdict.has(VerificationResult::Endorsed), "{verdict:?}");
    assert_eq!(verdict.endorsed_by, vec!["https://ext.example".to_string()]);
}

#[tokio::test]
async fn s6_constraint_violation_yields_invalid() {
    let (leaf_sk, leaf_jwk) = keypair(8);
    let (root_sk, root_jwk) = keypair(9);
    let root_kid = adem_types::kid_of(&root_jwk).unwrap();

    let emblem = emblem_token(&leaf_sk, &leaf_jwk, Some("https://acme.example"), &["acme.example"]);

    let header = embedded_header(&root_jwk, "adem-end");
    let payload = json!({
        "ver": "v1", "iat": 0, "nbf": 0, "exp": 9_999_999_999i64,
        "iss": "https://acme.example", "sub": "https://acme.example",
        "key": jwk_fields(&leaf_jwk),
        "emb": { "assets": ["*.other.example"] },
        "log": [log_entry("bG9nLWlk")],
    });
    let endorsement = sign_compact(&root_sk, &header, &payload);

    let directory = BindingLogDirectory {
        issuer: "acme.example".to_string(),
        root_kid,
    };

    let verdict = verify_tokens(&[emblem, endorsement], &[], &[], &directory).await;
    assert!(verdict.has(VerificationResult::Invalid));
    assert_eq!(verdict.levels().count(), 1);
}

/// Property 6 (spec §8): the verdict for a bag is invariant under
/// permutation of its tokens, since the key graph resolver's worklist runs
/// to a fixed point regardless of arrival order.
#[tokio::test]
async fn verdict_is_invariant_under_token_permutation() {
    let (leaf_sk, leaf_jwk) = keypair(10);
    let (root_sk, root_jwk) = keypair(11);
    let (ext_sk, ext_jwk) = keypair(12);
    let root_kid = adem_types::kid_of(&root_jwk).unwrap();

    let emblem = emblem_token(&leaf_sk, &leaf_jwk, Some("https://acme.example"), &["acme.example"]);

    let root_header = embedded_header(&root_jwk, "adem-end");
    let root_payload = json!({
        "ver": "v1", "iat": 0, "nbf": 0, "exp": 9_999_999_999i64,
        "iss": "https://acme.example", "sub": "https://acme.example",
        "key": jwk_fields(&leaf_jwk),
        "log": [log_entry("bG9nLWlk")],
    });
    let root_endorsement = sign_compact(&root_sk, &root_header, &root_payload);

    let ext_header = embedded_header(&ext_jwk, "adem-end");
    let ext_payload = json!({
        "ver": "v1", "iat": 0, "nbf": 0, "exp": 9_999_999_999i64,
        "iss": "https://ext.example", "sub": "https://acme.example",
        "key": root_kid, "end": true,
        "log": [log_entry("ZXh0LWxvZw==")],
    });
    let external_endorsement = sign_compact(&ext_sk, &ext_header, &ext_payload);

    let directory = BindingLogDirectory {
        issuer: "acme.example".to_string(),
        root_kid,
    };

    let forward = verify_tokens(
        &[emblem.clone(), root_endorsement.clone(), external_endorsement.clone()],
        &[],
        &[],
        &directory,
    )
    .await;
    let reversed = verify_tokens(
        &[external_endorsement, root_endorsement, emblem],
        &[],
        &[],
        &directory,
    )
    .await;

    let forward_levels: std::collections::HashSet<_> = forward.levels().copied().collect();
    let reversed_levels: std::collections::HashSet<_> = reversed.levels().copied().collect();
    assert_eq!(forward_levels, reversed_levels);
    assert_eq!(forward.endorsed_by, reversed.endorsed_by);
}

/// Property 7 (spec §8): adding a malformed token to a bag must not change
/// the verdict produced for the tokens that do verify.
#[tokio::test]
async fn malformed_token_does_not_change_verdict_for_the_rest() {
    let (sk, jwk) = keypair(13);
    let token = emblem_token(&sk, &jwk, None, &["example.com"]);
    let garbage = b"not.a.jws.token".to_vec();

    let clean = verify_tokens(&[token.clone()], &[], &[], &NoLogs).await;
    let with_garbage = verify_tokens(&[token, garbage], &[], &[], &NoLogs).await;

    let clean_levels: std::collections::HashSet<_> = clean.levels().copied().collect();
    let dirty_levels: std::collections::HashSet<_> = with_garbage.levels().copied().collect();
    assert_eq!(clean_levels, dirty_levels);
}
