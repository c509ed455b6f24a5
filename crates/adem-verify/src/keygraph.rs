//! The key graph resolver: admits a bag of raw JWS tokens, matching each to
//! its verification key and driving a fixed-point worklist so that a token
//! whose key only appears as the *subject* of another token still
//! resolves once that other token verifies.
//!
//! Single-threaded and cooperative: one worklist loop drains the bag to a
//! fixed point rather than racing a task per token.

use std::collections::{HashMap, HashSet, VecDeque};

use adem_types::{EmblemClaims, EndorsedKey, EndorsementClaims, Jwk, RawClaims};
use adem_ct::LogDirectory;
use tracing::{debug, warn};

use crate::error::AdmissionError;
use crate::jws::{self, ProtectedHeader};

/// An emblem whose signature and claims have been verified; its
/// `verification_kid` is the KID the signing key canonicalizes to.
#[derive(Debug, Clone)]
pub struct ValidatedEmblem {
    pub verification_kid: String,
    pub claims: EmblemClaims,
}

/// An endorsement whose signature and claims have been verified.
/// `ct_bound` is `None` when the endorsement carried no `log` claim, and
/// `Some(true)`/`Some(false)` when it did, recording whether every
/// configured log bound successfully.
#[derive(Debug, Clone)]
pub struct ValidatedEndorsement {
    pub verification_kid: String,
    pub claims: EndorsementClaims,
    pub ct_bound: Option<bool>,
}

#[derive(Debug, Clone)]
pub enum ValidatedToken {
    Emblem(ValidatedEmblem),
    Endorsement(ValidatedEndorsement),
}

/// The mutable key graph: known key material, which KIDs are verified, and
/// which verified KIDs are a-priori trust anchors.
#[derive(Debug, Default)]
pub struct KeyGraph {
    keys: HashMap<String, Jwk>,
    verified: HashSet<String>,
    trusted: HashSet<String>,
}

impl KeyGraph {
    fn seed(trusted_keys: &[Jwk], untrusted_keys: &[Jwk]) -> Self {
        let mut graph = KeyGraph::default();
        for key in trusted_keys {
            match adem_types::kid_of(key) {
                Ok(kid) => {
                    graph.trusted.insert(kid.clone());
                    graph.verified.insert(kid.clone());
                    graph.keys.insert(kid, key.clone());
                }
                Err(e) => warn!(error = %e, "could not compute kid for a trusted key"),
            }
        }
        for key in untrusted_keys {
            match adem_types::kid_of(key) {
                Ok(kid) => {
                    graph.keys.entry(kid).or_insert_with(|| key.clone());
                }
                Err(e) => warn!(error = %e, "could not compute kid for an untrusted key"),
            }
        }
        graph
    }

    /// A key is only usable for signature verification once it is both
    /// known and verified.
    fn get(&self, kid: &str) -> Option<Jwk> {
        if self.verified.contains(kid) {
            self.keys.get(kid).cloned()
        } else {
            None
        }
    }

    /// Registers `kid` as holding verified key material, returning `true`
    /// if this is new information (i.e. dependents should be unblocked).
    fn mark_verified(&mut self, kid: &str, key: Option<&Jwk>) -> bool {
        let was_verified = self.verified.contains(kid);
        if let Some(key) = key {
            self.keys.entry(kid.to_string()).or_insert_with(|| key.clone());
        }
        let newly = self.verified.insert(kid.to_string());
        newly && !was_verified
    }

    pub fn trusted_kids(&self) -> &HashSet<String> {
        &self.trusted
    }

    /// Key lookup that ignores the `verified` flag. Used only to admit a
    /// kid-only organizational-root candidate (spec.md §4.5 resolver table,
    /// row 3): such a candidate's own CT binding inside `admit` is what
    /// decides whether its key becomes verified, so the normal verified-gate
    /// lookup in `get` would deadlock it forever. Mirrors the Go original's
    /// `token_set.go` direct `th.keys[verificationKid]` lookup, which
    /// bypasses the same gate for the same reason.
    fn lookup_unverified(&self, kid: &str) -> Option<Jwk> {
        self.keys.get(kid).cloned()
    }
}

enum KeySource {
    Embedded(Jwk),
    Kid(String),
}

struct Candidate {
    header: ProtectedHeader,
    signing_input: Vec<u8>,
    signature: Vec<u8>,
    raw_claims: RawClaims,
    key_source: KeySource,
    verification_kid: String,
}

/// True when a raw payload's `log` claim is present and non-empty. Shared
/// between `resolve`'s root-candidate dispatch and `admit`'s CT-binding
/// gate, since both need to answer "is this a root endorsement" before the
/// claim set has been fully typed.
fn has_log_claim(raw: &RawClaims) -> bool {
    raw.log
        .as_ref()
        .map(|v| !matches!(v, serde_json::Value::Array(a) if a.is_empty()))
        .unwrap_or(false)
}

fn build_candidate(raw: &[u8]) -> Result<Candidate, AdmissionError> {
    let token = jws::parse_compact(raw)?;

    match token.header.cty.as_deref() {
        Some("adem-emb") | Some("adem-end") => {}
        _ => return Err(AdmissionError::UnrecognizedCty),
    }

    let (key_source, verification_kid) = if let Some(jwk) = token.header.jwk.clone() {
        let kid = adem_types::kid_of(&jwk).map_err(|_| AdmissionError::KeyUnresolved)?;
        (KeySource::Embedded(jwk), kid)
    } else if let Some(kid) = token.header.kid.clone() {
        (KeySource::Kid(kid.clone()), kid)
    } else {
        return Err(AdmissionError::NoKeyFound);
    };

    let raw_claims: RawClaims = serde_json::from_slice(&token.payload)?;

    Ok(Candidate {
        header: token.header,
        signing_input: token.signing_input,
        signature: token.signature,
        raw_claims,
        key_source,
        verification_kid,
    })
}

/// Outcome of resolving a bag of tokens: every token that admitted
/// successfully, plus the final key graph (for `_TRUSTED` checks during
/// chain verification) and the errors that caused discards (diagnostic
/// only).
pub struct ResolveOutcome {
    pub tokens: Vec<ValidatedToken>,
    pub graph: KeyGraph,
    pub errors: Vec<AdmissionError>,
}

pub async fn resolve(
    raw_tokens: &[Vec<u8>],
    trusted_keys: &[Jwk],
    untrusted_keys: &[Jwk],
    directory: &dyn LogDirectory,
    now: i64,
) -> ResolveOutcome {
    let mut graph = KeyGraph::seed(trusted_keys, untrusted_keys);
    let mut results = Vec::new();
    let mut errors = Vec::new();
    let mut dependents: HashMap<String, Vec<Candidate>> = HashMap::new();
    let mut ready: VecDeque<Candidate> = VecDeque::new();

    for raw in raw_tokens {
        match build_candidate(raw) {
            Ok(c) => ready.push_back(c),
            Err(e) => errors.push(e),
        }
    }

    while let Some(candidate) = ready.pop_front() {
        let key = match &candidate.key_source {
            KeySource::Embedded(jwk) => Some(jwk.clone()),
            KeySource::Kid(kid) => graph.get(kid).or_else(|| {
                // spec.md §4.5 table row 3: "kid only | log present | the
                // key is an organizational root; bind via CT and admit."
                // Such a candidate names its own verification key only by
                // kid, so it can only ever reach `admit` (and its CT
                // binding) if that key is looked up regardless of whether
                // the graph has verified it yet.
                let is_root_candidate = candidate.header.cty.as_deref() == Some("adem-end")
                    && has_log_claim(&candidate.raw_claims);
                if is_root_candidate {
                    graph.lookup_unverified(kid)
                } else {
                    None
                }
            }),
        };

        let Some(key) = key else {
            let kid = candidate.verification_kid.clone();
            dependents.entry(kid).or_default().push(candidate);
            continue;
        };

        match admit(candidate, &key, &mut graph, directory, now).await {
            Ok((token, newly_verified)) => {
                results.push(token);
                for kid in newly_verified {
                    if let Some(waiting) = dependents.remove(&kid) {
                        ready.extend(waiting);
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "token discarded during admission");
                errors.push(e);
            }
        }
    }

    for (_, waiting) in dependents {
        for _ in waiting {
            errors.push(AdmissionError::KeyUnresolved);
        }
    }

    ResolveOutcome {
        tokens: results,
        graph,
        errors,
    }
}

async fn admit(
    candidate: Candidate,
    key: &Jwk,
    graph: &mut KeyGraph,
    directory: &dyn LogDirectory,
    now: i64,
) -> Result<(ValidatedToken, Vec<String>), AdmissionError> {
    jws::verify_signature(&candidate.header.alg, key, &candidate.signing_input, &candidate.signature)?;

    let mut newly_verified = Vec::new();
    if graph.mark_verified(&candidate.verification_kid, Some(key)) {
        newly_verified.push(candidate.verification_kid.clone());
    }

    let is_endorsement = candidate.header.cty.as_deref() == Some("adem-end");
    let token = if is_endorsement {
        let has_log = has_log_claim(&candidate.raw_claims);

        let claims = EndorsementClaims::from_raw(candidate.raw_claims, now)?;

        let ct_bound = if has_log {
            if claims.log.is_empty() {
                return Err(AdmissionError::EmptyLog);
            }
            let iss = claims.iss.as_ref().ok_or(AdmissionError::NoIssuer)?;
            let results =
                adem_ct::verify_bindings(directory, iss.host(), &candidate.verification_kid, &claims.log)
                    .await;
            Some(!results.is_empty() && results.iter().all(|r| r.ok))
        } else {
            None
        };

        if let Some(endorsed) = &claims.key {
            match endorsed {
                EndorsedKey::Inline(jwk) => {
                    if let Ok(kid) = adem_types::kid_of(jwk) {
                        if graph.mark_verified(&kid, Some(jwk)) {
                            newly_verified.push(kid);
                        }
                    }
                }
                EndorsedKey::ByKid(kid) => {
                    if graph.keys.contains_key(kid) && graph.mark_verified(kid, None) {
                        newly_verified.push(kid.clone());
                    }
                }
            }
        }

        ValidatedToken::Endorsement(ValidatedEndorsement {
            verification_kid: candidate.verification_kid,
            claims,
            ct_bound,
        })
    } else {
        let claims = EmblemClaims::from_raw(candidate.raw_claims, now)?;
        ValidatedToken::Emblem(ValidatedEmblem {
            verification_kid: candidate.verification_kid,
            claims,
        })
    };

    Ok((token, newly_verified))
}
