//! The ADEM token verification engine's top-level entry point: admits a bag
//! of raw JWS tokens, resolves the key graph, walks the endorsement chain
//! for the bag's emblem, and aggregates the result into a [`Verdict`].

pub mod chain;
pub mod error;
pub mod jws;
pub mod keygraph;

use adem_ct::LogDirectory;
use adem_types::{EmblemClaims, Jwk, RawClaims, Verdict};
use tracing::{debug, instrument, warn};

use keygraph::ValidatedToken;

/// Verifies a bag of raw JWS compact tokens and returns a verdict.
///
/// Total function; never panics or propagates an internal error. Internal
/// failures (malformed tokens, unresolved keys, CT binding failures) are
/// logged on the `tracing` diagnostic channel and collapsed into the
/// verdict — they never cause this function to fail the whole call,
/// except where the failing token *is* the bag's emblem.
///
/// `trusted_keys` are a-priori anchors (e.g. pinned operator keys);
/// `untrusted_keys` are side-channel key material (e.g. probed from DNS)
/// that still requires an endorsement to become verified — a side-channel
/// key is never elevated to verified except *through* a verified signer.
#[instrument(skip(raw_tokens, trusted_keys, untrusted_keys, directory))]
pub async fn verify_tokens(
    raw_tokens: &[Vec<u8>],
    trusted_keys: &[Jwk],
    untrusted_keys: &[Jwk],
    directory: &dyn LogDirectory,
) -> Verdict {
    let now = current_unix_time();

    if let Some(verdict) = unsigned_shortcut(raw_tokens, now) {
        debug!("bag contains an unsigned emblem; short-circuiting chain work");
        return verdict;
    }

    let outcome = keygraph::resolve(raw_tokens, trusted_keys, untrusted_keys, directory, now).await;

    for err in &outcome.errors {
        debug!(error = %err, "token discarded during admission or resolution");
    }

    let mut emblems = Vec::new();
    let mut endorsements = Vec::new();
    for token in outcome.tokens {
        match token {
            ValidatedToken::Emblem(e) => emblems.push(e),
            ValidatedToken::Endorsement(e) => endorsements.push(e),
        }
    }

    if emblems.len() > 1 {
        // A bag carries at most one primary emblem plus its supporting
        // endorsements. Input order is stable, so pick the first and log
        // the rest as ignored rather than guess at a merge rule.
        warn!(
            count = emblems.len(),
            "bag carried more than one validated emblem; verifying only the first"
        );
    }

    let Some(emblem) = emblems.into_iter().next() else {
        debug!("bag carried no validated emblem");
        return Verdict::default();
    };

    match chain::verify_chain(&emblem, &endorsements, outcome.graph.trusted_kids()) {
        Ok(chain_outcome) => {
            let mut verdict = Verdict::default();
            for level in chain_outcome.levels {
                verdict.add(level);
            }
            verdict.protected = emblem.claims.assets;
            verdict.issuer = emblem.claims.iss.map(|oi| oi.as_str().to_string());
            verdict.endorsed_by = chain_outcome.endorsed_by;
            verdict
        }
        Err(e) => {
            warn!(error = %e, "endorsement chain did not verify");
            Verdict::invalid()
        }
    }
}

/// Scans for an admissible unsigned emblem: `alg: "none"`, `cty: "adem-emb"`,
/// with an otherwise-valid claim set. This is a sentinel that bypasses the
/// key graph and chain verifier entirely — an unsigned emblem makes no
/// authenticity claim beyond "this is what the bag says", so there is
/// nothing further to resolve.
fn unsigned_shortcut(raw_tokens: &[Vec<u8>], now: i64) -> Option<Verdict> {
    for raw in raw_tokens {
        let Ok(token) = jws::parse_compact(raw) else {
            continue;
        };
        if token.header.alg != "none" {
            continue;
        }
        if token.header.cty.as_deref() != Some("adem-emb") {
            continue;
        }
        let Ok(raw_claims) = serde_json::from_slice::<RawClaims>(&token.payload) else {
            continue;
        };
        let Ok(claims) = EmblemClaims::from_raw(raw_claims, now) else {
            continue;
        };

        let mut verdict = Verdict::unsigned();
        verdict.protected = claims.assets;
        return Some(verdict);
    }
    None
}

fn current_unix_time() -> i64 {
    chrono::Utc::now().timestamp()
}
