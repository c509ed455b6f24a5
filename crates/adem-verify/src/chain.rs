//! Endorsement chain verification: walks from a validated emblem toward its
//! organizational root, checking constraint inheritance at each hop, then
//! folds in any external endorsements of that root.

use std::collections::{HashMap, HashSet};

use adem_types::{EmblemClaims, EmblemConstraints, EndorsedKey, VerificationResult};

use crate::error::ChainError;
use crate::keygraph::{ValidatedEmblem, ValidatedEndorsement};

/// Levels and evidence a chain walk adds on top of the bare `SIGNED` level
/// every admitted emblem already carries.
#[derive(Debug, Default)]
pub struct ChainOutcome {
    pub levels: Vec<VerificationResult>,
    pub endorsed_by: Vec<String>,
}

fn endorsed_kid_of(endorsement: &ValidatedEndorsement) -> Option<String> {
    match endorsement.claims.key.as_ref()? {
        EndorsedKey::Inline(jwk) => adem_types::kid_of(jwk).ok(),
        EndorsedKey::ByKid(kid) => Some(kid.clone()),
    }
}

/// Builds `endorsed_kid → endorsement` for every endorsement sharing the
/// emblem's organization (`iss == sub == E.iss`). A duplicate target KID is
/// an illegal branch — linear chains only.
fn index_endorsements<'a>(
    e_iss: &str,
    endorsements: &'a [ValidatedEndorsement],
) -> Result<HashMap<String, &'a ValidatedEndorsement>, ChainError> {
    let mut map = HashMap::new();
    for endorsement in endorsements {
        let Some(iss) = &endorsement.claims.iss else { continue };
        if iss.as_str() != e_iss {
            continue;
        }
        let Some(sub) = &endorsement.claims.sub else { continue };
        if sub != e_iss {
            continue;
        }
        let Some(kid) = endorsed_kid_of(endorsement) else { continue };
        if map.insert(kid, endorsement).is_some() {
            return Err(ChainError::Branch);
        }
    }
    Ok(map)
}

fn constraints_satisfied(constraints: &EmblemConstraints, emblem: &EmblemClaims) -> bool {
    if !constraints.assets.is_empty() {
        for asset in &emblem.assets {
            if !constraints.assets.iter().any(|covering| covering.more_general(asset)) {
                return false;
            }
        }
    }

    if let Some(allowed) = constraints.purpose {
        if let Some(claimed) = emblem.constraints.as_ref().and_then(|c| c.purpose) {
            if !allowed.contains(claimed) {
                return false;
            }
        }
    }

    if let Some(allowed) = constraints.distribution {
        if let Some(claimed) = emblem.constraints.as_ref().and_then(|c| c.distribution) {
            if !allowed.contains(claimed) {
                return false;
            }
        }
    }

    if let Some(window) = constraints.window {
        if emblem.exp - emblem.nbf > window {
            return false;
        }
    }

    true
}

enum RootRef<'a> {
    Emblem(&'a ValidatedEmblem),
    Endorsement(&'a ValidatedEndorsement),
}

impl RootRef<'_> {
    fn verification_kid(&self) -> &str {
        match self {
            RootRef::Emblem(e) => &e.verification_kid,
            RootRef::Endorsement(e) => &e.verification_kid,
        }
    }

    /// Structurally carries a `log` claim, independent of whether that
    /// claim's CT binding actually succeeded (spec's §4.5/§7 distinction:
    /// an unbound root still anchors the chain, it just withholds
    /// `ORGANIZATIONAL`).
    fn log_present(&self) -> bool {
        matches!(self, RootRef::Endorsement(e) if e.ct_bound.is_some())
    }

    fn ct_bound(&self) -> Option<bool> {
        match self {
            RootRef::Endorsement(e) => e.ct_bound,
            RootRef::Emblem(_) => None,
        }
    }
}

fn walk<'a>(
    emblem: &'a ValidatedEmblem,
    endorsed_by: &HashMap<String, &'a ValidatedEndorsement>,
    trusted_kids: &HashSet<String>,
) -> Result<(RootRef<'a>, bool), ChainError> {
    let mut cur_kid = emblem.verification_kid.clone();
    let mut trusted_seen = trusted_kids.contains(&cur_kid);
    let mut root = RootRef::Emblem(emblem);
    let mut visited = HashSet::new();
    visited.insert(cur_kid.clone());

    loop {
        let Some(endorsement) = endorsed_by.get(&cur_kid) else {
            break;
        };

        if let Some(constraints) = &endorsement.claims.constraints {
            if !constraints_satisfied(constraints, &emblem.claims) {
                return Err(ChainError::ConstraintViolation);
            }
        }

        cur_kid = endorsement.verification_kid.clone();
        if !visited.insert(cur_kid.clone()) {
            // A cycle in the endorsement graph: no legitimate chain is
            // this shape, so treat it the same as an illegal branch.
            return Err(ChainError::Branch);
        }
        trusted_seen |= trusted_kids.contains(&cur_kid);
        root = RootRef::Endorsement(endorsement);
    }

    Ok((root, trusted_seen))
}

/// Runs §4.6 (chain walk, constraint inheritance, classification) and §4.7
/// (external endorsements) for one validated emblem against the full
/// endorsement set admitted alongside it.
pub fn verify_chain(
    emblem: &ValidatedEmblem,
    endorsements: &[ValidatedEndorsement],
    trusted_kids: &HashSet<String>,
) -> Result<ChainOutcome, ChainError> {
    let endorsed_by = match &emblem.claims.iss {
        Some(iss) => index_endorsements(iss.as_str(), endorsements)?,
        None => HashMap::new(),
    };

    let (root, trusted_seen) = walk(emblem, &endorsed_by, trusted_kids)?;

    let mut levels = vec![VerificationResult::Signed];
    if trusted_seen {
        levels.push(VerificationResult::SignedTrusted);
    }

    let log_present = root.log_present();
    if emblem.claims.iss.is_some() && !log_present {
        return Err(ChainError::MissingRootAnchor);
    }
    if log_present && root.ct_bound() == Some(true) {
        levels.push(VerificationResult::Organizational);
        if trusted_kids.contains(root.verification_kid()) {
            levels.push(VerificationResult::OrganizationalTrusted);
        }
    }

    let mut endorsed_by_list = Vec::new();
    if let RootRef::Endorsement(root_endorsement) = &root {
        if log_present {
            if let Some(root_iss) = &root_endorsement.claims.iss {
                for candidate in endorsements {
                    if !candidate.claims.external {
                        continue;
                    }
                    let Some(cand_iss) = &candidate.claims.iss else { continue };
                    let Some(cand_sub) = &candidate.claims.sub else { continue };
                    if cand_sub != root_iss.as_str() {
                        continue;
                    }
                    let Some(endorsed_kid) = endorsed_kid_of(candidate) else { continue };
                    if endorsed_kid != root_endorsement.verification_kid {
                        continue;
                    }
                    if candidate.claims.log.is_empty() || candidate.ct_bound != Some(true) {
                        continue;
                    }

                    if let Some(constraints) = &candidate.claims.constraints {
                        if !constraints_satisfied(constraints, &emblem.claims) {
                            return Err(ChainError::ConstraintViolation);
                        }
                    }

                    levels.push(VerificationResult::Endorsed);
                    if trusted_kids.contains(&candidate.verification_kid) {
                        levels.push(VerificationResult::EndorsedTrusted);
                    }
                    endorsed_by_list.push(cand_iss.as_str().to_string());
                }
            }
        }
    }

    Ok(ChainOutcome {
        levels,
        endorsed_by: endorsed_by_list,
    })
}
