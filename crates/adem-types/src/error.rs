use thiserror::Error;

/// Errors raised while parsing or comparing an [`crate::ai::Ai`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AiError {
    #[error("illegal asset identifier")]
    Illegal,
    #[error("asset identifier is empty")]
    Empty,
    #[error("illegal usage of domain name wildcards")]
    Wildcard,
    #[error("illegal address component")]
    IllegalAddress,
    #[error("illegal port component")]
    IllegalPort,
}

/// Errors raised while computing or applying a canonical key ID.
#[derive(Debug, Error)]
pub enum KidError {
    #[error("key has no alg set")]
    NoAlg,
    #[error("could not canonicalize key JSON: {0}")]
    Canonicalize(#[from] serde_json::Error),
}

/// Errors raised while parsing or validating emblem/endorsement claims.
#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("illegal ver claim")]
    IllegalVersion,
    #[error("token is not yet valid (nbf in the future)")]
    NotYetValid,
    #[error("token has expired")]
    Expired,
    #[error("illegal iss claim: {0}")]
    IllegalIssuer(String),
    #[error("illegal prp constraint value")]
    IllegalPrp,
    #[error("illegal dst constraint value")]
    IllegalDst,
    #[error("emblem must carry a non-empty assets claim")]
    MissingAssets,
    #[error("emblem claims must not carry a log claim")]
    UnexpectedLog,
    #[error("end claim must be a boolean")]
    IllegalEndClaim,
    #[error("illegal key claim: {0}")]
    IllegalKeyClaim(String),
    #[error("illegal log claim: {0}")]
    IllegalLogClaim(String),
    #[error("illegal constraint block: {0}")]
    IllegalType(String),
    #[error("asset identifier error: {0}")]
    Ai(#[from] AiError),
    #[error("malformed claims JSON: {0}")]
    Json(#[from] serde_json::Error),
}
