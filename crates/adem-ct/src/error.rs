use thiserror::Error;

/// Errors raised while verifying a root endorsement's binding to a
/// Certificate Transparency log.
#[derive(Debug, Error)]
pub enum CtError {
    #[error("issuer has no hostname")]
    IssuerHasNoHostname,
    #[error("certificate is not valid for issuer OI")]
    CertNotForIssuer,
    #[error("certificate is not valid for key")]
    CertNotForKey,
    #[error("do not recognize entry type")]
    UnknownEntryType,
    #[error("unknown log")]
    UnknownLog,
    #[error("could not fetch signed tree head: {0}")]
    Sth(String),
    #[error("STH signature is not valid")]
    InvalidSthSignature,
    #[error("could not fetch inclusion proof: {0}")]
    Proof(String),
    #[error("inclusion proof does not verify against the signed tree head")]
    InclusionMismatch,
    #[error("could not fetch log entry: {0}")]
    Entry(String),
}
