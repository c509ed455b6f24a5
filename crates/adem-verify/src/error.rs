use thiserror::Error;

/// Errors raised while parsing a JWS compact serialization or checking its
/// signature.
#[derive(Debug, Error)]
pub enum JwsError {
    #[error("token is not a compact serialization with exactly three segments")]
    NotCompact,
    #[error("malformed base64url segment")]
    Base64,
    #[error("malformed protected header: {0}")]
    Header(String),
    #[error("unsupported or malformed signing key for alg {0}")]
    UnsupportedKey(String),
    #[error("signature did not verify")]
    BadSignature,
}

/// Errors raised while admitting a single token into the key graph. Every
/// variant results in the token being discarded; it never poisons peers.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("token header carries neither kid nor jwk")]
    NoKeyFound,
    #[error("header declared an unrecognized cty")]
    UnrecognizedCty,
    #[error("jws error: {0}")]
    Jws(#[from] JwsError),
    #[error("claims error: {0}")]
    Claims(#[from] adem_types::ClaimsError),
    #[error("malformed claims payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("organizational root endorsement carries an empty log claim")]
    EmptyLog,
    #[error("organizational root endorsement carries no iss claim")]
    NoIssuer,
    #[error("verification key for this token could not be resolved")]
    KeyUnresolved,
}

/// Outcomes of walking an endorsement chain that collapse the verdict to
/// `INVALID`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChainError {
    #[error("two endorsements claim to endorse the same key")]
    Branch,
    #[error("endorsement constraint block is violated by the emblem it covers")]
    ConstraintViolation,
    #[error("emblem claims an issuer but no endorsement chain anchors it")]
    MissingRootAnchor,
}
