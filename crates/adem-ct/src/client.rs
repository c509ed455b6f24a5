//! The external collaborator surface this crate verifies against: a
//! directory that hands out per-log clients, and a client for one log's
//! STH/proof/entry endpoints.
//!
//! Network transport and X.509 parsing are out of scope here; callers
//! supply an implementation (typically backed by a real CT client and
//! certificate parser) and this crate only verifies the cryptographic
//! proofs.

use async_trait::async_trait;

use crate::error::CtError;

/// A log's signed tree head.
#[derive(Debug, Clone)]
pub struct SignedTreeHead {
    pub tree_size: u64,
    pub sha256_root_hash: [u8; 32],
}

/// An inclusion proof for one leaf, as returned by a log's
/// `get-proof-by-hash` endpoint.
#[derive(Debug, Clone)]
pub struct InclusionProof {
    pub leaf_index: u64,
    pub audit_path: Vec<[u8; 32]>,
}

/// The subject names carried by a logged certificate, already extracted by
/// the caller's X.509 parser (DNS SANs plus the subject common name).
#[derive(Debug, Clone, Default)]
pub struct CertSubjects {
    pub dns_names: Vec<String>,
    pub common_name: Option<String>,
}

/// A CT log entry. RFC 6962 defines two leaf types; a log that returns
/// neither (a future/unrecognized `LogEntryType`) is represented as
/// `Unknown` rather than refused at the transport layer, so this crate's
/// own binding check is what reports `UnknownEntryType`.
#[derive(Debug, Clone)]
pub enum Entry {
    X509(CertSubjects),
    Precert(CertSubjects),
    Unknown,
}

impl Entry {
    /// The subject names to bind against, for either supported entry kind.
    pub fn subjects(&self) -> Result<&CertSubjects, CtError> {
        match self {
            Entry::X509(s) | Entry::Precert(s) => Ok(s),
            Entry::Unknown => Err(CtError::UnknownEntryType),
        }
    }
}

/// One CT log's endpoints, scoped to what `VerifyBinding` needs.
#[async_trait]
pub trait LogClient: Send + Sync {
    async fn get_sth(&self) -> Result<SignedTreeHead, CtError>;

    fn verify_sth_signature(&self, sth: &SignedTreeHead) -> Result<(), CtError>;

    async fn get_proof_by_hash(
        &self,
        leaf_hash: &[u8; 32],
        tree_size: u64,
    ) -> Result<InclusionProof, CtError>;

    async fn get_entry_and_proof(
        &self,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<Entry, CtError>;
}

/// Resolves a `LogConfig`'s log ID to a client for that log, the way
/// `GetLogClient` resolves against the known-logs map built from Google's
/// and Apple's log lists.
#[async_trait]
pub trait LogDirectory: Send + Sync {
    async fn client_for(&self, log_id: &[u8]) -> Result<std::sync::Arc<dyn LogClient>, CtError>;
}
