//! The verdict returned for a verified asset: a set of verification levels
//! plus the evidence that earned them. Grounded on the result aggregation
//! shape sketched in `original_source/pkg/vfy/vfy.go`, generalized from a
//! single winning level to the full level *set* spec.md §3 calls for.

use std::collections::HashSet;

use crate::ai::Ai;

/// One level of trust a token bag can establish for an asset. Variants are
/// declared in increasing order of trust, which is what [`Verdict::highest`]
/// relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VerificationResult {
    /// No admissible emblem covers the asset at all.
    Unsigned,
    /// An emblem covers the asset but failed verification.
    Invalid,
    /// A self-signed emblem covers the asset.
    Signed,
    /// The emblem's key is endorsed by its own organization's root.
    Organizational,
    /// The emblem's key is endorsed by a key belonging to another
    /// organization.
    Endorsed,
    /// [`Self::Signed`], additionally bound to Certificate Transparency.
    SignedTrusted,
    /// [`Self::Organizational`], additionally bound to Certificate
    /// Transparency.
    OrganizationalTrusted,
    /// [`Self::Endorsed`], additionally bound to Certificate Transparency.
    EndorsedTrusted,
}

/// The aggregate result of verifying a bag of tokens for one asset: every
/// level the bag establishes, plus supporting evidence.
#[derive(Debug, Clone, Default)]
pub struct Verdict {
    levels: HashSet<VerificationResult>,
    /// The most specific asset identifiers actually covered, taken from the
    /// winning emblem(s).
    pub protected: Vec<Ai>,
    /// The emblem issuer, when the emblem carries one.
    pub issuer: Option<String>,
    /// KIDs of the keys that endorsed the winning emblem's key, root-first.
    pub endorsed_by: Vec<String>,
}

impl Verdict {
    pub fn unsigned() -> Self {
        let mut v = Verdict::default();
        v.levels.insert(VerificationResult::Unsigned);
        v
    }

    pub fn invalid() -> Self {
        let mut v = Verdict::default();
        v.levels.insert(VerificationResult::Invalid);
        v
    }

    pub fn add(&mut self, level: VerificationResult) {
        self.levels.insert(level);
    }

    pub fn has(&self, level: VerificationResult) -> bool {
        self.levels.contains(&level)
    }

    pub fn levels(&self) -> impl Iterator<Item = &VerificationResult> {
        self.levels.iter()
    }

    /// The single most-trusted level in this verdict's set, if any.
    pub fn highest(&self) -> Option<VerificationResult> {
        self.levels.iter().copied().max()
    }
}
