//! Core value types for the ADEM token verification engine: asset
//! identifiers, canonical key IDs, constraint masks, the emblem/endorsement
//! claim schema, and the verdict result type.

pub mod ai;
pub mod claims;
pub mod constraints;
pub mod error;
pub mod jwk;
pub mod result;

pub use ai::Ai;
pub use claims::{EmblemClaims, EndorsedKey, EndorsementClaims, LogConfig, Oi, RawClaims};
pub use constraints::{parse_constraints, Distribution, EmblemConstraints, Purpose};
pub use error::{AiError, ClaimsError, KidError};
pub use jwk::{calc_kid, kid_of, set_kid, Jwk};
pub use result::{Verdict, VerificationResult};
