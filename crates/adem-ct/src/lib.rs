//! Certificate Transparency binding verification for ADEM root
//! endorsements: RFC 6962 inclusion proof checking plus the subject-name
//! binding check tying a logged certificate to an issuer and a root key.

mod client;
mod error;
mod hasher;
mod verify;

pub use client::{CertSubjects, Entry, InclusionProof, LogClient, LogDirectory, SignedTreeHead};
pub use error::CtError;
pub use hasher::{leaf_hash, verify_inclusion};
pub use verify::{verify_binding, verify_bindings, LogBindingResult};
