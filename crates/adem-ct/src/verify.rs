//! Root endorsement-to-CT-log binding verification.

use adem_types::LogConfig;
use tracing::{instrument, warn};

use crate::client::LogDirectory;
use crate::error::CtError;
use crate::hasher::verify_inclusion;

/// The outcome of checking one `LogConfig` entry: callers get a result per
/// log rather than a single pass/fail, since an endorsement can bind to
/// several logs.
#[derive(Debug, Clone)]
pub struct LogBindingResult {
    pub log_id: Vec<u8>,
    pub ok: bool,
}

/// Verifies that `hash` (an SCT leaf hash) is included in the log
/// identified by `logs[].id`, and that the logged certificate is valid for
/// both `issuer_hostname` and `root_kid` (the root key's canonical KID,
/// already computed by the caller from the header- or side-channel-
/// supplied key material).
#[instrument(skip(directory), fields(issuer = issuer_hostname))]
pub async fn verify_binding(
    directory: &dyn LogDirectory,
    log_id: &[u8],
    leaf_hash: &[u8; 32],
    issuer_hostname: &str,
    root_kid: &str,
) -> Result<(), CtError> {
    if issuer_hostname.is_empty() {
        return Err(CtError::IssuerHasNoHostname);
    }

    let client = directory.client_for(log_id).await?;

    let sth = client.get_sth().await?;
    client.verify_sth_signature(&sth)?;

    let proof = client.get_proof_by_hash(leaf_hash, sth.tree_size).await?;
    let entry = client
        .get_entry_and_proof(proof.leaf_index, sth.tree_size)
        .await?;

    verify_inclusion(
        leaf_hash,
        proof.leaf_index,
        sth.tree_size,
        &proof.audit_path,
        &sth.sha256_root_hash,
    )?;

    let expected_key_subject = format!("{root_kid}.adem-configuration.{issuer_hostname}");
    let cert_subjects = entry.subjects()?;
    let subjects = cert_subjects
        .dns_names
        .iter()
        .map(String::as_str)
        .chain(cert_subjects.common_name.as_deref());

    let mut saw_issuer = false;
    let mut saw_key = false;
    for subject in subjects {
        saw_issuer |= subject == issuer_hostname;
        saw_key |= subject == expected_key_subject;
    }

    if !saw_issuer {
        return Err(CtError::CertNotForIssuer);
    }
    if !saw_key {
        return Err(CtError::CertNotForKey);
    }
    Ok(())
}

/// Verifies every `LogConfig` entry carried by a root endorsement against
/// `root_key`, returning one result per log rather than failing fast, so a
/// single unreachable or misbehaving log doesn't sink bindings to the
/// others.
pub async fn verify_bindings(
    directory: &dyn LogDirectory,
    issuer_hostname: &str,
    root_kid: &str,
    logs: &[LogConfig],
) -> Vec<LogBindingResult> {
    let mut results = Vec::with_capacity(logs.len());
    for log in logs {
        if log.ver != "v1" {
            warn!(log_id = ?log.id, "log config has unsupported version");
            results.push(LogBindingResult {
                log_id: log.id.clone(),
                ok: false,
            });
            continue;
        }

        let hash: Result<[u8; 32], _> = log.hash.as_slice().try_into();
        let ok = match hash {
            Ok(hash) => {
                match verify_binding(directory, &log.id, &hash, issuer_hostname, root_kid).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(log_id = ?log.id, error = %e, "log binding did not verify");
                        false
                    }
                }
            }
            Err(_) => false,
        };

        results.push(LogBindingResult {
            log_id: log.id.clone(),
            ok,
        });
    }
    results
}
