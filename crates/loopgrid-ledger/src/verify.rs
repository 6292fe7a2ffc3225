//! Chain verification.
//!
//! Walks decisions oldest-first, recomputing each content hash from the
//! stored payloads and each chain hash from the recomputed content hash and
//! the predecessor's *stored* chain hash. The walk stops at the first
//! mismatch. Problems are reported as data; nothing here returns an error.

use loopgrid_core::{Decision, DecisionId, HashAlgorithm};
use serde::{Deserialize, Serialize};

use crate::hash::{compute_chain_hash, compute_content_hash, DecisionContent};

/// Outcome of a chain walk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationResult {
    pub valid: bool,
    /// Records examined, including the broken one.
    pub total: usize,
    pub broken_at: Option<DecisionId>,
    pub message: String,
}

impl VerificationResult {
    fn broken(position: usize, id: &DecisionId, message: String) -> Self {
        Self {
            valid: false,
            total: position,
            broken_at: Some(id.clone()),
            message,
        }
    }
}

/// Verify an ascending sequence of decisions. The caller sorts.
pub fn verify_chain(decisions: &[Decision], algorithm: HashAlgorithm) -> VerificationResult {
    if decisions.is_empty() {
        return VerificationResult {
            valid: true,
            total: 0,
            broken_at: None,
            message: "No decisions to verify".to_string(),
        };
    }

    let mut previous_chain_hash: Option<&str> = None;

    for (i, decision) in decisions.iter().enumerate() {
        // Undecodable payloads are content tampering, not a failure of the walk.
        let expected_content_hash = decision.payloads().ok().map(|payloads| {
            compute_content_hash(
                DecisionContent::new(&decision.service_name, &decision.decision_type, &payloads),
                algorithm,
            )
        });

        let Some(expected_content_hash) = expected_content_hash
            .filter(|expected| expected == &decision.content_hash)
        else {
            tracing::warn!(decision_id = %decision.id, position = i + 1, "Content hash mismatch");
            return VerificationResult::broken(
                i + 1,
                &decision.id,
                format!(
                    "Content hash mismatch at decision {} — data was modified",
                    decision.id
                ),
            );
        };

        let expected_chain_hash =
            compute_chain_hash(&expected_content_hash, previous_chain_hash, algorithm);
        if decision.chain_hash != expected_chain_hash {
            tracing::warn!(decision_id = %decision.id, position = i + 1, "Chain hash mismatch");
            return VerificationResult::broken(
                i + 1,
                &decision.id,
                format!(
                    "Chain hash mismatch at decision {} — chain was broken",
                    decision.id
                ),
            );
        }

        previous_chain_hash = Some(decision.chain_hash.as_str());
    }

    VerificationResult {
        valid: true,
        total: decisions.len(),
        broken_at: None,
        message: format!(
            "All {} decisions verified — ledger integrity confirmed",
            decisions.len()
        ),
    }
}
