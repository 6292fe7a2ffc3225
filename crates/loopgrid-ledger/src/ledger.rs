//! The decision ledger: single-writer chained appends over a [`LedgerStore`].
//!
//! Appending reads the tail chain hash, links the new content hash to it,
//! and inserts. The store runs those three steps under one exclusive lock
//! that spans the whole ledger, because every service shares one global
//! chain. For [`FileLedgerStore`](crate::FileLedgerStore) that lock is a
//! file lock, so separate processes appending to one directory still form a
//! single chain. Reads, verification, and replay appends do not take it.

use std::sync::Arc;

use chrono::Utc;
use loopgrid_core::{
    Correction, Decision, DecisionId, DecisionPayloads, DecisionStatus, HashAlgorithm,
    IncorrectFlag, Payload, Replay, ReplayId,
};
use serde::Serialize;
use serde_json::Value;

use crate::draft::DecisionDraft;
use crate::error::{LedgerError, Result};
use crate::hash::{compute_chain_hash, compute_content_hash, DecisionContent};
use crate::store::{DecisionQuery, LedgerStore, ReviewUpdate, SortOrder};
use crate::verify::{verify_chain, VerificationResult};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// 1-based page selection for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(LedgerError::Validation("page must be at least 1".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(LedgerError::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            has_more: self.has_more,
        }
    }
}

/// Hash-chained decision ledger.
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    algorithm: HashAlgorithm,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, algorithm: HashAlgorithm) -> Self {
        Self {
            store,
            algorithm,
        }
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash, chain, and append a new decision.
    pub fn record(&self, draft: DecisionDraft) -> Result<Decision> {
        draft.validate()?;

        let payloads = DecisionPayloads {
            input: draft.input,
            model: draft.model,
            output: draft.output,
            prompt: draft.prompt,
            tool_calls: draft.tool_calls,
            metadata: draft.metadata,
        };
        let content_hash = compute_content_hash(
            DecisionContent::new(&draft.service_name, &draft.decision_type, &payloads),
            self.algorithm,
        );

        let unlinked = Decision {
            id: DecisionId::new(),
            sequence: 0,
            created_at: Utc::now(),
            service_name: draft.service_name,
            decision_type: draft.decision_type,
            input: Payload::from_value(&payloads.input),
            model: Payload::from_value(&payloads.model),
            output: Payload::from_value(&payloads.output),
            prompt: payloads.prompt.as_ref().map(Payload::from_value),
            tool_calls: payloads.tool_calls.as_ref().map(Payload::from_value),
            metadata: payloads.metadata.as_ref().map(Payload::from_value),
            content_hash,
            chain_hash: String::new(),
            status: DecisionStatus::Recorded,
            incorrect: None,
            correction: None,
        };

        let algorithm = self.algorithm;
        let decision = self
            .store
            .append_decision(Box::new(move |tail: Option<&Decision>| {
                link(unlinked, tail, algorithm)
            }))?;

        tracing::info!(
            decision_id = %decision.id,
            sequence = decision.sequence,
            service = %decision.service_name,
            decision_type = %decision.decision_type,
            "Decision recorded"
        );

        Ok(decision)
    }

    pub fn get(&self, id: &DecisionId) -> Result<Decision> {
        Ok(self.store.get_decision(id)?)
    }

    /// Newest-first page of decisions matching `query`.
    pub fn list(&self, query: &DecisionQuery, page: PageRequest) -> Result<Page<Decision>> {
        page.validate()?;
        let all = self.store.list_decisions(query, SortOrder::Descending)?;
        let total = all.len();
        let items: Vec<Decision> = all
            .into_iter()
            .skip((page.page - 1) * page.page_size)
            .take(page.page_size)
            .collect();

        Ok(Page {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
            has_more: page.page * page.page_size < total,
        })
    }

    /// Flag a decision as incorrect. Payloads and hashes stay untouched.
    pub fn mark_incorrect(&self, id: &DecisionId, reason: Option<String>) -> Result<Decision> {
        let review = ReviewUpdate {
            status: DecisionStatus::Incorrect,
            incorrect: Some(IncorrectFlag {
                reason,
                flagged_at: Utc::now(),
            }),
            correction: None,
        };
        let updated = self.store.update_review(id, &review)?;

        tracing::info!(decision_id = %id, "Decision marked incorrect");
        Ok(updated)
    }

    /// Attach a human correction as ground truth for a decision.
    pub fn attach_correction(
        &self,
        id: &DecisionId,
        output: Value,
        corrected_by: &str,
        notes: Option<String>,
    ) -> Result<Decision> {
        if corrected_by.trim().is_empty() {
            return Err(LedgerError::Validation("corrected_by must not be empty".into()));
        }
        if !output.is_object() {
            return Err(LedgerError::Validation(
                "correction must be a JSON object".into(),
            ));
        }

        let review = ReviewUpdate {
            status: DecisionStatus::Corrected,
            incorrect: None,
            correction: Some(Correction {
                output,
                corrected_by: corrected_by.to_string(),
                corrected_at: Utc::now(),
                notes,
            }),
        };
        let updated = self.store.update_review(id, &review)?;

        tracing::info!(decision_id = %id, corrected_by, "Correction attached");
        Ok(updated)
    }

    /// Walk the chain oldest-first, optionally scoped to one service.
    ///
    /// The chain is global, so a scoped walk over a ledger shared by several
    /// services reports the first record whose predecessor belongs to a
    /// different service as a chain break.
    pub fn verify(&self, service_name: Option<&str>) -> Result<VerificationResult> {
        let query = service_name
            .map(DecisionQuery::for_service)
            .unwrap_or_default();
        let decisions = self.store.list_decisions(&query, SortOrder::Ascending)?;
        let result = verify_chain(&decisions, self.algorithm);

        tracing::info!(
            valid = result.valid,
            total = result.total,
            broken_at = ?result.broken_at,
            service = ?service_name,
            "Ledger verified"
        );
        Ok(result)
    }

    /// Append a replay record. Replays are not chained.
    pub fn append_replay(&self, replay: &Replay) -> Result<()> {
        self.store.insert_replay(replay)?;
        Ok(())
    }

    pub fn get_replay(&self, id: &ReplayId) -> Result<Replay> {
        Ok(self.store.get_replay(id)?)
    }

    /// Replays of a decision, oldest first. Fails if the decision is unknown.
    pub fn list_replays(&self, decision_id: &DecisionId) -> Result<Vec<Replay>> {
        self.store.get_decision(decision_id)?;
        Ok(self.store.list_replays(decision_id)?)
    }
}

/// Chain `decision` onto `tail`. Runs under the store's append lock.
fn link(mut decision: Decision, tail: Option<&Decision>, algorithm: HashAlgorithm) -> Decision {
    let previous = tail.map(|t| t.chain_hash.as_str());
    decision.chain_hash = compute_chain_hash(&decision.content_hash, previous, algorithm);
    decision.sequence = tail.map_or(1, |t| t.sequence + 1);

    // Keep created_at monotonic even if the wall clock steps back.
    let now = Utc::now();
    decision.created_at = match tail {
        Some(t) if t.created_at > now => t.created_at,
        _ => now,
    };
    decision
}
