//! In-memory ledger store for embedding and tests.

use std::sync::RwLock;

use loopgrid_core::{Decision, DecisionId, Replay, ReplayId};

use crate::store::{
    creation_order, replay_order, sort_decisions, DecisionQuery, LedgerStore, LinkFn,
    ReviewUpdate, SortOrder, StoreError,
};

/// Volatile store. The write lock serializes appends and review updates.
#[derive(Default)]
pub struct MemoryLedgerStore {
    decisions: RwLock<Vec<Decision>>,
    replays: RwLock<Vec<Replay>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn append_decision(&self, link: LinkFn<'_>) -> Result<Decision, StoreError> {
        let mut decisions = self.decisions.write().map_err(|_| StoreError::Poisoned)?;
        let decision = link(decisions.iter().max_by(|a, b| creation_order(a, b)));
        if decisions.iter().any(|d| d.id == decision.id) {
            return Err(StoreError::Duplicate(decision.id.to_string()));
        }
        decisions.push(decision.clone());
        Ok(decision)
    }

    fn get_decision(&self, id: &DecisionId) -> Result<Decision, StoreError> {
        let decisions = self.decisions.read().map_err(|_| StoreError::Poisoned)?;
        decisions
            .iter()
            .find(|d| &d.id == id)
            .cloned()
            .ok_or_else(|| StoreError::DecisionNotFound(id.clone()))
    }

    fn last_decision(&self) -> Result<Option<Decision>, StoreError> {
        let decisions = self.decisions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(decisions.iter().max_by(|a, b| creation_order(a, b)).cloned())
    }

    fn list_decisions(
        &self,
        query: &DecisionQuery,
        order: SortOrder,
    ) -> Result<Vec<Decision>, StoreError> {
        let decisions = self.decisions.read().map_err(|_| StoreError::Poisoned)?;
        let mut matched: Vec<Decision> = decisions
            .iter()
            .filter(|d| query.matches(d))
            .cloned()
            .collect();
        sort_decisions(&mut matched, order);
        Ok(matched)
    }

    fn update_review(
        &self,
        id: &DecisionId,
        review: &ReviewUpdate,
    ) -> Result<Decision, StoreError> {
        let mut decisions = self.decisions.write().map_err(|_| StoreError::Poisoned)?;
        let decision = decisions
            .iter_mut()
            .find(|d| &d.id == id)
            .ok_or_else(|| StoreError::DecisionNotFound(id.clone()))?;
        review.apply(decision);
        Ok(decision.clone())
    }

    fn insert_replay(&self, replay: &Replay) -> Result<(), StoreError> {
        let mut replays = self.replays.write().map_err(|_| StoreError::Poisoned)?;
        if replays.iter().any(|r| r.id == replay.id) {
            return Err(StoreError::Duplicate(replay.id.to_string()));
        }
        replays.push(replay.clone());
        Ok(())
    }

    fn get_replay(&self, id: &ReplayId) -> Result<Replay, StoreError> {
        let replays = self.replays.read().map_err(|_| StoreError::Poisoned)?;
        replays
            .iter()
            .find(|r| &r.id == id)
            .cloned()
            .ok_or_else(|| StoreError::ReplayNotFound(id.clone()))
    }

    fn list_replays(&self, decision_id: &DecisionId) -> Result<Vec<Replay>, StoreError> {
        let replays = self.replays.read().map_err(|_| StoreError::Poisoned)?;
        let mut matched: Vec<Replay> = replays
            .iter()
            .filter(|r| &r.decision_id == decision_id)
            .cloned()
            .collect();
        matched.sort_by(replay_order);
        Ok(matched)
    }
}
