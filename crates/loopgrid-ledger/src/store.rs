//! Ledger storage: trait + file-system implementation.
//!
//! Decisions and replays are stored as one JSON document per record,
//! organized by creation date:
//!
//! ```text
//! {root}/
//!   ledger.lock
//!   HEAD
//!   decisions/2024/01/15/{decision_id}.json
//!   replays/2024/01/15/{replay_id}.json
//! ```
//!
//! The store is append-only. The only in-place write it accepts is a
//! [`ReviewUpdate`], which carries the status side channel and nothing that
//! participates in a hash. Appends and review updates hold an exclusive
//! advisory lock on `ledger.lock`, so every process and every store instance
//! opened on the same root sees one chain. `HEAD` names the newest decision
//! file so an append reads one record instead of the whole tree.

use std::cmp::Ordering;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use loopgrid_core::{
    Correction, Decision, DecisionId, DecisionStatus, IncorrectFlag, Payload, Replay, ReplayId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const LOCK_FILE: &str = "ledger.lock";
const HEAD_FILE: &str = "HEAD";

/// Errors that can occur during ledger storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Decision not found: {0}")]
    DecisionNotFound(DecisionId),

    #[error("Replay not found: {0}")]
    ReplayNotFound(ReplayId),

    #[error("Record already exists: {0}")]
    Duplicate(String),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Equality filters for listing decisions.
#[derive(Debug, Clone, Default)]
pub struct DecisionQuery {
    pub service_name: Option<String>,
    pub decision_type: Option<String>,
    pub status: Option<DecisionStatus>,
}

impl DecisionQuery {
    pub fn for_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: Some(service_name.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, decision: &Decision) -> bool {
        if let Some(service) = &self.service_name {
            if &decision.service_name != service {
                return false;
            }
        }
        if let Some(kind) = &self.decision_type {
            if &decision.decision_type != kind {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if &decision.status != status {
                return false;
            }
        }
        true
    }
}

/// Creation-order direction for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first. The order the chain verifier requires.
    Ascending,
    /// Newest first.
    #[default]
    Descending,
}

/// A patch to the review side channel of a stored decision.
///
/// `status` is always written. `incorrect` and `correction` are written only
/// when present, so a flag and a correction applied in either order both
/// survive.
#[derive(Debug, Clone)]
pub struct ReviewUpdate {
    pub status: DecisionStatus,
    pub incorrect: Option<IncorrectFlag>,
    pub correction: Option<Correction>,
}

impl ReviewUpdate {
    pub fn apply(&self, decision: &mut Decision) {
        decision.status = self.status;
        if let Some(flag) = &self.incorrect {
            decision.incorrect = Some(flag.clone());
        }
        if let Some(correction) = &self.correction {
            decision.correction = Some(correction.clone());
        }
    }
}

/// Builds the next decision from the current tail. Called once, under the
/// store's append lock.
pub type LinkFn<'a> = Box<dyn FnOnce(Option<&Decision>) -> Decision + 'a>;

/// Total creation order: `created_at`, ties broken by insertion sequence.
pub fn creation_order(a: &Decision, b: &Decision) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then(a.sequence.cmp(&b.sequence))
}

/// Sort decisions in place by creation order.
pub fn sort_decisions(decisions: &mut [Decision], order: SortOrder) {
    match order {
        SortOrder::Ascending => decisions.sort_by(creation_order),
        SortOrder::Descending => decisions.sort_by(|a, b| creation_order(b, a)),
    }
}

/// Listing order for replays: `created_at`, ties broken by id.
pub fn replay_order(a: &Replay, b: &Replay) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.as_str().cmp(b.id.as_str()))
}

/// Trait for ledger persistence backends.
pub trait LedgerStore: Send + Sync {
    /// Read the tail, build the next decision from it with `link`, and
    /// persist the result, all under one exclusive lock. Fails with
    /// `Duplicate` if the built id already exists.
    fn append_decision(&self, link: LinkFn<'_>) -> Result<Decision, StoreError>;

    /// Retrieve a decision by ID.
    fn get_decision(&self, id: &DecisionId) -> Result<Decision, StoreError>;

    /// The newest decision, if any. Does not take the append lock.
    fn last_decision(&self) -> Result<Option<Decision>, StoreError>;

    /// List decisions matching the query in creation order.
    fn list_decisions(
        &self,
        query: &DecisionQuery,
        order: SortOrder,
    ) -> Result<Vec<Decision>, StoreError>;

    /// Apply a review patch to the stored decision and return the result.
    /// The read-modify-write is atomic with respect to other updates.
    fn update_review(
        &self,
        id: &DecisionId,
        review: &ReviewUpdate,
    ) -> Result<Decision, StoreError>;

    /// Append a replay record.
    fn insert_replay(&self, replay: &Replay) -> Result<(), StoreError>;

    /// Retrieve a replay by ID.
    fn get_replay(&self, id: &ReplayId) -> Result<Replay, StoreError>;

    /// All replays of one decision in [`replay_order`].
    fn list_replays(&self, decision_id: &DecisionId) -> Result<Vec<Replay>, StoreError>;
}

/// File-system backed ledger store.
pub struct FileLedgerStore {
    root: PathBuf,
}

impl FileLedgerStore {
    /// Create a new store rooted at the given directory.
    /// Creates the directory tree if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join("decisions"))?;
        fs::create_dir_all(root.join("replays"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the newest-decision pointer.
    pub fn head_path(&self) -> PathBuf {
        self.root.join(HEAD_FILE)
    }

    /// Locate a decision file by scanning the date tree.
    pub fn decision_path(&self, id: &DecisionId) -> Result<PathBuf, StoreError> {
        find_file_recursive(&self.root.join("decisions"), &format!("{id}.json"))
            .ok_or_else(|| StoreError::DecisionNotFound(id.clone()))
    }

    fn replay_path(&self, id: &ReplayId) -> Result<PathBuf, StoreError> {
        find_file_recursive(&self.root.join("replays"), &format!("{id}.json"))
            .ok_or_else(|| StoreError::ReplayNotFound(id.clone()))
    }

    /// Take the ledger-wide write lock. Released when the file is dropped.
    fn lock(&self) -> Result<fs::File, StoreError> {
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.root.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    /// Newest decision, via `HEAD` when it points at a record and a full
    /// scan otherwise.
    fn tail(&self) -> Result<Option<Decision>, StoreError> {
        match fs::read_to_string(self.head_path()) {
            Ok(relative) => {
                let path = self.root.join(relative.trim());
                if path.is_file() {
                    return load_decision(&path).map(Some);
                }
                tracing::warn!(head = relative.trim(), "Ledger HEAD is dangling, scanning");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut files = Vec::new();
        json_files(&self.root.join("decisions"), &mut files)?;
        let mut newest: Option<Decision> = None;
        for path in &files {
            let decision = load_decision(path)?;
            if newest
                .as_ref()
                .map_or(true, |n| creation_order(&decision, n) == Ordering::Greater)
            {
                newest = Some(decision);
            }
        }
        Ok(newest)
    }
}

impl LedgerStore for FileLedgerStore {
    fn append_decision(&self, link: LinkFn<'_>) -> Result<Decision, StoreError> {
        let _lock = self.lock()?;

        let tail = self.tail()?;
        let decision = link(tail.as_ref());

        let relative = record_relative("decisions", &decision.created_at, decision.id.as_str());
        let path = self.root.join(&relative);
        let head = self.head_path();

        // HEAD goes first: if the record never lands, HEAD dangles and the
        // next append rescans instead of chaining to a stale tail.
        write_text_replace(&head, &relative.to_string_lossy())?;
        if let Err(e) = write_new(&path, &decision) {
            let _ = fs::remove_file(&head);
            return Err(e);
        }

        tracing::debug!(
            decision_id = %decision.id,
            path = %path.display(),
            "Decision saved"
        );
        Ok(decision)
    }

    fn get_decision(&self, id: &DecisionId) -> Result<Decision, StoreError> {
        let path = self.decision_path(id)?;
        read_json(&path)
    }

    fn last_decision(&self) -> Result<Option<Decision>, StoreError> {
        self.tail()
    }

    fn list_decisions(
        &self,
        query: &DecisionQuery,
        order: SortOrder,
    ) -> Result<Vec<Decision>, StoreError> {
        let mut files = Vec::new();
        json_files(&self.root.join("decisions"), &mut files)?;

        let mut all = Vec::with_capacity(files.len());
        for path in &files {
            let decision = load_decision(path)?;
            if query.matches(&decision) {
                all.push(decision);
            }
        }
        sort_decisions(&mut all, order);
        Ok(all)
    }

    fn update_review(
        &self,
        id: &DecisionId,
        review: &ReviewUpdate,
    ) -> Result<Decision, StoreError> {
        let _lock = self.lock()?;

        let path = self.decision_path(id)?;
        let mut decision: Decision = read_json(&path)?;
        review.apply(&mut decision);
        write_replace(&path, &decision)?;

        tracing::debug!(decision_id = %id, status = %decision.status, "Decision review updated");
        Ok(decision)
    }

    fn insert_replay(&self, replay: &Replay) -> Result<(), StoreError> {
        let path = self
            .root
            .join(record_relative("replays", &replay.created_at, replay.id.as_str()));
        write_new(&path, replay)?;

        tracing::debug!(
            replay_id = %replay.id,
            decision_id = %replay.decision_id,
            path = %path.display(),
            "Replay saved"
        );
        Ok(())
    }

    fn get_replay(&self, id: &ReplayId) -> Result<Replay, StoreError> {
        let path = self.replay_path(id)?;
        read_json(&path)
    }

    fn list_replays(&self, decision_id: &DecisionId) -> Result<Vec<Replay>, StoreError> {
        let mut files = Vec::new();
        json_files(&self.root.join("replays"), &mut files)?;

        let mut all = Vec::new();
        for path in &files {
            let replay: Replay = read_json(path)?;
            if &replay.decision_id == decision_id {
                all.push(replay);
            }
        }
        all.sort_by(replay_order);
        Ok(all)
    }
}

fn record_relative(kind: &str, created_at: &DateTime<Utc>, id: &str) -> PathBuf {
    let date = created_at.format("%Y/%m/%d");
    PathBuf::from(kind).join(format!("{date}/{id}.json"))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Load a decision for listing. A record that no longer parses becomes a
/// placeholder instead of an error, so one damaged file cannot hide the
/// rest of the ledger from verification and reporting.
fn load_decision(path: &Path) -> Result<Decision, StoreError> {
    let text = fs::read_to_string(path)?;
    let doc: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
    match Decision::deserialize(&doc) {
        Ok(decision) => Ok(decision),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Unreadable decision record"
            );
            Ok(placeholder_decision(path, &doc))
        }
    }
}

/// Stand-in for an unreadable record. Its payloads do not decode and its
/// content hash is empty, so the verifier reports it as modified.
fn placeholder_decision(path: &Path, doc: &Value) -> Decision {
    let text = |key: &str| doc.get(key).and_then(Value::as_str).map(str::to_string);

    let id = text("id")
        .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .unwrap_or_default();
    let created_at = text("created_at")
        .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
        .map(|t| t.with_timezone(&Utc))
        .or_else(|| {
            fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from)
        })
        .unwrap_or_default();

    Decision {
        id: DecisionId::from(id.as_str()),
        sequence: doc.get("sequence").and_then(Value::as_u64).unwrap_or(0),
        created_at,
        service_name: text("service_name").unwrap_or_default(),
        decision_type: text("decision_type").unwrap_or_default(),
        input: Payload::from_raw(""),
        model: Payload::from_raw(""),
        output: Payload::from_raw(""),
        prompt: None,
        tool_calls: None,
        metadata: None,
        content_hash: String::new(),
        chain_hash: text("chain_hash").unwrap_or_default(),
        status: DecisionStatus::Recorded,
        incorrect: None,
        correction: None,
    }
}

/// Write a record that must not exist yet.
fn write_new<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(record)?;
    let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(StoreError::Duplicate(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Replace an existing record via write-to-temp then rename.
fn write_replace<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
    write_text_replace(path, &serde_json::to_string_pretty(record)?)
}

fn write_text_replace(path: &Path, contents: &str) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Recursively find a file by name.
fn find_file_recursive(dir: &Path, filename: &str) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }

    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_file_recursive(&path, filename) {
                return Some(found);
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(filename) {
            return Some(path);
        }
    }

    None
}

/// Recursively collect every `.json` file under `dir`.
fn json_files(dir: &Path, results: &mut Vec<PathBuf>) -> Result<(), StoreError> {
    if !dir.is_dir() {
        return Ok(());
    }

    let entries = fs::read_dir(dir)?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            json_files(&path, results)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            results.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedgerStore;
    use loopgrid_core::{ExecutionMode, ExecutionStatus};
    use serde_json::json;

    fn make_decision(sequence: u64, service: &str) -> Decision {
        Decision {
            id: DecisionId::new(),
            sequence,
            created_at: Utc::now(),
            service_name: service.to_string(),
            decision_type: "reply".to_string(),
            input: json!({"message": "hi"}).into(),
            model: json!({"provider": "openai"}).into(),
            output: json!({"response": "hello"}).into(),
            prompt: None,
            tool_calls: None,
            metadata: None,
            content_hash: "c".repeat(64),
            chain_hash: format!("{sequence:064}"),
            status: DecisionStatus::Recorded,
            incorrect: None,
            correction: None,
        }
    }

    fn make_replay(decision_id: &DecisionId) -> Replay {
        Replay {
            id: ReplayId::new(),
            created_at: Utc::now(),
            decision_id: decision_id.clone(),
            overrides: None,
            triggered_by: "test".to_string(),
            replay_output: json!({"response": "hello"}),
            execution_status: ExecutionStatus::Completed,
            execution_mode: ExecutionMode::Simulated,
            execution_latency_ms: 0,
            tokens: 0,
            provider: "simulation".to_string(),
            error: None,
            output_changed: false,
            diff_summary: None,
        }
    }

    fn append(store: &dyn LedgerStore, decision: &Decision) -> Result<Decision, StoreError> {
        store.append_decision(Box::new(|_tail: Option<&Decision>| decision.clone()))
    }

    /// Append a decision whose sequence follows the tail's.
    fn append_next(store: &dyn LedgerStore, service: &str) -> Decision {
        store
            .append_decision(Box::new(|tail: Option<&Decision>| {
                make_decision(tail.map_or(1, |t| t.sequence + 1), service)
            }))
            .unwrap()
    }

    fn flag() -> ReviewUpdate {
        ReviewUpdate {
            status: DecisionStatus::Incorrect,
            incorrect: Some(IncorrectFlag {
                reason: Some("wrong refund policy".to_string()),
                flagged_at: Utc::now(),
            }),
            correction: None,
        }
    }

    fn correct() -> ReviewUpdate {
        ReviewUpdate {
            status: DecisionStatus::Corrected,
            incorrect: None,
            correction: Some(Correction {
                output: json!({"response": "refund issued"}),
                corrected_by: "reviewer@example.com".to_string(),
                corrected_at: Utc::now(),
                notes: None,
            }),
        }
    }

    #[test]
    fn save_and_retrieve() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path()).unwrap();
        let decision = make_decision(1, "support-agent");

        append(&store, &decision).unwrap();
        let retrieved = store.get_decision(&decision.id).unwrap();
        assert_eq!(retrieved, decision);
    }

    #[test]
    fn missing_decision_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path()).unwrap();
        let result = store.get_decision(&DecisionId::from("dec_doesnotexist"));
        assert!(matches!(result, Err(StoreError::DecisionNotFound(_))));
    }

    #[test]
    fn duplicate_insert_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path()).unwrap();
        let decision = make_decision(1, "svc");
        append(&store, &decision).unwrap();
        assert!(matches!(
            append(&store, &decision),
            Err(StoreError::Duplicate(_))
        ));

        // The failed append leaves the tail where it was.
        let next = append_next(&store, "svc");
        assert_eq!(next.sequence, 2);
    }

    #[test]
    fn list_orders_by_creation_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path()).unwrap();

        let t = Utc::now();
        let mut ids = Vec::new();
        for (seq, service) in [(1, "scanner"), (2, "hunter"), (3, "scanner")] {
            let mut d = make_decision(seq, service);
            d.created_at = t;
            ids.push(d.id.clone());
            append(&store, &d).unwrap();
        }

        let asc = store
            .list_decisions(&DecisionQuery::default(), SortOrder::Ascending)
            .unwrap();
        assert_eq!(asc.iter().map(|d| d.id.clone()).collect::<Vec<_>>(), ids);

        let desc = store
            .list_decisions(&DecisionQuery::for_service("scanner"), SortOrder::Descending)
            .unwrap();
        assert_eq!(desc.len(), 2);
        assert_eq!(desc[0].id, ids[2]);
        assert_eq!(desc[1].id, ids[0]);

        let last = store.last_decision().unwrap().unwrap();
        assert_eq!(last.id, ids[2]);
    }

    #[test]
    fn head_tracks_tail_and_recovers_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path()).unwrap();

        let first = append_next(&store, "svc");
        let second = append_next(&store, "svc");
        assert_eq!(second.sequence, 2);

        let head = fs::read_to_string(store.head_path()).unwrap();
        assert!(head.ends_with(&format!("{}.json", second.id)));
        assert!(dir.path().join(head.trim()).is_file());
        assert_ne!(first.id, second.id);
        assert_eq!(store.last_decision().unwrap(), Some(second.clone()));

        // Missing pointer: fall back to a scan.
        fs::remove_file(store.head_path()).unwrap();
        assert_eq!(append_next(&store, "svc").sequence, 3);

        // Dangling pointer: same.
        fs::write(store.head_path(), "decisions/2000/01/01/dec_gone.json").unwrap();
        assert_eq!(append_next(&store, "svc").sequence, 4);
    }

    #[test]
    fn review_update_keeps_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path()).unwrap();
        let decision = make_decision(1, "svc");
        append(&store, &decision).unwrap();

        let updated = store.update_review(&decision.id, &flag()).unwrap();
        assert_eq!(updated.status, DecisionStatus::Incorrect);
        assert_eq!(updated.content_hash, decision.content_hash);
        assert_eq!(updated.chain_hash, decision.chain_hash);
        assert_eq!(updated.output, decision.output);

        let reread = store.get_decision(&decision.id).unwrap();
        assert_eq!(reread, updated);
    }

    #[test]
    fn review_patches_keep_both_channels() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileLedgerStore::new(dir.path()).unwrap();
        let memory = MemoryLedgerStore::new();

        for store in [&file as &dyn LedgerStore, &memory] {
            let decision = append_next(store, "svc");

            store.update_review(&decision.id, &correct()).unwrap();
            let both = store.update_review(&decision.id, &flag()).unwrap();

            assert_eq!(both.status, DecisionStatus::Incorrect);
            assert!(both.incorrect.is_some());
            assert_eq!(
                both.correction.as_ref().map(|c| c.corrected_by.as_str()),
                Some("reviewer@example.com")
            );
        }
    }

    #[test]
    fn malformed_payload_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path()).unwrap();
        let mut decision = make_decision(1, "svc");
        decision.output = Payload::from_raw("{truncated");
        append(&store, &decision).unwrap();

        let loaded = store.get_decision(&decision.id).unwrap();
        assert!(loaded.output.decode().is_err());
    }

    #[test]
    fn unreadable_record_lists_as_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path()).unwrap();
        let good = append_next(&store, "svc");

        let day = dir.path().join("decisions/2024/01/15");
        fs::create_dir_all(&day).unwrap();
        fs::write(
            day.join("dec_badsequence.json"),
            r#"{"id": "dec_badsequence", "sequence": "two", "created_at": "2024-01-15T10:00:00Z"}"#,
        )
        .unwrap();
        fs::write(day.join("dec_notjson.json"), "not json at all").unwrap();

        let all = store
            .list_decisions(&DecisionQuery::default(), SortOrder::Ascending)
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id.as_str(), "dec_badsequence");
        assert!(all.iter().any(|d| d.id == good.id));

        let bad = all
            .iter()
            .find(|d| d.id.as_str() == "dec_badsequence")
            .unwrap();
        assert!(bad.content_hash.is_empty());
        assert!(bad.payloads().is_err());
        assert!(all.iter().any(|d| d.id.as_str() == "dec_notjson"));
    }

    #[test]
    fn replays_listed_per_decision() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path()).unwrap();
        let d1 = DecisionId::new();
        let d2 = DecisionId::new();

        let r1 = make_replay(&d1);
        let r2 = make_replay(&d2);
        let r3 = make_replay(&d1);
        for r in [&r1, &r2, &r3] {
            store.insert_replay(r).unwrap();
        }

        assert_eq!(store.get_replay(&r2.id).unwrap(), r2);
        let for_d1 = store.list_replays(&d1).unwrap();
        assert_eq!(for_d1.len(), 2);
        assert!(for_d1.iter().all(|r| r.decision_id == d1));
        assert!(matches!(
            store.get_replay(&ReplayId::from("rep_missing")),
            Err(StoreError::ReplayNotFound(_))
        ));
    }

    #[test]
    fn replays_with_equal_timestamps_list_in_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileLedgerStore::new(dir.path()).unwrap();
        let memory = MemoryLedgerStore::new();
        let decision_id = DecisionId::new();
        let at = Utc::now();

        let mut replays: Vec<Replay> = ["rep_cccccccccccc", "rep_aaaaaaaaaaaa", "rep_bbbbbbbbbbbb"]
            .into_iter()
            .map(|id| Replay {
                id: ReplayId::from(id),
                created_at: at,
                ..make_replay(&decision_id)
            })
            .collect();

        for store in [&file as &dyn LedgerStore, &memory] {
            for r in &replays {
                store.insert_replay(r).unwrap();
            }
        }
        replays.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));

        for store in [&file as &dyn LedgerStore, &memory] {
            let listed = store.list_replays(&decision_id).unwrap();
            assert_eq!(listed, replays);
            assert_eq!(store.list_replays(&decision_id).unwrap(), listed);
        }
    }
}
