//! LoopGrid Ledger: tamper-evident record of AI decisions.
//!
//! Every decision is content-hashed over its canonical JSON encoding and
//! chained to its predecessor, so editing, deleting, or reordering a stored
//! record is detected by [`verify_chain`]. Review state (incorrect flags and
//! human corrections) lives outside the hashed content.

pub mod draft;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod memory;
pub mod report;
pub mod store;
pub mod verify;
pub mod view;

pub use draft::DecisionDraft;
pub use error::{LedgerError, Result};
pub use hash::{canonical_json, compute_chain_hash, compute_content_hash, DecisionContent, GENESIS};
pub use ledger::{Ledger, Page, PageRequest};
pub use memory::MemoryLedgerStore;
pub use report::{ComplianceReport, ComplianceReporter, ComplianceStats, ExportFormat};
pub use store::{
    DecisionQuery, FileLedgerStore, LedgerStore, LinkFn, ReviewUpdate, SortOrder, StoreError,
};
pub use verify::{verify_chain, VerificationResult};
pub use view::{DecisionView, ReplayView};
