//! Compliance reporting over the ledger.
//!
//! Maps ledger statistics and chain verification onto EU AI Act Articles 12
//! (record-keeping), 14 (human oversight) and 9 (risk management), and
//! exports decisions for auditors as JSON or CSV.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use loopgrid_core::{Decision, DecisionStatus};
use serde::Serialize;

use crate::error::{LedgerError, Result};
use crate::ledger::Ledger;
use crate::store::{DecisionQuery, SortOrder};
use crate::verify::VerificationResult;
use crate::view::DecisionView;

pub const EXPORT_LIMIT: usize = 1000;

const CSV_HEADER: [&str; 6] = [
    "decision_id",
    "created_at",
    "service_name",
    "decision_type",
    "status",
    "content_hash",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComplianceStats {
    pub total: usize,
    pub recorded: usize,
    pub incorrect: usize,
    pub corrected: usize,
    /// Percent corrected, one decimal.
    pub correction_rate: f64,
    /// Percent incorrect or corrected, one decimal.
    pub error_rate: f64,
    pub unique_models: usize,
    pub unique_services: usize,
    pub unique_decision_types: usize,
    pub first_decision: Option<DateTime<Utc>>,
    pub last_decision: Option<DateTime<Utc>>,
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / total as f64).round() / 10.0
}

impl ComplianceStats {
    /// Aggregate over decisions sorted ascending by creation order.
    pub fn from_decisions(decisions: &[Decision]) -> Self {
        let count = |status: DecisionStatus| decisions.iter().filter(|d| d.status == status).count();
        let total = decisions.len();
        let incorrect = count(DecisionStatus::Incorrect);
        let corrected = count(DecisionStatus::Corrected);

        let models: HashSet<&str> = decisions.iter().map(|d| d.model.raw()).collect();
        let services: HashSet<&str> = decisions.iter().map(|d| d.service_name.as_str()).collect();
        let types: HashSet<&str> = decisions.iter().map(|d| d.decision_type.as_str()).collect();

        Self {
            total,
            recorded: count(DecisionStatus::Recorded),
            incorrect,
            corrected,
            correction_rate: percent(corrected, total),
            error_rate: percent(incorrect + corrected, total),
            unique_models: models.len(),
            unique_services: services.len(),
            unique_decision_types: types.len(),
            first_decision: decisions.first().map(|d| d.created_at),
            last_decision: decisions.last().map(|d| d.created_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    Partial,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordKeepingEvidence {
    pub total_decisions_logged: usize,
    pub immutable_hash_chain: bool,
    pub chain_length: usize,
    pub logging_period_start: Option<DateTime<Utc>>,
    pub logging_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HumanOversightEvidence {
    pub human_corrections: usize,
    pub flagged_for_review: usize,
    pub correction_rate: f64,
    pub human_in_the_loop: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskManagementEvidence {
    pub error_rate_tracked: bool,
    pub error_rate_percent: f64,
    pub replay_capability: bool,
    pub systematic_improvement: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleAssessment<E> {
    pub status: ComplianceStatus,
    pub description: &'static str,
    pub evidence: E,
}

#[derive(Debug, Clone, Serialize)]
pub struct EuAiActMapping {
    pub article_12_record_keeping: ArticleAssessment<RecordKeepingEvidence>,
    pub article_14_human_oversight: ArticleAssessment<HumanOversightEvidence>,
    pub article_9_risk_management: ArticleAssessment<RiskManagementEvidence>,
}

impl EuAiActMapping {
    pub fn assess(stats: &ComplianceStats, integrity: &VerificationResult) -> Self {
        let record_keeping = if stats.total > 0 && integrity.valid {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::NonCompliant
        };
        let oversight = if stats.corrected > 0 || stats.incorrect > 0 {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::Partial
        };

        Self {
            article_12_record_keeping: ArticleAssessment {
                status: record_keeping,
                description: "Automatic logging of AI system events throughout lifecycle",
                evidence: RecordKeepingEvidence {
                    total_decisions_logged: stats.total,
                    immutable_hash_chain: integrity.valid,
                    chain_length: integrity.total,
                    logging_period_start: stats.first_decision,
                    logging_period_end: stats.last_decision,
                },
            },
            article_14_human_oversight: ArticleAssessment {
                status: oversight,
                description: "Human oversight measures for AI system operation",
                evidence: HumanOversightEvidence {
                    human_corrections: stats.corrected,
                    flagged_for_review: stats.incorrect,
                    correction_rate: stats.correction_rate,
                    human_in_the_loop: true,
                },
            },
            article_9_risk_management: ArticleAssessment {
                status: ComplianceStatus::Partial,
                description: "Risk management system for AI lifecycle",
                evidence: RiskManagementEvidence {
                    error_rate_tracked: true,
                    error_rate_percent: stats.error_rate,
                    replay_capability: true,
                    systematic_improvement: stats.corrected > 0,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub report_type: &'static str,
    pub generated_at: DateTime<Utc>,
    pub generator: String,
    pub service_filter: Option<String>,
    pub summary: ComplianceStats,
    pub ledger_integrity: VerificationResult,
    pub eu_ai_act_mapping: EuAiActMapping,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(LedgerError::Validation(format!(
                "unsupported export format '{other}', expected json or csv"
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Csv => "csv",
        })
    }
}

#[derive(Debug, Serialize)]
struct JsonExport {
    decisions: Vec<DecisionView>,
    total: usize,
}

/// Quote a CSV field when it holds a delimiter, quote, or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    let mut row = fields.into_iter().map(csv_field).collect::<Vec<_>>().join(",");
    row.push_str("\r\n");
    row
}

/// Read-only compliance views of a [`Ledger`].
pub struct ComplianceReporter<'a> {
    ledger: &'a Ledger,
}

impl<'a> ComplianceReporter<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    fn scoped(service_name: Option<&str>) -> DecisionQuery {
        service_name
            .map(DecisionQuery::for_service)
            .unwrap_or_default()
    }

    pub fn stats(&self, service_name: Option<&str>) -> Result<ComplianceStats> {
        let decisions = self
            .ledger
            .store()
            .list_decisions(&Self::scoped(service_name), SortOrder::Ascending)?;
        Ok(ComplianceStats::from_decisions(&decisions))
    }

    pub fn report(&self, service_name: Option<&str>) -> Result<ComplianceReport> {
        let summary = self.stats(service_name)?;
        let ledger_integrity = self.ledger.verify(service_name)?;
        let eu_ai_act_mapping = EuAiActMapping::assess(&summary, &ledger_integrity);

        tracing::info!(
            service = ?service_name,
            total = summary.total,
            integrity = ledger_integrity.valid,
            "Compliance report generated"
        );

        Ok(ComplianceReport {
            report_type: "EU AI Act Compliance Assessment",
            generated_at: Utc::now(),
            generator: format!("LoopGrid v{}", env!("CARGO_PKG_VERSION")),
            service_filter: service_name.map(str::to_string),
            summary,
            ledger_integrity,
            eu_ai_act_mapping,
        })
    }

    /// Up to [`EXPORT_LIMIT`] matching decisions, newest first.
    pub fn export(&self, query: &DecisionQuery, format: ExportFormat) -> Result<String> {
        let mut decisions = self
            .ledger
            .store()
            .list_decisions(query, SortOrder::Descending)?;
        decisions.truncate(EXPORT_LIMIT);

        tracing::debug!(count = decisions.len(), %format, "Exporting decisions");

        match format {
            ExportFormat::Json => {
                let export = JsonExport {
                    total: decisions.len(),
                    decisions: decisions.iter().map(DecisionView::from).collect(),
                };
                Ok(serde_json::to_string_pretty(&export).map_err(loopgrid_core::CoreError::from)?)
            }
            ExportFormat::Csv => {
                let mut out = csv_row(CSV_HEADER);
                for d in &decisions {
                    let created_at = d.created_at.to_rfc3339_opts(SecondsFormat::Micros, true);
                    out.push_str(&csv_row([
                        d.id.as_str(),
                        created_at.as_str(),
                        d.service_name.as_str(),
                        d.decision_type.as_str(),
                        d.status.as_str(),
                        d.content_hash.as_str(),
                    ]));
                }
                Ok(out)
            }
        }
    }
}
