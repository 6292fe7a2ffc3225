//! CLI entry point for the LoopGrid decision ledger.
//!
//! Request bodies are read as JSON from stdin, results are written as JSON
//! (or CSV for `export --format csv`) to stdout, and logs go to stderr.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

use loopgrid_core::{DecisionId, DecisionStatus, LoopgridConfig, ReplayId};
use loopgrid_ledger::{
    ComplianceReporter, DecisionDraft, DecisionQuery, DecisionView, ExportFormat, FileLedgerStore,
    Ledger, PageRequest, ReplayView,
};
use loopgrid_replay::{BackendRegistry, ReplayEngine, ReplayExecutor};

#[derive(Parser, Debug)]
#[command(name = "loopgrid")]
#[command(about = "Tamper-evident ledger and replay engine for AI decisions")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: loopgrid).
    #[arg(short, long, default_value = "loopgrid", global = true)]
    config: String,

    /// Override the ledger data directory.
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append a decision (reads JSON from stdin).
    Record,
    /// Show one decision.
    Get { decision_id: String },
    /// List decisions, newest first.
    List {
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        decision_type: Option<String>,
        #[arg(long)]
        status: Option<DecisionStatus>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = loopgrid_ledger::ledger::DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
    /// Flag a decision as incorrect.
    Flag {
        decision_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Attach a human correction (reads the corrected output JSON from stdin).
    Correct {
        decision_id: String,
        #[arg(long)]
        corrected_by: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Verify ledger integrity.
    Verify {
        #[arg(long)]
        service: Option<String>,
    },
    /// Replay a decision, optionally with overrides.
    Replay {
        decision_id: String,
        /// Overrides as a JSON object, e.g. '{"prompt":{"template":"support_v2"}}'.
        #[arg(long)]
        overrides: Option<String>,
        #[arg(long)]
        triggered_by: Option<String>,
    },
    /// Show one replay.
    ReplayGet { replay_id: String },
    /// List the replays of a decision.
    Replays { decision_id: String },
    /// Compare a decision's output with one of its replays.
    Compare { decision_id: String, replay_id: String },
    /// EU AI Act compliance report.
    Report {
        #[arg(long)]
        service: Option<String>,
    },
    /// Export decisions for auditors.
    Export {
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        status: Option<DecisionStatus>,
        #[arg(long, default_value = "json")]
        format: ExportFormat,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if cli.log_json {
        fmt().with_env_filter(filter).json().with_writer(std::io::stderr).init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    let mut config = LoopgridConfig::load(&cli.config)?;
    if let Some(dir) = &cli.data_dir {
        config.ledger.data_dir = dir.clone();
    }
    tracing::debug!(command = ?cli.command, data_dir = %config.ledger.data_dir, "Running command");

    let output = run(&cli.command, &config, std::io::stdin()).await?;
    println!("{output}");
    Ok(())
}

fn open_ledger(config: &LoopgridConfig) -> anyhow::Result<Arc<Ledger>> {
    let store = FileLedgerStore::new(&config.ledger.data_dir)
        .with_context(|| format!("opening ledger at {}", config.ledger.data_dir))?;
    Ok(Arc::new(Ledger::new(
        Arc::new(store),
        config.ledger.hash_algorithm,
    )))
}

fn replay_engine(config: &LoopgridConfig, ledger: Arc<Ledger>) -> anyhow::Result<ReplayEngine> {
    let registry = BackendRegistry::from_config(&config.replay)?;
    let executor = ReplayExecutor::new(
        registry,
        Duration::from_secs(config.replay.timeout_secs),
    );
    Ok(ReplayEngine::new(ledger, executor))
}

fn read_json(mut stdin: impl Read) -> anyhow::Result<Value> {
    let mut input = String::new();
    stdin.read_to_string(&mut input)?;
    serde_json::from_str(&input).context("stdin is not valid JSON")
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Execute one command and render its stdout payload.
async fn run(command: &Command, config: &LoopgridConfig, stdin: impl Read) -> anyhow::Result<String> {
    let ledger = open_ledger(config)?;

    match command {
        Command::Record => {
            let draft: DecisionDraft = serde_json::from_value(read_json(stdin)?)
                .context("invalid decision body")?;
            let decision = ledger.record(draft)?;
            to_json(&DecisionView::from(&decision))
        }
        Command::Get { decision_id } => {
            let decision = ledger.get(&DecisionId::from(decision_id.as_str()))?;
            to_json(&DecisionView::from(&decision))
        }
        Command::List {
            service,
            decision_type,
            status,
            page,
            page_size,
        } => {
            let query = DecisionQuery {
                service_name: service.clone(),
                decision_type: decision_type.clone(),
                status: *status,
            };
            let page = ledger.list(
                &query,
                PageRequest {
                    page: *page,
                    page_size: *page_size,
                },
            )?;
            to_json(&page.map(|d| DecisionView::from(&d)))
        }
        Command::Flag {
            decision_id,
            reason,
        } => {
            let decision =
                ledger.mark_incorrect(&DecisionId::from(decision_id.as_str()), reason.clone())?;
            to_json(&DecisionView::from(&decision))
        }
        Command::Correct {
            decision_id,
            corrected_by,
            notes,
        } => {
            let output = read_json(stdin)?;
            let decision = ledger.attach_correction(
                &DecisionId::from(decision_id.as_str()),
                output,
                corrected_by,
                notes.clone(),
            )?;
            to_json(&DecisionView::from(&decision))
        }
        Command::Verify { service } => to_json(&ledger.verify(service.as_deref())?),
        Command::Replay {
            decision_id,
            overrides,
            triggered_by,
        } => {
            let overrides = overrides
                .as_deref()
                .map(serde_json::from_str::<Value>)
                .transpose()
                .context("--overrides is not valid JSON")?;
            let engine = replay_engine(config, ledger)?;
            let replay = engine
                .create_replay(
                    &DecisionId::from(decision_id.as_str()),
                    overrides,
                    triggered_by.as_deref(),
                )
                .await?;
            to_json(&ReplayView::from(&replay))
        }
        Command::ReplayGet { replay_id } => {
            let replay = ledger.get_replay(&ReplayId::from(replay_id.as_str()))?;
            to_json(&ReplayView::from(&replay))
        }
        Command::Replays { decision_id } => {
            let replays = ledger.list_replays(&DecisionId::from(decision_id.as_str()))?;
            to_json(&replays.iter().map(ReplayView::from).collect::<Vec<_>>())
        }
        Command::Compare {
            decision_id,
            replay_id,
        } => {
            let engine = replay_engine(config, ledger)?;
            let report = engine.compare(
                &DecisionId::from(decision_id.as_str()),
                &ReplayId::from(replay_id.as_str()),
            )?;
            to_json(&report)
        }
        Command::Report { service } => {
            to_json(&ComplianceReporter::new(&ledger).report(service.as_deref())?)
        }
        Command::Export {
            service,
            status,
            format,
        } => {
            let query = DecisionQuery {
                service_name: service.clone(),
                decision_type: None,
                status: *status,
            };
            Ok(ComplianceReporter::new(&ledger).export(&query, *format)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> LoopgridConfig {
        let mut config = LoopgridConfig::default();
        config.ledger.data_dir = dir.to_string_lossy().into_owned();
        config
    }

    const BODY: &str = r#"{
        "service_name": "support-agent",
        "decision_type": "customer_support_reply",
        "input": {"message": "I was charged twice"},
        "model": {"provider": "openai", "name": "gpt-4"},
        "prompt": {"template": "support_v1"},
        "output": {"response": "Your account looks fine."}
    }"#;

    async fn exec(config: &LoopgridConfig, args: &[&str], stdin: &str) -> Value {
        let cli = Cli::try_parse_from(std::iter::once("loopgrid").chain(args.iter().copied()))
            .unwrap();
        let out = run(&cli.command, config, stdin.as_bytes()).await.unwrap();
        serde_json::from_str(&out).unwrap()
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "loopgrid",
            "verify",
            "--service",
            "support-agent",
            "--data-dir",
            "/tmp/lg",
            "--log-json",
        ])
        .unwrap();
        assert_eq!(cli.data_dir.as_deref(), Some("/tmp/lg"));
        assert!(cli.log_json);
        assert_eq!(cli.config, "loopgrid");
        assert!(matches!(cli.command, Command::Verify { service: Some(ref s) } if s == "support-agent"));
    }

    #[test]
    fn rejects_unknown_export_format() {
        assert!(Cli::try_parse_from(["loopgrid", "export", "--format", "xml"]).is_err());
        assert!(Cli::try_parse_from(["loopgrid", "list", "--status", "corrected"]).is_ok());
    }

    #[tokio::test]
    async fn record_flag_correct_verify() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let recorded = exec(&config, &["record"], BODY).await;
        let id = recorded["decision_id"].as_str().unwrap().to_string();
        assert_eq!(recorded["status"], "recorded");

        let flagged = exec(&config, &["flag", &id, "--reason", "missed refund"], "").await;
        assert_eq!(flagged["status"], "incorrect");
        assert_eq!(flagged["incorrect_reason"], "missed refund");

        let corrected = exec(
            &config,
            &["correct", &id, "--corrected-by", "ops@example.com"],
            r#"{"response": "Refund issued."}"#,
        )
        .await;
        assert_eq!(corrected["status"], "corrected");
        assert_eq!(corrected["correction"]["corrected_by"], "ops@example.com");

        let verified = exec(&config, &["verify"], "").await;
        assert_eq!(verified["valid"], true);
        assert_eq!(verified["total"], 1);

        let listed = exec(&config, &["list", "--status", "corrected"], "").await;
        assert_eq!(listed["total"], 1);
    }

    #[tokio::test]
    async fn simulated_replay_and_compare() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let recorded = exec(&config, &["record"], BODY).await;
        let id = recorded["decision_id"].as_str().unwrap().to_string();

        let replay = exec(
            &config,
            &["replay", &id, "--overrides", r#"{"prompt":{"template":"support_v2"}}"#],
            "",
        )
        .await;
        assert_eq!(replay["execution_mode"], "simulated");
        assert_eq!(replay["output_changed"], true);
        assert_eq!(replay["triggered_by"], "system");
        let replay_id = replay["replay_id"].as_str().unwrap().to_string();

        let compared = exec(&config, &["compare", &id, &replay_id], "").await;
        assert_eq!(compared["output_changed"], true);

        let replays = exec(&config, &["replays", &id], "").await;
        assert_eq!(replays.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn csv_export_is_raw_text() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        exec(&config, &["record"], BODY).await;

        let cli = Cli::try_parse_from(["loopgrid", "export", "--format", "csv"]).unwrap();
        let out = run(&cli.command, &config, "".as_bytes()).await.unwrap();
        assert!(out.starts_with("decision_id,created_at,service_name"));
    }

    #[tokio::test]
    async fn invalid_body_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let cli = Cli::try_parse_from(["loopgrid", "record"]).unwrap();
        assert!(run(&cli.command, &config, "not json".as_bytes()).await.is_err());
        assert!(run(&cli.command, &config, r#"{"service_name": "x"}"#.as_bytes())
            .await
            .is_err());
    }
}
