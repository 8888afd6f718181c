//! # Clauselens CLI (`clause`)
//!
//! The `clause` binary is the boundary layer in front of the analysis
//! core. It provides commands for analyzing a contract document, asking
//! follow-up questions about it, and assessing its risks.
//!
//! ## Usage
//!
//! ```bash
//! clause --config ./config/clause.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `clause analyze <file>` | Extract, chunk, analyze, and persist a contract |
//! | `clause chat <contract-id> <message>` | Ask a question about an analyzed contract |
//! | `clause risks <contract-id>` | Assess (or return cached) risks for a contract |
//!
//! `analyze` prints the contract id derived from the document text; the
//! other commands take that id. Requires `ANTHROPIC_API_KEY` in the
//! environment.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use clauselens::analyzer::ContractAnalyzer;
use clauselens::chat::ChatManager;
use clauselens::config;
use clauselens::extract;
use clauselens::gateway::{AnthropicGateway, Gateway};
use clauselens::models::StoredAnalysis;
use clauselens::risk::RiskAssessor;
use clauselens::store::{FileStore, Store};

/// Clauselens: contract analysis, conversational review, and risk
/// assessment backed by an LLM completion API.
#[derive(Parser)]
#[command(
    name = "clause",
    about = "Clauselens: contract analysis, chat, and risk assessment",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Falls back to built-in defaults when the file does not exist.
    #[arg(long, global = true, default_value = "./config/clause.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Analyze a contract document.
    ///
    /// Extracts text from the file (pdf, docx, or txt), runs the chunked
    /// LLM analysis, and persists the merged result keyed by a contract
    /// id derived from the document text.
    Analyze {
        /// Path to the contract document.
        file: PathBuf,
    },

    /// Ask a question about a previously analyzed contract.
    ///
    /// Reuses the stored contract text; conversation history is persisted
    /// across invocations.
    Chat {
        /// Contract id printed by `analyze`.
        contract_id: String,

        /// The question to ask.
        message: String,
    },

    /// Assess risks for a previously analyzed contract.
    ///
    /// Returns the cached assessment when one exists; otherwise runs a
    /// fresh assessment and caches it.
    Risks {
        /// Contract id printed by `analyze`.
        contract_id: String,

        /// Ignore the cache and run a fresh assessment.
        #[arg(long)]
        fresh: bool,
    },
}

fn analysis_key(contract_id: &str) -> String {
    format!("analyses/{contract_id}")
}

/// Deterministic contract id: leading hex of the text's SHA-256.
fn contract_id_for(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clauselens=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_or_default(&cli.config)?;

    let gateway: Arc<dyn Gateway> = Arc::new(AnthropicGateway::new(&config.api)?);
    let store: Arc<dyn Store> = Arc::new(FileStore::new(config.storage.dir.clone()));

    match cli.command {
        Commands::Analyze { file } => {
            if !extract::allowed_file(&file) {
                bail!(
                    "unsupported file type: {} (allowed: {})",
                    file.display(),
                    extract::ALLOWED_EXTENSIONS.join(", ")
                );
            }
            let text = extract::extract_text(&file)?;
            let contract_id = contract_id_for(&text);

            let analyzer = ContractAnalyzer::new(Arc::clone(&gateway), &config)?;
            let analysis = analyzer.analyze(&text).await?;

            let stored = StoredAnalysis {
                contract_id: contract_id.clone(),
                filename: file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned()),
                text,
                analysis,
                analyzed_at: chrono::Utc::now().to_rfc3339(),
            };
            store
                .put(
                    &analysis_key(&contract_id),
                    &serde_json::to_string_pretty(&stored)?,
                )
                .await?;

            println!("analyze {}", file.display());
            println!("  contract id: {contract_id}");
            println!(
                "  classification: {}",
                stored
                    .analysis
                    .classification
                    .kind
                    .as_deref()
                    .unwrap_or("unknown")
            );
            println!("ok");
        }

        Commands::Chat {
            contract_id,
            message,
        } => {
            let stored = load_analysis(store.as_ref(), &contract_id).await?;
            let manager = ChatManager::new(Arc::clone(&gateway), Arc::clone(&store));
            let (reply, history) = manager
                .respond(&contract_id, &message, Some(&stored.text))
                .await?;
            println!("{}", reply.content);
            println!();
            println!("({} turns in history)", history.len());
        }

        Commands::Risks { contract_id, fresh } => {
            let assessor = RiskAssessor::new(Arc::clone(&gateway), Arc::clone(&store));

            let result = match (fresh, assessor.get_cached(&contract_id).await?) {
                (false, Some(cached)) => {
                    println!("risks {contract_id} (cached)");
                    cached
                }
                _ => {
                    let stored = load_analysis(store.as_ref(), &contract_id).await?;
                    println!("risks {contract_id}");
                    assessor.assess(&contract_id, &stored.analysis).await?
                }
            };

            let s = &result.summary;
            println!("  total: {}", s.total_risks);
            println!(
                "  severity: {} high / {} medium / {} low",
                s.high_priority_count, s.medium_priority_count, s.low_priority_count
            );
            for group in &s.risks_by_category {
                println!("  {:?}:", group.category);
                for risk in &group.risks {
                    println!("    [{:?}] {}", risk.severity, risk.title);
                    if let Some(rec) = &risk.recommendation {
                        println!("      recommendation: {rec}");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn load_analysis(store: &dyn Store, contract_id: &str) -> Result<StoredAnalysis> {
    let raw = store
        .get(&analysis_key(contract_id))
        .await?
        .with_context(|| format!("no analysis found for contract {contract_id}; run `clause analyze` first"))?;
    Ok(serde_json::from_str(&raw)?)
}
