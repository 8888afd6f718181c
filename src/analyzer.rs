//! Contract analysis orchestration.
//!
//! Drives the full extraction flow: chunk the contract text, send one
//! structured-extraction prompt per chunk to the gateway (concurrently,
//! bounded by the configured limit), then fold the raw envelopes back in
//! original chunk order through the merger and promote the result into a
//! typed [`ContractAnalysis`].
//!
//! Failure posture: a single gateway failure aborts the whole run (no
//! retries anywhere); a single chunk whose *output* fails to parse is
//! absorbed by the merger.

use crate::chunk::Chunker;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::gateway::{CompletionRequest, Gateway, Message};
use crate::merge;
use crate::models::ContractAnalysis;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

/// The canonical analysis schema, embedded verbatim into every extraction
/// prompt. Versioned externally; the core never validates the artifact
/// itself, only the model's conformance to it after the fact.
pub const ANALYSIS_SCHEMA: &str = include_str!("../schema/analysis_schema.json");

/// Tokens requested for each per-chunk completion.
const CHUNK_COMPLETION_TOKENS: u32 = 4096;

pub struct ContractAnalyzer {
    gateway: Arc<dyn Gateway>,
    chunker: Chunker,
    chunk_max_tokens: usize,
    max_concurrency: usize,
}

impl ContractAnalyzer {
    pub fn new(gateway: Arc<dyn Gateway>, config: &Config) -> Result<Self> {
        Ok(Self {
            gateway,
            chunker: Chunker::new(config.chunking.prompt_reserve)?,
            chunk_max_tokens: config.chunking.max_tokens,
            max_concurrency: config.api.max_concurrency,
        })
    }

    /// Analyze a full contract text into a typed [`ContractAnalysis`].
    pub async fn analyze(&self, text: &str) -> Result<ContractAnalysis> {
        let chunks = self.chunker.chunk(text, self.chunk_max_tokens);
        if chunks.is_empty() {
            return Err(Error::Validation("contract text is empty".to_string()));
        }
        info!(chunks = chunks.len(), "starting contract analysis");

        let total = chunks.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks: JoinSet<(usize, Result<Value>)> = JoinSet::new();

        for (index, chunk) in chunks.into_iter().enumerate() {
            let request = CompletionRequest {
                system: None,
                messages: vec![Message::user(build_chunk_prompt(&chunk, index, total))],
                max_tokens: CHUNK_COMPLETION_TOKENS,
                temperature: Some(0.0),
            };
            let gateway = Arc::clone(&self.gateway);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // The semaphore is never closed, but an acquire failure
                // must surface rather than run the call unbounded.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (index, Err(Error::Internal(e.to_string()))),
                };
                (index, gateway.complete(&request).await)
            });
        }

        // Dispatch order does not matter, but the merge must fold envelopes
        // in original chunk order regardless of completion order.
        let mut envelopes: Vec<Option<Value>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = joined.map_err(|e| Error::Internal(e.to_string()))?;
            let envelope = outcome?;
            info!(chunk = index + 1, total, "completed chunk analysis");
            envelopes[index] = Some(envelope);
        }

        let ordered: Vec<Value> = envelopes
            .into_iter()
            .map(|slot| slot.ok_or_else(|| Error::Internal("missing chunk result".to_string())))
            .collect::<Result<_>>()?;

        let merged = merge::merge_partials(&ordered)?;
        let analysis = merge::promote(merged)?;
        info!("completed contract analysis");
        Ok(analysis)
    }
}

/// Build the structured-extraction prompt for one chunk.
fn build_chunk_prompt(chunk: &str, index: usize, total: usize) -> String {
    format!(
        "You are analyzing part {part} of {total} of a contract.\n\
         Please analyze this section according to the following structure and output in JSON format only.\n\
         Do not include any other text or explanation - just the JSON object.\n\n\
         Contract text:\n{chunk}\n\n\
         Important:\n\
         1. If this chunk doesn't contain information for certain categories, mark them as \"{sentinel}\".\n\
         2. All numeric values should be returned as numbers, not strings.\n\
         3. Return your analysis as a valid JSON object.\n\
         4. For dates, use ISO 8601 format (YYYY-MM-DD).\n\
         5. For percentages, use decimal values (e.g., 0.20 instead of 20%).\n\
         6. For monetary values, return the number without currency symbols.\n\n\
         Expected JSON structure:\n{schema}",
        part = index + 1,
        total = total,
        chunk = chunk,
        sentinel = merge::NOT_FOUND_SENTINEL,
        schema = ANALYSIS_SCHEMA,
    )
}
