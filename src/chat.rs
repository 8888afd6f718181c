//! Conversational review of an analyzed contract.
//!
//! The [`ChatManager`] owns per-contract session state: the full source
//! text (loaded once, never re-supplied by callers), a fixed system
//! prompt, and the rolling message history. For every turn it assembles
//! the exact outgoing message sequence:
//!
//! - first turn only: a synthetic user message carrying the full contract
//!   text plus a synthetic assistant acknowledgment, so the model's
//!   grounding is established before the real question;
//! - at most the last [`HISTORY_REPLAY_LIMIT`] prior turns (older turns
//!   stay in the persisted history for audit and display, but are not
//!   resent);
//! - the current user message, always last.
//!
//! Turns for the same contract id are serialized through a per-id lock;
//! turns for different contract ids proceed concurrently. The full
//! updated history is persisted through the [`Store`] after every
//! successful turn.

use crate::error::{Error, Result};
use crate::gateway::{assistant_text, CompletionRequest, Gateway, Message};
use crate::models::ChatTurn;
use crate::store::Store;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Prior turns replayed into each outgoing message sequence.
pub const HISTORY_REPLAY_LIMIT: usize = 3;

/// Fixed instructions for the contract-analyst persona.
pub const SYSTEM_PROMPT: &str = "\
You are an expert contract analyst assistant. You have been provided with a contract to analyze.
When responding to questions:
1. Always refer to specific sections of the contract when relevant
2. Quote the exact text when making important points
3. Be clear about what the contract explicitly states vs what is implied
4. If something is not addressed in the contract, say so explicitly
5. Provide balanced analysis considering both parties' perspectives
6. Use clear, professional language
7. Focus on accuracy and precision in your interpretations";

const CHAT_COMPLETION_TOKENS: u32 = 1000;
const CHAT_TEMPERATURE: f32 = 0.7;

/// Persisted per-contract conversational state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub source_text: String,
    pub system_prompt: String,
    pub history: Vec<ChatTurn>,
}

impl Session {
    fn new(source_text: &str) -> Self {
        Self {
            source_text: source_text.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            history: Vec::new(),
        }
    }
}

pub struct ChatManager {
    gateway: Arc<dyn Gateway>,
    store: Arc<dyn Store>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

fn session_key(contract_id: &str) -> String {
    format!("sessions/{contract_id}")
}

fn audit_key(contract_id: &str) -> String {
    format!("audit/{contract_id}")
}

impl ChatManager {
    pub fn new(gateway: Arc<dyn Gateway>, store: Arc<dyn Store>) -> Self {
        Self {
            gateway,
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, contract_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(contract_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Process one conversational turn for `contract_id`.
    ///
    /// `source_text` is required only when no session exists yet; once a
    /// session is established the stored text is reused and the argument
    /// is ignored, so a caller never re-pays for extraction.
    ///
    /// Returns the assistant's reply turn together with the full updated
    /// history.
    pub async fn respond(
        &self,
        contract_id: &str,
        message: &str,
        source_text: Option<&str>,
    ) -> Result<(ChatTurn, Vec<ChatTurn>)> {
        let lock = self.lock_for(contract_id).await;
        let _guard = lock.lock().await;

        let mut session = match self.store.get(&session_key(contract_id)).await? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => {
                let text = source_text.ok_or_else(|| {
                    Error::Validation(format!(
                        "no session for contract {contract_id} and no source text supplied"
                    ))
                })?;
                info!(contract = contract_id, "creating new chat session");
                Session::new(text)
            }
        };

        let messages = build_outgoing(&session, message);

        let request = CompletionRequest {
            system: Some(session.system_prompt.clone()),
            messages,
            max_tokens: CHAT_COMPLETION_TOKENS,
            temperature: Some(CHAT_TEMPERATURE),
        };
        let envelope = self.gateway.complete(&request).await?;
        let reply_text = assistant_text(&envelope)?.to_string();

        let user_turn = new_turn("user", message);
        let assistant_turn = new_turn("assistant", &reply_text);
        session.history.push(user_turn.clone());
        session.history.push(assistant_turn.clone());

        self.store
            .put(&session_key(contract_id), &serde_json::to_string(&session)?)
            .await?;
        self.store
            .append(&audit_key(contract_id), &serde_json::to_string(&user_turn)?)
            .await?;
        self.store
            .append(
                &audit_key(contract_id),
                &serde_json::to_string(&assistant_turn)?,
            )
            .await?;

        Ok((assistant_turn, session.history))
    }
}

fn new_turn(role: &str, content: &str) -> ChatTurn {
    ChatTurn {
        id: Uuid::new_v4().to_string(),
        role: role.to_string(),
        content: content.to_string(),
        timestamp: Utc::now().to_rfc3339(),
    }
}

/// Assemble the outgoing message sequence for one turn.
fn build_outgoing(session: &Session, message: &str) -> Vec<Message> {
    let mut messages = Vec::new();

    if session.history.is_empty() {
        messages.push(Message::user(format!(
            "Here is the contract to analyze:\n\n{}\n\n\
             Please acknowledge that you've received the contract.",
            session.source_text
        )));
        messages.push(Message::assistant(
            "I have received the contract and am ready to help analyze it. \
             What would you like to know about the contract?",
        ));
    }

    let replay_from = session.history.len().saturating_sub(HISTORY_REPLAY_LIMIT);
    for turn in &session.history[replay_from..] {
        let msg = match turn.role.as_str() {
            "assistant" => Message::assistant(turn.content.clone()),
            _ => Message::user(turn.content.clone()),
        };
        messages.push(msg);
    }

    messages.push(Message::user(message));
    messages
}
