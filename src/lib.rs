//! # Clauselens
//!
//! **A contract analysis backend: chunked LLM extraction, conversational
//! review, and risk assessment.**
//!
//! Clauselens takes a contract document, extracts its text, analyzes it
//! with an LLM completion API in sentence-aligned chunks, merges the
//! per-chunk JSON results into one structured analysis, answers follow-up
//! questions about the contract in a persisted conversation, and derives
//! a cached risk assessment from the finished analysis.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────────┐   ┌────────┐
//! │ Document │──▶│ Chunker │──▶│ LLM Gateway  │──▶│ Merger │──▶ ContractAnalysis
//! │ (extract)│   │         │   │ (per chunk)  │   │        │
//! └──────────┘   └─────────┘   └──────────────┘   └────────┘
//!                                     ▲
//!                     ┌───────────────┴───────────────┐
//!                ┌────┴─────┐                   ┌─────┴────┐
//!                │   Chat   │                   │   Risk   │
//!                │ Manager  │                   │ Assessor │
//!                └────┬─────┘                   └─────┬────┘
//!                     └──────────┐   ┌────────────────┘
//!                                ▼   ▼
//!                             ┌─────────┐
//!                             │  Store  │
//!                             └─────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. [`extract`] converts an uploaded document (`pdf`, `docx`, `txt`)
//!    to plain UTF-8 text, or fails explicitly.
//! 2. The [`chunk`]er splits the text on sentence boundaries under a
//!    `cl100k_base` token budget, reserving room for the wrapping prompt.
//! 3. The [`analyzer`] sends one extraction prompt per chunk through the
//!    [`gateway`] (concurrently, bounded) and hands the raw envelopes to
//!    the [`merge`]r, which folds them in chunk order (sentinel-aware,
//!    first-seen-wins for scalars, deduplicating for lists) and promotes
//!    the result into a typed [`models::ContractAnalysis`].
//! 4. The [`chat`] manager keeps per-contract sessions (source text,
//!    system prompt, bounded-replay history) in the [`store`] and builds
//!    the exact message sequence for each turn.
//! 5. The [`risk`] assessor runs one prompt over the finished analysis,
//!    validates the returned risk list, computes a deterministic summary,
//!    and caches the result per contract id.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration: API, chunking, storage |
//! | [`error`] | Error taxonomy and `Result` alias |
//! | [`models`] | `ContractAnalysis` sections, turns, risks, summaries |
//! | [`extract`] | PDF / DOCX / plain-text extraction |
//! | [`chunk`] | Sentence-boundary token-budgeted chunker |
//! | [`gateway`] | Completion gateway trait, Anthropic impl, mock |
//! | [`merge`] | Order-preserving dedup merge of partial analyses |
//! | [`analyzer`] | Per-chunk orchestration into one typed analysis |
//! | [`chat`] | Per-contract conversation sessions |
//! | [`risk`] | Risk assessment with cached results |
//! | [`store`] | Key/value persistence: memory and file backends |

pub mod analyzer;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod merge;
pub mod models;
pub mod risk;
pub mod store;
