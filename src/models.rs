//! Core data models used throughout clauselens.
//!
//! These types represent the structured contract analysis, conversation
//! turns, and risk assessment results that flow through the pipeline.
//! Wire names are camelCase to match the analysis schema artifact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Immutable result of one full contract analysis run.
///
/// Every section key defined in the canonical schema is present, even when
/// its value defaulted to an empty placeholder; partial per-chunk absence
/// never produces a missing top-level section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContractAnalysis {
    pub metadata: Map<String, Value>,
    pub classification: Classification,
    pub compensation: CompensationTerms,
    pub termination: TerminationTerms,
    pub intellectual_property: IntellectualPropertyTerms,
    pub restrictive_covenants: RestrictiveCovenants,
    pub confidentiality: ConfidentialityTerms,
    pub liability: LiabilityTerms,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Classification {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub primary_characteristics: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompensationTerms {
    pub base_compensation: CompensationDetails,
    pub commission: CommissionStructure,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompensationDetails {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub frequency: Option<String>,
    pub is_guaranteed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommissionStructure {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub base_rate: f64,
    pub tiers: Vec<Value>,
    pub caps: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerminationTerms {
    pub notice_period: Map<String, Value>,
    pub immediate_termination_clauses: Vec<String>,
    pub post_termination_obligations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntellectualPropertyTerms {
    pub ownership: Map<String, Value>,
    pub moral_rights: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestrictiveCovenants {
    pub non_compete: Map<String, Value>,
    pub non_solicitation: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfidentialityTerms {
    pub scope: Vec<String>,
    pub duration: Map<String, Value>,
    pub exceptions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiabilityTerms {
    pub indemnification: Map<String, Value>,
    pub limitations: Map<String, Value>,
}

/// One role-tagged message in a persisted conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: String,
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

/// A single identified risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risk {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub category: RiskCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// The six risk categories, matching the analysis schema sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Compensation,
    Termination,
    Ip,
    Covenants,
    Confidentiality,
    Liability,
}

/// Risks grouped under one category, in first-appearance order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub category: RiskCategory,
    pub risks: Vec<Risk>,
}

/// Deterministic aggregation over a parsed risk list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    pub total_risks: usize,
    pub high_priority_count: usize,
    pub medium_priority_count: usize,
    pub low_priority_count: usize,
    pub risks_by_category: Vec<CategoryGroup>,
}

/// Full risk assessment output, persisted per contract id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessmentResult {
    pub risks: Vec<Risk>,
    pub summary: RiskSummary,
    pub timestamp: String,
}

/// A finished analysis persisted together with its source text, so chat and
/// risk assessment can run later without re-extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    pub contract_id: String,
    pub filename: Option<String>,
    pub text: String,
    pub analysis: ContractAnalysis,
    pub analyzed_at: String,
}
