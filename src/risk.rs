//! Risk assessment over a finished contract analysis.
//!
//! A single-shot gateway call: the full analysis is embedded as JSON in
//! one prompt, the model returns a `risks` array, and the summary
//! (total, per-severity counts, risks grouped by category in
//! first-appearance order) is computed deterministically here rather than
//! trusted from the model. Results are persisted per contract id;
//! [`RiskAssessor::get_cached`] returns the persisted value unchanged, and
//! callers are expected to check it before invoking
//! [`RiskAssessor::assess`].

use crate::error::{Error, Result};
use crate::gateway::{assistant_text, CompletionRequest, Gateway, Message};
use crate::merge::extract_json;
use crate::models::{
    CategoryGroup, ContractAnalysis, Risk, RiskAssessmentResult, RiskSummary, Severity,
};
use crate::store::Store;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

const RISK_COMPLETION_TOKENS: u32 = 4000;

fn risk_key(contract_id: &str) -> String {
    format!("risks/{contract_id}")
}

pub struct RiskAssessor {
    gateway: Arc<dyn Gateway>,
    store: Arc<dyn Store>,
}

impl RiskAssessor {
    pub fn new(gateway: Arc<dyn Gateway>, store: Arc<dyn Store>) -> Self {
        Self { gateway, store }
    }

    /// Run a fresh assessment and persist it keyed by `contract_id`.
    ///
    /// Does not consult the cache; callers check [`get_cached`] first.
    ///
    /// [`get_cached`]: RiskAssessor::get_cached
    pub async fn assess(
        &self,
        contract_id: &str,
        analysis: &ContractAnalysis,
    ) -> Result<RiskAssessmentResult> {
        info!(contract = contract_id, "starting risk assessment");

        let prompt = build_risk_prompt(analysis)?;
        let request = CompletionRequest {
            system: None,
            messages: vec![Message::user(prompt)],
            max_tokens: RISK_COMPLETION_TOKENS,
            temperature: None,
        };
        let envelope = self.gateway.complete(&request).await?;
        let risks = parse_risks(&envelope)?;
        let summary = summarize(&risks);

        let result = RiskAssessmentResult {
            risks,
            summary,
            timestamp: Utc::now().to_rfc3339(),
        };

        self.store
            .put(&risk_key(contract_id), &serde_json::to_string_pretty(&result)?)
            .await?;
        info!(
            contract = contract_id,
            risks = result.summary.total_risks,
            "completed risk assessment"
        );
        Ok(result)
    }

    /// Return the persisted assessment for `contract_id`, if any.
    pub async fn get_cached(&self, contract_id: &str) -> Result<Option<RiskAssessmentResult>> {
        match self.store.get(&risk_key(contract_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

/// Parse and shape-check the model's risk list.
fn parse_risks(envelope: &Value) -> Result<Vec<Risk>> {
    let text = assistant_text(envelope)?;
    let value = extract_json(text)?;

    let risks = value
        .get("risks")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Error::InvalidResponseShape("top-level 'risks' key absent or not a sequence".into())
        })?;

    serde_json::from_value(Value::Array(risks.clone()))
        .map_err(|e| Error::InvalidResponseShape(format!("malformed risk record: {e}")))
}

/// Deterministic summary: total, per-severity counts, and risks grouped by
/// category in order of each category's first appearance.
pub fn summarize(risks: &[Risk]) -> RiskSummary {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    for risk in risks {
        match groups.iter_mut().find(|g| g.category == risk.category) {
            Some(group) => group.risks.push(risk.clone()),
            None => groups.push(CategoryGroup {
                category: risk.category,
                risks: vec![risk.clone()],
            }),
        }
    }

    RiskSummary {
        total_risks: risks.len(),
        high_priority_count: risks.iter().filter(|r| r.severity == Severity::High).count(),
        medium_priority_count: risks
            .iter()
            .filter(|r| r.severity == Severity::Medium)
            .count(),
        low_priority_count: risks.iter().filter(|r| r.severity == Severity::Low).count(),
        risks_by_category: groups,
    }
}

fn build_risk_prompt(analysis: &ContractAnalysis) -> Result<String> {
    Ok(format!(
        "You are a contract risk assessment expert. Analyze this contract and identify potential risks \
         and concerns from the contractor/employee's perspective.\n\n\
         Contract Analysis:\n{analysis}\n\n\
         For each identified risk:\n\
         1. Categorize into one of these categories: compensation, termination, ip, covenants, confidentiality, liability\n\
         2. Assign severity (high, medium, low)\n\
         3. Provide clear description of the risk\n\
         4. Include specific recommendation to address or mitigate the risk\n\n\
         Format your response exactly like this example:\n\
         {{\n\
             \"risks\": [\n\
                 {{\n\
                     \"title\": \"Long Non-Compete Duration\",\n\
                     \"description\": \"The non-compete clause extends for 2 years, which is longer than industry standard.\",\n\
                     \"severity\": \"high\",\n\
                     \"category\": \"covenants\",\n\
                     \"recommendation\": \"Negotiate to reduce the non-compete period to 6-12 months\"\n\
                 }}\n\
             ]\n\
         }}\n\n\
         IMPORTANT: Return only the JSON object, no other text.",
        analysis = serde_json::to_string_pretty(analysis)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::models::RiskCategory;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn risk(title: &str, severity: Severity, category: RiskCategory) -> Risk {
        Risk {
            title: title.to_string(),
            description: format!("{title} description"),
            severity,
            category,
            recommendation: None,
        }
    }

    #[test]
    fn summary_counts_and_groups() {
        let risks = vec![
            risk("a", Severity::High, RiskCategory::Covenants),
            risk("b", Severity::Low, RiskCategory::Ip),
            risk("c", Severity::High, RiskCategory::Covenants),
            risk("d", Severity::Medium, RiskCategory::Liability),
        ];
        let summary = summarize(&risks);
        assert_eq!(summary.total_risks, 4);
        assert_eq!(summary.high_priority_count, 2);
        assert_eq!(summary.medium_priority_count, 1);
        assert_eq!(summary.low_priority_count, 1);
        assert_eq!(
            summary.high_priority_count + summary.medium_priority_count + summary.low_priority_count,
            summary.total_risks
        );
        // Categories appear in first-appearance order.
        let categories: Vec<_> = summary
            .risks_by_category
            .iter()
            .map(|g| g.category)
            .collect();
        assert_eq!(
            categories,
            vec![
                RiskCategory::Covenants,
                RiskCategory::Ip,
                RiskCategory::Liability
            ]
        );
        assert_eq!(summary.risks_by_category[0].risks.len(), 2);
    }

    #[test]
    fn summary_of_empty_list() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_risks, 0);
        assert!(summary.risks_by_category.is_empty());
    }

    #[tokio::test]
    async fn assess_parses_and_caches() {
        let gateway = Arc::new(MockGateway::new());
        let store = Arc::new(MemoryStore::new());
        gateway.push_text(
            &json!({
                "risks": [{
                    "title": "Broad IP Assignment",
                    "description": "All IP may be claimed by the company.",
                    "severity": "high",
                    "category": "ip",
                    "recommendation": "Add exclusions for pre-existing work"
                }]
            })
            .to_string(),
        );

        let assessor = RiskAssessor::new(
            Arc::clone(&gateway) as Arc<dyn Gateway>,
            Arc::clone(&store) as Arc<dyn Store>,
        );
        let analysis = ContractAnalysis::default();

        assert!(assessor.get_cached("c1").await.unwrap().is_none());
        let result = assessor.assess("c1", &analysis).await.unwrap();
        assert_eq!(result.summary.total_risks, 1);
        assert_eq!(result.risks[0].category, RiskCategory::Ip);

        // Cached copy comes back unchanged, without another gateway call.
        let cached = assessor.get_cached("c1").await.unwrap().unwrap();
        assert_eq!(cached.timestamp, result.timestamp);
        assert_eq!(cached.summary.total_risks, 1);
        assert_eq!(gateway.requests().len(), 1);
    }

    #[tokio::test]
    async fn missing_risks_key_is_invalid_shape() {
        let gateway = Arc::new(MockGateway::new());
        let store = Arc::new(MemoryStore::new());
        gateway.push_text(&json!({ "findings": [] }).to_string());

        let assessor = RiskAssessor::new(
            Arc::clone(&gateway) as Arc<dyn Gateway>,
            Arc::clone(&store) as Arc<dyn Store>,
        );
        assert!(matches!(
            assessor.assess("c1", &ContractAnalysis::default()).await,
            Err(Error::InvalidResponseShape(_))
        ));
    }

    #[tokio::test]
    async fn unknown_severity_is_invalid_shape() {
        let gateway = Arc::new(MockGateway::new());
        let store = Arc::new(MemoryStore::new());
        gateway.push_text(
            &json!({
                "risks": [{
                    "title": "x",
                    "description": "y",
                    "severity": "catastrophic",
                    "category": "ip"
                }]
            })
            .to_string(),
        );

        let assessor = RiskAssessor::new(
            Arc::clone(&gateway) as Arc<dyn Gateway>,
            Arc::clone(&store) as Arc<dyn Store>,
        );
        assert!(matches!(
            assessor.assess("c1", &ContractAnalysis::default()).await,
            Err(Error::InvalidResponseShape(_))
        ));
    }
}
