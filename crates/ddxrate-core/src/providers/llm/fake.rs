use super::LlmClient;
use crate::model::LlmResponse;
use async_trait::async_trait;
use serde_json::json;

/// Deterministic client for tests and offline runs. Returns a fixed
/// canned response for every prompt.
#[derive(Clone)]
pub struct FakeClient {
    pub canned: String,
}

const CONDITION_POOL: [(&str, &str); 5] = [
    ("Dengue fever", "A90"),
    ("Typhoid fever", "A01.0"),
    ("Malaria", "B54"),
    ("Pulmonary tuberculosis", "A15.0"),
    ("Influenza", "J11.1"),
];

impl FakeClient {
    pub fn new(canned: impl Into<String>) -> Self {
        Self {
            canned: canned.into(),
        }
    }

    /// A canned response that satisfies the diagnosis contract with `n`
    /// entries ranked 1..=n (n capped at the pool size).
    pub fn with_diagnoses(n: usize) -> Self {
        let n = n.clamp(1, CONDITION_POOL.len());
        let entries: Vec<serde_json::Value> = CONDITION_POOL[..n]
            .iter()
            .enumerate()
            .map(|(i, (condition, icd10))| {
                json!({
                    "condition": condition,
                    "icd10Code": icd10,
                    "supportingEvidence": format!("Findings consistent with {}", condition.to_lowercase()),
                    "likelihoodRank": i + 1,
                    "diagnosticTests": ["Complete blood count"],
                    "regionalConsiderations": "Endemic in the region during the rainy season",
                })
            })
            .collect();

        let body = json!({
            "differentialDiagnosis": entries,
            "missingInformation": ["Vaccination history"],
        });

        Self {
            canned: body.to_string(),
        }
    }
}

#[async_trait]
impl LlmClient for FakeClient {
    async fn complete(&self, _prompt: &str) -> anyhow::Result<LlmResponse> {
        Ok(LlmResponse {
            text: self.canned.clone(),
            provider: self.provider_name().to_string(),
            model: "fake".to_string(),
            meta: json!({"fake": true}),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
