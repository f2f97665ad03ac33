use crate::config::{self, GenerationConfig, StudyConfig};
use crate::errors::{Result, StudyError};
use crate::model::{Diagnosis, LlmOutput, Vignette};
use crate::providers::llm::openrouter::OpenRouterClient;
use crate::providers::llm::LlmClient;
use crate::storage::Store;
use jsonschema::JSONSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Collaborator-reviewed prompt for the differential diagnosis task.
/// The clinical wording is part of the study protocol; only the
/// vignette text and the diagnosis count bounds are substituted in.
const PROMPT_TEMPLATE: &str = r#"**Purpose:**
Generate a prioritized differential diagnosis based on SOAP (Subjective & Objective) findings, tailored to Indonesia's epidemiological, cultural, and healthcare landscape. The output will include **ICD-10** codes for each diagnosis.

---

## Input:
- **Subjective Data:** Patient-reported symptoms (e.g., duration, severity, associated factors).
- **Objective Data:** Clinician observations (vital signs, physical exam, lab/imaging results).
- **Additional Information (optional):** User-provided information (e.g., lab results, drugs, medications, previous illnesses).
---

## Output Requirements:

### 1. **Prioritization:**
Order diagnoses by likelihood, accounting for:
- **Regional Prevalence:** Prioritize diseases endemic to Indonesia (e.g., dengue, tuberculosis, typhoid, malaria, leptospirosis, diabetes, hypertension).
- **Demographics:** Consider age, gender, geographic location (e.g., malaria risk in Papua, dengue in urban Java), and socioeconomic factors (e.g., sanitation, nutrition).
- **Seasonality:** Note disease patterns (e.g., dengue peaks in rainy seasons).

### 2. **Diagnosis Format per Entry:**
- **Condition Name:** Medical term for the condition.
- **ICD-10 Code:** Include the most accurate and specific ICD-10 code for the condition.
- **Supporting Evidence:** Explicitly link SOAP findings to the diagnosis.
- **Diagnostic Tests:** Recommend locally accessible tests.
- **Regional Considerations:** Note cultural practices, healthcare access barriers, or environmental exposures.

### 3. **Missing Information Alert:**
Identify critical gaps in history or exams.

---

Respond with a single JSON object and no surrounding prose, shaped as:
{"differentialDiagnosis": [{"condition": "...", "icd10Code": "...", "supportingEvidence": "...", "likelihoodRank": 1, "diagnosticTests": ["..."], "regionalConsiderations": "..."}], "missingInformation": ["..."]}
Provide between {min} and {max} entries, with likelihoodRank consecutive from 1 (most likely).

VIGNETTE:
{vignette}"#;

/// Per-invocation knobs for generation; unset fields fall back to the
/// study configuration (and OPENROUTER_API_KEY for the credential).
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub api_key: Option<String>,
}

#[derive(Debug, Default)]
pub struct GenerationSummary {
    pub generated: Vec<i64>,
    pub skipped: Vec<i64>,
    pub failed: Vec<GenerationFailure>,
}

#[derive(Debug)]
pub struct GenerationFailure {
    pub vignette_id: i64,
    pub error: String,
}

impl GenerationSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Produces and persists differential diagnoses for vignettes. One
/// generator carries one resolved model/temperature pair; a different
/// override means building a new generator.
pub struct Generator {
    store: Store,
    client: Arc<dyn LlmClient>,
    config: GenerationConfig,
    temperature: f64,
}

impl Generator {
    /// Wire up with a caller-provided client (tests, other providers).
    pub fn new(store: Store, client: Arc<dyn LlmClient>, config: GenerationConfig) -> Self {
        let temperature = config.default_temperature;
        Self {
            store,
            client,
            config,
            temperature,
        }
    }

    /// Standard wiring: merge the request against the study defaults,
    /// resolve the credential, and build an OpenRouter client. Fails
    /// with MissingCredential before any network traffic.
    pub fn openrouter(
        store: Store,
        study: &StudyConfig,
        request: &GenerationRequest,
    ) -> Result<Self> {
        let api_key = config::resolve_api_key(request.api_key.as_deref())?;
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| study.generation.default_model.clone());
        let temperature = request
            .temperature
            .unwrap_or(study.generation.default_temperature);

        let client = Arc::new(OpenRouterClient::new(
            model,
            api_key,
            temperature,
            study.base_url.clone(),
        ));
        Ok(Self {
            store,
            client,
            config: study.generation.clone(),
            temperature,
        })
    }

    /// Generate diagnoses for one vignette. Idempotent: when an output
    /// already exists the stored one is returned untouched.
    pub async fn generate_for_vignette(&self, vignette_id: i64) -> Result<LlmOutput> {
        let vignette = self.require_vignette(vignette_id)?;
        if let Some(existing) = self.store.llm_output_by_vignette(vignette_id)? {
            tracing::info!(
                vignette_id,
                output_id = existing.id,
                "diagnoses already generated, skipping"
            );
            return Ok(existing);
        }
        self.generate_and_store(&vignette).await
    }

    /// Always call the model and insert a superseding output row.
    pub async fn regenerate_vignette(&self, vignette_id: i64) -> Result<LlmOutput> {
        let vignette = self.require_vignette(vignette_id)?;
        self.generate_and_store(&vignette).await
    }

    /// Sequentially generate for every vignette without an output.
    /// One failing vignette is recorded in the summary and the batch
    /// moves on; it never aborts the remaining items.
    pub async fn generate_all(&self) -> Result<GenerationSummary> {
        let vignettes = self.store.all_vignettes()?;
        let mut summary = GenerationSummary::default();

        for vignette in vignettes {
            if self.store.llm_output_by_vignette(vignette.id)?.is_some() {
                summary.skipped.push(vignette.id);
                continue;
            }
            match self.generate_and_store(&vignette).await {
                Ok(_) => summary.generated.push(vignette.id),
                Err(e) => {
                    tracing::warn!(
                        vignette_id = vignette.id,
                        error = %e,
                        "generation failed, continuing batch"
                    );
                    summary.failed.push(GenerationFailure {
                        vignette_id: vignette.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            generated = summary.generated.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "batch generation finished"
        );
        Ok(summary)
    }

    fn require_vignette(&self, vignette_id: i64) -> Result<Vignette> {
        self.store
            .vignette_by_id(vignette_id)?
            .ok_or(StudyError::NotFound {
                what: "vignette",
                id: vignette_id,
            })
    }

    async fn generate_and_store(&self, vignette: &Vignette) -> Result<LlmOutput> {
        let prompt = build_prompt(
            &vignette.content,
            self.config.min_diagnoses,
            self.config.max_diagnoses,
        );

        tracing::info!(
            vignette_id = vignette.id,
            provider = self.client.provider_name(),
            "requesting differential diagnoses"
        );
        let response = self
            .client
            .complete(&prompt)
            .await
            .map_err(|e| StudyError::Llm(format!("{:#}", e)))?;

        let (diagnoses, missing_information) = parse_and_validate(
            &response.text,
            self.config.min_diagnoses,
            self.config.max_diagnoses,
        )?;

        let output_id = self.store.save_llm_output(
            vignette.id,
            &diagnoses,
            missing_information.as_deref(),
            &response.model,
            self.temperature,
        )?;

        self.store
            .llm_output_by_vignette(vignette.id)?
            .ok_or(StudyError::NotFound {
                what: "llm_output",
                id: output_id,
            })
    }
}

fn build_prompt(vignette_content: &str, min_diagnoses: u8, max_diagnoses: u8) -> String {
    PROMPT_TEMPLATE
        .replace("{min}", &min_diagnoses.to_string())
        .replace("{max}", &max_diagnoses.to_string())
        .replace("{vignette}", vignette_content)
}

fn response_schema(min_diagnoses: u8, max_diagnoses: u8) -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["differentialDiagnosis"],
        "properties": {
            "differentialDiagnosis": {
                "type": "array",
                "minItems": min_diagnoses,
                "maxItems": max_diagnoses,
                "items": {
                    "type": "object",
                    "required": [
                        "condition",
                        "icd10Code",
                        "supportingEvidence",
                        "likelihoodRank",
                        "diagnosticTests",
                        "regionalConsiderations"
                    ],
                    "properties": {
                        "condition": { "type": "string", "minLength": 1 },
                        "icd10Code": { "type": "string", "minLength": 1 },
                        "supportingEvidence": { "type": "string", "minLength": 1 },
                        "likelihoodRank": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": max_diagnoses
                        },
                        "diagnosticTests": {
                            "type": "array",
                            "items": { "type": "string" }
                        },
                        "regionalConsiderations": { "type": "string" }
                    }
                }
            },
            "missingInformation": {
                "type": "array",
                "items": { "type": "string" }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiagnosisResponse {
    differential_diagnosis: Vec<DiagnosisEntry>,
    #[serde(default)]
    missing_information: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiagnosisEntry {
    condition: String,
    icd10_code: String,
    supporting_evidence: String,
    likelihood_rank: u8,
    diagnostic_tests: Vec<String>,
    regional_considerations: String,
}

/// Validate a raw model response against the diagnosis contract and
/// map it into storage form. Nothing is persisted on failure.
fn parse_and_validate(
    text: &str,
    min_diagnoses: u8,
    max_diagnoses: u8,
) -> Result<(Vec<Diagnosis>, Option<Vec<String>>)> {
    let instance: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| StudyError::SchemaValidation(format!("response is not valid JSON: {}", e)))?;

    let schema_json = response_schema(min_diagnoses, max_diagnoses);
    let compiled = JSONSchema::options()
        .compile(&schema_json)
        .map_err(|e| StudyError::SchemaValidation(format!("schema compile failed: {}", e)))?;

    if let Err(errors) = compiled.validate(&instance) {
        let error_list: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(StudyError::SchemaValidation(format!(
            "{} validation errors: {}",
            error_list.len(),
            error_list.join("; ")
        )));
    }

    let parsed: DiagnosisResponse = serde_json::from_value(instance)
        .map_err(|e| StudyError::SchemaValidation(format!("response shape mismatch: {}", e)))?;

    // Ranks must form a consecutive run 1..=n once ordered; a gap or a
    // duplicate rank is a contract violation even when the schema passed.
    let mut entries = parsed.differential_diagnosis;
    entries.sort_by_key(|e| e.likelihood_rank);
    for (i, entry) in entries.iter().enumerate() {
        let expected = (i + 1) as u8;
        if entry.likelihood_rank != expected {
            return Err(StudyError::SchemaValidation(format!(
                "likelihood ranks must be consecutive from 1; position {} has rank {}",
                i + 1,
                entry.likelihood_rank
            )));
        }
    }

    let diagnoses = entries
        .into_iter()
        .map(|e| Diagnosis {
            diagnosis: e.condition,
            rationale: e.supporting_evidence,
            icd10_code: Some(e.icd10_code),
            likelihood_rank: Some(e.likelihood_rank),
            diagnostic_tests: Some(e.diagnostic_tests),
            regional_considerations: Some(e.regional_considerations),
        })
        .collect();

    let missing = parsed.missing_information.filter(|v| !v.is_empty());
    Ok((diagnoses, missing))
}
