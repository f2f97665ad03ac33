use serde::{Deserialize, Serialize};

/// Presentation category of a vignette. Stored lowercase in the DB and
/// used (with id) as the display sort key for the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VignetteCategory {
    Common,
    Ambiguous,
    Emergent,
    Rare,
}

impl VignetteCategory {
    pub const ALL: [VignetteCategory; 4] = [
        VignetteCategory::Common,
        VignetteCategory::Ambiguous,
        VignetteCategory::Emergent,
        VignetteCategory::Rare,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VignetteCategory::Common => "common",
            VignetteCategory::Ambiguous => "ambiguous",
            VignetteCategory::Emergent => "emergent",
            VignetteCategory::Rare => "rare",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "common" => Some(VignetteCategory::Common),
            "ambiguous" => Some(VignetteCategory::Ambiguous),
            "emergent" => Some(VignetteCategory::Emergent),
            "rare" => Some(VignetteCategory::Rare),
            _ => None,
        }
    }
}

impl std::fmt::Display for VignetteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A synthetic patient case presented to raters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vignette {
    pub id: i64,
    pub category: VignetteCategory,
    pub patient_initials: String,
    pub content: String,
    pub created_at: String,
}

/// One ranked entry of a differential diagnosis.
///
/// JSON field names keep the wire spelling used by the model contract
/// (`icd10Code`, `likelihoodRank`, ...) so stored rows stay readable by
/// the analysis tooling. Sub-fields beyond diagnosis/rationale are
/// optional because early outputs predate the richer contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub diagnosis: String,
    pub rationale: String,
    #[serde(rename = "icd10Code", default, skip_serializing_if = "Option::is_none")]
    pub icd10_code: Option<String>,
    #[serde(
        rename = "likelihoodRank",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub likelihood_rank: Option<u8>,
    #[serde(
        rename = "diagnosticTests",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub diagnostic_tests: Option<Vec<String>>,
    #[serde(
        rename = "regionalConsiderations",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub regional_considerations: Option<String>,
}

/// A persisted model response for a vignette. Rows are immutable;
/// regeneration inserts a superseding row and the latest one wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmOutput {
    pub id: i64,
    pub vignette_id: i64,
    pub diagnoses: Vec<Diagnosis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_information: Option<Vec<String>>,
    pub model_name: String,
    pub temperature: f64,
    pub created_at: String,
}

/// A clinician's structured judgment of one LLM output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub rater_id: String,
    pub vignette_id: i64,
    pub llm_output_id: i64,
    pub relevance_score: u8,
    pub missing_critical: bool,
    pub missing_diagnosis: Option<String>,
    pub safety_score: u8,
    pub acceptable: bool,
    pub ordering_score: u8,
    pub confidence_level: u8,
    pub comment: Option<String>,
    pub created_at: String,
}

/// Insert payload for an evaluation (id/created_at assigned by storage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvaluation {
    pub rater_id: String,
    pub vignette_id: i64,
    pub llm_output_id: i64,
    pub relevance_score: u8,
    pub missing_critical: bool,
    pub missing_diagnosis: Option<String>,
    pub safety_score: u8,
    pub acceptable: bool,
    pub ordering_score: u8,
    pub confidence_level: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeLocation {
    Hospital,
    Clinic,
    Puskesmas,
    Home,
}

impl PracticeLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeLocation::Hospital => "hospital",
            PracticeLocation::Clinic => "clinic",
            PracticeLocation::Puskesmas => "puskesmas",
            PracticeLocation::Home => "home",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hospital" => Some(PracticeLocation::Hospital),
            "clinic" => Some(PracticeLocation::Clinic),
            "puskesmas" => Some(PracticeLocation::Puskesmas),
            "home" => Some(PracticeLocation::Home),
            _ => None,
        }
    }
}

impl std::fmt::Display for PracticeLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concerns a rater can select about clinical AI deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiConcern {
    Liability,
    Risk,
    Privacy,
    ClinicalReasoningInability,
    TransparencyLack,
    Other,
}

/// One-time demographics survey submitted after the last vignette.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaterDemographics {
    pub id: i64,
    pub rater_id: String,
    pub years_of_practice: u32,
    pub practice_location: PracticeLocation,
    pub ai_clinical_reasoning_confidence: u8,
    pub ai_safety_concern: u8,
    pub ai_decision_support_willingness: u8,
    pub ai_concerns: Vec<AiConcern>,
    pub phone_number: Option<String>,
    pub created_at: String,
}

/// Insert payload for demographics (id/created_at assigned by storage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDemographics {
    pub rater_id: String,
    pub years_of_practice: u32,
    pub practice_location: PracticeLocation,
    pub ai_clinical_reasoning_confidence: u8,
    pub ai_safety_concern: u8,
    pub ai_decision_support_willingness: u8,
    pub ai_concerns: Vec<AiConcern>,
    pub phone_number: Option<String>,
}

/// Derived per-rater completion view. Never persisted; recomputed from
/// the vignette and evaluation tables on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaterProgress {
    pub rater_id: String,
    pub total_vignettes: u64,
    pub completed_vignettes: u64,
    /// Evaluated vignette ids in evaluation order (created_at, then id).
    pub completed_ids: Vec<i64>,
}

impl RaterProgress {
    pub fn is_complete(&self) -> bool {
        self.total_vignettes > 0 && self.completed_vignettes >= self.total_vignettes
    }
}

/// Admin view of one vignette with collection counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VignetteStats {
    pub vignette: Vignette,
    pub evaluation_count: u64,
    pub has_llm_output: bool,
}

/// Raw text response from an LLM provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}
