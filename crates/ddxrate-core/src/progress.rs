use crate::errors::{Result, StudyError};
use crate::model::{LlmOutput, NewDemographics, NewEvaluation, RaterProgress, Vignette};
use crate::storage::Store;
use std::collections::HashSet;

/// Per-rater progress view plus the two gated writes. The duplicate
/// checks here are a fast path only; the UNIQUE indexes in storage
/// decide a race, and their rejection surfaces as the same error.
#[derive(Debug)]
pub struct ProgressTracker {
    store: Store,
}

impl ProgressTracker {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn progress(&self, rater_id: &str) -> Result<RaterProgress> {
        self.store.rater_progress(rater_id)
    }

    pub fn has_evaluated(&self, rater_id: &str, vignette_id: i64) -> Result<bool> {
        self.store.has_evaluated(rater_id, vignette_id)
    }

    /// First vignette (display order) the rater has not evaluated,
    /// paired with its latest output. None once every vignette is done.
    pub fn next_vignette(&self, rater_id: &str) -> Result<Option<(Vignette, Option<LlmOutput>)>> {
        let completed: HashSet<i64> = self
            .store
            .rater_progress(rater_id)?
            .completed_ids
            .into_iter()
            .collect();
        for (vignette, output) in self.store.vignettes_with_outputs()? {
            if !completed.contains(&vignette.id) {
                return Ok(Some((vignette, output)));
            }
        }
        Ok(None)
    }

    pub fn record_evaluation(&self, evaluation: &NewEvaluation) -> Result<i64> {
        validate_evaluation(evaluation)?;
        if self
            .store
            .has_evaluated(&evaluation.rater_id, evaluation.vignette_id)?
        {
            return Err(StudyError::DuplicateEvaluation {
                rater_id: evaluation.rater_id.clone(),
                vignette_id: evaluation.vignette_id,
            });
        }
        let id = self.store.save_evaluation(evaluation)?;
        tracing::info!(
            rater_id = %evaluation.rater_id,
            vignette_id = evaluation.vignette_id,
            evaluation_id = id,
            "evaluation recorded"
        );
        Ok(id)
    }

    pub fn record_demographics(&self, demographics: &NewDemographics) -> Result<i64> {
        validate_demographics(demographics)?;
        if self
            .store
            .has_submitted_demographics(&demographics.rater_id)?
        {
            return Err(StudyError::DuplicateDemographics {
                rater_id: demographics.rater_id.clone(),
            });
        }
        let id = self.store.save_demographics(demographics)?;
        tracing::info!(rater_id = %demographics.rater_id, "demographics recorded");
        Ok(id)
    }
}

fn score_in_range(name: &str, value: u8, max: u8) -> Result<()> {
    if value < 1 || value > max {
        return Err(StudyError::Validation(format!(
            "{} must be between 1 and {}, got {}",
            name, max, value
        )));
    }
    Ok(())
}

pub fn validate_evaluation(evaluation: &NewEvaluation) -> Result<()> {
    if evaluation.rater_id.trim().is_empty() {
        return Err(StudyError::Validation("rater id must not be empty".into()));
    }
    score_in_range("relevance_score", evaluation.relevance_score, 5)?;
    score_in_range("safety_score", evaluation.safety_score, 5)?;
    score_in_range("ordering_score", evaluation.ordering_score, 5)?;
    score_in_range("confidence_level", evaluation.confidence_level, 5)?;
    if evaluation.missing_critical
        && evaluation
            .missing_diagnosis
            .as_deref()
            .map_or(true, |d| d.trim().is_empty())
    {
        return Err(StudyError::Validation(
            "missing_diagnosis is required when a critical diagnosis is missing".into(),
        ));
    }
    Ok(())
}

pub fn validate_demographics(demographics: &NewDemographics) -> Result<()> {
    if demographics.rater_id.trim().is_empty() {
        return Err(StudyError::Validation("rater id must not be empty".into()));
    }
    if demographics.years_of_practice == 0 {
        return Err(StudyError::Validation(
            "years_of_practice must be at least 1".into(),
        ));
    }
    score_in_range(
        "ai_clinical_reasoning_confidence",
        demographics.ai_clinical_reasoning_confidence,
        5,
    )?;
    score_in_range("ai_safety_concern", demographics.ai_safety_concern, 5)?;
    score_in_range(
        "ai_decision_support_willingness",
        demographics.ai_decision_support_willingness,
        3,
    )?;
    Ok(())
}
