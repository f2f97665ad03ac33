use crate::errors::{Result, StudyError};
use crate::model::{
    AiConcern, LlmOutput, NewDemographics, NewEvaluation, PracticeLocation, Vignette,
};
use crate::progress::ProgressTracker;
use crate::storage::Store;
use std::collections::HashSet;

/// Where a rater currently is in the survey. One forward path:
/// Consent, Calibration, Evaluating, Demographics, Complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyState {
    Consent,
    Calibration,
    Evaluating { index: usize },
    Demographics,
    Complete,
}

/// One survey screen: a vignette and the diagnoses to judge.
#[derive(Debug, Clone)]
pub struct SurveyItem {
    pub vignette: Vignette,
    pub output: Option<LlmOutput>,
}

/// Evaluation fields as a rater fills them in; rater and vignette
/// identity come from the session.
#[derive(Debug, Clone)]
pub struct EvaluationForm {
    pub relevance_score: u8,
    pub missing_critical: bool,
    pub missing_diagnosis: Option<String>,
    pub safety_score: u8,
    pub acceptable: bool,
    pub ordering_score: u8,
    pub confidence_level: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DemographicsForm {
    pub years_of_practice: u32,
    pub practice_location: PracticeLocation,
    pub ai_clinical_reasoning_confidence: u8,
    pub ai_safety_concern: u8,
    pub ai_decision_support_willingness: u8,
    pub ai_concerns: Vec<AiConcern>,
    pub phone_number: Option<String>,
}

/// Drives one rater through the survey. The session is a view over the
/// store: all completion facts are persisted through the tracker, so a
/// rater can drop the session and resume where they left off.
#[derive(Debug)]
pub struct SurveySession {
    store: Store,
    tracker: ProgressTracker,
    rater_id: String,
    items: Vec<SurveyItem>,
    completed: HashSet<i64>,
    state: SurveyState,
}

impl SurveySession {
    /// Start a session at the consent step. The rater id is trimmed and
    /// must be non-empty, and consent must have been given; nothing is
    /// persisted until the first evaluation.
    pub fn begin(store: Store, rater_id: &str, agreed: bool) -> Result<Self> {
        let rater_id = rater_id.trim();
        if rater_id.is_empty() {
            return Err(StudyError::Validation("rater id must not be empty".into()));
        }
        if !agreed {
            return Err(StudyError::Validation(
                "participation requires consent".into(),
            ));
        }
        let tracker = ProgressTracker::new(store.clone());
        Ok(Self {
            store,
            tracker,
            rater_id: rater_id.to_string(),
            items: Vec::new(),
            completed: HashSet::new(),
            state: SurveyState::Consent,
        })
    }

    pub fn state(&self) -> SurveyState {
        self.state
    }

    pub fn rater_id(&self) -> &str {
        &self.rater_id
    }

    pub fn items(&self) -> &[SurveyItem] {
        &self.items
    }

    /// The vignette currently on screen, if the session is evaluating.
    pub fn current_item(&self) -> Option<&SurveyItem> {
        match self.state {
            SurveyState::Evaluating { index } => self.items.get(index),
            _ => None,
        }
    }

    pub fn is_completed(&self, vignette_id: i64) -> bool {
        self.completed.contains(&vignette_id)
    }

    pub fn acknowledge_consent(&mut self) -> Result<()> {
        if self.state != SurveyState::Consent {
            return Err(StudyError::Validation(
                "consent was already acknowledged".into(),
            ));
        }
        self.state = SurveyState::Calibration;
        Ok(())
    }

    /// Leave the calibration step and load the survey items. Resumes at
    /// the first vignette the rater has not evaluated; a rater who is
    /// already done lands on demographics or straight on completion.
    pub fn start_evaluating(&mut self) -> Result<()> {
        if self.state != SurveyState::Calibration {
            return Err(StudyError::Validation(
                "survey is not at the calibration step".into(),
            ));
        }

        self.items = self
            .store
            .vignettes_with_outputs()?
            .into_iter()
            .map(|(vignette, output)| SurveyItem { vignette, output })
            .collect();
        self.completed = self
            .tracker
            .progress(&self.rater_id)?
            .completed_ids
            .into_iter()
            .collect();

        let first_open = self
            .items
            .iter()
            .position(|item| !self.completed.contains(&item.vignette.id));
        self.state = match first_open {
            Some(index) => SurveyState::Evaluating { index },
            None => self.post_evaluation_state()?,
        };
        tracing::debug!(
            rater_id = %self.rater_id,
            total = self.items.len(),
            completed = self.completed.len(),
            state = ?self.state,
            "survey resumed"
        );
        Ok(())
    }

    /// Record the rater's judgment of the current vignette and advance.
    /// Nothing is written when the form fails validation, when the
    /// vignette was already evaluated, or when it has no generated
    /// diagnoses to judge.
    pub fn submit_evaluation(&mut self, form: &EvaluationForm) -> Result<i64> {
        let index = match self.state {
            SurveyState::Evaluating { index } => index,
            _ => {
                return Err(StudyError::Validation(
                    "survey is not at an evaluation step".into(),
                ))
            }
        };
        let item = &self.items[index];
        let vignette_id = item.vignette.id;
        if self.completed.contains(&vignette_id) {
            return Err(StudyError::Validation(format!(
                "vignette {} was already evaluated in this survey",
                vignette_id
            )));
        }
        let output = item.output.as_ref().ok_or_else(|| {
            StudyError::Validation(format!(
                "vignette {} has no generated diagnoses to evaluate",
                vignette_id
            ))
        })?;

        let evaluation = NewEvaluation {
            rater_id: self.rater_id.clone(),
            vignette_id,
            llm_output_id: output.id,
            relevance_score: form.relevance_score,
            missing_critical: form.missing_critical,
            missing_diagnosis: normalized(form.missing_diagnosis.clone()),
            safety_score: form.safety_score,
            acceptable: form.acceptable,
            ordering_score: form.ordering_score,
            confidence_level: form.confidence_level,
            comment: normalized(form.comment.clone()),
        };
        let id = self.tracker.record_evaluation(&evaluation)?;

        self.completed.insert(vignette_id);
        self.advance_from(index)?;
        Ok(id)
    }

    /// Step back to the previous vignette for review. Completed
    /// vignettes stay view-only.
    pub fn previous(&mut self) -> Result<()> {
        match self.state {
            SurveyState::Evaluating { index } if index > 0 => {
                self.state = SurveyState::Evaluating { index: index - 1 };
                Ok(())
            }
            SurveyState::Evaluating { .. } => Err(StudyError::Validation(
                "already at the first vignette".into(),
            )),
            _ => Err(StudyError::Validation(
                "survey is not at an evaluation step".into(),
            )),
        }
    }

    /// Step forward past a vignette that is already evaluated. The last
    /// vignette hands over to demographics.
    pub fn next(&mut self) -> Result<()> {
        let index = match self.state {
            SurveyState::Evaluating { index } => index,
            _ => {
                return Err(StudyError::Validation(
                    "survey is not at an evaluation step".into(),
                ))
            }
        };
        let vignette_id = self.items[index].vignette.id;
        if !self.completed.contains(&vignette_id) {
            return Err(StudyError::Validation(
                "evaluate this vignette before moving on".into(),
            ));
        }
        if index + 1 < self.items.len() {
            self.state = SurveyState::Evaluating { index: index + 1 };
        } else {
            self.state = self.post_evaluation_state()?;
        }
        Ok(())
    }

    /// Record the one-time demographics survey and finish.
    pub fn submit_demographics(&mut self, form: &DemographicsForm) -> Result<i64> {
        if self.state != SurveyState::Demographics {
            return Err(StudyError::Validation(
                "survey is not at the demographics step".into(),
            ));
        }
        let demographics = NewDemographics {
            rater_id: self.rater_id.clone(),
            years_of_practice: form.years_of_practice,
            practice_location: form.practice_location,
            ai_clinical_reasoning_confidence: form.ai_clinical_reasoning_confidence,
            ai_safety_concern: form.ai_safety_concern,
            ai_decision_support_willingness: form.ai_decision_support_willingness,
            ai_concerns: form.ai_concerns.clone(),
            phone_number: normalized(form.phone_number.clone()),
        };
        let id = self.tracker.record_demographics(&demographics)?;
        self.state = SurveyState::Complete;
        Ok(id)
    }

    /// Pick the next open vignette after `index`. Evaluations recorded
    /// outside this session can leave an earlier gap, so an empty tail
    /// falls back to the first open vignette anywhere.
    fn advance_from(&mut self, index: usize) -> Result<()> {
        let after = self.items[index + 1..]
            .iter()
            .position(|item| !self.completed.contains(&item.vignette.id))
            .map(|offset| index + 1 + offset);
        let target = after.or_else(|| {
            self.items
                .iter()
                .position(|item| !self.completed.contains(&item.vignette.id))
        });
        self.state = match target {
            Some(next) => SurveyState::Evaluating { index: next },
            None => self.post_evaluation_state()?,
        };
        Ok(())
    }

    fn post_evaluation_state(&self) -> Result<SurveyState> {
        if self.store.has_submitted_demographics(&self.rater_id)? {
            Ok(SurveyState::Complete)
        } else {
            Ok(SurveyState::Demographics)
        }
    }
}

fn normalized(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
