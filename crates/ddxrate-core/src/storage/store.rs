use crate::errors::{Result, StudyError};
use crate::model::{
    Diagnosis, Evaluation, LlmOutput, NewDemographics, NewEvaluation, PracticeLocation,
    RaterDemographics, RaterProgress, Vignette, VignetteCategory, VignetteStats,
};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        tracing::debug!(path = %path.display(), "opened study db");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    // --- Vignettes ---

    /// All vignettes in display order (category, then id).
    pub fn all_vignettes(&self) -> Result<Vec<Vignette>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, category, patient_initials, content, created_at
             FROM vignettes ORDER BY category, id",
        )?;
        let rows = stmt.query_map([], vignette_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn vignette_by_id(&self, id: i64) -> Result<Option<Vignette>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, category, patient_initials, content, created_at
             FROM vignettes WHERE id = ?1",
        )?;
        match stmt.query_row(params![id], vignette_from_row) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn vignettes_by_category(&self, category: VignetteCategory) -> Result<Vec<Vignette>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, category, patient_initials, content, created_at
             FROM vignettes WHERE category = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![category.as_str()], vignette_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn create_vignette(
        &self,
        category: VignetteCategory,
        patient_initials: &str,
        content: &str,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let created_at = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO vignettes(category, patient_initials, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![category.as_str(), patient_initials, content, created_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_vignette(
        &self,
        id: i64,
        category: VignetteCategory,
        patient_initials: &str,
        content: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE vignettes SET category = ?1, patient_initials = ?2, content = ?3
             WHERE id = ?4",
            params![category.as_str(), patient_initials, content, id],
        )?;
        if n == 0 {
            return Err(StudyError::NotFound {
                what: "vignette",
                id,
            });
        }
        Ok(())
    }

    /// Delete a vignette together with its outputs and evaluations.
    /// Runs inside one transaction so a failure never strands orphan
    /// rows. Returns false when the vignette did not exist.
    pub fn delete_vignette(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM evaluations WHERE vignette_id = ?1", params![id])?;
        tx.execute("DELETE FROM llm_outputs WHERE vignette_id = ?1", params![id])?;
        let n = tx.execute("DELETE FROM vignettes WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(n > 0)
    }

    pub fn vignette_stats(&self, id: i64) -> Result<Option<VignetteStats>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT v.id, v.category, v.patient_initials, v.content, v.created_at,
                    (SELECT COUNT(*) FROM evaluations e WHERE e.vignette_id = v.id),
                    EXISTS(SELECT 1 FROM llm_outputs o WHERE o.vignette_id = v.id)
             FROM vignettes v WHERE v.id = ?1",
        )?;
        match stmt.query_row(params![id], vignette_stats_from_row) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn all_vignette_stats(&self) -> Result<Vec<VignetteStats>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT v.id, v.category, v.patient_initials, v.content, v.created_at,
                    (SELECT COUNT(*) FROM evaluations e WHERE e.vignette_id = v.id),
                    EXISTS(SELECT 1 FROM llm_outputs o WHERE o.vignette_id = v.id)
             FROM vignettes v ORDER BY v.category, v.id",
        )?;
        let rows = stmt.query_map([], vignette_stats_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    // --- LLM outputs ---

    pub fn save_llm_output(
        &self,
        vignette_id: i64,
        diagnoses: &[Diagnosis],
        missing_information: Option<&[String]>,
        model_name: &str,
        temperature: f64,
    ) -> Result<i64> {
        let diagnoses_json = serde_json::to_string(diagnoses)?;
        let missing_json = missing_information
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.conn.lock().unwrap();
        let created_at = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO llm_outputs(vignette_id, diagnoses, missing_information,
                                     model_name, temperature, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                vignette_id,
                diagnoses_json,
                missing_json,
                model_name,
                temperature,
                created_at
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Latest output for a vignette. Outputs are never mutated; the
    /// newest row (created_at, then id) supersedes all earlier ones.
    pub fn llm_output_by_vignette(&self, vignette_id: i64) -> Result<Option<LlmOutput>> {
        let conn = self.conn.lock().unwrap();
        latest_output(&conn, vignette_id).map_err(Into::into)
    }

    pub fn all_llm_outputs(&self) -> Result<Vec<LlmOutput>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, vignette_id, diagnoses, missing_information, model_name,
                    temperature, created_at
             FROM llm_outputs ORDER BY vignette_id, id",
        )?;
        let rows = stmt.query_map([], llm_output_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Vignettes in display order, each paired with its latest output
    /// (if any). Backs the survey item list and the admin overview.
    pub fn vignettes_with_outputs(&self) -> Result<Vec<(Vignette, Option<LlmOutput>)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, category, patient_initials, content, created_at
             FROM vignettes ORDER BY category, id",
        )?;
        let vignettes = stmt
            .query_map([], vignette_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(vignettes.len());
        for v in vignettes {
            let output = latest_output(&conn, v.id)?;
            out.push((v, output));
        }
        Ok(out)
    }

    // --- Evaluations ---

    /// Insert an evaluation. The UNIQUE(rater_id, vignette_id) index is
    /// the authoritative duplicate gate; a constraint rejection maps to
    /// DuplicateEvaluation so racing submissions fail deterministically.
    pub fn save_evaluation(&self, eval: &NewEvaluation) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let created_at = chrono::Utc::now().to_rfc3339();
        let res = conn.execute(
            "INSERT INTO evaluations(rater_id, vignette_id, llm_output_id,
                                     relevance_score, missing_critical, missing_diagnosis,
                                     safety_score, acceptable, ordering_score,
                                     confidence_level, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                eval.rater_id,
                eval.vignette_id,
                eval.llm_output_id,
                eval.relevance_score,
                eval.missing_critical,
                eval.missing_diagnosis,
                eval.safety_score,
                eval.acceptable,
                eval.ordering_score,
                eval.confidence_level,
                eval.comment,
                created_at
            ],
        );
        match res {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => Err(StudyError::DuplicateEvaluation {
                rater_id: eval.rater_id.clone(),
                vignette_id: eval.vignette_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Evaluations by one rater in submission order.
    pub fn evaluations_by_rater(&self, rater_id: &str) -> Result<Vec<Evaluation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, rater_id, vignette_id, llm_output_id, relevance_score,
                    missing_critical, missing_diagnosis, safety_score, acceptable,
                    ordering_score, confidence_level, comment, created_at
             FROM evaluations WHERE rater_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![rater_id], evaluation_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn has_evaluated(&self, rater_id: &str, vignette_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT 1 FROM evaluations WHERE rater_id = ?1 AND vignette_id = ?2 LIMIT 1")?;
        Ok(stmt.exists(params![rater_id, vignette_id])?)
    }

    /// Completion view for one rater, recomputed from the tables.
    pub fn rater_progress(&self, rater_id: &str) -> Result<RaterProgress> {
        let conn = self.conn.lock().unwrap();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM vignettes", [], |r| r.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT vignette_id FROM evaluations WHERE rater_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![rater_id], |row| row.get::<_, i64>(0))?;
        let mut completed_ids = Vec::new();
        for r in rows {
            completed_ids.push(r?);
        }

        Ok(RaterProgress {
            rater_id: rater_id.to_string(),
            total_vignettes: total as u64,
            completed_vignettes: completed_ids.len() as u64,
            completed_ids,
        })
    }

    // --- Demographics ---

    pub fn save_demographics(&self, demo: &NewDemographics) -> Result<i64> {
        let concerns_json = serde_json::to_string(&demo.ai_concerns)?;
        let conn = self.conn.lock().unwrap();
        let created_at = chrono::Utc::now().to_rfc3339();
        let res = conn.execute(
            "INSERT INTO rater_demographics(rater_id, years_of_practice, practice_location,
                                            ai_clinical_reasoning_confidence, ai_safety_concern,
                                            ai_decision_support_willingness, ai_concerns,
                                            phone_number, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                demo.rater_id,
                demo.years_of_practice,
                demo.practice_location.as_str(),
                demo.ai_clinical_reasoning_confidence,
                demo.ai_safety_concern,
                demo.ai_decision_support_willingness,
                concerns_json,
                demo.phone_number,
                created_at
            ],
        );
        match res {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => Err(StudyError::DuplicateDemographics {
                rater_id: demo.rater_id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn demographics_by_rater(&self, rater_id: &str) -> Result<Option<RaterDemographics>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, rater_id, years_of_practice, practice_location,
                    ai_clinical_reasoning_confidence, ai_safety_concern,
                    ai_decision_support_willingness, ai_concerns, phone_number, created_at
             FROM rater_demographics WHERE rater_id = ?1",
        )?;
        match stmt.query_row(params![rater_id], demographics_from_row) {
            Ok(d) => Ok(Some(d)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn has_submitted_demographics(&self, rater_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT 1 FROM rater_demographics WHERE rater_id = ?1 LIMIT 1")?;
        Ok(stmt.exists(params![rater_id])?)
    }
}

fn latest_output(conn: &Connection, vignette_id: i64) -> rusqlite::Result<Option<LlmOutput>> {
    let mut stmt = conn.prepare(
        "SELECT id, vignette_id, diagnoses, missing_information, model_name,
                temperature, created_at
         FROM llm_outputs WHERE vignette_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT 1",
    )?;
    match stmt.query_row(params![vignette_id], llm_output_from_row) {
        Ok(o) => Ok(Some(o)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn vignette_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Vignette> {
    let raw: String = row.get(1)?;
    let category = VignetteCategory::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown vignette category '{}'", raw).into(),
        )
    })?;
    Ok(Vignette {
        id: row.get(0)?,
        category,
        patient_initials: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn vignette_stats_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VignetteStats> {
    let vignette = vignette_from_row(row)?;
    let evaluation_count: i64 = row.get(5)?;
    let has_llm_output: bool = row.get(6)?;
    Ok(VignetteStats {
        vignette,
        evaluation_count: evaluation_count as u64,
        has_llm_output,
    })
}

fn llm_output_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LlmOutput> {
    let diagnoses_json: String = row.get(2)?;
    let diagnoses: Vec<Diagnosis> = serde_json::from_str(&diagnoses_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let missing_json: Option<String> = row.get(3)?;
    let missing_information = match missing_json {
        Some(s) if !s.trim().is_empty() => Some(serde_json::from_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?),
        _ => None,
    };

    Ok(LlmOutput {
        id: row.get(0)?,
        vignette_id: row.get(1)?,
        diagnoses,
        missing_information,
        model_name: row.get(4)?,
        temperature: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn evaluation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Evaluation> {
    Ok(Evaluation {
        id: row.get(0)?,
        rater_id: row.get(1)?,
        vignette_id: row.get(2)?,
        llm_output_id: row.get(3)?,
        relevance_score: row.get(4)?,
        missing_critical: row.get(5)?,
        missing_diagnosis: row.get(6)?,
        safety_score: row.get(7)?,
        acceptable: row.get(8)?,
        ordering_score: row.get(9)?,
        confidence_level: row.get(10)?,
        comment: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn demographics_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RaterDemographics> {
    let location_raw: String = row.get(3)?;
    let practice_location = PracticeLocation::parse(&location_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown practice location '{}'", location_raw).into(),
        )
    })?;

    let concerns_json: String = row.get(7)?;
    let ai_concerns = serde_json::from_str(&concerns_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(RaterDemographics {
        id: row.get(0)?,
        rater_id: row.get(1)?,
        years_of_practice: row.get(2)?,
        practice_location,
        ai_clinical_reasoning_confidence: row.get(4)?,
        ai_safety_concern: row.get(5)?,
        ai_decision_support_willingness: row.get(6)?,
        ai_concerns,
        phone_number: row.get(8)?,
        created_at: row.get(9)?,
    })
}
