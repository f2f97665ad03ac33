use ddxrate_core::errors::StudyError;
use ddxrate_core::model::{
    AiConcern, Diagnosis, NewDemographics, NewEvaluation, PracticeLocation, VignetteCategory,
};
use ddxrate_core::storage::Store;
use tempfile::tempdir;

fn sample_diagnoses() -> Vec<Diagnosis> {
    vec![Diagnosis {
        diagnosis: "Dengue fever".into(),
        rationale: "High fever with thrombocytopenia".into(),
        icd10_code: Some("A90".into()),
        likelihood_rank: Some(1),
        diagnostic_tests: Some(vec!["NS1 antigen".into()]),
        regional_considerations: Some("Endemic in urban Java".into()),
    }]
}

fn sample_evaluation(rater_id: &str, vignette_id: i64, llm_output_id: i64) -> NewEvaluation {
    NewEvaluation {
        rater_id: rater_id.into(),
        vignette_id,
        llm_output_id,
        relevance_score: 4,
        missing_critical: false,
        missing_diagnosis: None,
        safety_score: 5,
        acceptable: true,
        ordering_score: 4,
        confidence_level: 3,
        comment: Some("Reasonable list".into()),
    }
}

#[test]
fn test_store_smoke_lifecycle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("study.db");

    // 1. Open store (init schema)
    let store = Store::open(&db_path)?;
    store.init_schema()?;

    // 2. Seed a vignette and one generated output
    let v_id = store.create_vignette(
        VignetteCategory::Common,
        "A.S.",
        "Fever for three days with petechial rash.",
    )?;
    let missing = vec!["Vaccination history".to_string()];
    let out_id = store.save_llm_output(
        v_id,
        &sample_diagnoses(),
        Some(missing.as_slice()),
        "test-model",
        0.1,
    )?;

    // 3. Record one evaluation
    store.save_evaluation(&sample_evaluation("rater-1", v_id, out_id))?;

    // 4. Verify via raw SQL
    let conn = rusqlite::Connection::open(&db_path)?;
    let vignettes: i64 = conn.query_row("SELECT count(*) FROM vignettes", [], |r| r.get(0))?;
    assert_eq!(vignettes, 1);
    let outputs: i64 = conn.query_row("SELECT count(*) FROM llm_outputs", [], |r| r.get(0))?;
    assert_eq!(outputs, 1);
    let evaluations: i64 = conn.query_row("SELECT count(*) FROM evaluations", [], |r| r.get(0))?;
    assert_eq!(evaluations, 1);

    // 5. Read back through the store
    let vignette = store.vignette_by_id(v_id)?.unwrap();
    assert_eq!(vignette.patient_initials, "A.S.");
    assert_eq!(vignette.category, VignetteCategory::Common);

    let output = store.llm_output_by_vignette(v_id)?.unwrap();
    assert_eq!(output.id, out_id);
    assert_eq!(output.diagnoses.len(), 1);
    assert_eq!(output.diagnoses[0].icd10_code.as_deref(), Some("A90"));
    assert_eq!(output.missing_information, Some(missing));

    Ok(())
}

#[test]
fn test_duplicate_evaluation_hits_unique_index() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let v_id = store.create_vignette(
        VignetteCategory::Common,
        "B.T.",
        "Chronic cough and weight loss.",
    )?;
    let out_id = store.save_llm_output(v_id, &sample_diagnoses(), None, "test-model", 0.1)?;

    store.save_evaluation(&sample_evaluation("rater-1", v_id, out_id))?;

    // Second insert goes straight to the store, past any pre-check
    let err = store
        .save_evaluation(&sample_evaluation("rater-1", v_id, out_id))
        .unwrap_err();
    assert!(
        matches!(err, StudyError::DuplicateEvaluation { vignette_id, .. } if vignette_id == v_id)
    );

    // A different rater is not blocked
    store.save_evaluation(&sample_evaluation("rater-2", v_id, out_id))?;

    let conn = store.conn.lock().unwrap();
    let n: i64 = conn.query_row("SELECT count(*) FROM evaluations", [], |r| r.get(0))?;
    assert_eq!(n, 2);
    Ok(())
}

#[test]
fn test_latest_output_supersedes_earlier_ones() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let v_id = store.create_vignette(
        VignetteCategory::Ambiguous,
        "C.R.",
        "Intermittent abdominal pain.",
    )?;

    let first = store.save_llm_output(v_id, &sample_diagnoses(), None, "model-a", 0.1)?;
    let second = store.save_llm_output(v_id, &sample_diagnoses(), None, "model-b", 0.2)?;
    assert!(second > first);

    let current = store.llm_output_by_vignette(v_id)?.unwrap();
    assert_eq!(current.id, second);
    assert_eq!(current.model_name, "model-b");

    // Both rows are retained
    let all = store.all_llm_outputs()?;
    assert_eq!(all.len(), 2);
    Ok(())
}

#[test]
fn test_delete_vignette_cascades() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;

    let keep = store.create_vignette(VignetteCategory::Common, "K.P.", "Headache after fall.")?;
    let keep_out = store.save_llm_output(keep, &sample_diagnoses(), None, "test-model", 0.1)?;
    store.save_evaluation(&sample_evaluation("rater-1", keep, keep_out))?;

    let doomed =
        store.create_vignette(VignetteCategory::Rare, "D.M.", "Progressive muscle weakness.")?;
    let doomed_out = store.save_llm_output(doomed, &sample_diagnoses(), None, "test-model", 0.1)?;
    for rater in ["rater-1", "rater-2", "rater-3"] {
        store.save_evaluation(&sample_evaluation(rater, doomed, doomed_out))?;
    }

    assert!(store.delete_vignette(doomed)?);
    assert!(!store.delete_vignette(doomed)?);

    let conn = store.conn.lock().unwrap();
    let evals: i64 = conn.query_row(
        "SELECT count(*) FROM evaluations WHERE vignette_id = ?1",
        [doomed],
        |r| r.get(0),
    )?;
    assert_eq!(evals, 0);
    let outputs: i64 = conn.query_row(
        "SELECT count(*) FROM llm_outputs WHERE vignette_id = ?1",
        [doomed],
        |r| r.get(0),
    )?;
    assert_eq!(outputs, 0);

    // Unrelated rows survive
    let total_evals: i64 = conn.query_row("SELECT count(*) FROM evaluations", [], |r| r.get(0))?;
    assert_eq!(total_evals, 1);
    drop(conn);
    assert!(store.vignette_by_id(keep)?.is_some());
    Ok(())
}

#[test]
fn test_update_vignette_requires_existing_row() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let v_id = store.create_vignette(VignetteCategory::Common, "E.F.", "Initial text.")?;

    store.update_vignette(v_id, VignetteCategory::Emergent, "E.F.", "Crushing chest pain.")?;
    let updated = store.vignette_by_id(v_id)?.unwrap();
    assert_eq!(updated.category, VignetteCategory::Emergent);
    assert_eq!(updated.content, "Crushing chest pain.");

    let err = store
        .update_vignette(4242, VignetteCategory::Common, "X.X.", "nope")
        .unwrap_err();
    assert!(matches!(err, StudyError::NotFound { .. }));
    Ok(())
}

#[test]
fn test_vignette_stats_count_collection_state() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;

    let with_data =
        store.create_vignette(VignetteCategory::Common, "G.H.", "Fever and joint pain.")?;
    let out_id = store.save_llm_output(with_data, &sample_diagnoses(), None, "test-model", 0.1)?;
    store.save_evaluation(&sample_evaluation("rater-1", with_data, out_id))?;
    store.save_evaluation(&sample_evaluation("rater-2", with_data, out_id))?;

    let bare = store.create_vignette(VignetteCategory::Rare, "I.J.", "Unexplained bruising.")?;

    let stats = store.vignette_stats(with_data)?.unwrap();
    assert_eq!(stats.evaluation_count, 2);
    assert!(stats.has_llm_output);

    let all = store.all_vignette_stats()?;
    assert_eq!(all.len(), 2);
    let bare_stats = all.iter().find(|s| s.vignette.id == bare).unwrap();
    assert_eq!(bare_stats.evaluation_count, 0);
    assert!(!bare_stats.has_llm_output);

    assert!(store.vignette_stats(4242)?.is_none());
    Ok(())
}

#[test]
fn test_demographics_unique_per_rater() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;

    let demo = NewDemographics {
        rater_id: "rater-1".into(),
        years_of_practice: 6,
        practice_location: PracticeLocation::Puskesmas,
        ai_clinical_reasoning_confidence: 3,
        ai_safety_concern: 4,
        ai_decision_support_willingness: 2,
        ai_concerns: vec![AiConcern::Liability, AiConcern::Privacy],
        phone_number: None,
    };
    store.save_demographics(&demo)?;

    let err = store.save_demographics(&demo).unwrap_err();
    assert!(matches!(
        err,
        StudyError::DuplicateDemographics { ref rater_id } if rater_id == "rater-1"
    ));

    assert!(store.has_submitted_demographics("rater-1")?);
    assert!(!store.has_submitted_demographics("rater-2")?);

    let stored = store.demographics_by_rater("rater-1")?.unwrap();
    assert_eq!(stored.practice_location, PracticeLocation::Puskesmas);
    assert_eq!(
        stored.ai_concerns,
        vec![AiConcern::Liability, AiConcern::Privacy]
    );
    Ok(())
}
