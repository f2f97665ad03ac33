use async_trait::async_trait;
use ddxrate_core::config::GenerationConfig;
use ddxrate_core::errors::StudyError;
use ddxrate_core::generate::Generator;
use ddxrate_core::model::{LlmResponse, VignetteCategory};
use ddxrate_core::providers::llm::fake::FakeClient;
use ddxrate_core::providers::llm::LlmClient;
use ddxrate_core::storage::Store;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Returns one canned response per call, in order.
struct SequenceClient {
    responses: Mutex<VecDeque<String>>,
}

impl SequenceClient {
    fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl LlmClient for SequenceClient {
    async fn complete(&self, _prompt: &str) -> anyhow::Result<LlmResponse> {
        let text = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("ran out of canned responses");
        Ok(LlmResponse {
            text,
            provider: "fake".into(),
            model: "fake".into(),
            meta: serde_json::Value::Null,
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

fn seeded_store(n: usize) -> anyhow::Result<(Store, Vec<i64>)> {
    let store = Store::memory()?;
    store.init_schema()?;
    let mut ids = Vec::new();
    for i in 0..n {
        ids.push(store.create_vignette(
            VignetteCategory::Common,
            "T.V.",
            &format!("Case {} for generation.", i + 1),
        )?);
    }
    Ok((store, ids))
}

fn output_count(store: &Store) -> anyhow::Result<i64> {
    let conn = store.conn.lock().unwrap();
    Ok(conn.query_row("SELECT count(*) FROM llm_outputs", [], |r| r.get(0))?)
}

#[tokio::test]
async fn test_generate_persists_contract_valid_output() -> anyhow::Result<()> {
    let (store, ids) = seeded_store(1)?;
    let generator = Generator::new(
        store.clone(),
        Arc::new(FakeClient::with_diagnoses(3)),
        GenerationConfig::default(),
    );

    let output = generator.generate_for_vignette(ids[0]).await?;
    assert_eq!(output.vignette_id, ids[0]);
    assert!((1..=5).contains(&output.diagnoses.len()));
    for (i, d) in output.diagnoses.iter().enumerate() {
        assert_eq!(d.likelihood_rank, Some((i + 1) as u8));
        assert!(d.icd10_code.is_some());
        assert!(!d.rationale.is_empty());
    }
    assert_eq!(output.model_name, "fake");
    assert!(output.missing_information.is_some());
    Ok(())
}

#[tokio::test]
async fn test_generate_skips_existing_output() -> anyhow::Result<()> {
    let (store, ids) = seeded_store(1)?;
    let generator = Generator::new(
        store.clone(),
        Arc::new(FakeClient::with_diagnoses(2)),
        GenerationConfig::default(),
    );

    let first = generator.generate_for_vignette(ids[0]).await?;
    let second = generator.generate_for_vignette(ids[0]).await?;
    assert_eq!(first.id, second.id);
    assert_eq!(output_count(&store)?, 1);
    Ok(())
}

#[tokio::test]
async fn test_regenerate_inserts_superseding_row() -> anyhow::Result<()> {
    let (store, ids) = seeded_store(1)?;
    let generator = Generator::new(
        store.clone(),
        Arc::new(FakeClient::with_diagnoses(2)),
        GenerationConfig::default(),
    );

    let first = generator.generate_for_vignette(ids[0]).await?;
    let second = generator.regenerate_vignette(ids[0]).await?;
    assert_ne!(first.id, second.id);
    assert_eq!(output_count(&store)?, 2);

    let current = store.llm_output_by_vignette(ids[0])?.unwrap();
    assert_eq!(current.id, second.id);
    Ok(())
}

#[tokio::test]
async fn test_unknown_vignette_is_not_found() -> anyhow::Result<()> {
    let (store, _) = seeded_store(1)?;
    let generator = Generator::new(
        store,
        Arc::new(FakeClient::with_diagnoses(1)),
        GenerationConfig::default(),
    );

    let err = generator.generate_for_vignette(4242).await.unwrap_err();
    assert!(matches!(err, StudyError::NotFound { id: 4242, .. }));
    Ok(())
}

#[tokio::test]
async fn test_rejected_response_is_not_persisted() -> anyhow::Result<()> {
    let (store, ids) = seeded_store(1)?;
    let generator = Generator::new(
        store.clone(),
        Arc::new(FakeClient::new("this is not json")),
        GenerationConfig::default(),
    );

    let err = generator.generate_for_vignette(ids[0]).await.unwrap_err();
    assert!(matches!(err, StudyError::SchemaValidation(_)));
    assert_eq!(output_count(&store)?, 0);
    assert!(store.llm_output_by_vignette(ids[0])?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_generate_all_isolates_failures() -> anyhow::Result<()> {
    let (store, ids) = seeded_store(3)?;

    // Middle response violates the contract (empty diagnosis list)
    let client = SequenceClient::new([
        FakeClient::with_diagnoses(2).canned,
        r#"{"differentialDiagnosis": []}"#.to_string(),
        FakeClient::with_diagnoses(4).canned,
    ]);
    let generator = Generator::new(store.clone(), Arc::new(client), GenerationConfig::default());

    let summary = generator.generate_all().await?;
    assert_eq!(summary.generated, vec![ids[0], ids[2]]);
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].vignette_id, ids[1]);
    assert!(!summary.is_clean());

    // A second pass only touches the failed vignette
    let retry = Generator::new(
        store.clone(),
        Arc::new(FakeClient::with_diagnoses(1)),
        GenerationConfig::default(),
    );
    let summary = retry.generate_all().await?;
    assert_eq!(summary.generated, vec![ids[1]]);
    assert_eq!(summary.skipped, vec![ids[0], ids[2]]);
    assert!(summary.is_clean());
    assert_eq!(output_count(&store)?, 3);
    Ok(())
}
