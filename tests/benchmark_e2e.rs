// Benchmarking flow over the real engines: run an annotated corpus,
// aggregate metrics, select a winner.

use std::sync::Arc;

use riservato::benchmarking::{
    BenchmarkDataset, BenchmarkRunner, EngineComparator, ScoreWeights, WinnerSelector,
};
use riservato::recognizers::{EngineConfig, Recognizer, RecognizerEngine};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn corpus() -> BenchmarkDataset {
    BenchmarkDataset::from_json(
        r#"{
            "id": "legal_corpus_mini",
            "kind": "mixed_legal",
            "documents": [
                {
                    "id": "doc1",
                    "text": "Mario Rossi contro Luca Bianchi.",
                    "entities": [
                        {"kind": "PERSON", "start": 0, "end": 11, "text": "Mario Rossi"},
                        {"kind": "PERSON", "start": 19, "end": 31, "text": "Luca Bianchi"}
                    ]
                },
                {
                    "id": "doc2",
                    "text": "CF: RSSMRA85T10A562S in atti.",
                    "entities": [
                        {"kind": "FISCAL_CODE", "start": 4, "end": 20, "text": "RSSMRA85T10A562S"}
                    ]
                },
                {
                    "id": "doc3",
                    "text": "Nessun dato personale presente nel testo.",
                    "entities": []
                }
            ]
        }"#,
    )
    .unwrap()
}

fn engines() -> Vec<(String, Arc<dyn Recognizer>)> {
    vec![
        (
            "presidio".to_string(),
            Arc::new(RecognizerEngine::presidio(EngineConfig::default())) as Arc<dyn Recognizer>,
        ),
        (
            "spacy".to_string(),
            Arc::new(RecognizerEngine::spacy(EngineConfig::default())) as Arc<dyn Recognizer>,
        ),
    ]
}

#[tokio::test]
async fn benchmark_runs_and_selects_a_winner() {
    init_tracing();
    let runner = BenchmarkRunner::new(engines(), corpus());
    let results = runner.run_all().await.unwrap();

    assert_eq!(results.len(), 2);
    for result in results.values() {
        assert_eq!(result.dataset_id, "legal_corpus_mini");
        assert_eq!(result.dataset_size, 3);
        // Every annotated entity is found with exact offsets.
        assert_eq!(result.confusion.false_negatives, 0);
        assert!(result.f1_score > 0.9, "engine {} f1 {}", result.engine, result.f1_score);
        assert!(result.latency.max_us >= result.latency.min_us);
        assert!(result.by_kind.contains_key("PERSON"));
    }

    let all: Vec<_> = results.values().cloned().collect();
    let winner = WinnerSelector::with_defaults().select_winner(&all).unwrap();
    assert!(winner == "presidio" || winner == "spacy");

    let report = EngineComparator::with_defaults().compare(&all).unwrap();
    assert_eq!(report.engines.len(), 2);
    assert!(report.recommendation.contains("Recommended engine"));
    assert_eq!(report.significance.len(), 1);
}

#[tokio::test]
async fn custom_weights_must_be_normalized() {
    init_tracing();
    let bad = ScoreWeights {
        f1: 0.9,
        latency: 0.3,
        precision: 0.1,
        recall: 0.1,
    };
    assert!(WinnerSelector::new(bad, 500.0).is_err());
}
