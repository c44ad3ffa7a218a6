mod common;

use common::{corpus, ScriptedBackend};
use complaint_types::{PipelineError, TaxonomyStatus};
use llm_sdk::ServiceError;
use taxonomy::{ClassificationGateway, ProposerOptions, TaxonomyProposer};

const PROPOSAL: &str = r#"```json
[
  {"category_name": "MOTOR", "category_description": "Falhas de motor", "representative_examples": ["carro parou"]},
  {"category_name": "PECAS", "category_description": "Falta de peças", "representative_examples": ["sem peça"]},
  {"category_name": "ATENDIMENTO", "category_description": "Demora no atendimento", "representative_examples": []}
]
```"#;

fn proposer(backend: std::sync::Arc<ScriptedBackend>, sample_size: usize) -> TaxonomyProposer {
    TaxonomyProposer::new(
        ClassificationGateway::new(backend, "gpt-4o-mini"),
        ProposerOptions {
            sample_size,
            min_categories: 2,
            max_categories: 4,
            seed: Some(7),
        },
    )
}

#[tokio::test]
async fn proposal_awaits_curation() {
    let backend = ScriptedBackend::new(|_, _| Ok(PROPOSAL.to_string()));
    let complaints = corpus(&["a", "b", "c", "d", "e"]);

    let proposed = proposer(backend.clone(), 50).propose(&complaints).await.unwrap();

    assert_eq!(proposed.status, TaxonomyStatus::AwaitingCuration);
    assert_eq!(proposed.sample_size, 5);
    assert_eq!(proposed.total_complaints, 5);
    let names: Vec<_> = proposed.proposed_categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["MOTOR", "PECAS", "ATENDIMENTO"]);

    let request = &backend.requests()[0];
    assert!(request.user.contains("between 2 and 4"));
    assert!(request.user.contains("Complaint COMPLAINT_1:\nTitle: a"));
    assert_eq!(request.max_tokens, 3000);
    assert_eq!(request.model, "gpt-4o-mini");
}

#[tokio::test]
async fn seeded_proposals_send_the_same_sample() {
    let titles: Vec<String> = (0..60).map(|i| format!("t{}", i)).collect();
    let titles: Vec<&str> = titles.iter().map(String::as_str).collect();
    let complaints = corpus(&titles);

    let first = ScriptedBackend::new(|_, _| Ok(PROPOSAL.to_string()));
    let second = ScriptedBackend::new(|_, _| Ok(PROPOSAL.to_string()));
    proposer(first.clone(), 10).propose(&complaints).await.unwrap();
    proposer(second.clone(), 10).propose(&complaints).await.unwrap();

    assert_eq!(first.requests()[0].user, second.requests()[0].user);
}

#[tokio::test]
async fn failed_call_is_fatal() {
    let backend = ScriptedBackend::new(|_, _| Err(ServiceError::authentication("invalid api key")));

    let err = proposer(backend, 10).propose(&corpus(&["a"])).await.unwrap_err();

    match err {
        PipelineError::ExternalCall { call, message, .. } => {
            assert_eq!(call, "theme_discovery");
            assert!(message.contains("invalid api key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_proposal_is_a_postcondition_failure() {
    for answer in ["I think the themes are motor and parts", "[]", r#"[{"name": "A"}, {"name": "A"}]"#] {
        let backend = ScriptedBackend::new(move |_, _| Ok(answer.to_string()));
        let err = proposer(backend, 10).propose(&corpus(&["a", "b"])).await.unwrap_err();
        assert!(matches!(err, PipelineError::Postcondition { .. }), "{answer}: {err}");
    }
}

#[tokio::test]
async fn empty_corpus_is_rejected_before_any_call() {
    let backend = ScriptedBackend::new(|_, _| Ok(PROPOSAL.to_string()));
    let err = proposer(backend.clone(), 10).propose(&[]).await.unwrap_err();

    assert!(matches!(err, PipelineError::NoOutput { .. }));
    assert_eq!(backend.calls(), 0);
}
