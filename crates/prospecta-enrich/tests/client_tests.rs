//! Research client tests against a wiremock server.
//!
//! Validates status-to-error mapping: success bodies become patches, 429
//! becomes the rate-limited error class, other failures become transient
//! enrichment errors.

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use prospecta_core::{
    retry::{classify, ErrorClass},
    EnrichmentRequest, Error, JobKind,
};
use prospecta_enrich::{ResearchClient, ResearchClientConfig};

fn request(kind: JobKind) -> EnrichmentRequest {
    EnrichmentRequest {
        item_id: prospecta_core::new_v7(),
        kind,
        payload: serde_json::json!({"company_name": "Initech"}),
    }
}

async fn client_for(server: &MockServer) -> ResearchClient {
    ResearchClient::new(ResearchClientConfig::new().with_base_url(server.uri()))
}

#[tokio::test]
async fn test_success_returns_patch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/enrich"))
        .and(body_partial_json(serde_json::json!({"kind": "research"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "research": {"funding": "Series B"},
            "category": "mid-market",
            "tags": ["saas", "b2b"],
            "summary": "Mid-market SaaS vendor"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let patch = client.enrich(&request(JobKind::Research)).await.unwrap();

    assert_eq!(patch.category.as_deref(), Some("mid-market"));
    assert_eq!(patch.summary.as_deref(), Some("Mid-market SaaS vendor"));
    assert_eq!(
        patch.tags,
        Some(vec!["saas".to_string(), "b2b".to_string()])
    );
    assert!(patch.research.is_some());
}

#[tokio::test]
async fn test_partial_body_leaves_absent_fields_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/enrich"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "summary": "Only a summary"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let patch = client.enrich(&request(JobKind::Preprocess)).await.unwrap();

    assert_eq!(patch.summary.as_deref(), Some("Only a summary"));
    assert!(patch.research.is_none());
    assert!(patch.category.is_none());
    assert!(patch.tags.is_none());
}

#[tokio::test]
async fn test_429_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/enrich"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .enrich(&request(JobKind::Research))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RateLimited(_)));
    assert_eq!(classify(&err), ErrorClass::RateLimited);
    assert!(err.to_string().contains("30"));
}

#[tokio::test]
async fn test_500_maps_to_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/enrich"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .enrich(&request(JobKind::Research))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Enrichment(_)));
    assert_eq!(classify(&err), ErrorClass::Transient);
}

#[tokio::test]
async fn test_api_key_sent_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/enrich"))
        .and(header("authorization", "Bearer sekrit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "summary": "ok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ResearchClient::new(
        ResearchClientConfig::new()
            .with_base_url(server.uri())
            .with_api_key("sekrit"),
    );
    client.enrich(&request(JobKind::Research)).await.unwrap();
}
