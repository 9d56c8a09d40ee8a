use std::time::Duration;

use reelagents::api::{ApiClient, CheckoutSessionRequest};
use reelagents::error::ClientError;
use reelagents::models::{
    CompanyId, CreateDigitalTwinRequest, JobStatus, NewDigitalTwin, Role,
};
use reelagents::session_store::SessionStore;
use serde_json::json;
use url::Url;
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

mod test_utils;
use test_utils::signed_in;

fn anonymous_client(server: &MockServer) -> ApiClient {
    ApiClient::new(
        &Url::parse(&server.uri()).unwrap(),
        SessionStore::new(),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn authenticated_requests_carry_bearer_token() {
    let server = MockServer::start().await;
    let company_id = CompanyId(Uuid::new_v4());
    let signed_in = signed_in(&server, Role::Company, Some(company_id)).await;

    Mock::given(method("POST"))
        .and(path("/api/digital-twins/create"))
        .and(header("authorization", format!("Bearer {}", signed_in.token).as_str()))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "name": "Ava",
            "training_data_url": "s3://bucket/ava.zip",
            "company_id": company_id,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "J1",
            "digital_twin_id": "tw-1",
            "execution_arn": "arn:aws:states:execution",
            "status": "started",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = signed_in
        .context
        .api
        .create_digital_twin(&CreateDigitalTwinRequest {
            twin: NewDigitalTwin {
                name: "Ava".to_string(),
                description: None,
                training_data_url: "s3://bucket/ava.zip".to_string(),
            },
            company_id,
        })
        .await
        .unwrap();

    assert_eq!(response.job_id, "J1");
    assert_eq!(response.digital_twin_id, "tw-1");
}

#[tokio::test]
async fn anonymous_requests_send_no_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/J9/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "running" })))
        .mount(&server)
        .await;

    let job = anonymous_client(&server).job_status("J9").await.unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.progress, 0);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn error_body_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stripe/create-checkout-session"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Agent not found" })),
        )
        .mount(&server)
        .await;

    let err = anonymous_client(&server)
        .create_checkout_session(&CheckoutSessionRequest {
            campaign_id: "c1".to_string(),
            agent_id: "a1".to_string(),
            amount: 5000,
        })
        .await
        .unwrap_err();

    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Agent not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn error_without_message_uses_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/campaigns"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = anonymous_client(&server)
        .list_campaigns(CompanyId(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Request failed");
}

#[tokio::test]
async fn lists_campaigns_for_company() {
    let server = MockServer::start().await;
    let company_id = CompanyId(Uuid::new_v4());
    Mock::given(method("GET"))
        .and(path("/api/campaigns"))
        .and(query_param("company_id", company_id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "campaigns": [{
                "id": "c1",
                "company_id": company_id,
                "name": "Launch",
                "description": null,
                "budget": 1200.0,
                "status": "active",
                "target_audience": null,
                "start_date": "2024-06-01",
                "end_date": null,
                "created_at": "2024-05-01T00:00:00Z",
                "updated_at": "2024-05-01T00:00:00Z"
            }],
            "count": 1
        })))
        .mount(&server)
        .await;

    let list = anonymous_client(&server)
        .list_campaigns(company_id)
        .await
        .unwrap();
    assert_eq!(list.count, 1);
    assert_eq!(list.campaigns[0].name, "Launch");
}

#[tokio::test]
async fn job_status_reports_completed_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/J1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "progress": 100,
            "result": { "model_endpoint": "https://models.test/ava" }
        })))
        .mount(&server)
        .await;

    let job = anonymous_client(&server).job_status("J1").await.unwrap();
    assert_eq!(job.job_id, "J1");
    assert!(job.status.is_terminal());
    assert_eq!(
        job.result,
        Some(json!({ "model_endpoint": "https://models.test/ava" }))
    );
}

#[tokio::test]
async fn fractional_progress_keeps_polling_job_alive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/J4/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "running", "progress": 42.5 })),
        )
        .mount(&server)
        .await;

    let job = anonymous_client(&server).job_status("J4").await.unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.progress, 43);
}

#[tokio::test]
async fn lists_certified_agents_for_campaign() {
    let server = MockServer::start().await;
    let signed_in = signed_in(&server, Role::Company, Some(CompanyId(Uuid::new_v4()))).await;

    Mock::given(method("GET"))
        .and(path("/api/campaigns/c1/certified-agents"))
        .and(header("authorization", format!("Bearer {}", signed_in.token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "agents": [{
                "id": "ag-1",
                "name": "Sam Rivera",
                "specialization": "Retail",
                "email": "sam@example.com",
                "certification_status": "certified",
                "rating": 4.8,
                "completed_campaigns": 12,
                "hourly_rate": 75
            }],
            "campaign_id": "c1",
            "count": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let list = signed_in
        .context
        .api
        .list_certified_agents("c1")
        .await
        .unwrap();
    assert_eq!(list.count, 1);
    assert_eq!(list.campaign_id, "c1");
    assert!(list.agents[0].is_certified());
    assert_eq!(list.agents[0].hourly_rate, Some(75.0));
}

#[tokio::test]
async fn certified_agents_need_a_campaign_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "agents": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let list = anonymous_client(&server)
        .list_certified_agents("  ")
        .await
        .unwrap();
    assert!(list.agents.is_empty());
    assert_eq!(list.count, 0);
}

#[tokio::test]
async fn certified_agents_rejection_uses_fetch_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/campaigns/missing/certified-agents"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Campaign not found" })),
        )
        .mount(&server)
        .await;

    let err = anonymous_client(&server)
        .list_certified_agents("missing")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 404, .. }));
    assert_eq!(err.user_message(), "Failed to fetch certified agents");
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let api = ApiClient::new(
        &Url::parse("http://127.0.0.1:9").unwrap(),
        SessionStore::new(),
        Duration::from_millis(500),
    )
    .unwrap();

    let err = api.job_status("J1").await.unwrap_err();
    assert!(err.is_network());
}
