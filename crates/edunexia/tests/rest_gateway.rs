use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use edunexia::clock::FixedClock;
use edunexia::config::{GatewayConfig, SweepConfig};
use edunexia::gateway::query::timestamp;
use edunexia::gateway::{GatewayError, RestGateway};
use edunexia::workflows::cancellations::{
    CancellationReason, CancellationRepository, CancellationService, CancellationServiceError,
    CancellationStatus, CancellationSubmission, ErrorKind, RequestFilters,
};
use edunexia::workflows::cancellations::CancellationRequestId;
use edunexia::workflows::enrollments::{
    Enrollment, EnrollmentId, EnrollmentRepository, EnrollmentStatus,
};
use edunexia::workflows::RepositoryError;

const API_KEY: &str = "service-role-key";

fn gateway_for(server: &MockServer) -> RestGateway {
    RestGateway::new(&GatewayConfig {
        url: Some(format!("{}/", server.uri())),
        api_key: Some(API_KEY.to_string()),
        timeout: Duration::from_secs(5),
    })
    .expect("gateway client")
}

fn enrollment_row(id: Uuid, status: &str) -> Value {
    json!({
        "id": id,
        "aluno_id": Uuid::new_v4(),
        "curso_id": Uuid::new_v4(),
        "plano_pagamento_id": Uuid::new_v4(),
        "status": status,
        "data_inicio": "2025-02-03",
        "data_fim": null,
        "observacoes": null,
        "created_at": "2025-02-01T10:00:00Z",
        "updated_at": "2025-05-01T10:00:00Z"
    })
}

fn request_row(id: Uuid, enrollment_id: Uuid) -> Value {
    json!({
        "id": id,
        "matricula_id": enrollment_id,
        "aluno_id": Uuid::new_v4(),
        "motivo": "financeiro",
        "descricao": "Perdi o emprego",
        "status": "pendente",
        "data_solicitacao": "2025-09-10T09:30:00Z",
        "data_analise": null,
        "analisado_por": null,
        "observacoes_analise": null,
        "created_at": "2025-09-10T09:30:00Z",
        "updated_at": "2025-09-10T09:30:00Z",
        "matricula": {
            "id": enrollment_id,
            "status": "ativa",
            "aluno": { "nome": "Ana Souza" },
            "curso": { "nome": "Pedagogia" }
        }
    })
}

#[test]
fn gateway_requires_url() {
    let result = RestGateway::new(&GatewayConfig {
        url: None,
        api_key: None,
        timeout: Duration::from_secs(5),
    });

    assert!(matches!(result, Err(GatewayError::MissingUrl)));
}

#[tokio::test]
async fn fetch_sends_credentials_and_decodes_row() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/matriculas"))
        .and(query_param("id", format!("eq.{id}")))
        .and(header("apikey", API_KEY))
        .and(header("authorization", format!("Bearer {API_KEY}").as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([enrollment_row(id, "ativa")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let enrollment = EnrollmentRepository::fetch(&gateway, EnrollmentId(id))
        .await
        .expect("fetch succeeds")
        .expect("row present");

    assert_eq!(enrollment.id, EnrollmentId(id));
    assert_eq!(enrollment.status, EnrollmentStatus::Active);
}

#[tokio::test]
async fn empty_result_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/matriculas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let fetched = EnrollmentRepository::fetch(&gateway, EnrollmentId::generate())
        .await
        .expect("fetch succeeds");

    assert!(fetched.is_none());
}

#[tokio::test]
async fn delinquent_query_filters_status_and_cutoff() {
    let server = MockServer::start().await;
    let cutoff = Utc.with_ymd_and_hms(2025, 6, 17, 12, 0, 0).unwrap();
    Mock::given(method("GET"))
        .and(path("/matriculas"))
        .and(query_param("status", "eq.inadimplente"))
        .and(query_param("updated_at", format!("lt.{}", timestamp(cutoff))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            enrollment_row(Uuid::new_v4(), "inadimplente")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let rows = gateway.delinquent_before(cutoff).await.expect("query succeeds");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, EnrollmentStatus::Delinquent);
}

#[tokio::test]
async fn unique_violation_surfaces_as_pending_conflict() {
    let server = MockServer::start().await;
    let enrollment_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/matriculas"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([enrollment_row(enrollment_id, "ativa")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/solicitacoes_cancelamento"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({ "status": "pendente", "motivo": "financeiro" })))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Arc::new(gateway_for(&server));
    let service = CancellationService::new(
        gateway.clone(),
        gateway,
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 9, 15, 12, 0, 0).unwrap())),
        SweepConfig::default(),
    );

    let error = service
        .request(
            EnrollmentId(enrollment_id),
            CancellationSubmission {
                reason: CancellationReason::Financial,
                description: None,
            },
        )
        .await
        .expect_err("duplicate pending request");

    assert!(matches!(
        error,
        CancellationServiceError::PendingRequestExists(id) if id == EnrollmentId(enrollment_id)
    ));
}

#[tokio::test]
async fn listing_reads_exact_count_and_embedded_names() {
    let server = MockServer::start().await;
    let request_id = Uuid::new_v4();
    let enrollment_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/solicitacoes_cancelamento"))
        .and(header("prefer", "count=exact"))
        .and(query_param("status", "eq.pendente"))
        .and(query_param("order", "data_solicitacao.desc"))
        .and(query_param("offset", "20"))
        .and(query_param("limit", "10"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "20-20/21")
                .set_body_json(json!([request_row(request_id, enrollment_id)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Arc::new(gateway_for(&server));
    let service = CancellationService::new(
        gateway.clone(),
        gateway,
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 9, 15, 12, 0, 0).unwrap())),
        SweepConfig::default(),
    );

    let page = service
        .list(&RequestFilters {
            status: Some(CancellationStatus::Pending),
            page: Some(3),
            ..RequestFilters::default()
        })
        .await
        .expect("listing succeeds");

    assert_eq!(page.meta.total, 21);
    assert_eq!(page.meta.page, 3);
    assert_eq!(page.meta.page_count, 3);
    assert_eq!(page.data.len(), 1);
    let details = &page.data[0];
    assert_eq!(details.request.reason, CancellationReason::Financial);
    assert_eq!(details.enrollment.student_name.as_deref(), Some("Ana Souza"));
    assert_eq!(details.enrollment.course_name.as_deref(), Some("Pedagogia"));
    assert_eq!(details.enrollment.status, Some(EnrollmentStatus::Active));
}

#[tokio::test]
async fn server_errors_are_reported_as_gateway_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/solicitacoes_cancelamento"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let error = gateway
        .has_pending(EnrollmentId::generate())
        .await
        .expect_err("gateway down");
    match &error {
        RepositoryError::Unavailable(message) => assert!(message.contains("upstream down")),
        other => panic!("expected unavailable, got {other:?}"),
    }

    let gateway = Arc::new(gateway);
    let service = CancellationService::new(
        gateway.clone(),
        gateway,
        Arc::new(FixedClock(Utc::now())),
        SweepConfig::default(),
    );
    let error = service
        .get(CancellationRequestId::generate())
        .await
        .expect_err("gateway down");
    assert_eq!(error.kind(), ErrorKind::Gateway);
}

#[tokio::test]
async fn malformed_payload_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/solicitacoes_cancelamento"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let error = CancellationRepository::with_status(&gateway, CancellationStatus::Approved)
        .await
        .expect_err("not a row array");

    assert!(matches!(error, RepositoryError::Decode(_)));
}

#[tokio::test]
async fn conditional_update_filters_on_expected_status() {
    let server = MockServer::start().await;
    let moved_on = Uuid::new_v4();
    let still_delinquent = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path("/matriculas"))
        .and(query_param("id", format!("eq.{moved_on}")))
        .and(query_param("status", "eq.inadimplente"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/matriculas"))
        .and(query_param("id", format!("eq.{still_delinquent}")))
        .and(query_param("status", "eq.inadimplente"))
        .and(body_partial_json(json!({ "status": "cancelada" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([enrollment_row(still_delinquent, "cancelada")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let cancelled_row = |id| -> Enrollment {
        serde_json::from_value(enrollment_row(id, "cancelada")).expect("enrollment row")
    };

    let skipped = gateway
        .update_if_status(cancelled_row(moved_on), EnrollmentStatus::Delinquent)
        .await
        .expect("patch succeeds");
    assert!(skipped.is_none());

    let written = gateway
        .update_if_status(cancelled_row(still_delinquent), EnrollmentStatus::Delinquent)
        .await
        .expect("patch succeeds")
        .expect("row updated");
    assert_eq!(written.status, EnrollmentStatus::Cancelled);
}

#[tokio::test]
async fn delete_reports_missing_rows() {
    let server = MockServer::start().await;
    let present = Uuid::new_v4();
    Mock::given(method("DELETE"))
        .and(path("/solicitacoes_cancelamento"))
        .and(query_param("id", format!("eq.{present}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([request_row(present, Uuid::new_v4())])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/solicitacoes_cancelamento"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    gateway
        .delete(CancellationRequestId(present))
        .await
        .expect("row removed");
    let missing = gateway
        .delete(CancellationRequestId::generate())
        .await
        .expect_err("nothing to remove");
    assert!(matches!(missing, RepositoryError::NotFound));
}
