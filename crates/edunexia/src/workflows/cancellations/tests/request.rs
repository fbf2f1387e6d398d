use std::sync::Arc;

use chrono::NaiveDate;

use super::common::*;
use crate::store::InMemoryStore;
use crate::workflows::cancellations::domain::{
    CancellationReason, CancellationStatus, CancellationSubmission, RequestFilters,
};
use crate::workflows::cancellations::{CancellationServiceError, ErrorKind};
use crate::workflows::enrollments::{EnrollmentId, EnrollmentStatus};

#[tokio::test]
async fn active_enrollment_gets_pending_request_stamped_now() {
    let (service, store, record) = seeded(EnrollmentStatus::Active, days_ago(3));

    let request = service
        .request(record.id, submission())
        .await
        .expect("request accepted");

    assert_eq!(request.status, CancellationStatus::Pending);
    assert_eq!(request.requested_at, now());
    assert_eq!(request.enrollment_id, record.id);
    assert_eq!(request.student_id, record.student_id);
    assert_eq!(request.reason, CancellationReason::Financial);
    assert!(request.reviewed_at.is_none());
    assert!(request.reviewed_by.is_none());
    assert_eq!(store.requests_for(record.id), vec![request]);
}

#[tokio::test]
async fn delinquent_enrollment_may_request_cancellation() {
    let (service, _store, record) = seeded(EnrollmentStatus::Delinquent, days_ago(10));

    let request = service
        .request(record.id, submission())
        .await
        .expect("delinquent enrollments are eligible");

    assert_eq!(request.status, CancellationStatus::Pending);
}

#[tokio::test]
async fn ineligible_statuses_are_rejected_without_inserting() {
    for status in EnrollmentStatus::ALL {
        if status.accepts_cancellation_request() {
            continue;
        }

        let (service, store, record) = seeded(status, days_ago(1));
        let error = service
            .request(record.id, submission())
            .await
            .expect_err("status is not eligible");
        assert!(
            matches!(
                error,
                CancellationServiceError::EnrollmentNotEligible { status: rejected, .. }
                    if rejected == status
            ),
            "unexpected error for {status}: {error:?}"
        );
        assert_eq!(error.kind(), ErrorKind::InvalidState);
        assert_eq!(store.request_count(), 0, "no row for {status}");
    }
}

#[tokio::test]
async fn missing_enrollment_is_not_found() {
    let (service, store) = build_service();
    let missing = EnrollmentId::generate();

    match service.request(missing, submission()).await {
        Err(CancellationServiceError::EnrollmentNotFound(id)) => assert_eq!(id, missing),
        other => panic!("expected not found, got {other:?}"),
    }
    assert_eq!(store.request_count(), 0);
}

#[tokio::test]
async fn second_pending_request_conflicts() {
    let (service, store, record) = seeded(EnrollmentStatus::Active, days_ago(1));
    service
        .request(record.id, submission())
        .await
        .expect("first request");

    let second = CancellationSubmission {
        reason: CancellationReason::Other,
        description: None,
    };
    match service.request(record.id, second).await {
        Err(CancellationServiceError::PendingRequestExists(id)) => assert_eq!(id, record.id),
        other => panic!("expected pending conflict, got {other:?}"),
    }
    assert_eq!(store.request_count(), 1);
}

#[tokio::test]
async fn gateway_failures_are_wrapped_with_cause() {
    let service = service_over(
        Arc::new(UnavailableEnrollments),
        Arc::new(InMemoryStore::new()),
    );

    let error = service
        .request(EnrollmentId::generate(), submission())
        .await
        .expect_err("gateway offline");

    assert_eq!(error.kind(), ErrorKind::Gateway);
    let source = std::error::Error::source(&error)
        .map(ToString::to_string)
        .unwrap_or_default();
    assert!(
        error.to_string().contains("database offline") || source.contains("database offline"),
        "cause should be preserved: {error}"
    );
}

#[tokio::test]
async fn listing_filters_orders_and_paginates() {
    let (service, store) = build_service();
    store
        .register_course(
            crate::workflows::enrollments::CourseId(uuid::Uuid::nil()),
            "Gestão Escolar",
        )
        .expect("register course");

    let mut expected_order = Vec::new();
    for offset in 0..5 {
        let mut record = enrollment(EnrollmentStatus::Active, days_ago(1));
        record.course_id = crate::workflows::enrollments::CourseId(uuid::Uuid::nil());
        store
            .seed_enrollments([record.clone()])
            .expect("seed enrollment");
        let request = pending_request(&record, days_ago(offset));
        store.seed_request(request.clone()).expect("seed request");
        expected_order.push(request.id);
    }

    let first_page = service
        .list(&RequestFilters {
            status: Some(CancellationStatus::Pending),
            per_page: Some(2),
            ..RequestFilters::default()
        })
        .await
        .expect("list succeeds");

    assert_eq!(first_page.meta.total, 5);
    assert_eq!(first_page.meta.page, 1);
    assert_eq!(first_page.meta.per_page, 2);
    assert_eq!(first_page.meta.page_count, 3);
    let ids: Vec<_> = first_page.data.iter().map(|item| item.request.id).collect();
    assert_eq!(ids, expected_order[..2].to_vec());
    assert_eq!(
        first_page.data[0].enrollment.course_name.as_deref(),
        Some("Gestão Escolar")
    );

    let last_page = service
        .list(&RequestFilters {
            page: Some(3),
            per_page: Some(2),
            ..RequestFilters::default()
        })
        .await
        .expect("list succeeds");
    assert_eq!(last_page.data.len(), 1);
    assert_eq!(last_page.data[0].request.id, expected_order[4]);

    let approved_only = service
        .list(&RequestFilters {
            status: Some(CancellationStatus::Approved),
            ..RequestFilters::default()
        })
        .await
        .expect("list succeeds");
    assert_eq!(approved_only.meta.total, 0);
    assert!(approved_only.data.is_empty());
}

#[tokio::test]
async fn listing_date_range_is_inclusive_of_both_days() {
    let (service, store) = build_service();
    let inside_early = now().date_naive() - chrono::Duration::days(2);
    let inside_late = now().date_naive();

    for days in [0, 2, 3] {
        let record = enrollment(EnrollmentStatus::Active, days_ago(1));
        store
            .seed_enrollments([record.clone()])
            .expect("seed enrollment");
        store
            .seed_request(pending_request(&record, days_ago(days)))
            .expect("seed request");
    }

    let page = service
        .list(&RequestFilters {
            date_from: Some(inside_early),
            date_to: Some(inside_late),
            ..RequestFilters::default()
        })
        .await
        .expect("list succeeds");

    assert_eq!(page.meta.total, 2);
    assert!(page.data.iter().all(|item| {
        let day: NaiveDate = item.request.requested_at.date_naive();
        day >= inside_early && day <= inside_late
    }));
}

#[tokio::test]
async fn get_returns_joined_details_or_not_found() {
    let (service, store, record) = seeded(EnrollmentStatus::Active, days_ago(1));
    store
        .register_student(record.student_id, "Ana Souza")
        .expect("register student");
    let request = service
        .request(record.id, submission())
        .await
        .expect("request accepted");

    let details = service.get(request.id).await.expect("details");
    assert_eq!(details.request, request);
    assert_eq!(details.enrollment.enrollment_id, Some(record.id));
    assert_eq!(details.enrollment.status, Some(EnrollmentStatus::Active));
    assert_eq!(details.enrollment.student_name.as_deref(), Some("Ana Souza"));

    let missing = crate::workflows::cancellations::CancellationRequestId::generate();
    match service.get(missing).await {
        Err(CancellationServiceError::NotFound(id)) => assert_eq!(id, missing),
        other => panic!("expected not found, got {other:?}"),
    }
}
