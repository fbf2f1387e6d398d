
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use super::{CourseId, EnrollmentService, NewEnrollment, PaymentPlanId, StudentId};
use crate::clock::FixedClock;
use crate::store::InMemoryStore;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 15, 12, 0, 0).unwrap()
}

fn build_service() -> (EnrollmentService<InMemoryStore>, InMemoryStore) {
    let store = InMemoryStore::new();
    let service = EnrollmentService::new(Arc::new(store.clone()), Arc::new(FixedClock(now())));
    (service, store)
}

fn new_enrollment() -> NewEnrollment {
    NewEnrollment {
        student_id: StudentId(Uuid::new_v4()),
        course_id: CourseId(Uuid::new_v4()),
        payment_plan_id: PaymentPlanId(Uuid::new_v4()),
        status: None,
        start_date: NaiveDate::from_ymd_opt(2025, 8, 4).expect("valid date"),
        end_date: None,
        notes: None,
    }
}
