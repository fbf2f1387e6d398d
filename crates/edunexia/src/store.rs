//! Process-local store used when no gateway is configured, by the CLI demo, and by tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::workflows::cancellations::{
    CancellationRepository, CancellationRequest, CancellationRequestDetails,
    CancellationRequestId, CancellationStatus, RequestQuery,
};
use crate::workflows::enrollments::{
    CourseId, Enrollment, EnrollmentId, EnrollmentRepository, EnrollmentSnapshot,
    EnrollmentStatus, StudentId,
};
use crate::workflows::repository::RepositoryError;

#[derive(Debug, Default)]
struct Tables {
    enrollments: HashMap<EnrollmentId, Enrollment>,
    requests: HashMap<CancellationRequestId, CancellationRequest>,
    students: HashMap<StudentId, String>,
    courses: HashMap<CourseId, String>,
}

impl Tables {
    fn snapshot(&self, enrollment_id: EnrollmentId) -> EnrollmentSnapshot {
        match self.enrollments.get(&enrollment_id) {
            Some(enrollment) => EnrollmentSnapshot {
                enrollment_id: Some(enrollment.id),
                status: Some(enrollment.status),
                student_name: self.students.get(&enrollment.student_id).cloned(),
                course_name: self.courses.get(&enrollment.course_id).cloned(),
            },
            None => EnrollmentSnapshot::default(),
        }
    }

    fn details(&self, request: &CancellationRequest) -> CancellationRequestDetails {
        CancellationRequestDetails {
            request: request.clone(),
            enrollment: self.snapshot(request.enrollment_id),
        }
    }

    fn pending_conflict(&self, record: &CancellationRequest) -> bool {
        record.is_pending()
            && self.requests.values().any(|existing| {
                existing.id != record.id
                    && existing.enrollment_id == record.enrollment_id
                    && existing.is_pending()
            })
    }
}

/// Both repository traits over shared in-process tables, including the
/// one-pending-request-per-enrollment constraint.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
    }

    /// Load rows as-is, keeping their timestamps.
    pub fn seed_enrollments<I>(&self, enrollments: I) -> Result<usize, RepositoryError>
    where
        I: IntoIterator<Item = Enrollment>,
    {
        let mut tables = self.tables()?;
        let mut loaded = 0;
        for enrollment in enrollments {
            tables.enrollments.insert(enrollment.id, enrollment);
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn seed_request(&self, request: CancellationRequest) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if tables.pending_conflict(&request) {
            return Err(RepositoryError::Conflict);
        }
        tables.requests.insert(request.id, request);
        Ok(())
    }

    pub fn register_student(&self, id: StudentId, name: &str) -> Result<(), RepositoryError> {
        self.tables()?.students.insert(id, name.to_string());
        Ok(())
    }

    pub fn register_course(&self, id: CourseId, name: &str) -> Result<(), RepositoryError> {
        self.tables()?.courses.insert(id, name.to_string());
        Ok(())
    }

    pub fn enrollment(&self, id: EnrollmentId) -> Option<Enrollment> {
        self.tables().ok()?.enrollments.get(&id).cloned()
    }

    /// Requests recorded for an enrollment, oldest first.
    pub fn requests_for(&self, enrollment_id: EnrollmentId) -> Vec<CancellationRequest> {
        let Ok(tables) = self.tables() else {
            return Vec::new();
        };
        let mut requests: Vec<_> = tables
            .requests
            .values()
            .filter(|request| request.enrollment_id == enrollment_id)
            .cloned()
            .collect();
        requests.sort_by_key(|request| request.requested_at);
        requests
    }

    pub fn request_count(&self) -> usize {
        self.tables().map(|tables| tables.requests.len()).unwrap_or(0)
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryStore {
    async fn insert(&self, record: Enrollment) -> Result<Enrollment, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.enrollments.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.enrollments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, record: Enrollment) -> Result<Enrollment, RepositoryError> {
        let mut tables = self.tables()?;
        match tables.enrollments.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(record)
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn update_if_status(
        &self,
        record: Enrollment,
        expected: EnrollmentStatus,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let mut tables = self.tables()?;
        match tables.enrollments.get_mut(&record.id) {
            Some(existing) if existing.status == expected => {
                *existing = record.clone();
                Ok(Some(record))
            }
            Some(_) => Ok(None),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn fetch(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(self.tables()?.enrollments.get(&id).cloned())
    }

    async fn list(
        &self,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        let tables = self.tables()?;
        let mut enrollments: Vec<_> = tables
            .enrollments
            .values()
            .filter(|enrollment| status.map_or(true, |status| enrollment.status == status))
            .cloned()
            .collect();
        enrollments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(enrollments)
    }

    async fn delinquent_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .enrollments
            .values()
            .filter(|enrollment| enrollment.is_stale_delinquent(cutoff))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CancellationRepository for InMemoryStore {
    async fn insert(
        &self,
        record: CancellationRequest,
    ) -> Result<CancellationRequest, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.requests.contains_key(&record.id) || tables.pending_conflict(&record) {
            return Err(RepositoryError::Conflict);
        }
        tables.requests.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        record: CancellationRequest,
    ) -> Result<CancellationRequest, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.requests.contains_key(&record.id) {
            return Err(RepositoryError::NotFound);
        }
        if tables.pending_conflict(&record) {
            return Err(RepositoryError::Conflict);
        }
        tables.requests.insert(record.id, record.clone());
        Ok(record)
    }

    async fn fetch(
        &self,
        id: CancellationRequestId,
    ) -> Result<Option<CancellationRequest>, RepositoryError> {
        Ok(self.tables()?.requests.get(&id).cloned())
    }

    async fn fetch_details(
        &self,
        id: CancellationRequestId,
    ) -> Result<Option<CancellationRequestDetails>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.requests.get(&id).map(|request| tables.details(request)))
    }

    async fn list(
        &self,
        query: &RequestQuery,
    ) -> Result<(Vec<CancellationRequestDetails>, u64), RepositoryError> {
        let tables = self.tables()?;
        let mut matching: Vec<&CancellationRequest> = tables
            .requests
            .values()
            .filter(|request| query.matches(request))
            .collect();
        matching.sort_by(|a, b| {
            b.requested_at
                .cmp(&a.requested_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let page = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .map(|request| tables.details(request))
            .collect();
        Ok((page, total))
    }

    async fn delete(&self, id: CancellationRequestId) -> Result<(), RepositoryError> {
        self.tables()?
            .requests
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn has_pending(&self, enrollment_id: EnrollmentId) -> Result<bool, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .requests
            .values()
            .any(|request| request.enrollment_id == enrollment_id && request.is_pending()))
    }

    async fn with_status(
        &self,
        status: CancellationStatus,
    ) -> Result<Vec<CancellationRequest>, RepositoryError> {
        let tables = self.tables()?;
        let mut requests: Vec<_> = tables
            .requests
            .values()
            .filter(|request| request.status == status)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }
}
