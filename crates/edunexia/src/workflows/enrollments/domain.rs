use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for enrollments (`matriculas.id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrollmentId(pub Uuid);

impl EnrollmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentPlanId(pub Uuid);

/// Lifecycle status of an enrollment, serialized with the gateway's wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "ativa")]
    Active,
    #[serde(rename = "cancelada")]
    Cancelled,
    #[serde(rename = "trancada")]
    Suspended,
    #[serde(rename = "concluida")]
    Completed,
    #[serde(rename = "em_processo")]
    InProgress,
    #[serde(rename = "inadimplente")]
    Delinquent,
    #[serde(rename = "reativada")]
    Reactivated,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 8] = [
        EnrollmentStatus::Pending,
        EnrollmentStatus::Active,
        EnrollmentStatus::Cancelled,
        EnrollmentStatus::Suspended,
        EnrollmentStatus::Completed,
        EnrollmentStatus::InProgress,
        EnrollmentStatus::Delinquent,
        EnrollmentStatus::Reactivated,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pendente",
            EnrollmentStatus::Active => "ativa",
            EnrollmentStatus::Cancelled => "cancelada",
            EnrollmentStatus::Suspended => "trancada",
            EnrollmentStatus::Completed => "concluida",
            EnrollmentStatus::InProgress => "em_processo",
            EnrollmentStatus::Delinquent => "inadimplente",
            EnrollmentStatus::Reactivated => "reativada",
        }
    }

    /// Cancelled and completed enrollments never move to another status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, EnrollmentStatus::Cancelled | EnrollmentStatus::Completed)
    }

    /// Only active or delinquent enrollments may originate a cancellation request.
    pub const fn accepts_cancellation_request(self) -> bool {
        matches!(self, EnrollmentStatus::Active | EnrollmentStatus::Delinquent)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown enrollment status '{0}'")]
pub struct UnknownEnrollmentStatus(pub String);

impl FromStr for EnrollmentStatus {
    type Err = UnknownEnrollmentStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        EnrollmentStatus::ALL
            .into_iter()
            .find(|status| status.label() == trimmed)
            .ok_or_else(|| UnknownEnrollmentStatus(trimmed.to_string()))
    }
}

/// A student's enrollment in a course offering under a payment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    #[serde(rename = "aluno_id")]
    pub student_id: StudentId,
    #[serde(rename = "curso_id")]
    pub course_id: CourseId,
    #[serde(rename = "plano_pagamento_id")]
    pub payment_plan_id: PaymentPlanId,
    pub status: EnrollmentStatus,
    #[serde(rename = "data_inicio")]
    pub start_date: NaiveDate,
    #[serde(rename = "data_fim", default)]
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "observacoes", default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// Append a note on a new line, or set it when the field is empty.
    pub fn append_note(&mut self, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }

        self.notes = Some(match self.notes.take().filter(|text| !text.trim().is_empty()) {
            Some(existing) => format!("{existing}\n{note}"),
            None => note.to_string(),
        });
    }

    /// Whether the enrollment has been delinquent since strictly before `cutoff`.
    pub fn is_stale_delinquent(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == EnrollmentStatus::Delinquent && self.updated_at < cutoff
    }
}

/// Payload accepted when an enrollment is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEnrollment {
    #[serde(rename = "aluno_id")]
    pub student_id: StudentId,
    #[serde(rename = "curso_id")]
    pub course_id: CourseId,
    #[serde(rename = "plano_pagamento_id")]
    pub payment_plan_id: PaymentPlanId,
    #[serde(default)]
    pub status: Option<EnrollmentStatus>,
    #[serde(rename = "data_inicio")]
    pub start_date: NaiveDate,
    #[serde(rename = "data_fim", default)]
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "observacoes", default)]
    pub notes: Option<String>,
}

/// Display fields joined from the student and course relations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnrollmentSnapshot {
    pub enrollment_id: Option<EnrollmentId>,
    pub status: Option<EnrollmentStatus>,
    pub student_name: Option<String>,
    pub course_name: Option<String>,
}
