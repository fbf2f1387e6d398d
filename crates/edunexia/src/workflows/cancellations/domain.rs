use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflows::enrollments::{EnrollmentId, EnrollmentSnapshot, StudentId};

/// Reviewer identity recorded on automatically resolved requests.
pub const SYSTEM_REVIEWER: &str = "system";

/// Identifier wrapper for cancellation requests (`solicitacoes_cancelamento.id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CancellationRequestId(pub Uuid);

impl CancellationRequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CancellationRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of whoever resolves a request, taken from the authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewerId(pub String);

impl ReviewerId {
    pub fn system() -> Self {
        Self(SYSTEM_REVIEWER.to_string())
    }
}

impl fmt::Display for ReviewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancellationReason {
    #[serde(rename = "financeiro")]
    Financial,
    #[serde(rename = "insatisfacao_curso")]
    CourseDissatisfaction,
    #[serde(rename = "insatisfacao_atendimento")]
    ServiceDissatisfaction,
    #[serde(rename = "transferencia_instituicao")]
    InstitutionTransfer,
    #[serde(rename = "problemas_pessoais")]
    PersonalProblems,
    #[serde(rename = "mudanca_cidade")]
    Relocation,
    #[serde(rename = "outros")]
    Other,
}

impl CancellationReason {
    pub const ALL: [CancellationReason; 7] = [
        CancellationReason::Financial,
        CancellationReason::CourseDissatisfaction,
        CancellationReason::ServiceDissatisfaction,
        CancellationReason::InstitutionTransfer,
        CancellationReason::PersonalProblems,
        CancellationReason::Relocation,
        CancellationReason::Other,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            CancellationReason::Financial => "financeiro",
            CancellationReason::CourseDissatisfaction => "insatisfacao_curso",
            CancellationReason::ServiceDissatisfaction => "insatisfacao_atendimento",
            CancellationReason::InstitutionTransfer => "transferencia_instituicao",
            CancellationReason::PersonalProblems => "problemas_pessoais",
            CancellationReason::Relocation => "mudanca_cidade",
            CancellationReason::Other => "outros",
        }
    }

    /// Human readable text used in enrollment notes.
    pub const fn description(self) -> &'static str {
        match self {
            CancellationReason::Financial => "Financeiro",
            CancellationReason::CourseDissatisfaction => "Insatisfação com o curso",
            CancellationReason::ServiceDissatisfaction => "Insatisfação com o atendimento",
            CancellationReason::InstitutionTransfer => "Transferência para outra instituição",
            CancellationReason::PersonalProblems => "Problemas pessoais",
            CancellationReason::Relocation => "Mudança de cidade",
            CancellationReason::Other => "Outros",
        }
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Review state of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancellationStatus {
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "aprovada")]
    Approved,
    #[serde(rename = "negada")]
    Denied,
    #[serde(rename = "expirada")]
    Expired,
}

impl CancellationStatus {
    pub const ALL: [CancellationStatus; 4] = [
        CancellationStatus::Pending,
        CancellationStatus::Approved,
        CancellationStatus::Denied,
        CancellationStatus::Expired,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            CancellationStatus::Pending => "pendente",
            CancellationStatus::Approved => "aprovada",
            CancellationStatus::Denied => "negada",
            CancellationStatus::Expired => "expirada",
        }
    }

    /// Statuses a reviewer may hand down.
    pub const fn is_decision(self) -> bool {
        matches!(self, CancellationStatus::Approved | CancellationStatus::Denied)
    }
}

impl fmt::Display for CancellationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cancellation status '{0}'")]
pub struct UnknownCancellationStatus(pub String);

impl FromStr for CancellationStatus {
    type Err = UnknownCancellationStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        CancellationStatus::ALL
            .into_iter()
            .find(|status| status.label() == trimmed)
            .ok_or_else(|| UnknownCancellationStatus(trimmed.to_string()))
    }
}

/// A request to terminate an enrollment, subject to review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRequest {
    pub id: CancellationRequestId,
    #[serde(rename = "matricula_id")]
    pub enrollment_id: EnrollmentId,
    #[serde(rename = "aluno_id")]
    pub student_id: StudentId,
    #[serde(rename = "motivo")]
    pub reason: CancellationReason,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    pub status: CancellationStatus,
    #[serde(rename = "data_solicitacao")]
    pub requested_at: DateTime<Utc>,
    #[serde(rename = "data_analise", default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(rename = "analisado_por", default)]
    pub reviewed_by: Option<ReviewerId>,
    #[serde(rename = "observacoes_analise", default)]
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CancellationRequest {
    pub fn is_pending(&self) -> bool {
        self.status == CancellationStatus::Pending
    }

    /// Note appended to the enrollment when this request is approved.
    pub fn approval_note(&self) -> String {
        let mut note = format!(
            "Cancelamento aprovado via solicitação {}. Motivo: {}",
            self.id,
            self.reason.description()
        );
        if let Some(description) = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
        {
            note.push_str(&format!(" ({description})"));
        }
        if let Some(review) = self
            .review_notes
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
        {
            note.push_str(&format!(". Observações da análise: {review}"));
        }
        note
    }
}

/// Request row joined with the enrollment, student, and course display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRequestDetails {
    #[serde(flatten)]
    pub request: CancellationRequest,
    #[serde(rename = "matricula")]
    pub enrollment: EnrollmentSnapshot,
}

/// Payload of a student or operator asking to cancel an enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationSubmission {
    #[serde(rename = "motivo")]
    pub reason: CancellationReason,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
}

/// Reviewer verdict on a pending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub status: CancellationStatus,
    #[serde(rename = "observacoes", default)]
    pub notes: Option<String>,
}

/// Filters accepted by the request listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFilters {
    #[serde(default)]
    pub status: Option<CancellationStatus>,
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl RequestFilters {
    pub const DEFAULT_PER_PAGE: u32 = 10;
    pub const MAX_PER_PAGE: u32 = 100;

    /// Resolve the filters into the bounds and window handed to the repository.
    pub fn to_query(&self) -> RequestQuery {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(Self::DEFAULT_PER_PAGE)
            .clamp(1, Self::MAX_PER_PAGE);

        RequestQuery {
            status: self.status,
            requested_from: self.date_from.and_then(start_of_day),
            requested_before: self
                .date_to
                .and_then(|date| date.succ_opt())
                .and_then(start_of_day),
            offset: u64::from(page - 1) * u64::from(per_page),
            limit: per_page,
            page,
        }
    }
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

/// Repository-level listing query: inclusive lower bound, exclusive upper bound,
/// ordered by request time descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestQuery {
    pub status: Option<CancellationStatus>,
    pub requested_from: Option<DateTime<Utc>>,
    pub requested_before: Option<DateTime<Utc>>,
    pub offset: u64,
    pub limit: u32,
    pub page: u32,
}

impl RequestQuery {
    pub fn matches(&self, request: &CancellationRequest) -> bool {
        self.status.map_or(true, |status| request.status == status)
            && self
                .requested_from
                .map_or(true, |from| request.requested_at >= from)
            && self
                .requested_before
                .map_or(true, |before| request.requested_at < before)
    }
}

/// One page of results with the paging metadata the dashboards render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub page_count: u64,
}

impl PageMeta {
    pub fn new(total: u64, page: u32, per_page: u32) -> Self {
        let per_page_wide = u64::from(per_page.max(1));
        Self {
            total,
            page,
            per_page,
            page_count: total.div_ceil(per_page_wide),
        }
    }
}

/// Outcome of one automatic delinquency sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub cutoff: DateTime<Utc>,
    pub threshold_days: i64,
    pub candidates: usize,
    /// Number of enrollments cancelled by this run.
    pub cancelled: usize,
    pub skipped: Vec<EnrollmentId>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub(crate) fn new(cutoff: DateTime<Utc>, threshold_days: i64) -> Self {
        Self {
            cutoff,
            threshold_days,
            candidates: 0,
            cancelled: 0,
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub enrollment_id: EnrollmentId,
    pub error: String,
}
