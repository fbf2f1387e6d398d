use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use super::domain::{
    CourseId, Enrollment, EnrollmentId, EnrollmentStatus, PaymentPlanId, StudentId,
};

#[derive(Debug)]
pub enum EnrollmentImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, message: String },
}

impl std::fmt::Display for EnrollmentImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrollmentImportError::Io(err) => {
                write!(f, "failed to read enrollment export: {}", err)
            }
            EnrollmentImportError::Csv(err) => write!(f, "invalid enrollment CSV data: {}", err),
            EnrollmentImportError::InvalidRow { line, message } => {
                write!(f, "enrollment export line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for EnrollmentImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnrollmentImportError::Io(err) => Some(err),
            EnrollmentImportError::Csv(err) => Some(err),
            EnrollmentImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for EnrollmentImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for EnrollmentImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Loads a `matriculas` CSV export, used to seed the in-memory store.
pub struct EnrollmentCsvImporter;

impl EnrollmentCsvImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        imported_at: DateTime<Utc>,
    ) -> Result<Vec<Enrollment>, EnrollmentImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, imported_at)
    }

    /// Rows without an id get a fresh one; missing timestamps default to `imported_at`.
    pub fn from_reader<R: Read>(
        reader: R,
        imported_at: DateTime<Utc>,
    ) -> Result<Vec<Enrollment>, EnrollmentImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut enrollments = Vec::new();

        for (index, row) in csv_reader.deserialize::<EnrollmentRow>().enumerate() {
            // header is line 1
            let line = index as u64 + 2;
            let row = row?;
            let enrollment = row
                .into_enrollment(imported_at)
                .map_err(|message| EnrollmentImportError::InvalidRow { line, message })?;
            enrollments.push(enrollment);
        }

        Ok(enrollments)
    }
}

#[derive(Debug, Deserialize)]
struct EnrollmentRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    id: Option<String>,
    aluno_id: String,
    curso_id: String,
    plano_pagamento_id: String,
    status: String,
    data_inicio: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    data_fim: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    observacoes: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    created_at: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    updated_at: Option<String>,
}

impl EnrollmentRow {
    fn into_enrollment(self, imported_at: DateTime<Utc>) -> Result<Enrollment, String> {
        let id = match self.id.as_deref() {
            Some(raw) => EnrollmentId(parse_uuid("id", raw)?),
            None => EnrollmentId::generate(),
        };
        let status = self
            .status
            .parse::<EnrollmentStatus>()
            .map_err(|err| err.to_string())?;
        let created_at = self
            .created_at
            .as_deref()
            .map(|raw| parse_timestamp("created_at", raw))
            .transpose()?
            .unwrap_or(imported_at);
        let updated_at = self
            .updated_at
            .as_deref()
            .map(|raw| parse_timestamp("updated_at", raw))
            .transpose()?
            .unwrap_or(created_at);

        Ok(Enrollment {
            id,
            student_id: StudentId(parse_uuid("aluno_id", &self.aluno_id)?),
            course_id: CourseId(parse_uuid("curso_id", &self.curso_id)?),
            payment_plan_id: PaymentPlanId(parse_uuid(
                "plano_pagamento_id",
                &self.plano_pagamento_id,
            )?),
            status,
            start_date: parse_date("data_inicio", &self.data_inicio)?,
            end_date: self
                .data_fim
                .as_deref()
                .map(|raw| parse_date("data_fim", raw))
                .transpose()?,
            notes: self.observacoes,
            created_at,
            updated_at,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|raw| !raw.trim().is_empty()))
}

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|err| format!("{field} is not a uuid ({err})"))
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("{field} must be YYYY-MM-DD ({err})"))
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    parse_date(field, raw)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("{field} must be RFC 3339 or YYYY-MM-DD"))
}
