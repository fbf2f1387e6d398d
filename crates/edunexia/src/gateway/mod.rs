//! Adapter for the hosted relational gateway (PostgREST dialect).
//!
//! Both repository traits are implemented on [`RestGateway`]. The pending-request
//! uniqueness the cancellation workflow depends on is expected as a partial unique
//! index on `solicitacoes_cancelamento (matricula_id) where status = 'pendente'`,
//! which PostgREST reports as `409 Conflict`. Conditional enrollment updates add a
//! `status=eq.<expected>` filter to the PATCH, so an empty representation means the row
//! had already moved on.

pub mod query;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::workflows::cancellations::{
    CancellationRepository, CancellationRequest, CancellationRequestDetails,
    CancellationRequestId, CancellationStatus, RequestQuery,
};
use crate::workflows::enrollments::{
    Enrollment, EnrollmentId, EnrollmentRepository, EnrollmentSnapshot, EnrollmentStatus,
};
use crate::workflows::repository::RepositoryError;
use query::{content_range_total, timestamp, Filter};

const ENROLLMENTS: &str = "matriculas";
const CANCELLATION_REQUESTS: &str = "solicitacoes_cancelamento";
const REQUEST_DETAILS_SELECT: &str =
    "*,matricula:matriculas(id,status,aluno:alunos(nome),curso:cursos(nome))";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("GATEWAY_URL is not configured")]
    MissingUrl,
    #[error("GATEWAY_API_KEY is not a valid header value")]
    InvalidApiKey,
    #[error("could not build gateway client: {0}")]
    Client(#[from] reqwest::Error),
}

/// HTTP client for the `matriculas` and `solicitacoes_cancelamento` relations.
#[derive(Debug, Clone)]
pub struct RestGateway {
    client: Client,
    base_url: String,
}

impl RestGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let base_url = config.url.clone().ok_or(GatewayError::MissingUrl)?;

        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let api_key = HeaderValue::from_str(key).map_err(|_| GatewayError::InvalidApiKey)?;
            let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| GatewayError::InvalidApiKey)?;
            headers.insert("apikey", api_key);
            headers.insert(AUTHORIZATION, bearer);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("edunexia/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: Filter,
    ) -> Result<Vec<T>, RepositoryError> {
        debug!(table, params = ?filter.params(), "gateway select");
        let request = self.client.get(self.url(table)).query(filter.params());
        let response = send(request).await?;
        decode(response).await
    }

    async fn select_counted<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: Filter,
    ) -> Result<(Vec<T>, u64), RepositoryError> {
        debug!(table, params = ?filter.params(), "gateway counted select");
        let request = self
            .client
            .get(self.url(table))
            .header("Prefer", "count=exact")
            .query(filter.params());
        let response = send(request).await?;
        let total = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(content_range_total);
        let rows: Vec<T> = decode(response).await?;
        let total = total.unwrap_or(rows.len() as u64);
        Ok((rows, total))
    }

    async fn insert_row<T, R>(&self, table: &str, row: &T) -> Result<R, RepositoryError>
    where
        T: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = self
            .client
            .post(self.url(table))
            .header("Prefer", "return=representation")
            .json(row);
        let response = send(request).await?;
        first_row(decode(response).await?)
    }

    /// PATCH every row matching `filter`; the updated rows come back.
    async fn update_rows<T, R>(
        &self,
        table: &str,
        filter: Filter,
        row: &T,
    ) -> Result<Vec<R>, RepositoryError>
    where
        T: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = self
            .client
            .patch(self.url(table))
            .header("Prefer", "return=representation")
            .query(filter.params())
            .json(row);
        let response = send(request).await?;
        decode(response).await
    }

    async fn delete_row(
        &self,
        table: &str,
        id: impl std::fmt::Display,
    ) -> Result<(), RepositoryError> {
        let filter = Filter::new().eq("id", id);
        let request = self
            .client
            .delete(self.url(table))
            .header("Prefer", "return=representation")
            .query(filter.params());
        let response = send(request).await?;
        let removed: Vec<serde_json::Value> = decode(response).await?;
        first_row(removed).map(|_| ())
    }
}

async fn send(request: RequestBuilder) -> Result<reqwest::Response, RepositoryError> {
    let response = request
        .send()
        .await
        .map_err(|err| RepositoryError::Unavailable(err.to_string()))?;

    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::CONFLICT => Err(RepositoryError::Conflict),
        StatusCode::NOT_FOUND => Err(RepositoryError::NotFound),
        status => {
            let body = response.text().await.unwrap_or_default();
            Err(RepositoryError::Unavailable(format!("{status}: {body}")))
        }
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RepositoryError> {
    response
        .json::<T>()
        .await
        .map_err(|err| RepositoryError::Decode(err.to_string()))
}

fn first_row<R>(rows: Vec<R>) -> Result<R, RepositoryError> {
    rows.into_iter().next().ok_or(RepositoryError::NotFound)
}

#[derive(Debug, Deserialize)]
struct NamedRow {
    nome: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedEnrollment {
    id: Option<EnrollmentId>,
    status: Option<EnrollmentStatus>,
    aluno: Option<NamedRow>,
    curso: Option<NamedRow>,
}

#[derive(Debug, Deserialize)]
struct RequestDetailsRow {
    #[serde(flatten)]
    request: CancellationRequest,
    matricula: Option<EmbeddedEnrollment>,
}

impl From<RequestDetailsRow> for CancellationRequestDetails {
    fn from(row: RequestDetailsRow) -> Self {
        let enrollment = row
            .matricula
            .map(|embedded| EnrollmentSnapshot {
                enrollment_id: embedded.id,
                status: embedded.status,
                student_name: embedded.aluno.and_then(|aluno| aluno.nome),
                course_name: embedded.curso.and_then(|curso| curso.nome),
            })
            .unwrap_or_default();

        Self {
            request: row.request,
            enrollment,
        }
    }
}

#[async_trait]
impl EnrollmentRepository for RestGateway {
    async fn insert(&self, record: Enrollment) -> Result<Enrollment, RepositoryError> {
        self.insert_row(ENROLLMENTS, &record).await
    }

    async fn update(&self, record: Enrollment) -> Result<Enrollment, RepositoryError> {
        let filter = Filter::new().eq("id", record.id);
        first_row(self.update_rows(ENROLLMENTS, filter, &record).await?)
    }

    async fn update_if_status(
        &self,
        record: Enrollment,
        expected: EnrollmentStatus,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let filter = Filter::new().eq("id", record.id).eq("status", expected);
        let rows: Vec<Enrollment> = self.update_rows(ENROLLMENTS, filter, &record).await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        let rows: Vec<Enrollment> = self
            .select(ENROLLMENTS, Filter::new().select("*").eq("id", id))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list(
        &self,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        let mut filter = Filter::new().select("*");
        if let Some(status) = status {
            filter = filter.eq("status", status);
        }
        self.select(ENROLLMENTS, filter.order_desc("created_at")).await
    }

    async fn delinquent_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        let filter = Filter::new()
            .select("*")
            .eq("status", EnrollmentStatus::Delinquent)
            .lt("updated_at", timestamp(cutoff));
        self.select(ENROLLMENTS, filter).await
    }
}

#[async_trait]
impl CancellationRepository for RestGateway {
    async fn insert(
        &self,
        record: CancellationRequest,
    ) -> Result<CancellationRequest, RepositoryError> {
        self.insert_row(CANCELLATION_REQUESTS, &record).await
    }

    async fn update(
        &self,
        record: CancellationRequest,
    ) -> Result<CancellationRequest, RepositoryError> {
        let filter = Filter::new().eq("id", record.id);
        first_row(self.update_rows(CANCELLATION_REQUESTS, filter, &record).await?)
    }

    async fn delete(&self, id: CancellationRequestId) -> Result<(), RepositoryError> {
        self.delete_row(CANCELLATION_REQUESTS, id).await
    }

    async fn fetch(
        &self,
        id: CancellationRequestId,
    ) -> Result<Option<CancellationRequest>, RepositoryError> {
        let rows: Vec<CancellationRequest> = self
            .select(CANCELLATION_REQUESTS, Filter::new().select("*").eq("id", id))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_details(
        &self,
        id: CancellationRequestId,
    ) -> Result<Option<CancellationRequestDetails>, RepositoryError> {
        let filter = Filter::new().select(REQUEST_DETAILS_SELECT).eq("id", id);
        let rows: Vec<RequestDetailsRow> = self.select(CANCELLATION_REQUESTS, filter).await?;
        Ok(rows.into_iter().next().map(Into::into))
    }

    async fn list(
        &self,
        query: &RequestQuery,
    ) -> Result<(Vec<CancellationRequestDetails>, u64), RepositoryError> {
        let mut filter = Filter::new().select(REQUEST_DETAILS_SELECT);
        if let Some(status) = query.status {
            filter = filter.eq("status", status);
        }
        if let Some(from) = query.requested_from {
            filter = filter.gte("data_solicitacao", timestamp(from));
        }
        if let Some(before) = query.requested_before {
            filter = filter.lt("data_solicitacao", timestamp(before));
        }
        let filter = filter
            .order_desc("data_solicitacao")
            .window(query.offset, query.limit);

        let (rows, total) = self
            .select_counted::<RequestDetailsRow>(CANCELLATION_REQUESTS, filter)
            .await?;
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn has_pending(&self, enrollment_id: EnrollmentId) -> Result<bool, RepositoryError> {
        let filter = Filter::new()
            .select("id")
            .eq("matricula_id", enrollment_id)
            .eq("status", CancellationStatus::Pending)
            .window(0, 1);
        let rows: Vec<serde_json::Value> = self.select(CANCELLATION_REQUESTS, filter).await?;
        Ok(!rows.is_empty())
    }

    async fn with_status(
        &self,
        status: CancellationStatus,
    ) -> Result<Vec<CancellationRequest>, RepositoryError> {
        let filter = Filter::new()
            .select("*")
            .eq("status", status)
            .order_desc("data_solicitacao");
        self.select(CANCELLATION_REQUESTS, filter).await
    }
}
