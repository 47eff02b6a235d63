use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{BackendError, CreateAttempt, ExamBackend, StatusUpdate};
use crate::core::config::Settings;
use crate::core::time::format_offset;
use crate::model::{
    Answer, AnswerPayload, Attempt, AttemptStatus, Evaluation, Identity, IntegrityEventKind,
    Question, StudentRef,
};

/// `ExamBackend` over the hosted platform's HTTP surface: PostgREST-style
/// table endpoints under `/rest/v1`, the auth user endpoint under
/// `/auth/v1`, and serverless functions under `/functions/v1`. Row-level
/// security on the other side scopes every query to the signed-in student.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    anon_key: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

/// Wire shape of the answers table: one nullable column per payload shape,
/// exactly one of them set per row.
#[derive(Debug, Serialize, Deserialize)]
struct AnswerRow {
    attempt_id: Uuid,
    question_id: Uuid,
    answer_text: Option<String>,
    answer_options: Option<Vec<Uuid>>,
    answer_json: Option<Value>,
}

impl AnswerRow {
    fn from_payload(attempt_id: Uuid, question_id: Uuid, payload: &AnswerPayload) -> Self {
        let mut row = Self {
            attempt_id,
            question_id,
            answer_text: None,
            answer_options: None,
            answer_json: None,
        };
        match payload {
            AnswerPayload::Text(text) => row.answer_text = Some(text.clone()),
            AnswerPayload::Options(ids) => row.answer_options = Some(ids.clone()),
            AnswerPayload::Game(value) => row.answer_json = Some(value.clone()),
        }
        row
    }

    fn into_answer(self) -> Option<Answer> {
        let payload = if let Some(text) = self.answer_text {
            AnswerPayload::Text(text)
        } else if let Some(options) = self.answer_options {
            AnswerPayload::Options(options)
        } else if let Some(value) = self.answer_json {
            AnswerPayload::Game(value)
        } else {
            return None;
        };
        Some(Answer { attempt_id: self.attempt_id, question_id: self.question_id, payload })
    }
}

impl HttpBackend {
    pub fn from_settings(settings: &Settings, access_token: impl Into<String>) -> Result<Self> {
        let timeout = Duration::from_secs(settings.backend().request_timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.backend().base_url.trim_end_matches('/').to_string(),
            anon_key: settings.backend().anon_key.clone(),
            access_token: access_token.into(),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn function_url(&self, name: &str) -> String {
        format!("{}/functions/v1/{name}", self.base_url)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", &self.anon_key).bearer_auth(&self.access_token)
    }

    async fn check(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(map_error(status, detail))
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, BackendError> {
        let response =
            self.authed(self.client.get(self.rest_url(table)).query(query)).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}

fn map_error(status: StatusCode, detail: String) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized,
        StatusCode::NOT_FOUND => BackendError::NotFound(detail),
        StatusCode::CONFLICT => BackendError::Conflict(detail),
        _ => BackendError::Remote { status: status.as_u16(), detail },
    }
}

/// A conditional PATCH that matched no row comes back as an empty
/// representation; that is the lost-the-race signal, not an error.
fn update_outcome<T>(rows: &[T]) -> StatusUpdate {
    if rows.is_empty() {
        StatusUpdate::Conflict
    } else {
        StatusUpdate::Applied
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl ExamBackend for HttpBackend {
    async fn current_identity(&self) -> Result<Option<Identity>, BackendError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self.authed(self.client.get(url)).send().await?;
        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        let user: AuthUser = response.json().await?;
        Ok(Some(Identity { user_id: user.id, email: user.email }))
    }

    async fn resolve_student(&self, user_id: Uuid) -> Result<Option<StudentRef>, BackendError> {
        let rows: Vec<StudentRef> = self
            .fetch_rows(
                "students",
                &[
                    ("select", "id,full_name".to_string()),
                    ("user_id", format!("eq.{user_id}")),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn get_evaluation(
        &self,
        evaluation_id: Uuid,
    ) -> Result<Option<Evaluation>, BackendError> {
        let rows: Vec<Evaluation> = self
            .fetch_rows(
                "evaluations",
                &[("id", format!("eq.{evaluation_id}")), ("limit", "1".to_string())],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_active_attempt(
        &self,
        student_id: Uuid,
        evaluation_id: Uuid,
    ) -> Result<Option<Attempt>, BackendError> {
        let rows: Vec<Attempt> = self
            .fetch_rows(
                "attempts",
                &[
                    ("student_id", format!("eq.{student_id}")),
                    ("evaluation_id", format!("eq.{evaluation_id}")),
                    ("status", "eq.in_progress".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_latest_attempt(
        &self,
        student_id: Uuid,
        evaluation_id: Uuid,
    ) -> Result<Option<Attempt>, BackendError> {
        let rows: Vec<Attempt> = self
            .fetch_rows(
                "attempts",
                &[
                    ("student_id", format!("eq.{student_id}")),
                    ("evaluation_id", format!("eq.{evaluation_id}")),
                    ("order", "started_at.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn create_attempt(&self, params: CreateAttempt) -> Result<Attempt, BackendError> {
        let body = serde_json::json!({
            "student_id": params.student_id,
            "evaluation_id": params.evaluation_id,
            "status": AttemptStatus::InProgress,
            "option_order": params.option_order,
        });
        let response = self
            .authed(self.client.post(self.rest_url("attempts")))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let mut rows: Vec<Attempt> = response.json().await?;
        rows.pop().ok_or_else(|| BackendError::Decode("attempt insert returned no row".into()))
    }

    async fn list_questions(&self, evaluation_id: Uuid) -> Result<Vec<Question>, BackendError> {
        self.fetch_rows(
            "questions",
            &[
                ("select", "*,options(*)".to_string()),
                ("evaluation_id", format!("eq.{evaluation_id}")),
                ("order", "position.asc".to_string()),
            ],
        )
        .await
    }

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>, BackendError> {
        let rows: Vec<AnswerRow> =
            self.fetch_rows("answers", &[("attempt_id", format!("eq.{attempt_id}"))]).await?;
        Ok(rows.into_iter().filter_map(AnswerRow::into_answer).collect())
    }

    async fn upsert_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        payload: &AnswerPayload,
    ) -> Result<(), BackendError> {
        let row = AnswerRow::from_payload(attempt_id, question_id, payload);
        let response = self
            .authed(
                self.client
                    .post(self.rest_url("answers"))
                    .query(&[("on_conflict", "attempt_id,question_id")]),
            )
            .header("Prefer", "resolution=merge-duplicates")
            .json(&row)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Conditional update: the `status=eq.in_progress` filter makes the
    /// PATCH a no-op when the attempt already left `in_progress`, and the
    /// empty representation is the conflict signal.
    async fn update_attempt_status(
        &self,
        attempt_id: Uuid,
        status: AttemptStatus,
        ended_at: Option<OffsetDateTime>,
    ) -> Result<StatusUpdate, BackendError> {
        let body = serde_json::json!({
            "status": status,
            "ended_at": ended_at.map(format_offset),
        });
        let response = self
            .authed(
                self.client
                    .patch(self.rest_url("attempts"))
                    .query(&[("id", format!("eq.{attempt_id}")), ("status", "eq.in_progress".to_string())]),
            )
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let rows: Vec<Attempt> = response.json().await?;
        Ok(update_outcome(&rows))
    }

    async fn trigger_auto_grading(&self, attempt_id: Uuid) -> Result<(), BackendError> {
        let response = self
            .authed(self.client.post(self.function_url("grade-attempt")))
            .json(&serde_json::json!({ "attempt_id": attempt_id }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn log_integrity_event(
        &self,
        attempt_id: Uuid,
        kind: IntegrityEventKind,
    ) -> Result<(), BackendError> {
        let response = self
            .authed(self.client.post(self.function_url("log-integrity-event")))
            .json(&serde_json::json!({ "attempt_id": attempt_id, "event_type": kind.as_str() }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
