//! HTTP client for the answering service (`POST /api/chat`).

use async_trait::async_trait;
use client_core::error::AppError;
use client_core::http::{build_client, decode_json, endpoint, parse_base_url, ServiceError};
use client_core::observability::TracedClientExt;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::metrics::record_call_duration;
use super::AnswerService;
use crate::config::ServiceSettings;
use crate::models::{Answer, Question, SourceRef};

#[derive(Serialize)]
struct AskRequest<'a> {
    question: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct AskResponse {
    answer: String,
    #[serde(default)]
    sources: Vec<SourceExcerpt>,
}

#[derive(Deserialize)]
struct SourceExcerpt {
    text: String,
    page: u32,
    relevance: f32,
}

impl From<SourceExcerpt> for SourceRef {
    fn from(source: SourceExcerpt) -> Self {
        Self {
            excerpt: source.text,
            page: source.page,
            relevance_score: source.relevance,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpAnswerService {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpAnswerService {
    pub fn new(settings: &ServiceSettings) -> Result<Self, AppError> {
        let client = build_client(settings.connect_timeout(), settings.request_timeout())?;
        Self::with_client(client, &settings.base_url, settings.answer_timeout())
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            timeout,
        })
    }
}

#[async_trait]
impl AnswerService for HttpAnswerService {
    #[tracing::instrument(skip(self, question), fields(scoped = question.document_id.is_some()))]
    async fn ask(&self, question: &Question) -> Result<Answer, ServiceError> {
        let url = endpoint(&self.base_url, &["api", "chat"])?;
        let body = AskRequest {
            question: &question.text,
            document_id: question.document_id.as_deref(),
        };

        let started = Instant::now();
        let result: Result<AskResponse, ServiceError> = async {
            let response = self
                .client
                .traced_post(url.as_str())
                .json(&body)
                .timeout(self.timeout)
                .send_with_request_id(&Uuid::new_v4().to_string())
                .await?;
            decode_json::<AskResponse>(response).await
        }
        .await;
        record_call_duration("ask", result.is_ok(), started.elapsed());

        let response = result.map_err(|e| {
            tracing::error!(error = %e, "Answering service call failed");
            e
        })?;

        Ok(Answer {
            text: response.answer,
            sources: response.sources.into_iter().map(SourceRef::from).collect(),
        })
    }
}
