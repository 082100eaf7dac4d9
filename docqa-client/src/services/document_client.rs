//! HTTP client for the document store.
//!
//! Endpoints:
//! - `POST /api/upload-pdf` (multipart, field `file`)
//! - `GET /api/documents`
//! - `GET /api/insights/{document_id}`

use async_trait::async_trait;
use client_core::error::AppError;
use client_core::http::{build_client, decode_json, endpoint, parse_base_url, ServiceError};
use client_core::observability::TracedClientExt;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use std::time::Instant;
use uuid::Uuid;

use super::metrics::record_call_duration;
use super::DocumentStore;
use crate::config::ServiceSettings;
use crate::models::{DocumentSummary, FileRef, InsightBundle, UploadAck};

#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDocumentStore {
    pub fn new(settings: &ServiceSettings) -> Result<Self, AppError> {
        let client = build_client(settings.connect_timeout(), settings.request_timeout())?;
        Self::with_client(client, &settings.base_url)
    }

    /// Reuse an existing client, sharing its connection pool.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    #[tracing::instrument(skip(self, file), fields(file_name = %file.name(), size = file.size()))]
    async fn upload(&self, file: &FileRef) -> Result<UploadAck, ServiceError> {
        let url = endpoint(&self.base_url, &["api", "upload-pdf"])?;
        let part = Part::bytes(file.bytes().to_vec())
            .file_name(file.name().to_string())
            .mime_str(file.media_type())?;
        let form = Form::new().part("file", part);

        let started = Instant::now();
        let result: Result<UploadAck, ServiceError> = async {
            let response = self
                .client
                .traced_post(url.as_str())
                .multipart(form)
                .send_with_request_id(&Uuid::new_v4().to_string())
                .await?;
            decode_json::<UploadAck>(response).await
        }
        .await;
        record_call_duration("upload", result.is_ok(), started.elapsed());

        result.map_err(|e| {
            tracing::error!(error = %e, "Document upload failed");
            e
        })
    }

    #[tracing::instrument(skip(self))]
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, ServiceError> {
        let url = endpoint(&self.base_url, &["api", "documents"])?;

        let started = Instant::now();
        let result: Result<Vec<DocumentSummary>, ServiceError> = async {
            let response = self
                .client
                .traced_get(url.as_str())
                .send_with_request_id(&Uuid::new_v4().to_string())
                .await?;
            decode_json::<Vec<DocumentSummary>>(response).await
        }
        .await;
        record_call_duration("list_documents", result.is_ok(), started.elapsed());

        result
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_insights(&self, document_id: &str) -> Result<InsightBundle, ServiceError> {
        let url = endpoint(&self.base_url, &["api", "insights", document_id])?;

        let started = Instant::now();
        let result: Result<InsightBundle, ServiceError> = async {
            let response = self
                .client
                .traced_get(url.as_str())
                .send_with_request_id(&Uuid::new_v4().to_string())
                .await?;
            decode_json::<InsightBundle>(response).await
        }
        .await;
        record_call_duration("fetch_insights", result.is_ok(), started.elapsed());

        result
    }
}
