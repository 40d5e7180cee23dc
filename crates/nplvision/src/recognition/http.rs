//! HTTP implementations of the content store and recognition service.
//!
//! Content store: `PUT {endpoint}/{bucket}/{key}` with the PDF as body.
//! Recognition service: `POST {endpoint}/jobs` to start a job, then
//! `GET {endpoint}/jobs/{job_id}?next_token=...` for status and results.
//! Both send `Authorization: Bearer` when a token is configured.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::error::{RecognitionError, RemoteError, SubmissionError, TransferError};
use super::{ContentStore, JobId, RecognitionService, RemoteKey, ResultPage};
use crate::sanitize;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Uploads of large scans can take a while on slow links.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum length of a rejected response body kept in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn create_http_client() -> Result<Client, RemoteError> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| RemoteError::HttpClient(e.to_string()))
}

fn authorize(request: RequestBuilder, token: Option<&SecretString>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token.expose_secret()),
        None => request,
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

/// Connection failures and timeouts are worth retrying; a malformed request
/// or a body error is not.
fn transport(e: &reqwest::Error) -> (String, bool) {
    let transient = e.is_connect() || e.is_timeout();
    (e.to_string(), transient)
}

/// Returns the response on 2xx, otherwise `(status, truncated body)`.
async fn check_status(response: Response) -> Result<Response, (u16, String)> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err((status.as_u16(), truncate_body(&body)))
}

fn trim_endpoint(endpoint: &str) -> String {
    endpoint.trim_end_matches('/').to_string()
}

pub struct HttpContentStore {
    client: Client,
    endpoint: String,
    bucket: String,
    token: Option<SecretString>,
}

impl HttpContentStore {
    pub fn new(endpoint: &str, bucket: &str, token: Option<SecretString>) -> Result<Self, RemoteError> {
        Ok(Self {
            client: create_http_client()?,
            endpoint: trim_endpoint(endpoint),
            bucket: bucket.to_string(),
            token,
        })
    }

    pub fn object_url(&self, key: &RemoteKey) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn put(&self, local_path: &Path, key: &RemoteKey) -> Result<(), TransferError> {
        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| TransferError::ReadArtifact {
                path: local_path.to_path_buf(),
                source: e,
            })?;

        let url = self.object_url(key);
        debug!(
            "PUT {} ({} bytes) from {}",
            sanitize::redact_url(&url),
            body.len(),
            sanitize::redact_path(local_path)
        );

        let request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(body);

        let response = authorize(request, self.token.as_ref())
            .send()
            .await
            .map_err(|e| {
                let (message, transient) = transport(&e);
                TransferError::Transport { message, transient }
            })?;

        check_status(response)
            .await
            .map(|_| ())
            .map_err(|(status, message)| TransferError::Rejected { status, message })
    }
}

#[derive(Debug, Serialize)]
struct StartJobRequest<'a> {
    document: DocumentLocation<'a>,
}

#[derive(Debug, Serialize)]
struct DocumentLocation<'a> {
    bucket: &'a str,
    key: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartJobResponse {
    job_id: String,
}

pub struct HttpRecognitionService {
    client: Client,
    endpoint: String,
    bucket: String,
    token: Option<SecretString>,
}

impl HttpRecognitionService {
    /// `bucket` names where uploaded artifacts live, so the service can
    /// locate them from the key alone.
    pub fn new(endpoint: &str, bucket: &str, token: Option<SecretString>) -> Result<Self, RemoteError> {
        Ok(Self {
            client: create_http_client()?,
            endpoint: trim_endpoint(endpoint),
            bucket: bucket.to_string(),
            token,
        })
    }

    pub fn jobs_url(&self) -> String {
        format!("{}/jobs", self.endpoint)
    }

    pub fn job_url(&self, job_id: &JobId) -> String {
        format!("{}/jobs/{}", self.endpoint, job_id)
    }
}

#[async_trait]
impl RecognitionService for HttpRecognitionService {
    async fn start_text_detection(&self, key: &RemoteKey) -> Result<JobId, SubmissionError> {
        let payload = StartJobRequest {
            document: DocumentLocation {
                bucket: &self.bucket,
                key: key.as_str(),
            },
        };

        let request = self.client.post(self.jobs_url()).json(&payload);
        let response = authorize(request, self.token.as_ref())
            .send()
            .await
            .map_err(|e| {
                let (message, transient) = transport(&e);
                SubmissionError::Transport { message, transient }
            })?;

        let response = check_status(response)
            .await
            .map_err(|(status, message)| SubmissionError::Rejected { status, message })?;

        let started: StartJobResponse = response
            .json()
            .await
            .map_err(|e| SubmissionError::InvalidResponse(e.to_string()))?;

        if started.job_id.trim().is_empty() {
            return Err(SubmissionError::InvalidResponse(
                "empty job_id in response".to_string(),
            ));
        }

        Ok(JobId::new(started.job_id))
    }

    async fn get_text_detection(
        &self,
        job_id: &JobId,
        next_token: Option<&str>,
    ) -> Result<ResultPage, RecognitionError> {
        let mut request = self.client.get(self.job_url(job_id));
        if let Some(token) = next_token {
            request = request.query(&[("next_token", token)]);
        }

        let response = authorize(request, self.token.as_ref())
            .send()
            .await
            .map_err(|e| {
                let (message, transient) = transport(&e);
                RecognitionError::Transport { message, transient }
            })?;

        let response = check_status(response)
            .await
            .map_err(|(status, message)| RecognitionError::Rejected { status, message })?;

        response
            .json::<ResultPage>()
            .await
            .map_err(|e| RecognitionError::InvalidResponse(e.to_string()))
    }
}
