use anyhow::{Context, Result};
use krishi_contracts::artifacts::ImageArtifact;
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::Client as HttpClient;

use crate::config::ClientConfig;

pub const PREDICT_PATH: &str = "/predict";
pub const UPLOAD_FIELD: &str = "file";

/// Raw answer from the diagnosis endpoint. Interpreting it is the
/// pipeline's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

impl TransportReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait DiagnosisTransport {
    fn endpoint(&self) -> &str;
    /// Sends one artifact. `Err` means no response arrived at all.
    fn predict(&self, artifact: &ImageArtifact) -> Result<TransportReply>;
}

pub struct HttpDiagnosisTransport {
    http: HttpClient,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpDiagnosisTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build diagnosis HTTP client")?;
        Ok(Self {
            http,
            endpoint: config.endpoint(PREDICT_PATH),
            bearer_token: config.bearer_token.clone(),
        })
    }
}

impl DiagnosisTransport for HttpDiagnosisTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn predict(&self, artifact: &ImageArtifact) -> Result<TransportReply> {
        let part = MultipartPart::bytes(artifact.bytes().to_vec())
            .file_name(artifact.file_name().to_string())
            .mime_str(artifact.mime().as_str())
            .with_context(|| format!("invalid upload content type {}", artifact.mime()))?;
        let form = MultipartForm::new().part(UPLOAD_FIELD, part);

        let mut request = self.http.post(&self.endpoint).multipart(form);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .with_context(|| format!("predict request failed ({})", self.endpoint))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .context("predict response body read failed")?;
        Ok(TransportReply { status, body })
    }
}
