use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::core::config::Settings;
use crate::db::models::OcrText;
use crate::services::collaborators::OcrEngine;

#[derive(Debug, Clone)]
pub(crate) struct DatalabOcrService {
    client: Client,
    api_key: String,
    base_url: String,
    mode: String,
    output_format: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

#[derive(Debug, Clone)]
struct MarkerJobRef {
    request_id: String,
    request_check_url: String,
}

impl DatalabOcrService {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.datalab().timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(timeout)
            .build()
            .context("Failed to build DataLab HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.datalab().api_key.clone(),
            base_url: settings.datalab().base_url.trim_end_matches('/').to_string(),
            mode: settings.datalab().mode.clone(),
            output_format: settings.datalab().output_format.clone(),
            poll_interval: Duration::from_secs(settings.datalab().poll_interval_seconds),
            max_poll_attempts: settings.datalab().max_poll_attempts,
        })
    }

    /// Remote references are passed through as `file_url`; anything else is
    /// read from the local filesystem and uploaded.
    async fn build_form(&self, file_ref: &str, mime_type: &str) -> Result<Form> {
        let form = Form::new()
            .text("mode", self.mode.clone())
            .text("output_format", self.output_format.clone());

        if file_ref.starts_with("http://") || file_ref.starts_with("https://") {
            return Ok(form.text("file_url", file_ref.to_string()));
        }

        let bytes = tokio::fs::read(file_ref)
            .await
            .with_context(|| format!("Failed to read worksheet file {file_ref}"))?;
        let file_name = Path::new(file_ref)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("worksheet")
            .to_string();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_type)
            .with_context(|| format!("Invalid MIME type {mime_type}"))?;

        Ok(form.part("file", part))
    }

    async fn submit_marker_job(&self, form: Form) -> Result<MarkerJobRef> {
        let endpoint = format!("{}/marker", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to call DataLab marker API")?;

        let status = response.status();
        let raw_body = response.text().await.context("Failed to read DataLab marker response")?;
        let parsed = serde_json::from_str::<Value>(&raw_body).map_err(|err| {
            anyhow::anyhow!(
                "DataLab marker returned non-JSON body (status {}): {}: {}",
                status,
                err,
                raw_body
            )
        })?;

        if !status.is_success() {
            anyhow::bail!(
                "DataLab marker submit failed (status {}): {}",
                status,
                extract_error_message(&parsed)
            );
        }
        if parsed.get("success").and_then(Value::as_bool).is_some_and(|value| !value) {
            anyhow::bail!(
                "DataLab marker submit returned success=false: {}",
                extract_error_message(&parsed)
            );
        }

        extract_marker_job_ref(&self.base_url, &parsed)
            .context("DataLab marker submit response missing request reference")
    }

    async fn poll_marker_result(&self, job_ref: &MarkerJobRef) -> Result<OcrText> {
        for attempt in 0..self.max_poll_attempts {
            let response = self
                .client
                .get(&job_ref.request_check_url)
                .header("X-Api-Key", &self.api_key)
                .send()
                .await
                .context("Failed to call DataLab marker result endpoint")?;

            let status_code = response.status();
            let raw_body = response.text().await.context("Failed to read DataLab poll response")?;
            let parsed: Value = serde_json::from_str(&raw_body).map_err(|err| {
                anyhow::anyhow!(
                    "DataLab poll returned non-JSON body (status {}): {}: {}",
                    status_code,
                    err,
                    raw_body
                )
            })?;

            if !status_code.is_success() {
                anyhow::bail!(
                    "DataLab poll failed (status {}): {}",
                    status_code,
                    extract_error_message(&parsed)
                );
            }

            let status = parsed
                .get("status")
                .and_then(Value::as_str)
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or_else(|| "unknown".to_string());

            if status == "complete" || status == "completed" {
                return ocr_text_from_payload(&parsed).with_context(|| {
                    format!("DataLab OCR job {} returned no text", job_ref.request_id)
                });
            }

            if status == "failed" || status == "error" {
                anyhow::bail!(
                    "DataLab OCR job {} failed: {}",
                    job_ref.request_id,
                    extract_error_message(&parsed)
                );
            }

            if parsed.get("success").and_then(Value::as_bool).is_some_and(|value| !value) {
                anyhow::bail!(
                    "DataLab OCR job {} returned success=false: {}",
                    job_ref.request_id,
                    extract_error_message(&parsed)
                );
            }

            if attempt + 1 >= self.max_poll_attempts {
                break;
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        Err(anyhow::anyhow!(
            "DataLab OCR polling timed out for request {} after {} attempts",
            job_ref.request_id,
            self.max_poll_attempts
        ))
    }
}

#[async_trait]
impl OcrEngine for DatalabOcrService {
    async fn extract(&self, file_ref: &str, mime_type: &str) -> Result<OcrText> {
        let form = self.build_form(file_ref, mime_type).await?;
        let job_ref = self.submit_marker_job(form).await?;
        tracing::debug!(request_id = %job_ref.request_id, "DataLab OCR job submitted");
        self.poll_marker_result(&job_ref).await
    }
}

fn extract_marker_job_ref(base_url: &str, payload: &Value) -> Option<MarkerJobRef> {
    let request_check_url = extract_request_check_url(base_url, payload);
    let request_id = extract_request_id(payload).or_else(|| {
        request_check_url
            .clone()
            .and_then(|url| url.trim_end_matches('/').rsplit('/').next().map(ToString::to_string))
    })?;

    let request_check_url =
        request_check_url.unwrap_or_else(|| format!("{}/marker/{}", base_url, request_id));

    Some(MarkerJobRef { request_id, request_check_url })
}

fn extract_request_check_url(base_url: &str, payload: &Value) -> Option<String> {
    let raw = payload.get("request_check_url").and_then(Value::as_str)?;
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw.to_string());
    }
    let normalized_base = format!("{}/", base_url.trim_end_matches('/'));
    reqwest::Url::parse(&normalized_base)
        .ok()
        .and_then(|base| base.join(raw).ok())
        .map(|url| url.to_string())
}

fn extract_request_id(payload: &Value) -> Option<String> {
    payload
        .get("request_id")
        .or_else(|| payload.get("request_check_id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn ocr_text_from_payload(payload: &Value) -> Option<OcrText> {
    let container = payload.get("result").unwrap_or(payload);
    let lookup = |key: &str| {
        container
            .get(key)
            .and_then(Value::as_str)
            .or_else(|| payload.get(key).and_then(Value::as_str))
            .map(str::to_string)
    };

    let text = lookup("markdown").or_else(|| lookup("text"))?;
    if text.trim().is_empty() {
        return None;
    }

    let confidence = container
        .get("confidence")
        .or_else(|| payload.get("confidence"))
        .and_then(Value::as_f64);

    Some(OcrText { text, confidence, model: lookup("model") })
}

fn extract_error_message(payload: &Value) -> String {
    if let Some(detail) = payload.get("detail") {
        if let Some(text) = detail.as_str() {
            return text.to_string();
        }
        if let Some(items) = detail.as_array() {
            let joined = items
                .iter()
                .filter_map(|item| {
                    item.get("msg")
                        .and_then(Value::as_str)
                        .or_else(|| item.get("message").and_then(Value::as_str))
                })
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return joined;
            }
        }
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .unwrap_or("unknown_error")
        .to_string()
}
