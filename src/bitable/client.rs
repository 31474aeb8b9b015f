//! Production [`TableStore`] backed by the bitable HTTP API.
//!
//! All calls go through one authenticated helper: exchange (or reuse) the
//! tenant token, issue the request, read the body as text, and interpret the
//! envelope. The service can fail two ways, a non-success HTTP status or
//! an HTTP 200 whose JSON envelope carries a non-zero `code`, and both are
//! surfaced as [`ContractError::Api`] with the status and body attached, so
//! the webhook's failure JSON always says which call broke and why.

use crate::bitable::token::{SystemClock, TokenCache};
use crate::bitable::{Fields, Media, Record, TableStore};
use crate::config::AppConfig;
use crate::error::ContractError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// HTTP client for the bitable service with an owned token cache.
pub struct BitableClient {
    http: reqwest::Client,
    api_base: String,
    app_id: String,
    app_secret: String,
    app_token: String,
    upload_parent_type: String,
    upload_parent_node: String,
    tokens: TokenCache<SystemClock>,
}

impl BitableClient {
    pub fn new(config: &AppConfig) -> Result<Self, ContractError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ContractError::Internal(format!("http client: {e}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            app_token: config.app_token.clone(),
            upload_parent_type: config.upload_parent_type.clone(),
            upload_parent_node: config.upload_parent_node().to_string(),
            tokens: TokenCache::new(SystemClock),
        })
    }

    /// Current tenant token, re-exchanged when missing or near expiry.
    async fn tenant_token(&self) -> Result<String, ContractError> {
        if let Some(token) = self.tokens.valid() {
            return Ok(token);
        }

        let url = format!("{}/auth/v3/tenant_access_token/internal", self.api_base);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "app_id": self.app_id, "app_secret": self.app_secret }))
            .send()
            .await
            .map_err(|e| api_transport_err("tenant_access_token", e))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let parsed = parse_body(&body);

        let token = parsed
            .get("tenant_access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());

        match token {
            Some(token) if status < 400 && envelope_code(&parsed) == 0 => {
                let expire = parsed.get("expire").and_then(Value::as_u64).unwrap_or(3600);
                self.tokens.store(token.to_string(), expire);
                debug!("tenant token refreshed, expires in {expire}s");
                Ok(token.to_string())
            }
            _ => Err(ContractError::Api {
                context: "tenant_access_token".into(),
                status,
                body,
            }),
        }
    }

    /// Authenticated JSON call returning the parsed envelope.
    async fn api_json(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ContractError> {
        let token = self.tenant_token().await?;
        let url = format!("{}{}", self.api_base, path);

        let mut req = self.http.request(method, &url).bearer_auth(&token);
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send().await.map_err(|e| api_transport_err(path, e))?;
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let parsed = parse_body(&text);

        if status >= 400 || envelope_code(&parsed) != 0 {
            return Err(ContractError::Api {
                context: path.to_string(),
                status,
                body: text,
            });
        }
        Ok(parsed)
    }
}

#[async_trait]
impl TableStore for BitableClient {
    async fn get_record(&self, table_id: &str, record_id: &str) -> Result<Record, ContractError> {
        let path = format!(
            "/bitable/v1/apps/{}/tables/{}/records/{}",
            self.app_token, table_id, record_id
        );
        let resp = self.api_json(reqwest::Method::GET, &path, None).await?;

        let fields: Fields = resp
            .pointer("/data/record/fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Ok(Record {
            record_id: record_id.to_string(),
            fields,
        })
    }

    async fn update_record(
        &self,
        table_id: &str,
        record_id: &str,
        fields: Value,
    ) -> Result<(), ContractError> {
        let path = format!(
            "/bitable/v1/apps/{}/tables/{}/records/{}",
            self.app_token, table_id, record_id
        );
        self.api_json(reqwest::Method::PUT, &path, Some(json!({ "fields": fields })))
            .await?;
        Ok(())
    }

    async fn download_media(&self, file_token: &str) -> Result<Media, ContractError> {
        let token = self.tenant_token().await?;
        let url = format!("{}/drive/v1/medias/{}/download", self.api_base, file_token);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ContractError::MediaDownload {
                status: 0,
                body: e.to_string(),
            })?;

        let status = resp.status().as_u16();
        if status >= 400 {
            let body = resp.text().await.unwrap_or_default();
            return Err(ContractError::MediaDownload { status, body });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ContractError::MediaDownload {
                status,
                body: e.to_string(),
            })?;

        Ok(Media {
            content_type,
            bytes: bytes.to_vec(),
        })
    }

    async fn upload_media(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ContractError> {
        let token = self.tenant_token().await?;
        let url = format!("{}/drive/v1/medias/upload_all", self.api_base);
        let size = bytes.len();

        let file_part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| ContractError::Internal(format!("multipart: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .text("file_name", file_name.to_string())
            .text("parent_type", self.upload_parent_type.clone())
            .text("parent_node", self.upload_parent_node.clone())
            .text("size", size.to_string())
            .part("file", file_part);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| api_transport_err("medias/upload_all", e))?;

        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let parsed = parse_body(&text);

        match parsed
            .pointer("/data/file_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
        {
            Some(file_token) if status < 400 => Ok(file_token.to_string()),
            _ => Err(ContractError::Upload {
                status,
                code: envelope_code(&parsed),
                msg: parsed
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                parent_type: self.upload_parent_type.clone(),
                parent_hint: parent_hint(&self.upload_parent_node),
            }),
        }
    }
}

/// Parse a response body as JSON, wrapping non-JSON text for diagnostics.
fn parse_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
}

/// The service's envelope `code`; 0 means success, absence counts as 0.
fn envelope_code(body: &Value) -> i64 {
    body.get("code").and_then(Value::as_i64).unwrap_or(0)
}

/// Truncate the parent node for error messages.
fn parent_hint(node: &str) -> String {
    node.chars().take(10).collect()
}

fn api_transport_err(context: &str, e: reqwest::Error) -> ContractError {
    ContractError::Api {
        context: context.to_string(),
        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
        body: e.to_string(),
    }
}
