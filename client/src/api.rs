//! Remote valuation API client.
//!
//! Only the endpoints the sync flows need:
//! - `GET /valuation/{id}/export` returns a payload, with its version token
//!   in the `ETag` header
//! - `POST /import` writes inputs, conditionally when `If-Match` is sent,
//!   answering `412` when the server's version moved on
//! - `GET /companies` lists companies for selection
//! - `GET /runs?limit=N` lists recent valuation runs

use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::header::{ETAG, IF_MATCH};
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use valsync_engine::{ImportRequest, ValuationPayload};

const MAX_LOG_BODY_CHARS: usize = 512;

/// Operations the sync controller needs from the platform.
#[async_trait]
pub trait ValuationApi: Send + Sync {
    /// Fetch a valuation with its version token.
    async fn export(&self, id: &str) -> Result<ValuationPayload, ApiError>;

    /// Write inputs. With `if_match`, the write only succeeds if the server
    /// is still at that version.
    async fn import(&self, request: &ImportRequest, if_match: Option<&str>)
        -> Result<(), ApiError>;

    /// Company names available to the user.
    async fn companies(&self) -> Result<Vec<String>, ApiError>;

    /// Most recent valuation runs, newest first.
    async fn runs(&self, limit: usize) -> Result<Vec<RunSummary>, ApiError>;
}

/// One row of the recent-runs listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub enterprise_value: Option<f64>,
}

/// Error body shape used by the platform.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// HTTP implementation of [`ValuationApi`].
#[derive(Debug, Clone)]
pub struct HttpValuationApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpValuationApi {
    /// Create a client for `base_url` (e.g. `http://localhost:8000/api/excel`).
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(classify)?;
        Self::check(response).await
    }

    /// Turn a non-2xx response into an error, keeping the server's detail.
    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            tracing::debug!("API response status: {}", status);
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let mut preview: String = body.chars().take(MAX_LOG_BODY_CHARS).collect();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        tracing::debug!("API response error ({}): {}", status, preview);

        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.detail)
            .map(|detail| match detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        Err(ApiError::from_status(status.as_u16(), message))
    }
}

#[async_trait]
impl ValuationApi for HttpValuationApi {
    async fn export(&self, id: &str) -> Result<ValuationPayload, ApiError> {
        let url = self.url(&format!("/valuation/{}/export", urlencode(id)));
        let response = Self::send(self.authorize(self.client.get(&url))).await?;

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let mut payload =
            ValuationPayload::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;

        match etag {
            Some(etag) => payload.etag = Some(etag),
            None => tracing::warn!(
                valuation_id = %id,
                "Export carried no ETag; later writes will be unconditional"
            ),
        }

        Ok(payload)
    }

    async fn import(
        &self,
        request: &ImportRequest,
        if_match: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut builder = self.authorize(self.client.post(self.url("/import"))).json(request);
        if let Some(etag) = if_match {
            builder = builder.header(IF_MATCH, etag);
        }

        Self::send(builder).await?;
        Ok(())
    }

    async fn companies(&self) -> Result<Vec<String>, ApiError> {
        let request = self.authorize(self.client.get(self.url("/companies")));
        let response = Self::send(request).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn runs(&self, limit: usize) -> Result<Vec<RunSummary>, ApiError> {
        let request = self
            .authorize(self.client.get(self.url("/runs")))
            .query(&[("limit", limit)]);
        let response = Self::send(request).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Connection failures and timeouts mean the platform could not be reached.
fn classify(err: reqwest::Error) -> ApiError {
    if err.is_connect() || err.is_timeout() {
        ApiError::Unreachable(err.to_string())
    } else {
        ApiError::Transport(err)
    }
}

/// Percent-encode a path segment.
fn urlencode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let api = HttpValuationApi::new(
            "http://localhost:8000/api/excel/",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(api.base_url(), "http://localhost:8000/api/excel");
        assert_eq!(api.url("/import"), "http://localhost:8000/api/excel/import");
    }

    #[test]
    fn encodes_path_segments() {
        assert_eq!(urlencode("550e8400-e29b"), "550e8400-e29b");
        assert_eq!(urlencode("a/b c"), "a%2Fb%20c");
    }
}
