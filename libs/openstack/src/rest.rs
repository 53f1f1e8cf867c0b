//! Shared REST plumbing for the service clients.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;

/// Header carrying the Keystone token on every request.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Thin JSON REST client bound to one service endpoint.
///
/// Each service API (compute, network, block storage, image) owns one of
/// these, pointed at the endpoint the service catalog advertised for it.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestClient {
    /// Create a client for `base_url`, sending `token` on every request.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTH_TOKEN_HEADER,
            HeaderValue::from_str(token)
                .map_err(|_| ApiError::Auth("token is not a valid header value".into()))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET a JSON document.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!(path, "GET");
        let response = self.client.get(self.url(path)).send().await?;
        Self::decode(path, response).await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(path, "POST");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::decode(path, response).await
    }

    /// POST a JSON body, expecting no response payload (202-style actions).
    pub async fn post_no_content<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        debug!(path, "POST");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::check(path, response).await.map(|_| ())
    }

    /// PUT a JSON body and decode the JSON response.
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(path, "PUT");
        let response = self.client.put(self.url(path)).json(body).send().await?;
        Self::decode(path, response).await
    }

    /// DELETE a resource, expecting no response payload.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        debug!(path, "DELETE");
        let response = self.client.delete(self.url(path)).send().await?;
        Self::check(path, response).await.map(|_| ())
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
        let response = Self::check(path, response).await?;
        response.json().await.map_err(ApiError::from)
    }

    async fn check(path: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response).await;
        Err(match status {
            StatusCode::NOT_FOUND => ApiError::NotFound(path.to_string()),
            StatusCode::CONFLICT => ApiError::Conflict(message),
            StatusCode::UNAUTHORIZED => ApiError::Auth(message),
            _ => ApiError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }
}

/// Pull a human-readable message out of an OpenStack error body.
///
/// Services wrap errors differently ({"itemNotFound": {...}},
/// {"NeutronError": {...}}, {"badRequest": {...}}), but the payload is
/// always a single-key object with a "message" field inside.
async fn error_message(response: Response) -> String {
    let fallback = "no error detail".to_string();
    let Ok(body) = response.text().await else {
        return fallback;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) else {
        return if body.is_empty() { fallback } else { body };
    };
    value
        .as_object()
        .and_then(|o| o.values().next())
        .and_then(|inner| inner.get("message"))
        .and_then(|m| m.as_str())
        .map(|m| m.to_string())
        .unwrap_or(if body.is_empty() { fallback } else { body })
}
