//! HTTP transport used by the API client
//!
//! The client never talks to reqwest directly; it hands an `HttpRequest` to a
//! `Transport`. Production code uses `ReqwestTransport`, tests inject
//! `MockTransport` from the `mock` module.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::client::ClientConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

/// A request relative to the API endpoint, e.g. `GET /v1/projects/{ref}`
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a pooled reqwest client
pub struct ReqwestTransport {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    timeout_seconds: u64,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let endpoint = url::Url::parse(&config.endpoint)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", config.endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                config.endpoint
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            auth_header: format!("Bearer {}", config.access_token),
            timeout_seconds: config.timeout_seconds,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self
            .http_client
            .request(request.method.into(), &url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(ACCEPT, "application/json")
            .header(
                USER_AGENT,
                concat!("terraform-provider-supabase/", env!("CARGO_PKG_VERSION")),
            );
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout_seconds)
            } else {
                TransportError::Request(e)
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn config(endpoint: String) -> ClientConfig {
        ClientConfig {
            endpoint,
            access_token: "sbp_test".to_string(),
            timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn sends_bearer_token_and_json_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PATCH", "/v1/projects/abc/postgrest")
            .match_header("authorization", "Bearer sbp_test")
            .match_header("accept", "application/json")
            .match_header(
                "user-agent",
                Matcher::Regex("^terraform-provider-supabase/".to_string()),
            )
            .match_body(Matcher::Json(serde_json::json!({"max_rows": 100})))
            .with_status(200)
            .with_body(r#"{"max_rows":100}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(&config(server.url())).unwrap();
        let response = transport
            .send(HttpRequest {
                method: Method::Patch,
                path: "/v1/projects/abc/postgrest".to_string(),
                body: Some(serde_json::json!({"max_rows": 100})),
            })
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"max_rows":100}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn strips_trailing_slash_from_endpoint() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/projects/abc")
            .with_body("{}")
            .create_async()
            .await;

        let transport = ReqwestTransport::new(&config(format!("{}/", server.url()))).unwrap();
        let _ = transport
            .send(HttpRequest {
                method: Method::Get,
                path: "/v1/projects/abc".to_string(),
                body: None,
            })
            .await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_statuses_are_returned_not_raised() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/projects/abc/config/auth")
            .with_status(404)
            .with_body(r#"{"message":"Project not found"}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(&config(server.url())).unwrap();
        let response = transport
            .send(HttpRequest {
                method: Method::Get,
                path: "/v1/projects/abc/config/auth".to_string(),
                body: None,
            })
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn network_errors_surface_as_transport_errors() {
        let transport = ReqwestTransport::new(&config("http://127.0.0.1:1".to_string())).unwrap();

        let result = transport
            .send(HttpRequest {
                method: Method::Get,
                path: "/v1/projects/abc".to_string(),
                body: None,
            })
            .await;

        assert!(matches!(result, Err(TransportError::Request(_))));
    }

    #[test]
    fn rejects_invalid_endpoints() {
        assert!(matches!(
            ReqwestTransport::new(&config("not a url".to_string())),
            Err(TransportError::InvalidUrl(_))
        ));
        assert!(matches!(
            ReqwestTransport::new(&config("ftp://api.supabase.com".to_string())),
            Err(TransportError::InvalidUrl(_))
        ));
    }
}
