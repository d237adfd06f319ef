use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::error::ApiError;
use super::transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};

pub const DEFAULT_ENDPOINT: &str = "https://api.supabase.com";

/// Connection settings for the Management API
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub access_token: String,
    pub timeout_seconds: u64,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_token: access_token.into(),
            ..Default::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: String::new(),
            timeout_seconds: 30,
        }
    }
}

/// Supabase Management API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: Option<String>,
    error: Option<String>,
}

impl Client {
    /// Create a client talking HTTP to `config.endpoint`
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ClientInner { transport }),
        }
    }

    /// Project operations
    pub fn projects(&self) -> crate::api::projects::ProjectsApi<'_> {
        crate::api::projects::ProjectsApi::new(self)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::Get, path, None).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(Method::Put, path, Some(encode(body)?)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(Method::Post, path, Some(encode(body)?)).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(Method::Patch, path, Some(encode(body)?)).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        tracing::debug!("{} request to: {}", method, path);

        let response = self
            .inner
            .transport
            .send(HttpRequest {
                method,
                path: path.to_string(),
                body,
            })
            .await?;

        tracing::debug!("Response status: {}", response.status);

        if response.is_success() {
            return parse_success_response(response);
        }
        if response.status == 401 {
            return Err(ApiError::AuthError);
        }
        Err(error_response(response))
    }
}

fn encode<B: Serialize>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::EncodeError(e.to_string()))
}

fn parse_success_response<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    tracing::debug!("API response body: {}", response.body);

    // Some writes answer with an empty body
    let text = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };

    serde_json::from_str::<T>(text).map_err(|e| {
        tracing::error!("Failed to deserialize response: {}, body: {}", e, response.body);
        ApiError::ParseError(e.to_string())
    })
}

fn error_response(response: HttpResponse) -> ApiError {
    let message = match serde_json::from_str::<ApiErrorResponse>(&response.body) {
        Ok(ApiErrorResponse {
            message: Some(message),
            ..
        }) => message,
        Ok(ApiErrorResponse {
            error: Some(error), ..
        }) => error,
        _ if response.body.trim().is_empty() => "Unknown error".to_string(),
        _ => response.body,
    };

    tracing::error!("API error response ({}): {}", response.status, message);
    ApiError::ApiError {
        status: response.status,
        message,
    }
}
