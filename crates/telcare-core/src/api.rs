use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PortalConfig;
use crate::store::SessionStore;
use crate::types::FieldErrorMap;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const GENERIC_ERROR_MESSAGE: &str = "요청 처리 중 오류가 발생했습니다.";
pub const SESSION_EXPIRED_MESSAGE: &str = "세션이 만료되었습니다. 다시 로그인해주세요.";

/// Errors surfaced by the REST layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Backend {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("{message}")]
    Unauthorized { message: String },
    #[error("{message}")]
    FieldErrors {
        message: String,
        fields: FieldErrorMap,
    },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Message(String),
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// User-facing message, regardless of variant.
    pub fn display_message(&self) -> String {
        match self {
            ApiError::Transport(_) => GENERIC_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// Per-call knobs layered over the client defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    pub timeout: Option<Duration>,
}

/// HTTP client bound to one backend base URL.
///
/// Every request passes through the same explicit steps: bearer injection
/// from the session store, dispatch, then error normalization. A 401 gets
/// one refresh attempt before the failure is surfaced.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
    store: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, store: Arc<SessionStore>) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into(),
            http,
            store,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_with(path, &RequestOverrides::default()).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        overrides: &RequestOverrides,
    ) -> Result<T, ApiError> {
        let text = self.execute(Method::GET, path, None, overrides).await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.post_with(path, body, &RequestOverrides::default())
            .await
    }

    pub async fn post_with<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        overrides: &RequestOverrides,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        let text = self
            .execute(Method::POST, path, Some(body), overrides)
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// POST whose response body is ignored (fire-and-acknowledge endpoints).
    pub async fn post_no_content<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_value(body)?;
        self.execute(Method::POST, path, Some(body), &RequestOverrides::default())
            .await?;
        Ok(())
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        let text = self
            .execute(Method::PUT, path, Some(body), &RequestOverrides::default())
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let text = self
            .execute(Method::DELETE, path, None, &RequestOverrides::default())
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        overrides: &RequestOverrides,
    ) -> Result<String, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut retried = false;

        loop {
            let mut builder = self.http.request(method.clone(), &url);
            if let Some(timeout) = overrides.timeout {
                builder = builder.timeout(timeout);
            }
            if let Some(token) = self.store.token_from_either() {
                builder = builder.bearer_auth(token);
            }
            if let Some(ref body) = body {
                builder = builder.json(body);
            }

            debug!(%method, %url, retried, "dispatching request");
            let response = builder.send().await?;
            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                return Ok(text);
            }

            if status == StatusCode::UNAUTHORIZED {
                if !retried && self.try_refresh().await {
                    retried = true;
                    continue;
                }
                return Err(ApiError::Unauthorized {
                    message: extract_message(&text)
                        .unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string()),
                });
            }

            return Err(normalize_error(status, &text));
        }
    }

    /// One refresh attempt per request. The refresh endpoint is not wired
    /// up yet, so this never succeeds and the caller sees the original 401.
    async fn try_refresh(&self) -> bool {
        match self.store.refresh_token_from_either() {
            Some(_) => {
                warn!("access token rejected; refresh endpoint not available");
                false
            }
            None => {
                debug!("access token rejected and no refresh token stored");
                false
            }
        }
    }
}

/// Map a non-success response body onto a typed error.
///
/// Recognized shapes, in order: `fieldErrors` maps, `error.code`/
/// `error.message` envelopes, then a bare top-level `message`.
fn normalize_error(status: StatusCode, body: &str) -> ApiError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if let Some(ref value) = parsed {
        if let Some(fields) = value.get("fieldErrors").and_then(Value::as_object) {
            let fields: FieldErrorMap = fields
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect();
            if !fields.is_empty() {
                let message = top_level_message(value)
                    .unwrap_or_else(|| "입력값을 확인해주세요.".to_string());
                return ApiError::FieldErrors { message, fields };
            }
        }

        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(message) = nested_error_message(value).or_else(|| top_level_message(value)) {
            return ApiError::Backend {
                status: status.as_u16(),
                code,
                message,
            };
        }
    }

    ApiError::Backend {
        status: status.as_u16(),
        code: None,
        message: GENERIC_ERROR_MESSAGE.to_string(),
    }
}

fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    nested_error_message(&value).or_else(|| top_level_message(&value))
}

fn nested_error_message(value: &Value) -> Option<String> {
    value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn top_level_message(value: &Value) -> Option<String> {
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// The per-area clients the portal talks through. All share one session
/// store so a token obtained through the user client authenticates the rest.
#[derive(Debug, Clone)]
pub struct PortalClients {
    pub user: ApiClient,
    pub bill: ApiClient,
    pub product: ApiClient,
    pub kos_mock: ApiClient,
}

impl PortalClients {
    pub fn from_config(portal: &PortalConfig, store: Arc<SessionStore>) -> Result<Self, ApiError> {
        Ok(Self {
            user: ApiClient::new(portal.user_base(), Arc::clone(&store))?,
            bill: ApiClient::new(portal.bill_base(), Arc::clone(&store))?,
            product: ApiClient::new(portal.product_base(), Arc::clone(&store))?,
            kos_mock: ApiClient::new(portal.kos_mock_base(), store)?,
        })
    }
}
