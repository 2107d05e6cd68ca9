//! Minimal HTTP capability for the provider gateway.
//!
//! The core never opens sockets; it hands a fully built request to the shell
//! and is resumed with the response. One request, one response; no retry,
//! no streaming, no caching.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone)]
pub struct Http<E> {
    context: CapabilityContext<HttpOperation, E>,
}

impl<Ev> Capability<Ev> for Http<Ev> {
    type Operation = HttpOperation;
    type MappedSelf<MappedEv> = Http<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Http::new(self.context.map_event(f))
    }
}

impl<E> Http<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<HttpOperation, E>) -> Self {
        Self { context }
    }

    pub fn execute<F>(&self, request: HttpRequest, callback: F)
    where
        F: FnOnce(HttpResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let response = context
                .request_from_shell(HttpOperation::Execute(request))
                .await;
            context.update_app(callback(response));
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    #[serde(with = "serde_bytes")]
    pub body: Option<Vec<u8>>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn post(url: impl Into<String>) -> Result<Self, HttpError> {
        let url = url.into();
        validate_url(&url)?;
        Ok(Self {
            method: HttpMethod::Post,
            url,
            headers: Vec::new(),
            body: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    pub fn get(url: impl Into<String>) -> Result<Self, HttpError> {
        let url = url.into();
        validate_url(&url)?;
        Ok(Self {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            body: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_json_body(mut self, value: &serde_json::Value) -> Result<Self, HttpError> {
        let body = serde_json::to_vec(value).map_err(|e| HttpError::InvalidRequest {
            reason: e.to_string(),
        })?;
        self.body = Some(body);
        self.headers
            .push(("Content-Type".into(), "application/json".into()));
        Ok(self)
    }
}

fn validate_url(url: &str) -> Result<(), HttpError> {
    let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl {
        reason: e.to_string(),
    })?;
    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(HttpError::InvalidUrl {
            reason: format!("unsupported scheme '{scheme}'"),
        });
    }
    if parsed.host_str().is_none() {
        return Err(HttpError::InvalidUrl {
            reason: "missing host".into(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpOperation {
    Execute(HttpRequest),
}

impl Operation for HttpOperation {
    type Output = HttpResult;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::InvalidResponse {
            reason: format!("failed to parse JSON: {e}"),
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpError {
    #[error("invalid URL: {reason}")]
    InvalidUrl { reason: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("network failure: {message}")]
    Network { message: String },

    #[error("timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },
}

pub type HttpResult = Result<HttpResponse, HttpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_builds_json_request() {
        let request = HttpRequest::post("https://example.com/v1/things")
            .unwrap()
            .with_json_body(&json!({"a": 1}))
            .unwrap();

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body.as_deref(), Some(&br#"{"a":1}"#[..]));
        assert!(request
            .headers
            .iter()
            .any(|(n, v)| n == "Content-Type" && v == "application/json"));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(matches!(
            HttpRequest::get("ftp://example.com"),
            Err(HttpError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_url() {
        assert!(HttpRequest::get("not a url").is_err());
    }

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::new(204, vec![]).is_success());
        assert!(!HttpResponse::new(404, vec![]).is_success());
        assert!(!HttpResponse::new(500, vec![]).is_success());
    }

    #[test]
    fn test_response_json_error_is_typed() {
        let response = HttpResponse::new(200, b"not json".to_vec());
        assert!(matches!(
            response.json::<serde_json::Value>(),
            Err(HttpError::InvalidResponse { .. })
        ));
    }
}
