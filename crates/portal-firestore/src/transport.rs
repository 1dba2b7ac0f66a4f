//! HTTP seam shared by the document client and the auth gateway

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    Json(serde_json::Value),
    /// Flat string-keyed form, sent as `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Repeated keys are allowed (e.g. `mask.fieldPaths`)
    pub query: Vec<(String, String)>,
    pub bearer_token: Option<String>,
    pub body: Option<HttpBody>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            bearer_token: None,
            body: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(HttpBody::Json(body));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(HttpBody::Form(fields));
        self
    }

    /// First query value for `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
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

/// Sends one request and returns the raw status and body.
///
/// Non-success statuses are NOT errors at this level; callers decode the
/// provider error envelope themselves.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// `reqwest`-backed transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        {
            builder = builder.timeout(std::time::Duration::from_secs(30));
        }
        let client = builder.build().map_err(|e| ApiError::Transport {
            message: format!("Failed to create HTTP client: {}", e),
        })?;
        Ok(Self { client })
    }

    /// Classify a reqwest failure into an actionable message.
    fn format_reqwest_error(e: &reqwest::Error, url: &str) -> String {
        if e.is_timeout() {
            format!("timeout calling {} - request took too long", url)
        } else if {
            #[cfg(not(target_arch = "wasm32"))]
            {
                e.is_connect()
            }
            #[cfg(target_arch = "wasm32")]
            {
                false
            }
        } {
            format!(
                "connection error calling {} - check network connectivity and DNS. Error: {}",
                url, e
            )
        } else if e.is_request() {
            format!("request error calling {} - malformed request. Error: {}", url, e)
        } else if e.is_decode() {
            format!("decode error reading {}: {}", url, e)
        } else {
            format!("failed calling {}: {}. Debug details: {:?}", url, e, e)
        }
    }

    fn trace_headers() -> reqwest::header::HeaderMap {
        #[allow(unused_mut)]
        let mut headers = reqwest::header::HeaderMap::new();
        #[cfg(not(target_arch = "wasm32"))]
        {
            use opentelemetry::Context;
            use opentelemetry::global;

            struct HeaderInjector<'a> {
                headers: &'a mut reqwest::header::HeaderMap,
            }
            impl opentelemetry::propagation::Injector for HeaderInjector<'_> {
                fn set(&mut self, key: &str, value: String) {
                    if let (Ok(name), Ok(value)) = (
                        reqwest::header::HeaderName::from_bytes(key.as_bytes()),
                        reqwest::header::HeaderValue::from_str(&value),
                    ) {
                        self.headers.insert(name, value);
                    }
                }
            }

            let mut injector = HeaderInjector {
                headers: &mut headers,
            };
            global::get_text_map_propagator(|propagator| {
                propagator.inject_context(&Context::current(), &mut injector);
            });
        }
        headers
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .headers(Self::trace_headers())
            .query(&request.query);
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            Some(HttpBody::Json(body)) => builder.json(body),
            Some(HttpBody::Form(fields)) => builder.form(fields),
            None => builder,
        };

        debug!(
            "[ReqwestTransport] {} {}",
            request.method.as_str(),
            request.url
        );

        let response = builder.send().await.map_err(|e| {
            let message = Self::format_reqwest_error(&e, &request.url);
            error!("[ReqwestTransport] {}", message);
            ApiError::Transport { message }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| ApiError::Transport {
            message: format!("Failed to read response body from {}: {}", request.url, e),
        })?;

        debug!(
            "[ReqwestTransport] {} {} -> {} ({} bytes)",
            request.method.as_str(),
            request.url,
            status,
            body.len()
        );

        Ok(HttpResponse { status, body })
    }
}
