//! Scripted in-memory transport for tests
//!
//! Responses are replayed in the order they were pushed; every request is
//! recorded so tests can assert on URLs, query parameters and bodies.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::{ApiError, Result};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

#[derive(Clone, Default)]
pub struct FakeTransport {
    responses: Arc<Mutex<VecDeque<Result<HttpResponse>>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status and JSON body.
    pub fn respond(&self, status: u16, body: serde_json::Value) -> &Self {
        self.push(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }))
    }

    /// Queue a transport-level failure.
    pub fn fail(&self, message: &str) -> &Self {
        self.push(Err(ApiError::Transport {
            message: message.to_string(),
        }))
    }

    fn push(&self, response: Result<HttpResponse>) -> &Self {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(response);
        self
    }

    /// All requests sent so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests().pop()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| {
                Err(ApiError::Transport {
                    message: format!("FakeTransport has no response queued for {}", request.url),
                })
            })
    }
}
