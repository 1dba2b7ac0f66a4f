//! Identity Toolkit gateway: password and IdP sign-in

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{ApiError, ErrorEnvelope, Result};
use crate::models::{AuthSession, UserInfo};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};

pub const IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";
pub const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
pub const GOOGLE_PROVIDER_ID: &str = "google.com";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub api_key: String,
    pub endpoint: String,
    pub userinfo_endpoint: String,
}

impl AuthConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: IDENTITY_ENDPOINT.to_string(),
            userinfo_endpoint: USERINFO_ENDPOINT.to_string(),
        }
    }
}

pub struct AuthClient {
    config: AuthConfig,
    transport: Arc<dyn HttpTransport>,
}

impl AuthClient {
    pub fn new(config: AuthConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// POST `{endpoint}/accounts:{action}?key=...` with a form body.
    async fn accounts_call(
        &self,
        action: &str,
        mut form: Vec<(String, String)>,
    ) -> Result<AuthSession> {
        form.push(("returnSecureToken".to_string(), "true".to_string()));
        let url = format!(
            "{}/accounts:{}",
            self.config.endpoint.trim_end_matches('/'),
            action
        );
        let request = HttpRequest::new(HttpMethod::Post, url)
            .query("key", self.config.api_key.as_str())
            .form(form);

        debug!("[AuthClient] accounts:{}", action);
        let response = self.transport.send(request).await?;
        if response.status != 200 {
            let envelope = ErrorEnvelope::from_body(response.status, &response.body);
            error!(
                "[AuthClient] accounts:{} failed: HTTP {} {}",
                action, response.status, envelope.error.message
            );
            return Err(ApiError::RemoteRequest {
                status: response.status,
                envelope,
            });
        }

        let session: AuthSession =
            serde_json::from_str(&response.body).map_err(|e| ApiError::UnexpectedResponse {
                message: format!("Failed to parse accounts:{} response: {}", action, e),
            })?;
        info!(
            "[AuthClient] accounts:{} succeeded for user {}",
            action, session.local_id
        );
        Ok(session)
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.accounts_call(
            "signInWithPassword",
            vec![
                ("email".to_string(), email.to_string()),
                ("password".to_string(), password.to_string()),
            ],
        )
        .await
    }

    pub async fn sign_up_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.accounts_call(
            "signUp",
            vec![
                ("email".to_string(), email.to_string()),
                ("password".to_string(), password.to_string()),
            ],
        )
        .await
    }

    /// Exchange an OAuth access token from `provider_id` for a Firebase session.
    pub async fn sign_in_with_idp(
        &self,
        access_token: &str,
        provider_id: &str,
        request_uri: &str,
    ) -> Result<AuthSession> {
        self.accounts_call(
            "signInWithIdp",
            vec![
                (
                    "postBody".to_string(),
                    format!("access_token={}&providerId={}", access_token, provider_id),
                ),
                ("requestUri".to_string(), request_uri.to_string()),
                ("returnIdpCredential".to_string(), "true".to_string()),
            ],
        )
        .await
    }

    /// Profile of the Google account behind an OAuth access token.
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo> {
        let request = HttpRequest::new(HttpMethod::Get, self.config.userinfo_endpoint.as_str())
            .bearer(access_token);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(ApiError::RemoteRequest {
                status: response.status,
                envelope: ErrorEnvelope::from_body(response.status, &response.body),
            });
        }
        serde_json::from_str(&response.body).map_err(|e| ApiError::UnexpectedResponse {
            message: format!("Failed to parse userinfo response: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeTransport;
    use crate::transport::HttpBody;
    use serde_json::json;

    fn client(fake: &FakeTransport) -> AuthClient {
        AuthClient::new(AuthConfig::new("api-key"), Arc::new(fake.clone()))
    }

    #[tokio::test]
    async fn test_sign_in_with_password() {
        let fake = FakeTransport::new();
        fake.respond(
            200,
            json!({
                "idToken": "tok",
                "refreshToken": "ref",
                "email": "ada@example.edu",
                "localId": "u1",
                "expiresIn": "3600",
                "registered": true
            }),
        );

        let session = client(&fake)
            .sign_in_with_password("ada@example.edu", "secret")
            .await
            .unwrap();
        assert_eq!(session.id_token, "tok");
        assert_eq!(session.local_id, "u1");

        let request = fake.last_request().unwrap();
        assert_eq!(
            request.url,
            "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword"
        );
        assert_eq!(request.query_value("key"), Some("api-key"));
        match request.body {
            Some(HttpBody::Form(fields)) => {
                assert!(fields.contains(&("email".to_string(), "ada@example.edu".to_string())));
                assert!(fields.contains(&("returnSecureToken".to_string(), "true".to_string())));
            }
            other => panic!("expected form body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sign_up_failure_carries_provider_message() {
        let fake = FakeTransport::new();
        fake.respond(
            400,
            json!({"error": {
                "code": 400,
                "message": "EMAIL_EXISTS",
                "errors": [{"message": "EMAIL_EXISTS", "domain": "global", "reason": "invalid"}]
            }}),
        );

        let err = client(&fake)
            .sign_up_with_password("ada@example.edu", "secret")
            .await
            .unwrap_err();
        match err {
            ApiError::RemoteRequest { status, envelope } => {
                assert_eq!(status, 400);
                assert_eq!(envelope.error.message, "EMAIL_EXISTS");
                assert_eq!(envelope.error.errors.len(), 1);
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sign_in_with_idp_posts_access_token() {
        let fake = FakeTransport::new();
        fake.respond(
            200,
            json!({"idToken": "tok", "localId": "u2", "providerId": "google.com"}),
        );
        let session = client(&fake)
            .sign_in_with_idp("ya29.token", GOOGLE_PROVIDER_ID, "https://portal.example.edu")
            .await
            .unwrap();
        assert_eq!(session.provider_id.as_deref(), Some("google.com"));

        let request = fake.last_request().unwrap();
        assert!(request.url.ends_with("accounts:signInWithIdp"));
        let Some(HttpBody::Form(fields)) = request.body else {
            panic!("expected form body");
        };
        assert!(fields.contains(&(
            "postBody".to_string(),
            "access_token=ya29.token&providerId=google.com".to_string()
        )));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let fake = FakeTransport::new();
        fake.fail("connection refused");
        let err = client(&fake)
            .sign_in_with_password("a@b.c", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }
}
