//! Google OAuth implicit-grant redirect
//!
//! Builds the authorize URL the browser is sent to, and reads the token the
//! provider hands back in the redirect URI fragment.

use reqwest::Url;

pub const GOOGLE_AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OAuthError {
    #[error("Invalid OAuth URL: {0}")]
    InvalidUrl(String),

    #[error("Provider returned error '{error}'")]
    Provider { error: String },

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Redirect fragment has no access_token")]
    MissingToken,
}

#[derive(Debug, Clone)]
pub struct OAuthRequest {
    pub endpoint: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub state: Option<String>,
    pub include_granted_scopes: Option<bool>,
    pub enable_granular_consent: Option<bool>,
    pub login_hint: Option<String>,
    pub prompt: Option<String>,
}

impl OAuthRequest {
    /// New request with a random `state`.
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            endpoint: GOOGLE_AUTHORIZE_ENDPOINT.to_string(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: Vec::new(),
            state: Some(uuid::Uuid::new_v4().to_string()),
            include_granted_scopes: None,
            enable_granular_consent: None,
            login_hint: None,
            prompt: None,
        }
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn state(mut self, state: Option<String>) -> Self {
        self.state = state;
        self
    }

    pub fn include_granted_scopes(mut self, include: bool) -> Self {
        self.include_granted_scopes = Some(include);
        self
    }

    pub fn enable_granular_consent(mut self, enable: bool) -> Self {
        self.enable_granular_consent = Some(enable);
        self
    }

    pub fn login_hint(mut self, hint: impl Into<String>) -> Self {
        self.login_hint = Some(hint.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// The GET URL to redirect the browser to.
    pub fn authorize_url(&self) -> Result<Url, OAuthError> {
        let mut params: Vec<(&str, String)> = vec![
            ("client_id", self.client_id.clone()),
            ("redirect_uri", self.redirect_uri.clone()),
            ("response_type", "token".to_string()),
            ("scope", self.scopes.join(" ")),
        ];
        if let Some(state) = &self.state {
            params.push(("state", state.clone()));
        }
        if let Some(include) = self.include_granted_scopes {
            params.push(("include_granted_scopes", include.to_string()));
        }
        if let Some(enable) = self.enable_granular_consent {
            params.push(("enable_granular_consent", enable.to_string()));
        }
        if let Some(hint) = &self.login_hint {
            params.push(("login_hint", hint.clone()));
        }
        if let Some(prompt) = &self.prompt {
            params.push(("prompt", prompt.clone()));
        }
        Url::parse_with_params(&self.endpoint, &params)
            .map_err(|e| OAuthError::InvalidUrl(e.to_string()))
    }
}

/// Token delivered in the redirect URI fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub scopes: Vec<String>,
    pub state: Option<String>,
}

/// Parse `#access_token=...&state=...` and check `state` when one is expected.
pub fn parse_redirect_fragment(
    fragment: &str,
    expected_state: Option<&str>,
) -> Result<OAuthToken, OAuthError> {
    // The fragment uses query-string encoding; borrow Url's parser for it
    let url = Url::parse(&format!(
        "http://localhost/?{}",
        fragment.trim_start_matches('#')
    ))
    .map_err(|e| OAuthError::InvalidUrl(e.to_string()))?;

    let mut access_token = None;
    let mut token_type = None;
    let mut expires_in = None;
    let mut scopes = Vec::new();
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "access_token" => access_token = Some(value.into_owned()),
            "token_type" => token_type = Some(value.into_owned()),
            "expires_in" => expires_in = value.parse().ok(),
            "scope" => scopes = value.split_whitespace().map(str::to_string).collect(),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(OAuthError::Provider {
                    error: value.into_owned(),
                });
            }
            _ => {}
        }
    }

    if let Some(expected) = expected_state {
        if state.as_deref() != Some(expected) {
            return Err(OAuthError::StateMismatch);
        }
    }

    Ok(OAuthToken {
        access_token: access_token.ok_or(OAuthError::MissingToken)?,
        token_type,
        expires_in,
        scopes,
        state,
    })
}
