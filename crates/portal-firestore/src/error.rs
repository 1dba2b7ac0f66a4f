use serde::{Deserialize, Serialize};

/// Errors raised while translating between JSON and Firestore's tagged values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Unsupported field type for key '{key}'")]
    UnsupportedFieldType { key: String },

    #[error("Document must encode to a JSON object")]
    NotAnObject,

    #[error("Malformed integerValue '{value}'")]
    MalformedInteger { value: String },

    #[error("Failed to convert document: {0}")]
    Deserialize(#[from] serde_json::Error),
}

/// One entry of `error.errors[]` in a Google API error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// The `error` object of a failed identity/document call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
    #[serde(default)]
    pub status: Option<String>,
}

/// `{ "error": { code, message, errors[] } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    /// Decode a response body into an envelope.
    ///
    /// Bodies that are not an envelope (proxies, HTML error pages) are kept
    /// as the message so the caller still sees what the server said.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => envelope,
            Err(_) => ErrorEnvelope {
                error: ErrorBody {
                    code: status,
                    message: if body.chars().count() > 500 {
                        format!("{}... (truncated)", body.chars().take(500).collect::<String>())
                    } else {
                        body.to_string()
                    },
                    errors: Vec::new(),
                    status: None,
                },
            },
        }
    }
}

/// Failures of a remote identity or document call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status} from remote service: {}", envelope.error.message)]
    RemoteRequest { status: u16, envelope: ErrorEnvelope },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },
}

impl ApiError {
    /// Provider message of a remote failure, e.g. `EMAIL_EXISTS`.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            ApiError::RemoteRequest { envelope, .. } => Some(envelope.error.message.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
