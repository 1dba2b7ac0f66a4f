//! Firebase REST glue for the portal
//!
//! This crate provides:
//!
//! - `codec` - JSON <-> Firestore tagged-value conversion
//! - `client` - FirestoreClient (document get/list/create/update/delete)
//! - `auth` - AuthClient (Identity Toolkit password and IdP sign-in)
//! - `oauth` - Google OAuth redirect URL and fragment parsing
//! - `transport` - HttpTransport seam and its reqwest implementation
//! - `fake` - FakeTransport for tests
//! - `models` - wire models

pub mod auth;
pub mod client;
pub mod codec;
pub mod error;
pub mod fake;
pub mod models;
pub mod oauth;
pub mod transport;

pub use auth::{AuthClient, AuthConfig, GOOGLE_PROVIDER_ID};
pub use client::{DocumentPage, FirestoreClient, FirestoreConfig, ReadOptions};
pub use codec::{decode_document, decode_value, encode_document, encode_value};
pub use error::{ApiError, CodecError, ErrorEnvelope};
pub use fake::FakeTransport;
pub use models::*;
pub use oauth::{OAuthError, OAuthRequest, OAuthToken, parse_redirect_fragment};
pub use transport::{HttpBody, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
