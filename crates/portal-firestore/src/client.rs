use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::codec::{decode_document, encode_document};
use crate::error::{ApiError, ErrorEnvelope, Result};
use crate::models::{
    Document, DocumentMeta, ListDocumentsResponse, WireDocument, WriteBody, document_id,
};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};

pub const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_DATABASE: &str = "(default)";

#[derive(Clone, Debug)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database: String,
    pub endpoint: String,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            endpoint: FIRESTORE_ENDPOINT.to_string(),
        }
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.endpoint.trim_end_matches('/'),
            self.project_id,
            self.database
        )
    }
}

/// Optional query parameters of document reads.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Field paths to return; everything when empty
    pub mask: Vec<String>,
    pub transaction: Option<String>,
    pub read_time: Option<chrono::DateTime<chrono::Utc>>,
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
    pub order_by: Option<String>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mask = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn transaction(mut self, transaction: impl Into<String>) -> Self {
        self.transaction = Some(transaction.into());
        self
    }

    pub fn read_time(mut self, at: chrono::DateTime<chrono::Utc>) -> Self {
        self.read_time = Some(at);
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by = Some(order.into());
        self
    }

    fn apply(&self, mut request: HttpRequest) -> HttpRequest {
        for field in &self.mask {
            request = request.query("mask.fieldPaths", field.as_str());
        }
        if let Some(t) = &self.transaction {
            request = request.query("transaction", t.as_str());
        }
        if let Some(at) = &self.read_time {
            request = request.query(
                "readTime",
                at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            );
        }
        if let Some(size) = self.page_size {
            request = request.query("pageSize", size.to_string());
        }
        if let Some(token) = &self.page_token {
            request = request.query("pageToken", token.as_str());
        }
        if let Some(order) = &self.order_by {
            request = request.query("orderBy", order.as_str());
        }
        request
    }
}

/// A top-level field name as a field path segment. Names other than
/// `[A-Za-z_][A-Za-z0-9_]*` are backtick-quoted with `\` and `` ` `` escaped.
pub fn field_path_segment(name: &str) -> String {
    let mut chars = name.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        return name.to_string();
    }
    let escaped = name.replace('\\', "\\\\").replace('`', "\\`");
    format!("`{}`", escaped)
}

/// One page of a collection listing.
#[derive(Debug, Clone)]
pub struct DocumentPage<T> {
    /// Decoded documents keyed by document id, in server order
    pub documents: IndexMap<String, T>,
    /// Documents skipped because they were empty or did not decode
    pub dropped: usize,
    pub next_page_token: Option<String>,
}

/// Firestore REST client.
///
/// Every call is a single HTTP round trip; there is no caching or retry.
pub struct FirestoreClient {
    config: FirestoreConfig,
    transport: Arc<dyn HttpTransport>,
    id_token: Option<String>,
}

impl FirestoreClient {
    pub fn new(config: FirestoreConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport,
            id_token: None,
        }
    }

    /// Attach the Firebase id token sent as `Authorization: Bearer`.
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }

    pub fn set_id_token(&mut self, id_token: Option<String>) {
        self.id_token = id_token;
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let url = format!(
            "{}/{}",
            self.config.documents_url(),
            path.trim_matches('/')
        );
        let request = HttpRequest::new(method, url);
        match &self.id_token {
            Some(token) => request.bearer(token.as_str()),
            None => request,
        }
    }

    /// Send and return the body of a successful response.
    async fn execute(&self, request: HttpRequest, operation: &str) -> Result<String> {
        let url = request.url.clone();
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            let envelope = ErrorEnvelope::from_body(response.status, &response.body);
            error!(
                "[FirestoreClient] {} failed for {}: HTTP {} {}",
                operation, url, response.status, envelope.error.message
            );
            return Err(ApiError::RemoteRequest {
                status: response.status,
                envelope,
            });
        }
        Ok(response.body)
    }

    fn parse<R: DeserializeOwned>(body: &str, operation: &str) -> Result<R> {
        serde_json::from_str(body).map_err(|e| ApiError::UnexpectedResponse {
            message: format!(
                "Failed to parse {} response: {} - Response: {}",
                operation,
                e,
                body.chars().take(200).collect::<String>()
            ),
        })
    }

    /// Read one document. Missing or empty documents yield `None`.
    pub async fn get_document<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &ReadOptions,
    ) -> Result<Option<Document<T>>> {
        let request = options.apply(self.request(HttpMethod::Get, path));
        debug!("[FirestoreClient] get_document path={}", path);

        let body = match self.execute(request, "get_document").await {
            Ok(body) => body,
            Err(ApiError::RemoteRequest { status: 404, .. }) => {
                debug!("[FirestoreClient] Document {} not found", path);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let wire: WireDocument = Self::parse(&body, "get_document")?;
        let meta = DocumentMeta::from_wire(&wire);
        Ok(decode_document(&wire.fields)?.map(|data| Document { meta, data }))
    }

    /// List one page of a collection.
    ///
    /// Empty documents and documents that fail typed decoding are dropped;
    /// the count is reported in [`DocumentPage::dropped`].
    pub async fn list_documents<T: DeserializeOwned>(
        &self,
        collection: &str,
        options: &ReadOptions,
    ) -> Result<DocumentPage<T>> {
        let request = options.apply(self.request(HttpMethod::Get, collection));
        let body = self.execute(request, "list_documents").await?;
        let response: ListDocumentsResponse = Self::parse(&body, "list_documents")?;

        let total = response.documents.len();
        let mut documents = IndexMap::with_capacity(total);
        let mut dropped = 0;
        for wire in response.documents {
            match decode_document::<T>(&wire.fields) {
                Ok(Some(data)) => {
                    documents.insert(document_id(&wire.name).to_string(), data);
                }
                Ok(None) => dropped += 1,
                Err(e) => {
                    debug!(
                        "[FirestoreClient] Skipping undecodable document {}: {}",
                        wire.name, e
                    );
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            warn!(
                "[FirestoreClient] list_documents {}: dropped {} of {} documents",
                collection, dropped, total
            );
        }
        info!(
            "[FirestoreClient] Listed {} documents from {}",
            documents.len(),
            collection
        );

        Ok(DocumentPage {
            documents,
            dropped,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    /// Create or overwrite `{collection}/{id}`.
    pub async fn create_document<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        document: &T,
    ) -> Result<DocumentMeta> {
        let fields = encode_document(document)?;
        let body = serde_json::to_value(WriteBody { fields: &fields }).map_err(|e| {
            ApiError::UnexpectedResponse {
                message: format!("Failed to serialize document body: {}", e),
            }
        })?;
        let request = self
            .request(HttpMethod::Patch, &format!("{}/{}", collection, id))
            .json(body);

        let body = self.execute(request, "create_document").await?;
        let wire: WireDocument = Self::parse(&body, "create_document")?;
        info!("[FirestoreClient] Wrote {}/{}", collection, id);
        Ok(DocumentMeta::from_wire(&wire))
    }

    /// Update the fields present in `document`, keeping all others.
    ///
    /// Fails with a remote error if the document does not exist.
    pub async fn update_document<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        document: &T,
    ) -> Result<DocumentMeta> {
        let fields = encode_document(document)?;
        let mut request = self
            .request(HttpMethod::Patch, &format!("{}/{}", collection, id))
            .query("currentDocument.exists", "true");
        for key in fields.keys() {
            request = request.query("updateMask.fieldPaths", field_path_segment(key));
        }
        let body = serde_json::to_value(WriteBody { fields: &fields }).map_err(|e| {
            ApiError::UnexpectedResponse {
                message: format!("Failed to serialize document body: {}", e),
            }
        })?;

        let body = self.execute(request.json(body), "update_document").await?;
        let wire: WireDocument = Self::parse(&body, "update_document")?;
        info!(
            "[FirestoreClient] Updated {} fields of {}/{}",
            fields.len(),
            collection,
            id
        );
        Ok(DocumentMeta::from_wire(&wire))
    }

    pub async fn delete_document(&self, path: &str) -> Result<()> {
        let request = self.request(HttpMethod::Delete, path);
        self.execute(request, "delete_document").await?;
        info!("[FirestoreClient] Deleted {}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeTransport;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Event {
        title: String,
        seats: i64,
    }

    fn client(fake: &FakeTransport) -> FirestoreClient {
        FirestoreClient::new(FirestoreConfig::new("campus"), Arc::new(fake.clone()))
            .with_id_token("id-token")
    }

    #[tokio::test]
    async fn test_get_document_sends_bearer_and_mask() {
        let fake = FakeTransport::new();
        fake.respond(
            200,
            json!({
                "name": "projects/campus/databases/(default)/documents/events/e1",
                "fields": {
                    "title": {"stringValue": "Open day"},
                    "seats": {"integerValue": "120"}
                }
            }),
        );

        let doc = client(&fake)
            .get_document::<Event>("events/e1", &ReadOptions::new().mask(["title", "seats"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.meta.id(), "e1");
        assert_eq!(
            doc.data,
            Event {
                title: "Open day".to_string(),
                seats: 120
            }
        );

        let request = fake.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(
            request.url,
            "https://firestore.googleapis.com/v1/projects/campus/databases/(default)/documents/events/e1"
        );
        assert_eq!(request.bearer_token.as_deref(), Some("id-token"));
        let masks: Vec<_> = request
            .query
            .iter()
            .filter(|(k, _)| k == "mask.fieldPaths")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(masks, vec!["title", "seats"]);
    }

    #[tokio::test]
    async fn test_get_missing_document_is_none() {
        let fake = FakeTransport::new();
        fake.respond(
            404,
            json!({"error": {"code": 404, "message": "Document not found", "status": "NOT_FOUND"}}),
        );
        let doc = client(&fake)
            .get_document::<Event>("events/missing", &ReadOptions::new())
            .await
            .unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_create_document_patches_encoded_fields() {
        let fake = FakeTransport::new();
        fake.respond(
            200,
            json!({"name": "projects/campus/databases/(default)/documents/events/e2"}),
        );
        let event = Event {
            title: "Lecture".to_string(),
            seats: 30,
        };
        let meta = client(&fake)
            .create_document("events", "e2", &event)
            .await
            .unwrap();
        assert_eq!(meta.id(), "e2");

        let request = fake.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Patch);
        assert!(request.url.ends_with("/documents/events/e2"));
        assert_eq!(
            request.body,
            Some(crate::transport::HttpBody::Json(json!({
                "fields": {
                    "title": {"stringValue": "Lecture"},
                    "seats": {"integerValue": "30"}
                }
            })))
        );
    }

    #[tokio::test]
    async fn test_update_document_sends_field_mask() {
        let fake = FakeTransport::new();
        fake.respond(
            200,
            json!({"name": "projects/campus/databases/(default)/documents/events/e2"}),
        );
        client(&fake)
            .update_document("events", "e2", &json!({"seats": 31}))
            .await
            .unwrap();

        let request = fake.last_request().unwrap();
        assert_eq!(request.query_value("updateMask.fieldPaths"), Some("seats"));
        assert_eq!(request.query_value("currentDocument.exists"), Some("true"));
    }

    #[tokio::test]
    async fn test_update_mask_quotes_non_identifier_keys() {
        let fake = FakeTransport::new();
        fake.respond(
            200,
            json!({"name": "projects/campus/databases/(default)/documents/users/u1"}),
        );
        client(&fake)
            .update_document("users", "u1", &json!({"display-name": "Ada", "role": "user"}))
            .await
            .unwrap();

        let request = fake.last_request().unwrap();
        let masks: Vec<_> = request
            .query
            .iter()
            .filter(|(k, _)| k == "updateMask.fieldPaths")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(masks, vec!["`display-name`", "role"]);
    }

    #[test]
    fn test_field_path_segment_quoting() {
        assert_eq!(field_path_segment("seats"), "seats");
        assert_eq!(field_path_segment("_private1"), "_private1");
        assert_eq!(field_path_segment("1st"), "`1st`");
        assert_eq!(field_path_segment("a.b"), "`a.b`");
        assert_eq!(field_path_segment("it`s"), "`it\\`s`");
        assert_eq!(field_path_segment(""), "``");
    }

    #[tokio::test]
    async fn test_remote_failure_carries_envelope() {
        let fake = FakeTransport::new();
        fake.respond(
            403,
            json!({"error": {"code": 403, "message": "Missing or insufficient permissions."}}),
        );
        let err = client(&fake).delete_document("events/e1").await.unwrap_err();
        assert_eq!(
            err.remote_message(),
            Some("Missing or insufficient permissions.")
        );
    }
}
