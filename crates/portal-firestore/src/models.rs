//! Wire models of the Firestore and Identity Toolkit REST surfaces

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field map of a document as it travels over the wire.
pub type Fields = BTreeMap<String, FirestoreValue>;

/// A single field value in Firestore's tagged-union JSON shape.
///
/// Exactly one tag is expected to be populated, but nothing enforces it:
/// the decoder picks the first populated tag in a fixed order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    /// 64-bit integer carried as a decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_value: Option<bool>,
    /// NaN and the infinities travel as the strings `"NaN"`, `"Infinity"`
    /// and `"-Infinity"`
    #[serde(default, with = "wire_double", skip_serializing_if = "Option::is_none")]
    pub double_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_value: Option<MapValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_value: Option<ArrayValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_value: Option<NullValue>,
}

mod wire_double {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDouble {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) if d.is_nan() => serializer.serialize_str("NaN"),
            Some(d) if d.is_infinite() && *d > 0.0 => serializer.serialize_str("Infinity"),
            Some(d) if d.is_infinite() => serializer.serialize_str("-Infinity"),
            Some(d) => serializer.serialize_f64(*d),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let Some(raw) = Option::<RawDouble>::deserialize(deserializer)? else {
            return Ok(None);
        };
        match raw {
            RawDouble::Number(d) => Ok(Some(d)),
            RawDouble::Text(text) => match text.as_str() {
                "NaN" => Ok(Some(f64::NAN)),
                "Infinity" => Ok(Some(f64::INFINITY)),
                "-Infinity" => Ok(Some(f64::NEG_INFINITY)),
                other => Err(D::Error::custom(format!("invalid doubleValue {:?}", other))),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: Fields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<FirestoreValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullValue {
    #[serde(rename = "NULL_VALUE")]
    NullValue,
}

/// A document resource as returned by the REST API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<WireDocument>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of a create/overwrite request.
#[derive(Debug, Serialize)]
pub struct WriteBody<'a> {
    pub fields: &'a Fields,
}

/// Resource metadata of a document, without its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    /// Full resource name, `projects/{p}/databases/{d}/documents/{path}`
    pub name: String,
    pub create_time: Option<chrono::DateTime<chrono::Utc>>,
    pub update_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl DocumentMeta {
    pub fn from_wire(doc: &WireDocument) -> Self {
        let parse = |s: &Option<String>| {
            s.as_deref().and_then(|t| {
                chrono::DateTime::parse_from_rfc3339(t)
                    .ok()
                    .map(|dt| dt.with_timezone(&chrono::Utc))
            })
        };
        Self {
            name: doc.name.clone(),
            create_time: parse(&doc.create_time),
            update_time: parse(&doc.update_time),
        }
    }

    /// Last path segment of the resource name, i.e. the document id.
    pub fn id(&self) -> &str {
        document_id(&self.name)
    }
}

/// Segment after the last `/` of a document name.
pub fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// A decoded document together with its resource metadata.
#[derive(Debug, Clone)]
pub struct Document<T> {
    pub meta: DocumentMeta,
    pub data: T,
}

/// Identity Toolkit sign-in/sign-up success body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    #[serde(default)]
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Firebase user id
    #[serde(default)]
    pub local_id: String,
    /// Token lifetime in seconds, sent as a string
    #[serde(default)]
    pub expires_in: Option<String>,
    #[serde(default)]
    pub registered: Option<bool>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Only present for IdP sign-in
    #[serde(default)]
    pub provider_id: Option<String>,
}

/// OpenID Connect userinfo of the signed-in Google account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_is_last_segment() {
        assert_eq!(
            document_id("projects/p/databases/(default)/documents/courses/cs101"),
            "cs101"
        );
        assert_eq!(document_id("plain"), "plain");
    }

    #[test]
    fn test_wire_value_skips_unset_tags() {
        let v = FirestoreValue {
            integer_value: Some("7".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            serde_json::json!({"integerValue": "7"})
        );
    }

    #[test]
    fn test_non_finite_doubles_use_string_form() {
        let v: FirestoreValue = serde_json::from_value(serde_json::json!({"doubleValue": "-Infinity"})).unwrap();
        assert_eq!(v.double_value, Some(f64::NEG_INFINITY));
        let v: FirestoreValue = serde_json::from_value(serde_json::json!({"doubleValue": "NaN"})).unwrap();
        assert!(v.double_value.unwrap().is_nan());
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            serde_json::json!({"doubleValue": "NaN"})
        );
        let v: FirestoreValue = serde_json::from_value(serde_json::json!({"doubleValue": 1.5})).unwrap();
        assert_eq!(v.double_value, Some(1.5));
        assert!(serde_json::from_value::<FirestoreValue>(serde_json::json!({"doubleValue": "lots"})).is_err());
    }

    #[test]
    fn test_meta_parses_timestamps() {
        let doc = WireDocument {
            name: "projects/p/databases/(default)/documents/events/e1".to_string(),
            fields: Fields::new(),
            create_time: Some("2024-03-01T10:00:00.123456Z".to_string()),
            update_time: None,
        };
        let meta = DocumentMeta::from_wire(&doc);
        assert_eq!(meta.id(), "e1");
        assert!(meta.create_time.is_some());
        assert!(meta.update_time.is_none());
    }
}
