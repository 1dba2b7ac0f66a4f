use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Anonymous,
    User,
    Admin,
}

/// `users/{uid}` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub display_name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub enrolled_courses: Vec<String>,
}

fn default_role() -> Role {
    Role::User
}

/// `courses/{id}` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub code: String,
    pub credits: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `events/{id}` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampusEvent {
    pub title: String,
    /// RFC 3339 start time
    pub starts_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CampusEvent {
    pub fn start(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::parse_from_rfc3339(&self.starts_at)
            .ok()
            .map(|dt| dt.with_timezone(&chrono::Utc))
    }
}
