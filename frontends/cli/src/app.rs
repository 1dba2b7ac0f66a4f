//! Page-lifetime application context
//!
//! Owned by the application root and handed to screens and work items
//! explicitly. Everything here lives on the UI thread, hence `Rc`/`RefCell`.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use portal_firestore::{
    ApiError, AuthClient, AuthSession, FirestoreClient, HttpTransport, OAuthRequest, OAuthToken,
    ReadOptions, UserInfo, GOOGLE_PROVIDER_ID, parse_redirect_fragment,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::PortalConfig;
use crate::models::{CampusEvent, Course, Role, UserProfile};
use crate::views::ViewId;

const ALERT_LIFETIME: Duration = Duration::from_secs(5);

/// Signed-in state for the lifetime of the page.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub auth: Option<AuthSession>,
    pub oauth_token: Option<OAuthToken>,
    pub user_info: Option<UserInfo>,
    pub profile: Option<UserProfile>,
    pub role: Role,
}

impl Session {
    pub fn is_signed_in(&self) -> bool {
        self.auth.is_some()
    }

    pub fn display_name(&self) -> String {
        self.profile
            .as_ref()
            .map(|p| p.display_name.clone())
            .or_else(|| self.user_info.as_ref().and_then(|u| u.name.clone()))
            .or_else(|| self.auth.as_ref().and_then(|a| a.email.clone()))
            .unwrap_or_else(|| "guest".to_string())
    }
}

/// Transient message banner.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertBanner {
    pub message: String,
    pub shown_at: Instant,
}

/// Documents prefetched during transitions.
#[derive(Debug, Clone, Default)]
pub struct PortalData {
    pub courses: IndexMap<String, Course>,
    pub events: IndexMap<String, CampusEvent>,
    pub users: IndexMap<String, UserProfile>,
    pub selected_event: Option<String>,
}

pub struct AppContext {
    config: PortalConfig,
    transport: Arc<dyn HttpTransport>,
    auth: AuthClient,
    firestore: RefCell<Rc<FirestoreClient>>,
    session: RefCell<Session>,
    alert: RefCell<Option<AlertBanner>>,
    data: RefCell<PortalData>,
    oauth_state: RefCell<Option<String>>,
    redirect: RefCell<Option<ViewId>>,
}

impl AppContext {
    pub fn new(config: PortalConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let auth = AuthClient::new(config.auth(), transport.clone());
        let firestore = FirestoreClient::new(config.firestore(), transport.clone());
        Self {
            config,
            transport,
            auth,
            firestore: RefCell::new(Rc::new(firestore)),
            session: RefCell::new(Session::default()),
            alert: RefCell::new(None),
            data: RefCell::new(PortalData::default()),
            oauth_state: RefCell::new(None),
            redirect: RefCell::new(None),
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn data(&self) -> std::cell::Ref<'_, PortalData> {
        self.data.borrow()
    }

    /// Client carrying the current id token; cloned out so no borrow is
    /// held across awaits.
    fn firestore(&self) -> Rc<FirestoreClient> {
        self.firestore.borrow().clone()
    }

    pub fn homepage(&self) -> ViewId {
        match self.session.borrow().role {
            Role::Anonymous => ViewId::AnonymousHomepage,
            Role::User => ViewId::UserHomepage,
            Role::Admin => ViewId::AdminHomepage,
        }
    }

    pub fn show_alert(&self, message: impl Into<String>) {
        let message = message.into();
        info!("[AppContext] alert: {}", message);
        *self.alert.borrow_mut() = Some(AlertBanner {
            message,
            shown_at: Instant::now(),
        });
    }

    /// The banner message if it has not expired yet.
    pub fn current_alert(&self, now: Instant) -> Option<String> {
        let mut alert = self.alert.borrow_mut();
        match alert.as_ref() {
            Some(a) if now.duration_since(a.shown_at) < ALERT_LIFETIME => Some(a.message.clone()),
            Some(_) => {
                *alert = None;
                None
            }
            None => None,
        }
    }

    /// View the host should navigate to once the running work is done.
    pub fn take_redirect(&self) -> Option<ViewId> {
        self.redirect.borrow_mut().take()
    }

    fn redirect_to(&self, view: ViewId) {
        *self.redirect.borrow_mut() = Some(view);
    }

    /// User-facing text for a failed remote call.
    pub fn describe_error(err: &anyhow::Error) -> String {
        match err.downcast_ref::<ApiError>() {
            Some(api) => match api.remote_message() {
                Some(code) => humanize_auth_code(code),
                None => api.to_string(),
            },
            None => format!("{:#}", err),
        }
    }

    async fn establish(&self, auth: AuthSession) -> Result<Role> {
        // Only installed once the profile has loaded
        let client = Rc::new(
            FirestoreClient::new(self.config.firestore(), self.transport.clone())
                .with_id_token(auth.id_token.as_str()),
        );

        let profile = client
            .get_document::<UserProfile>(&format!("users/{}", auth.local_id), &ReadOptions::new())
            .await
            .context("Failed to load user profile")?
            .map(|doc| doc.data);
        let role = profile.as_ref().map(|p| p.role).unwrap_or(Role::User);

        *self.firestore.borrow_mut() = client;
        let mut session = self.session.borrow_mut();
        info!(
            "[AppContext] signed in {} as {:?}",
            auth.email.as_deref().unwrap_or(&auth.local_id),
            role
        );
        session.auth = Some(auth);
        session.profile = profile;
        session.role = role;
        drop(session);

        self.redirect_to(self.homepage());
        Ok(role)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Role> {
        let auth = self.auth.sign_in_with_password(email, password).await?;
        self.establish(auth).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Role> {
        let auth = self.auth.sign_up_with_password(email, password).await?;
        self.establish(auth).await
    }

    /// Authorize URL for the Google redirect flow; remembers its `state`.
    pub fn begin_oauth(&self) -> Result<String> {
        let oauth = self
            .config
            .oauth
            .as_ref()
            .context("No oauth section in config")?;
        let mut request = OAuthRequest::new(oauth.client_id.as_str(), oauth.redirect_uri.as_str())
            .include_granted_scopes(true);
        for scope in &oauth.scopes {
            request = request.scope(scope.as_str());
        }
        *self.oauth_state.borrow_mut() = request.state.clone();
        Ok(request.authorize_url()?.to_string())
    }

    /// Finish the redirect flow from the fragment the provider returned.
    pub async fn complete_oauth(&self, fragment: &str) -> Result<Role> {
        let expected = self.oauth_state.borrow_mut().take();
        let token = parse_redirect_fragment(fragment, expected.as_deref())?;
        let request_uri = self
            .config
            .oauth
            .as_ref()
            .map(|o| o.redirect_uri.clone())
            .unwrap_or_default();

        let user_info = self.auth.fetch_user_info(&token.access_token).await?;
        let auth = self
            .auth
            .sign_in_with_idp(&token.access_token, GOOGLE_PROVIDER_ID, &request_uri)
            .await?;
        {
            let mut session = self.session.borrow_mut();
            session.oauth_token = Some(token);
            session.user_info = Some(user_info);
        }
        self.establish(auth).await
    }

    pub fn sign_out(&self) {
        *self.session.borrow_mut() = Session::default();
        *self.firestore.borrow_mut() = Rc::new(FirestoreClient::new(
            self.config.firestore(),
            self.transport.clone(),
        ));
        self.data.borrow_mut().users.clear();
        info!("[AppContext] signed out");
    }

    pub async fn load_courses(&self) -> Result<()> {
        let page = self
            .firestore()
            .list_documents::<Course>("courses", &ReadOptions::new().order_by("code"))
            .await?;
        self.data.borrow_mut().courses = page.documents;
        Ok(())
    }

    pub async fn load_events(&self) -> Result<()> {
        let page = self
            .firestore()
            .list_documents::<CampusEvent>("events", &ReadOptions::new().order_by("starts_at"))
            .await?;
        let mut data = self.data.borrow_mut();
        data.events = page.documents;
        if data
            .selected_event
            .as_ref()
            .is_some_and(|id| !data.events.contains_key(id))
        {
            data.selected_event = None;
        }
        Ok(())
    }

    pub async fn load_users(&self) -> Result<()> {
        if self.session.borrow().role != Role::Admin {
            warn!("[AppContext] load_users skipped: not an admin");
            return Ok(());
        }
        let page = self
            .firestore()
            .list_documents::<UserProfile>(
                "users",
                &ReadOptions::new().mask(["display_name", "email", "role"]),
            )
            .await?;
        self.data.borrow_mut().users = page.documents;
        Ok(())
    }

    /// Re-read the signed-in user's profile.
    pub async fn refresh_profile(&self) -> Result<()> {
        let Some(uid) = self.session.borrow().auth.as_ref().map(|a| a.local_id.clone()) else {
            return Ok(());
        };
        let profile = self
            .firestore()
            .get_document::<UserProfile>(&format!("users/{}", uid), &ReadOptions::new())
            .await?
            .map(|doc| doc.data);
        let mut session = self.session.borrow_mut();
        if let Some(p) = &profile {
            session.role = p.role;
        }
        session.profile = profile;
        Ok(())
    }

    pub fn select_event(&self, id: &str) -> bool {
        let mut data = self.data.borrow_mut();
        if data.events.contains_key(id) || data.events.is_empty() {
            data.selected_event = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Admin only: write `events/{id}`.
    pub async fn publish_event(&self, id: &str, event: &CampusEvent) -> Result<()> {
        if self.session.borrow().role != Role::Admin {
            anyhow::bail!("Only administrators can publish events");
        }
        self.firestore()
            .create_document("events", id, event)
            .await?;
        self.data
            .borrow_mut()
            .events
            .insert(id.to_string(), event.clone());
        Ok(())
    }

    /// Change the signed-in user's display name, leaving other fields alone.
    pub async fn update_display_name(&self, name: &str) -> Result<()> {
        let uid = self
            .session
            .borrow()
            .auth
            .as_ref()
            .map(|a| a.local_id.clone())
            .context("Not signed in")?;
        self.firestore()
            .update_document("users", &uid, &serde_json::json!({ "display_name": name }))
            .await?;
        if let Some(profile) = self.session.borrow_mut().profile.as_mut() {
            profile.display_name = name.to_string();
        }
        Ok(())
    }
}

/// Identity Toolkit error codes as shown to the user.
fn humanize_auth_code(code: &str) -> String {
    // Codes can carry a suffix: "WEAK_PASSWORD : Password should be..."
    let head = code.split(':').next().unwrap_or(code).trim();
    match head {
        "EMAIL_EXISTS" => "An account with this email already exists".to_string(),
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Wrong email or password".to_string()
        }
        "USER_DISABLED" => "This account has been disabled".to_string(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts, try again later".to_string(),
        "WEAK_PASSWORD" => "Password should be at least 6 characters".to_string(),
        _ => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize_known_codes() {
        assert_eq!(
            humanize_auth_code("EMAIL_EXISTS"),
            "An account with this email already exists"
        );
        assert_eq!(
            humanize_auth_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            "Password should be at least 6 characters"
        );
        assert_eq!(humanize_auth_code("SOMETHING_NEW"), "SOMETHING_NEW");
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut session = Session::default();
        assert_eq!(session.display_name(), "guest");
        session.auth = Some(AuthSession {
            email: Some("ada@example.edu".to_string()),
            ..Default::default()
        });
        assert_eq!(session.display_name(), "ada@example.edu");
    }
}
