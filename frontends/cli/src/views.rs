use portal_navigation::ViewRegistry;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::app::AppContext;
use crate::screens::{self, Screen};

/// Every screen the portal can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewId {
    AnonymousHomepage,
    UserHomepage,
    AdminHomepage,
    About,
    Admin,
    Calendar,
    Contact,
    Courses,
    Event,
    Profile,
    Login,
}

impl ViewId {
    pub const ALL: [ViewId; 11] = [
        ViewId::AnonymousHomepage,
        ViewId::UserHomepage,
        ViewId::AdminHomepage,
        ViewId::About,
        ViewId::Admin,
        ViewId::Calendar,
        ViewId::Contact,
        ViewId::Courses,
        ViewId::Event,
        ViewId::Profile,
        ViewId::Login,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ViewId::AnonymousHomepage => "anonymous-homepage",
            ViewId::UserHomepage => "user-homepage",
            ViewId::AdminHomepage => "admin-homepage",
            ViewId::About => "about",
            ViewId::Admin => "admin",
            ViewId::Calendar => "calendar",
            ViewId::Contact => "contact",
            ViewId::Courses => "courses",
            ViewId::Event => "event",
            ViewId::Profile => "profile",
            ViewId::Login => "login",
        }
    }

    /// Views whose data is fetched while the screen is faded out. The
    /// profile is refreshed on every transition anyway.
    pub fn needs_prefetch(&self) -> bool {
        matches!(
            self,
            ViewId::Admin | ViewId::Calendar | ViewId::Courses | ViewId::Event
        )
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown view: {0}")]
pub struct UnknownViewName(pub String);

impl FromStr for ViewId {
    type Err = UnknownViewName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ViewId::ALL
            .into_iter()
            .find(|v| v.name() == wanted)
            .ok_or(UnknownViewName(s.to_string()))
    }
}

/// Registry of every screen, each rendering from the shared context.
pub fn build_registry(ctx: &Rc<AppContext>) -> ViewRegistry<ViewId, Screen> {
    let mut builder = ViewRegistry::builder();
    for view in ViewId::ALL {
        let ctx = ctx.clone();
        builder = builder.register(view, move || screens::render(view, &ctx));
    }
    builder.build()
}
