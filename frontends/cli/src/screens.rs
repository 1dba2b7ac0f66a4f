//! Text renditions of each portal screen

use std::fmt;

use crate::app::AppContext;
use crate::models::Role;
use crate::views::ViewId;

/// Rendered output of one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub title: String,
    pub lines: Vec<String>,
}

impl Screen {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    fn lines<I: IntoIterator<Item = String>>(mut self, lines: I) -> Self {
        self.lines.extend(lines);
        self
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.title)?;
        for line in &self.lines {
            writeln!(f, "  {}", line)?;
        }
        Ok(())
    }
}

pub fn render(view: ViewId, ctx: &AppContext) -> Screen {
    match view {
        ViewId::AnonymousHomepage => anonymous_homepage(),
        ViewId::UserHomepage => user_homepage(ctx),
        ViewId::AdminHomepage => admin_homepage(ctx),
        ViewId::About => about(),
        ViewId::Admin => admin(ctx),
        ViewId::Calendar => calendar(ctx),
        ViewId::Contact => contact(),
        ViewId::Courses => courses(ctx),
        ViewId::Event => event(ctx),
        ViewId::Profile => profile(ctx),
        ViewId::Login => login(ctx),
    }
}

fn anonymous_homepage() -> Screen {
    Screen::new("Welcome")
        .line("Browse: about, contact, courses, calendar")
        .line("Type `login <email> <password>` or `oauth` to sign in")
}

fn user_homepage(ctx: &AppContext) -> Screen {
    let session = ctx.session();
    let enrolled = session
        .profile
        .as_ref()
        .map(|p| p.enrolled_courses.len())
        .unwrap_or(0);
    Screen::new(format!("Hello, {}", session.display_name()))
        .line(format!("Enrolled in {} course(s)", enrolled))
        .line("Go to: courses, calendar, profile")
}

fn admin_homepage(ctx: &AppContext) -> Screen {
    let session = ctx.session();
    Screen::new(format!("Administration - {}", session.display_name()))
        .line("Go to: admin, calendar, courses")
}

fn about() -> Screen {
    Screen::new("About")
        .line("The campus portal lists courses and events and keeps your profile.")
}

fn contact() -> Screen {
    Screen::new("Contact")
        .line("Front office: Monday to Friday, 9:00-17:00")
        .line("Use the profile screen to keep your email address current")
}

fn admin(ctx: &AppContext) -> Screen {
    if ctx.session().role != Role::Admin {
        return Screen::new("Admin").line("Restricted: administrators only");
    }
    let data = ctx.data();
    Screen::new("Admin")
        .line(format!("{} registered user(s)", data.users.len()))
        .lines(data.users.iter().map(|(id, user)| {
            format!("{} <{}> [{:?}] ({})", user.display_name, user.email, user.role, id)
        }))
}

fn calendar(ctx: &AppContext) -> Screen {
    let data = ctx.data();
    if data.events.is_empty() {
        return Screen::new("Calendar").line("No upcoming events");
    }
    Screen::new("Calendar").lines(data.events.iter().map(|(id, event)| {
        let when = event
            .start()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| event.starts_at.clone());
        format!("{}  {}  ({})", when, event.title, id)
    }))
}

fn courses(ctx: &AppContext) -> Screen {
    let data = ctx.data();
    if data.courses.is_empty() {
        return Screen::new("Courses").line("No courses published");
    }
    Screen::new("Courses").lines(data.courses.values().map(|course| {
        match &course.instructor {
            Some(instructor) => format!(
                "{} {} ({} cr) - {}",
                course.code, course.title, course.credits, instructor
            ),
            None => format!("{} {} ({} cr)", course.code, course.title, course.credits),
        }
    }))
}

fn event(ctx: &AppContext) -> Screen {
    let data = ctx.data();
    let Some(event) = data
        .selected_event
        .as_ref()
        .and_then(|id| data.events.get(id))
    else {
        return Screen::new("Event").line("No event selected; use `select <event-id>`");
    };
    Screen::new(event.title.clone())
        .line(format!("Starts: {}", event.starts_at))
        .lines(event.location.iter().map(|l| format!("Where: {}", l)))
        .lines(event.description.iter().cloned())
}

fn profile(ctx: &AppContext) -> Screen {
    let session = ctx.session();
    match &session.profile {
        Some(profile) => Screen::new("Profile")
            .line(format!("Name: {}", profile.display_name))
            .line(format!("Email: {}", profile.email))
            .line(format!("Role: {:?}", profile.role))
            .line(format!("Courses: {}", profile.enrolled_courses.join(", "))),
        None if session.is_signed_in() => Screen::new("Profile").line("No profile on record"),
        None => Screen::new("Profile").line("Sign in to see your profile"),
    }
}

fn login(ctx: &AppContext) -> Screen {
    let screen = Screen::new("Sign in")
        .line("login <email> <password>")
        .line("signup <email> <password>");
    if ctx.config().oauth.is_some() {
        screen.line("oauth  (then `redirect <fragment>`)")
    } else {
        screen
    }
}
