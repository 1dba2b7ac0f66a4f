use anyhow::Result;
use portal_firestore::ReqwestTransport;
use portal_navigation::{
    Clock, NavigationError, SystemClock, TransitionController, TransitionKind, TransitionTiming,
};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::app::AppContext;
use crate::config::PortalConfig;
use crate::models::CampusEvent;
use crate::screens::Screen;
use crate::views::{ViewId, build_registry};

/// A line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Go(ViewId),
    Home,
    Login { email: String, password: String },
    SignUp { email: String, password: String },
    OAuth,
    Redirect(String),
    Select(String),
    Rename(String),
    Publish {
        id: String,
        starts_at: String,
        title: String,
    },
    Logout,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    View(#[from] crate::views::UnknownViewName),
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(CommandError::Empty);
    };
    let rest: Vec<&str> = words.collect();

    let credentials = |usage: &'static str| match rest.as_slice() {
        [email, password] => Ok((email.to_string(), password.to_string())),
        _ => Err(CommandError::Usage(usage)),
    };

    match verb {
        "go" => match rest.as_slice() {
            ["home"] => Ok(Command::Home),
            [view] => Ok(Command::Go(view.parse()?)),
            _ => Err(CommandError::Usage("go <view>")),
        },
        "home" => Ok(Command::Home),
        "login" => {
            let (email, password) = credentials("login <email> <password>")?;
            Ok(Command::Login { email, password })
        }
        "signup" => {
            let (email, password) = credentials("signup <email> <password>")?;
            Ok(Command::SignUp { email, password })
        }
        "oauth" => Ok(Command::OAuth),
        "redirect" => match rest.as_slice() {
            [fragment] => Ok(Command::Redirect(fragment.to_string())),
            _ => Err(CommandError::Usage("redirect <fragment>")),
        },
        "select" => match rest.as_slice() {
            [id] => Ok(Command::Select(id.to_string())),
            _ => Err(CommandError::Usage("select <event-id>")),
        },
        "name" if !rest.is_empty() => Ok(Command::Rename(rest.join(" "))),
        "name" => Err(CommandError::Usage("name <display name>")),
        "publish" => match rest.as_slice() {
            [id, starts_at, title @ ..] if !title.is_empty() => Ok(Command::Publish {
                id: id.to_string(),
                starts_at: starts_at.to_string(),
                title: title.join(" "),
            }),
            _ => Err(CommandError::Usage("publish <event-id> <rfc3339-start> <title>")),
        },
        "logout" => Ok(Command::Logout),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

/// Portal state driven by the frame loop: context, screens and the
/// transition controller.
pub struct PortalApp {
    ctx: Rc<AppContext>,
    controller: TransitionController<ViewId, Screen>,
    last_output: Option<String>,
}

impl PortalApp {
    pub fn new(ctx: Rc<AppContext>, clock: Box<dyn Clock>, timing: TransitionTiming) -> Result<Self> {
        let registry = build_registry(&ctx);
        let mut controller = TransitionController::new(registry, ctx.homepage(), clock, timing)?;

        let profile_ctx = ctx.clone();
        controller.queue_intermediate(true, move || {
            let ctx = profile_ctx.clone();
            async move { ctx.refresh_profile().await }
        });

        Ok(Self {
            ctx,
            controller,
            last_output: None,
        })
    }

    pub fn context(&self) -> &Rc<AppContext> {
        &self.ctx
    }

    pub fn current_view(&self) -> ViewId {
        self.controller.current_view()
    }

    pub fn in_transition(&self) -> bool {
        self.controller.in_transition()
    }

    /// Text printed by the most recent [`PortalApp::tick`] that produced any.
    pub fn last_output(&self) -> Option<&str> {
        self.last_output.as_deref()
    }

    /// Apply a command. Returns text to print right away, if any.
    pub fn handle(&mut self, command: Command) -> Option<String> {
        debug!("[PortalApp] command {:?}", command);
        match command {
            Command::Go(view) => {
                self.queue_prefetch(view);
                self.navigate(view)
            }
            Command::Home => self.navigate(self.ctx.homepage()),
            Command::Login { email, password } => {
                self.queue_once(move |ctx| {
                    let (email, password) = (email.clone(), password.clone());
                    async move { ctx.sign_in(&email, &password).await.map(|_| ()) }
                });
                self.navigate(self.ctx.homepage())
            }
            Command::SignUp { email, password } => {
                self.queue_once(move |ctx| {
                    let (email, password) = (email.clone(), password.clone());
                    async move { ctx.sign_up(&email, &password).await.map(|_| ()) }
                });
                self.navigate(self.ctx.homepage())
            }
            Command::OAuth => match self.ctx.begin_oauth() {
                Ok(url) => Some(format!(
                    "Open this URL, then paste the part after '#' as `redirect <fragment>`:\n{}",
                    url
                )),
                Err(e) => Some(format!("{:#}", e)),
            },
            Command::Redirect(fragment) => {
                self.queue_once(move |ctx| {
                    let fragment = fragment.clone();
                    async move { ctx.complete_oauth(&fragment).await.map(|_| ()) }
                });
                self.navigate(self.ctx.homepage())
            }
            Command::Select(id) => {
                if !self.ctx.select_event(&id) {
                    return Some(format!("No event with id {}", id));
                }
                self.queue_prefetch(ViewId::Event);
                self.navigate(ViewId::Event)
            }
            Command::Rename(name) => {
                self.queue_once(move |ctx| {
                    let name = name.clone();
                    async move { ctx.update_display_name(&name).await }
                });
                self.navigate(ViewId::Profile)
            }
            Command::Publish {
                id,
                starts_at,
                title,
            } => {
                if chrono::DateTime::parse_from_rfc3339(&starts_at).is_err() {
                    return Some(format!("Not an RFC 3339 time: {}", starts_at));
                }
                let event = CampusEvent {
                    title,
                    starts_at,
                    location: None,
                    description: None,
                };
                self.queue_once(move |ctx| {
                    let (id, event) = (id.clone(), event.clone());
                    async move { ctx.publish_event(&id, &event).await }
                });
                self.queue_prefetch(ViewId::Calendar);
                self.navigate(ViewId::Calendar)
            }
            Command::Logout => {
                self.ctx.sign_out();
                self.navigate(ViewId::AnonymousHomepage)
            }
            Command::Quit => None,
        }
    }

    /// Render one frame. Returns the text to print when it changed.
    pub fn tick(&mut self) -> Option<String> {
        if let Some(view) = self.ctx.take_redirect() {
            info!("[PortalApp] redirecting to {}", view);
            if let Err(e) = self.controller.navigate(view, TransitionKind::Fade) {
                warn!("[PortalApp] redirect failed: {}", e);
            }
        }

        let frame = match self.controller.render() {
            Ok(frame) => frame,
            Err(NavigationError::TransitionWork { source }) => {
                self.ctx.take_redirect();
                self.ctx.show_alert(AppContext::describe_error(&source));
                match self.controller.render() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("[PortalApp] render failed twice: {}", e);
                        return None;
                    }
                }
            }
            Err(e) => {
                warn!("[PortalApp] render failed: {}", e);
                return None;
            }
        };

        let mut output = String::new();
        if let Some(alert) = self.ctx.current_alert(Instant::now()) {
            output.push_str(&format!("! {}\n", alert));
        }
        if frame.loading {
            output.push_str("[loading...]\n");
        } else {
            output.push_str(&frame.content.to_string());
        }

        if self.last_output.as_deref() == Some(output.as_str()) {
            return None;
        }
        self.last_output = Some(output.clone());
        Some(output)
    }

    fn navigate(&mut self, view: ViewId) -> Option<String> {
        match self.controller.navigate(view, TransitionKind::Fade) {
            Ok(()) => None,
            Err(e) => Some(e.to_string()),
        }
    }

    /// Queue work for the next transition only, handing it the context.
    fn queue_once<F, Fut>(&mut self, work: F)
    where
        F: Fn(Rc<AppContext>) -> Fut + 'static,
        Fut: std::future::Future<Output = Result<()>> + 'static,
    {
        let ctx = self.ctx.clone();
        self.controller
            .queue_intermediate(false, move || work(ctx.clone()));
    }

    fn queue_prefetch(&mut self, view: ViewId) {
        if !view.needs_prefetch() {
            return;
        }
        self.queue_once(move |ctx| async move {
            match view {
                ViewId::Courses => ctx.load_courses().await,
                ViewId::Calendar | ViewId::Event => ctx.load_events().await,
                ViewId::Admin => ctx.load_users().await,
                _ => Ok(()),
            }
        });
    }
}

/// Run the portal until `quit` or end of input.
pub async fn run_app(config: PortalConfig) -> Result<()> {
    let transport = Arc::new(ReqwestTransport::new()?);
    let frame_interval = config.frame_interval();
    let timing = config.transition.timing();
    let ctx = Rc::new(AppContext::new(config, transport));
    let mut app = PortalApp::new(ctx, Box::new(SystemClock::new()), timing)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("[Portal] started, frame interval {:?}", frame_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(output) = app.tick() {
                    println!("{}", output);
                }
            }
            line = rx.recv() => {
                let Some(line) = line else {
                    info!("[Portal] stdin closed");
                    break;
                };
                match parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        if let Some(output) = app.handle(command) {
                            println!("{}", output);
                        }
                    }
                    Err(CommandError::Empty) => {}
                    Err(e) => println!("{}", e),
                }
            }
        }
    }

    info!("[Portal] exiting");
    Ok(())
}
