//! Terminal host for the campus portal
//!
//! Screens are rendered as text, navigation runs through the animated
//! transition controller, and data comes from Firebase over REST.

pub mod app;
pub mod config;
pub mod launcher;
pub mod models;
pub mod screens;
pub mod views;

pub use app::{AlertBanner, AppContext, PortalData, Session};
pub use config::PortalConfig;
pub use launcher::{Command, PortalApp, parse_command, run_app};
pub use views::ViewId;
