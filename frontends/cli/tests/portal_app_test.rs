use portal_cli::models::Role;
use portal_cli::{AppContext, PortalApp, PortalConfig, ViewId, parse_command};
use portal_firestore::FakeTransport;
use portal_navigation::{ManualClock, TransitionTiming};
use serde_json::json;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

const STEP: Duration = Duration::from_millis(50);

fn setup() -> (PortalApp, FakeTransport, ManualClock) {
    let config = PortalConfig::from_yaml_str(
        r#"
firebase:
  api_key: "test-key"
  project_id: "campus"
"#,
    )
    .unwrap();
    let fake = FakeTransport::new();
    let clock = ManualClock::new();
    let ctx = Rc::new(AppContext::new(config, Arc::new(fake.clone())));
    let timing = TransitionTiming {
        fade: Duration::from_millis(100),
        settle: Duration::from_millis(100),
    };
    let app = PortalApp::new(ctx, Box::new(clock.clone()), timing).unwrap();
    (app, fake, clock)
}

fn run(app: &mut PortalApp, clock: &ManualClock, line: &str) {
    assert_eq!(app.handle(parse_command(line).unwrap()), None);
    for _ in 0..200 {
        app.tick();
        if !app.in_transition() {
            return;
        }
        clock.advance(STEP);
    }
    panic!("transition after `{}` did not finish", line);
}

fn sign_in_response(uid: &str) -> serde_json::Value {
    json!({
        "idToken": format!("token-{}", uid),
        "refreshToken": "refresh",
        "localId": uid,
        "email": "ada@example.edu",
        "registered": true
    })
}

fn profile_response(uid: &str, role: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/campus/databases/(default)/documents/users/{}", uid),
        "fields": {
            "display_name": {"stringValue": "Ada"},
            "email": {"stringValue": "ada@example.edu"},
            "role": {"stringValue": role},
            "enrolled_courses": {"arrayValue": {"values": [{"stringValue": "CS401"}]}}
        }
    })
}

#[test]
fn test_starts_on_anonymous_homepage() {
    let (mut app, fake, _clock) = setup();
    assert_eq!(app.current_view(), ViewId::AnonymousHomepage);
    let output = app.tick().unwrap();
    assert!(output.contains("== Welcome =="));
    assert!(app.tick().is_none(), "unchanged frames are not printed again");
    assert!(fake.requests().is_empty());
}

#[test]
fn test_admin_login_lands_on_admin_homepage() {
    let (mut app, fake, clock) = setup();
    fake.respond(200, sign_in_response("u1"));
    fake.respond(200, profile_response("u1", "admin"));

    run(&mut app, &clock, "login ada@example.edu secret");

    assert_eq!(app.current_view(), ViewId::AdminHomepage);
    let session = app.context().session();
    assert!(session.is_signed_in());
    assert_eq!(session.role, Role::Admin);
    assert!(app.last_output().unwrap().contains("Administration - Ada"));

    let requests = fake.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].url.ends_with("/accounts:signInWithPassword"));
    assert!(requests[1].url.ends_with("/documents/users/u1"));
    assert_eq!(requests[1].bearer_token.as_deref(), Some("token-u1"));
}

#[test]
fn test_missing_profile_defaults_to_user_role() {
    let (mut app, fake, clock) = setup();
    fake.respond(200, sign_in_response("u2"));
    fake.respond(
        404,
        json!({"error": {"code": 404, "message": "Document not found", "status": "NOT_FOUND"}}),
    );

    run(&mut app, &clock, "login ada@example.edu secret");

    assert_eq!(app.current_view(), ViewId::UserHomepage);
    assert_eq!(app.context().session().role, Role::User);
    assert!(app.context().session().profile.is_none());
}

#[test]
fn test_failed_login_shows_alert_and_stays() {
    let (mut app, fake, clock) = setup();
    fake.respond(
        400,
        json!({"error": {"code": 400, "message": "INVALID_PASSWORD", "errors": []}}),
    );

    run(&mut app, &clock, "login ada@example.edu wrong");

    assert_eq!(app.current_view(), ViewId::AnonymousHomepage);
    assert!(!app.context().session().is_signed_in());
    assert_eq!(
        app.context().current_alert(Instant::now()).as_deref(),
        Some("Wrong email or password")
    );
    assert!(app.last_output().unwrap().starts_with("! Wrong email or password"));
    assert_eq!(fake.requests().len(), 1);
}

#[test]
fn test_sign_up_with_existing_email() {
    let (mut app, fake, clock) = setup();
    fake.respond(400, json!({"error": {"code": 400, "message": "EMAIL_EXISTS"}}));

    run(&mut app, &clock, "signup ada@example.edu secret");

    assert_eq!(app.current_view(), ViewId::AnonymousHomepage);
    assert_eq!(
        app.context().current_alert(Instant::now()).as_deref(),
        Some("An account with this email already exists")
    );
    assert!(fake.last_request().unwrap().url.ends_with("/accounts:signUp"));
}

#[test]
fn test_courses_are_fetched_during_the_transition() {
    let (mut app, fake, clock) = setup();
    fake.respond(
        200,
        json!({
            "documents": [
                {
                    "name": "projects/campus/databases/(default)/documents/courses/c1",
                    "fields": {
                        "title": {"stringValue": "Compilers"},
                        "code": {"stringValue": "CS401"},
                        "credits": {"integerValue": "6"}
                    }
                },
                {"name": "projects/campus/databases/(default)/documents/courses/draft"}
            ]
        }),
    );

    run(&mut app, &clock, "go courses");

    assert_eq!(app.current_view(), ViewId::Courses);
    let data = app.context().data();
    assert_eq!(data.courses.len(), 1);
    assert_eq!(data.courses["c1"].title, "Compilers");
    drop(data);
    assert!(app.last_output().unwrap().contains("CS401 Compilers (6 cr)"));

    let request = fake.last_request().unwrap();
    assert!(request.url.ends_with("/documents/courses"));
    assert!(
        request
            .query
            .contains(&("orderBy".to_string(), "code".to_string()))
    );
}

#[test]
fn test_admin_screen_is_restricted_for_anonymous_users() {
    let (mut app, fake, clock) = setup();

    run(&mut app, &clock, "go admin");

    assert_eq!(app.current_view(), ViewId::Admin);
    assert!(app.last_output().unwrap().contains("Restricted"));
    assert!(fake.requests().is_empty());
}

#[test]
fn test_logout_returns_to_anonymous_homepage() {
    let (mut app, fake, clock) = setup();
    fake.respond(200, sign_in_response("u1"));
    fake.respond(200, profile_response("u1", "user"));
    run(&mut app, &clock, "login ada@example.edu secret");
    assert_eq!(app.current_view(), ViewId::UserHomepage);

    run(&mut app, &clock, "logout");

    assert_eq!(app.current_view(), ViewId::AnonymousHomepage);
    assert!(!app.context().session().is_signed_in());
    assert_eq!(app.context().homepage(), ViewId::AnonymousHomepage);
    assert_eq!(fake.requests().len(), 2);
}

#[test]
fn test_profile_is_refreshed_on_every_transition_when_signed_in() {
    let (mut app, fake, clock) = setup();
    fake.respond(200, sign_in_response("u1"));
    fake.respond(200, profile_response("u1", "user"));
    run(&mut app, &clock, "login ada@example.edu secret");

    fake.respond(200, profile_response("u1", "admin"));
    run(&mut app, &clock, "go about");

    assert_eq!(app.current_view(), ViewId::About);
    assert_eq!(app.context().session().role, Role::Admin);
    assert_eq!(app.context().homepage(), ViewId::AdminHomepage);
}

#[test]
fn test_navigation_during_loading_still_fetches_new_target() {
    let (mut app, fake, clock) = setup();
    assert_eq!(app.handle(parse_command("go about").unwrap()), None);
    // Fade out, show the indicator, then run the profile refresh
    for _ in 0..4 {
        app.tick();
        clock.advance(STEP);
    }
    assert!(app.last_output().unwrap().contains("[loading...]"));

    fake.respond(
        200,
        json!({
            "documents": [{
                "name": "projects/campus/databases/(default)/documents/courses/c1",
                "fields": {
                    "title": {"stringValue": "Compilers"},
                    "code": {"stringValue": "CS401"},
                    "credits": {"integerValue": "6"}
                }
            }]
        }),
    );
    run(&mut app, &clock, "go courses");

    assert_eq!(app.current_view(), ViewId::Courses);
    assert_eq!(app.context().data().courses.len(), 1);
    assert_eq!(fake.requests().len(), 1);
    assert!(app.last_output().unwrap().contains("CS401 Compilers (6 cr)"));
}
