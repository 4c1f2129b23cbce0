use std::sync::Arc;

use actix_web::{
    body::MessageBody,
    cookie::Cookie,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test::{self, TestRequest},
    web, App,
};
use campushub::{
    config::{Config, MIN_BCRYPT_COST},
    db::{MemoryStore, Store},
    dto::UserPatch,
    models::Session,
    service::{crypto, mail::LogMailer},
    AppState,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

const ADMIN_PASSWORD: &str = "let-me-in";

fn test_state() -> (web::Data<AppState>, Arc<MemoryStore>) {
    let memory = Arc::new(MemoryStore::default());
    let upload_dir = std::env::temp_dir().join("campushub-test-uploads");
    std::fs::create_dir_all(&upload_dir).unwrap();
    let config = Config {
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        bcrypt_cost: MIN_BCRYPT_COST,
        upload_dir,
        ..Config::default()
    };
    let state = web::Data::new(AppState {
        store: memory.clone(),
        mailer: Arc::new(LogMailer),
        config,
    });
    (state, memory)
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(App::new().configure(campushub::routes($state.clone()))).await
    };
}

struct Reply {
    status: StatusCode,
    body: Value,
    cookies: Vec<Cookie<'static>>,
}

impl Reply {
    fn cookie(&self, name: &str) -> Cookie<'static> {
        self.cookies
            .iter()
            .find(|c| c.name() == name)
            .cloned()
            .unwrap_or_else(|| panic!("response did not set cookie {name}"))
    }

    fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

/// Middleware rejections come back as `Err`; render them like the server does.
async fn send<S, R, B>(app: &S, req: R) -> Reply
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match test::try_call_service(app, req).await {
        Ok(resp) => {
            let status = resp.status();
            let cookies = resp.response().cookies().map(|c| c.into_owned()).collect();
            let bytes = test::read_body(resp).await;
            Reply {
                status,
                body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
                cookies,
            }
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
            Reply {
                status,
                body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
                cookies: Vec::new(),
            }
        }
    }
}

async fn verification_code(memory: &MemoryStore, email: &str) -> (Uuid, String) {
    let user = memory.find_user_by_email(email).await.unwrap().unwrap();
    (user.id, user.verification_code.unwrap())
}

/// Signs up and verifies, returning the session cookie and user id.
async fn register<S, B>(
    app: &S,
    memory: &MemoryStore,
    email: &str,
    username: &str,
) -> (Cookie<'static>, Uuid)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let reply = send(
        app,
        TestRequest::post()
            .uri("/api/auth/signup")
            .set_json(json!({ "email": email, "password": "secret123", "username": username }))
            .to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let (user_id, code) = verification_code(memory, email).await;
    let reply = send(
        app,
        TestRequest::post()
            .uri("/api/auth/verify")
            .set_json(json!({ "userId": user_id, "code": code }))
            .to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    (reply.cookie("session"), user_id)
}

async fn create_event<S, B>(app: &S, session: &Cookie<'static>, title: &str, date: String) -> Reply
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    send(
        app,
        TestRequest::post()
            .uri("/api/events")
            .cookie(session.clone())
            .set_json(json!({
                "title": title,
                "description": "Open to all students",
                "date": date,
                "category": "social",
            }))
            .to_request(),
    )
    .await
}

const BOUNDARY: &str = "campushub-form-boundary";

/// One-field `multipart/form-data` request to the upload endpoint.
fn upload_request(field: &str, content_type: &str, bytes: &[u8]) -> TestRequest {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"poster.bin\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    TestRequest::post()
        .uri("/api/upload")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(body)
}

fn in_days(days: i64) -> String {
    (Utc::now() + Duration::days(days)).to_rfc3339()
}

#[actix_rt::test]
async fn past_events_are_rejected_and_future_ones_listed() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let (session, _) = register(&app, &memory, "ana@uni.edu", "ana").await;

    let past = create_event(&app, &session, "Yesterday", in_days(-1)).await;
    assert_eq!(past.status, StatusCode::BAD_REQUEST);
    assert_eq!(past.error(), "Cannot create events in the past");

    let created = create_event(&app, &session, "Board games", in_days(2)).await;
    assert_eq!(created.status, StatusCode::OK);
    assert_eq!(created.body["success"], true);

    let list = send(&app, TestRequest::get().uri("/api/events").to_request()).await;
    let events = list.body["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], "Board games");
    assert_eq!(events[0]["imageUrl"], "/vibrant-campus-event.png");
    assert!(events[0].get("likes").is_none());

    let filtered = send(
        &app,
        TestRequest::get()
            .uri("/api/events?category=sports")
            .to_request(),
    )
    .await;
    assert!(filtered.body["events"].as_array().unwrap().is_empty());

    let bad = send(
        &app,
        TestRequest::get()
            .uri("/api/events?category=raves")
            .to_request(),
    )
    .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.error(), "Invalid category");
}

#[actix_rt::test]
async fn pending_signup_is_refreshed_until_verified() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let signup = |username: &str| {
        TestRequest::post()
            .uri("/api/auth/signup")
            .set_json(json!({ "email": "bo@uni.edu", "password": "secret123", "username": username }))
            .to_request()
    };

    let first = send(&app, signup("bo")).await;
    assert_eq!(first.status, StatusCode::OK);
    let second = send(&app, signup("bo2")).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(first.body["userId"], second.body["userId"]);

    let (user_id, code) = verification_code(&memory, "bo@uni.edu").await;
    let user = memory.find_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.username, "bo2");
    assert!(!user.email_verified);

    let verify = || {
        TestRequest::post()
            .uri("/api/auth/verify")
            .set_json(json!({ "userId": user_id, "code": code.clone() }))
            .to_request()
    };
    assert_eq!(send(&app, verify()).await.status, StatusCode::OK);
    let reused = send(&app, verify()).await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
    assert_eq!(reused.error(), "Email already verified");

    let again = send(&app, signup("bo3")).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.error(), "Email already registered");
}

#[actix_rt::test]
async fn signin_requires_verified_email_and_right_password() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    send(
        &app,
        TestRequest::post()
            .uri("/api/auth/signup")
            .set_json(json!({ "email": "cy@uni.edu", "password": "secret123", "username": "cy" }))
            .to_request(),
    )
    .await;
    let signin = |password: &str| {
        TestRequest::post()
            .uri("/api/auth/signin")
            .set_json(json!({ "email": "cy@uni.edu", "password": password }))
            .to_request()
    };

    let unverified = send(&app, signin("secret123")).await;
    assert_eq!(unverified.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unverified.error(), "Please verify your email first");

    let (user_id, code) = verification_code(&memory, "cy@uni.edu").await;
    send(
        &app,
        TestRequest::post()
            .uri("/api/auth/verify")
            .set_json(json!({ "userId": user_id, "code": code }))
            .to_request(),
    )
    .await;

    let wrong = send(&app, signin("secret999")).await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.error(), "Invalid credentials");

    let ok = send(&app, signin("secret123")).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["user"]["username"], "cy");
    assert_eq!(memory.session_count(user_id), 2);
}

#[actix_rt::test]
async fn like_then_dislike_moves_the_vote() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let (session, user_id) = register(&app, &memory, "di@uni.edu", "di").await;
    let created = create_event(&app, &session, "Open mic", in_days(1)).await;
    let event_id = created.body["eventId"].as_str().unwrap().to_string();

    let like = send(
        &app,
        TestRequest::post()
            .uri(&format!("/api/events/{event_id}/like"))
            .cookie(session.clone())
            .to_request(),
    )
    .await;
    assert_eq!(like.body["liked"], true);

    let dislike = send(
        &app,
        TestRequest::post()
            .uri(&format!("/api/events/{event_id}/dislike"))
            .cookie(session.clone())
            .to_request(),
    )
    .await;
    assert_eq!(dislike.body["disliked"], true);

    let detail = send(
        &app,
        TestRequest::get()
            .uri(&format!("/api/events/{event_id}"))
            .to_request(),
    )
    .await;
    assert_eq!(detail.body["event"]["likes"], json!([]));
    assert_eq!(detail.body["event"]["dislikes"], json!([user_id]));

    let list = send(
        &app,
        TestRequest::get()
            .uri("/api/events")
            .cookie(session.clone())
            .to_request(),
    )
    .await;
    let viewer = &list.body["events"][0]["viewer"];
    assert_eq!(viewer["liked"], false);
    assert_eq!(viewer["disliked"], true);
}

#[actix_rt::test]
async fn reacting_twice_with_same_emoji_restores_state() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let (session, _) = register(&app, &memory, "ed@uni.edu", "ed").await;
    let created = create_event(&app, &session, "Film night", in_days(4)).await;
    let uri = format!("/api/events/{}/react", created.body["eventId"].as_str().unwrap());
    let react = |emoji: &str| {
        TestRequest::post()
            .uri(&uri)
            .cookie(session.clone())
            .set_json(json!({ "emoji": emoji }))
            .to_request()
    };

    assert_eq!(send(&app, react("🎉")).await.body["reaction"], "added");
    assert_eq!(send(&app, react("🔥")).await.body["reaction"], "replaced");
    assert_eq!(send(&app, react("🔥")).await.body["reaction"], "removed");

    let empty = send(&app, react(" ")).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.error(), "Emoji is required");

    let list = send(&app, TestRequest::get().uri("/api/events").to_request()).await;
    assert_eq!(list.body["events"][0]["reactionsCount"], 0);
}

#[actix_rt::test]
async fn commenting_requires_session_and_content() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let (session, _) = register(&app, &memory, "fa@uni.edu", "fa").await;
    let created = create_event(&app, &session, "Career fair", in_days(6)).await;
    let uri = format!("/api/events/{}/comment", created.body["eventId"].as_str().unwrap());

    let anonymous = send(
        &app,
        TestRequest::post()
            .uri(&uri)
            .set_json(json!({ "content": "hi" }))
            .to_request(),
    )
    .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let empty = send(
        &app,
        TestRequest::post()
            .uri(&uri)
            .cookie(session.clone())
            .set_json(json!({ "content": "   " }))
            .to_request(),
    )
    .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.error(), "Comment cannot be empty");

    let posted = send(
        &app,
        TestRequest::post()
            .uri(&uri)
            .cookie(session.clone())
            .set_json(json!({ "content": "  see you there  " }))
            .to_request(),
    )
    .await;
    assert_eq!(posted.status, StatusCode::OK);
    assert_eq!(posted.body["comment"]["content"], "see you there");
    assert_eq!(posted.body["comment"]["username"], "fa");

    let missing = send(
        &app,
        TestRequest::post()
            .uri(&format!("/api/events/{}/comment", Uuid::new_v4()))
            .cookie(session.clone())
            .set_json(json!({ "content": "hello?" }))
            .to_request(),
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn account_deletion_scrubs_engagement_and_sessions() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let (gone, gone_id) = register(&app, &memory, "gi@uni.edu", "gi").await;
    let (stays, stays_id) = register(&app, &memory, "ha@uni.edu", "ha").await;
    let created = create_event(&app, &stays, "Hike", in_days(3)).await;
    let event_id = created.body["eventId"].as_str().unwrap().to_string();

    for (path, body) in [
        ("like", json!({})),
        ("react", json!({ "emoji": "👍" })),
        ("comment", json!({ "content": "count me in" })),
    ] {
        let reply = send(
            &app,
            TestRequest::post()
                .uri(&format!("/api/events/{event_id}/{path}"))
                .cookie(gone.clone())
                .set_json(body)
                .to_request(),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
    }
    send(
        &app,
        TestRequest::post()
            .uri(&format!("/api/events/{event_id}/like"))
            .cookie(stays.clone())
            .to_request(),
    )
    .await;

    let stats = send(
        &app,
        TestRequest::get()
            .uri("/api/user/stats")
            .cookie(gone.clone())
            .to_request(),
    )
    .await;
    assert_eq!(stats.body["stats"]["likesGiven"], 1);
    assert_eq!(stats.body["stats"]["commentsCount"], 1);
    assert_eq!(stats.body["stats"]["eventsInteracted"], 1);

    let wrong = send(
        &app,
        TestRequest::post()
            .uri("/api/user/delete")
            .cookie(gone.clone())
            .set_json(json!({ "password": "nope" }))
            .to_request(),
    )
    .await;
    assert_eq!(wrong.error(), "Incorrect password");

    let deleted = send(
        &app,
        TestRequest::post()
            .uri("/api/user/delete")
            .cookie(gone.clone())
            .set_json(json!({ "password": "secret123" }))
            .to_request(),
    )
    .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(memory.session_count(gone_id), 0);

    let detail = send(
        &app,
        TestRequest::get()
            .uri(&format!("/api/events/{event_id}"))
            .to_request(),
    )
    .await;
    let event = &detail.body["event"];
    assert_eq!(event["likes"], json!([stays_id]));
    assert_eq!(event["comments"], json!([]));
    assert_eq!(event["reactions"], json!([]));

    let me = send(
        &app,
        TestRequest::get().uri("/api/auth/me").cookie(gone).to_request(),
    )
    .await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    assert_eq!(me.error(), "Not authenticated");
}

#[actix_rt::test]
async fn username_changes_respect_cooldown() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let (session, user_id) = register(&app, &memory, "ik@uni.edu", "ik").await;
    register(&app, &memory, "jo@uni.edu", "jo").await;
    let rename = |username: &str| {
        TestRequest::put()
            .uri("/api/user/update")
            .cookie(session.clone())
            .set_json(json!({ "username": username }))
            .to_request()
    };

    let taken = send(&app, rename("jo")).await;
    assert_eq!(taken.error(), "Username already taken");

    assert_eq!(send(&app, rename("ik2")).await.status, StatusCode::OK);
    let too_soon = send(&app, rename("ik3")).await;
    assert_eq!(too_soon.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        too_soon.error(),
        "You can only change your username once every 3 weeks"
    );

    let backdated = UserPatch {
        last_username_change: Some(Utc::now() - Duration::days(21)),
        ..Default::default()
    };
    memory.update_user(user_id, &backdated).await.unwrap();
    assert_eq!(send(&app, rename("ik3")).await.status, StatusCode::OK);

    let me = send(
        &app,
        TestRequest::get().uri("/api/auth/me").cookie(session.clone()).to_request(),
    )
    .await;
    assert_eq!(me.body["user"]["username"], "ik3");
}

#[actix_rt::test]
async fn password_and_picture_updates() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let (session, user_id) = register(&app, &memory, "ka@uni.edu", "ka").await;
    let update = |body: Value| {
        TestRequest::put()
            .uri("/api/user/update")
            .cookie(session.clone())
            .set_json(body)
            .to_request()
    };

    let no_current = send(&app, update(json!({ "newPassword": "another1" }))).await;
    assert_eq!(no_current.error(), "Current password is required");
    let bad_current =
        send(&app, update(json!({ "currentPassword": "nope", "newPassword": "another1" }))).await;
    assert_eq!(bad_current.error(), "Current password is incorrect");
    let short =
        send(&app, update(json!({ "currentPassword": "secret123", "newPassword": "abc" }))).await;
    assert_eq!(short.error(), "New password must be at least 6 characters");

    send(&app, update(json!({ "profilePicture": "/uploads/me.png" }))).await;
    let user = memory.find_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.profile_picture.as_deref(), Some("/uploads/me.png"));

    send(&app, update(json!({ "username": "ka" }))).await;
    let user = memory.find_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.profile_picture.as_deref(), Some("/uploads/me.png"));
    assert_eq!(user.last_username_change, None);

    send(&app, update(json!({ "profilePicture": null }))).await;
    let user = memory.find_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.profile_picture, None);
}

#[actix_rt::test]
async fn signout_invalidates_the_session() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let (session, user_id) = register(&app, &memory, "li@uni.edu", "li").await;

    let out = send(
        &app,
        TestRequest::post()
            .uri("/api/auth/signout")
            .cookie(session.clone())
            .to_request(),
    )
    .await;
    assert_eq!(out.status, StatusCode::OK);
    assert_eq!(memory.session_count(user_id), 0);

    let me = send(
        &app,
        TestRequest::get().uri("/api/auth/me").cookie(session).to_request(),
    )
    .await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn admin_surface_is_guarded() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let (session, _) = register(&app, &memory, "mo@uni.edu", "mo").await;
    let created = create_event(&app, &session, "Quiz night", in_days(2)).await;
    let event_id = created.body["eventId"].as_str().unwrap().to_string();
    send(
        &app,
        TestRequest::post()
            .uri(&format!("/api/events/{event_id}/like"))
            .cookie(session.clone())
            .to_request(),
    )
    .await;

    let anonymous = send(&app, TestRequest::get().uri("/api/admin/events").to_request()).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let forged = send(
        &app,
        TestRequest::get()
            .uri("/api/admin/events")
            .cookie(Cookie::new("admin_session", "admin"))
            .to_request(),
    )
    .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

    let bad_login = send(
        &app,
        TestRequest::post()
            .uri("/api/admin/auth")
            .set_json(json!({ "password": "guess" }))
            .to_request(),
    )
    .await;
    assert_eq!(bad_login.status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad_login.error(), "Invalid password");

    let login = send(
        &app,
        TestRequest::post()
            .uri("/api/admin/auth")
            .set_json(json!({ "password": ADMIN_PASSWORD }))
            .to_request(),
    )
    .await;
    let admin = login.cookie("admin_session");

    let status = send(
        &app,
        TestRequest::get()
            .uri("/api/admin/auth")
            .cookie(admin.clone())
            .to_request(),
    )
    .await;
    assert_eq!(status.body["authenticated"], true);

    let list = send(
        &app,
        TestRequest::get()
            .uri("/api/admin/events")
            .cookie(admin.clone())
            .to_request(),
    )
    .await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.body["totals"]["totalEvents"], 1);
    assert_eq!(list.body["totals"]["totalLikes"], 1);

    let detail = send(
        &app,
        TestRequest::get()
            .uri(&format!("/api/admin/events/{event_id}"))
            .cookie(admin.clone())
            .to_request(),
    )
    .await;
    assert_eq!(detail.body["event"]["likedBy"], json!(["mo"]));

    let by_admin = send(
        &app,
        TestRequest::post()
            .uri("/api/admin/events")
            .cookie(admin.clone())
            .set_json(json!({
                "title": "Orientation",
                "description": "Welcome week",
                "date": in_days(10),
                "category": "academic",
            }))
            .to_request(),
    )
    .await;
    assert_eq!(by_admin.status, StatusCode::OK);
    let admin_event = by_admin.body["eventId"].as_str().unwrap().to_string();
    let shown = send(
        &app,
        TestRequest::get()
            .uri(&format!("/api/events/{admin_event}"))
            .to_request(),
    )
    .await;
    assert_eq!(shown.body["event"]["createdBy"], "admin");

    let removed = send(
        &app,
        TestRequest::delete()
            .uri(&format!("/api/admin/events/{admin_event}"))
            .cookie(admin)
            .to_request(),
    )
    .await;
    assert_eq!(removed.status, StatusCode::OK);
}

#[actix_rt::test]
async fn malformed_ids_are_not_found() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let (session, _) = register(&app, &memory, "ne@uni.edu", "ne").await;

    let reply = send(
        &app,
        TestRequest::get().uri("/api/events/not-a-uuid").to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body["error"].is_string());

    let update = send(
        &app,
        TestRequest::put()
            .uri(&format!("/api/events/{}", Uuid::new_v4()))
            .cookie(session)
            .set_json(json!({ "title": "Renamed" }))
            .to_request(),
    )
    .await;
    assert_eq!(update.status, StatusCode::NOT_FOUND);
    assert_eq!(update.error(), "Event not found");
}

#[actix_rt::test]
async fn expired_session_is_not_authenticated() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let (_, user_id) = register(&app, &memory, "ol@uni.edu", "ol").await;

    let token = crypto::generate_token();
    let now = Utc::now();
    let mut session = Session::new(crypto::get_sha3_256_hash(&token), user_id, now - Duration::days(8));
    session.expires_at = now - Duration::seconds(1);
    memory.insert_session(&session).await.unwrap();

    let me = send(
        &app,
        TestRequest::get()
            .uri("/api/auth/me")
            .cookie(Cookie::new("session", token))
            .to_request(),
    )
    .await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    assert_eq!(me.error(), "Not authenticated");
}

#[actix_rt::test]
async fn uploads_are_checked_stored_and_served() {
    let (state, memory) = test_state();
    let app = test_app!(state);
    let png = b"\x89PNG\r\n\x1a\nnot really a picture";

    let anonymous = send(&app, upload_request("file", "image/png", png).to_request()).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let (session, _) = register(&app, &memory, "pe@uni.edu", "pe").await;
    let with_session = |req: TestRequest| req.cookie(session.clone()).to_request();

    let stored = send(&app, with_session(upload_request("file", "image/png", png))).await;
    assert_eq!(stored.status, StatusCode::OK, "{}", stored.body);
    let url = stored.body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/") && url.ends_with(".png"));

    let served = test::call_service(&app, TestRequest::get().uri(&url).to_request()).await;
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(test::read_body(served).await.as_ref(), png.as_slice());

    let text = send(&app, with_session(upload_request("file", "text/plain", b"hello"))).await;
    assert_eq!(text.status, StatusCode::BAD_REQUEST);
    assert_eq!(text.error(), "Invalid file type");

    let huge = vec![0u8; 6 * 1024 * 1024];
    let too_large = send(&app, with_session(upload_request("file", "image/jpeg", &huge))).await;
    assert_eq!(too_large.status, StatusCode::BAD_REQUEST);
    assert_eq!(too_large.error(), "File too large");

    let wrong_field = send(&app, with_session(upload_request("avatar", "image/png", png))).await;
    assert_eq!(wrong_field.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_field.error(), "No file uploaded");
}
