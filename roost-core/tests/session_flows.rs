/*
    session_flows.rs - End-to-end session flows

    Drives an AppContext against the in-memory backend: anonymous launch,
    account creation, incomplete profiles, sign-out and posting.
*/

use roost_core::app::{AppCollaborators, AppContext, AppError, AppTasks};
use roost_core::config::Config;
use roost_core::core_backend::{MemoryBackend, Operation};
use roost_core::core_loadable::{Loadable, TransportError};
use roost_core::core_model::{MessageRow, Profile, ProfileCandidate, RemotePost, Uid, UserKey, UserType};
use roost_core::core_session::{MemoryActivityLog, SessionError, SessionPhase};
use roost_core::test_utils::wait_for_state;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    backend: Arc<MemoryBackend>,
    activity: Arc<MemoryActivityLog>,
    app: AppContext,
    _tasks: AppTasks,
}

fn offline_config() -> Config {
    let mut config = Config::default();
    config.cache.enabled = false;
    config.session.flag_reset_delay = Duration::from_millis(50);
    config
}

async fn started(config: Config) -> Fixture {
    let backend = Arc::new(MemoryBackend::new());
    let activity = Arc::new(MemoryActivityLog::new());
    let app = AppContext::new(
        config,
        AppCollaborators::in_memory(backend.clone(), activity.clone()),
    )
    .unwrap();
    let tasks = app.start().await.unwrap();

    Fixture {
        backend,
        activity,
        app,
        _tasks: tasks,
    }
}

fn message(id: &str, at: u64, from: &UserKey, to: &UserKey, text: &str) -> RemotePost {
    RemotePost::Message(MessageRow {
        id: id.to_string(),
        sent_at: at,
        sender: from.clone(),
        recipient: to.clone(),
        subject: "hi".to_string(),
        text: text.to_string(),
        reply_to: None,
        statuses: Vec::new(),
    })
}

/// Link the anonymous session to `email`, create the profile and wait for posts
async fn sign_up(fixture: &Fixture, email: &str, name: &str) -> Uid {
    let session = fixture.app.session();
    let uid = session.sign_in_or_create(email, "secret1").await.unwrap();

    let me = UserKey::new(uid.clone(), name);
    let bob = UserKey::new(Uid::new("bob"), "Bob");
    fixture.backend.seed_rows(vec![message("m1", 100, &bob, &me, "welcome aboard")]);

    session
        .create_profile_saga(ProfileCandidate::new(uid.clone(), name))
        .await
        .unwrap();

    let mut posts = fixture.app.posts().watch();
    wait_for_state(&mut posts, |state| state.is_loaded()).await;
    uid
}

#[tokio::test]
async fn test_fresh_launch_is_anonymous() {
    let fixture = started(offline_config()).await;
    let snapshot = fixture.app.session().snapshot();

    assert_eq!(snapshot.phase, SessionPhase::Anonymous);
    assert!(snapshot.is_anonymous());
    assert_eq!(fixture.app.posts().state(), Loadable::Empty);
    assert!(fixture.app.filter().is_enabled());
    assert_eq!(fixture.backend.call_count(Operation::SignInAnonymously), 1);
}

#[tokio::test]
async fn test_link_keeps_uid_and_loads_posts() {
    let fixture = started(offline_config()).await;
    let anonymous_uid = fixture.app.session().snapshot().uid().cloned().unwrap();

    let uid = sign_up(&fixture, "ada@roost.app", "Ada").await;

    assert_eq!(uid, anonymous_uid);
    assert_eq!(fixture.app.session().phase(), SessionPhase::Unverified);
    assert_eq!(fixture.backend.verification_emails_sent(), 1);

    let partners = fixture.app.partners();
    assert_eq!(partners.len(), 1);
    assert_eq!(partners[0].key.display_name, "Bob");
    assert_eq!(fixture.app.search("aboard").len(), 1);
    assert!(fixture.app.metrics().snapshot().sign_ins >= 1);
}

#[tokio::test]
async fn test_incomplete_profile_then_complete() {
    let fixture = started(offline_config()).await;
    let uid = fixture.backend.add_account("cy@roost.app", "secret1", false);
    let session = fixture.app.session();

    session.sign_in_existing("cy@roost.app", "secret1").await.unwrap();
    let mut rx = session.watch();
    let snapshot = wait_for_state(&mut rx, |s| s.phase == SessionPhase::ProfileIncomplete).await;
    assert_eq!(snapshot.uid(), Some(&uid));
    assert!(snapshot.flags.account_incomplete);

    let profile = session.complete_profile("Cy").await.unwrap();
    assert_eq!(profile.display_name, "Cy");
    assert_eq!(session.phase(), SessionPhase::Unverified);

    fixture.backend.verify_email("cy@roost.app");
    assert_eq!(session.refresh_verification().await.unwrap(), SessionPhase::Verified);
    assert!(fixture.activity.events().iter().any(|e| e == "email verified"));
}

#[tokio::test]
async fn test_existing_credential_signs_in_instead_of_linking() {
    let fixture = started(offline_config()).await;
    let uid = fixture.backend.add_account("dee@roost.app", "secret1", true);
    fixture.backend.add_profile(Profile {
        uid: uid.clone(),
        display_name: "Dee".to_string(),
        photo_url: None,
        user_type: UserType::Standard,
    });
    let session = fixture.app.session();

    let signed_in = session.sign_in_or_create("dee@roost.app", "secret1").await.unwrap();
    assert_eq!(signed_in, uid);

    let mut rx = session.watch();
    let snapshot = wait_for_state(&mut rx, |s| s.phase == SessionPhase::Verified).await;
    assert_eq!(snapshot.user().unwrap().key().display_name, "Dee");
    assert!(!snapshot.flags.creating_account);
    assert_eq!(fixture.backend.call_count(Operation::CreateIdentity), 0);
}

#[tokio::test]
async fn test_sign_out_keeps_posts_by_default() {
    let fixture = started(offline_config()).await;
    sign_up(&fixture, "ada@roost.app", "Ada").await;

    fixture.app.session().sign_out().await.unwrap();

    assert_eq!(fixture.app.session().phase(), SessionPhase::Anonymous);
    assert!(fixture.app.posts().is_loaded());
}

#[tokio::test]
async fn test_sign_out_resets_posts_when_enabled() {
    let mut config = offline_config();
    config.features.reset_stores_on_sign_out = true;
    let fixture = started(config).await;
    sign_up(&fixture, "ada@roost.app", "Ada").await;

    fixture.app.session().sign_out().await.unwrap();

    let mut posts = fixture.app.posts().watch();
    wait_for_state(&mut posts, |state| matches!(state, Loadable::Empty)).await;
    assert_eq!(fixture.app.session().phase(), SessionPhase::Anonymous);
}

#[tokio::test]
async fn test_account_created_flag_clears_after_delay() {
    let fixture = started(offline_config()).await;
    sign_up(&fixture, "ada@roost.app", "Ada").await;

    let mut rx = fixture.app.session().watch();
    let snapshot = wait_for_state(&mut rx, |s| !s.flags.account_created).await;
    assert_eq!(snapshot.phase, SessionPhase::Unverified);
}

#[tokio::test]
async fn test_submit_post_validates_then_sends() {
    let fixture = started(offline_config()).await;
    sign_up(&fixture, "ada@roost.app", "Ada").await;
    let bob = UserKey::new(Uid::new("bob"), "Bob");

    let post = fixture.app.submit_post(bob.clone(), "lunch", "noon at the park?").await.unwrap();
    assert_eq!(fixture.app.posts().items().first(), Some(&post));

    let err = fixture
        .app
        .submit_post(bob, "lunch", "you are stupid")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Session(SessionError::InputValidation(_))));
    assert_eq!(fixture.backend.call_count(Operation::CreatePost), 1);
}

#[tokio::test]
async fn test_failed_post_is_reported() {
    let fixture = started(offline_config()).await;
    sign_up(&fixture, "ada@roost.app", "Ada").await;
    fixture
        .backend
        .fail_next(Operation::CreatePost, TransportError::Unavailable("offline".into()));

    let before = fixture.app.posts().len();
    let err = fixture
        .app
        .submit_post(UserKey::new(Uid::new("bob"), "Bob"), "lunch", "noon?")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Store(_)));
    assert_eq!(fixture.app.posts().len(), before);
    assert!(fixture.app.posts().last_error().is_some());
}
