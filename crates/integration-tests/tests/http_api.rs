//! The JSON API driven through the router.

use axum::http::{Method, StatusCode};
use serde_json::json;

use staple_core::{Email, NotificationEvent};
use staple_integration_tests::TestApp;

const EMAIL: &str = "reader@example.com";
const PASSWORD: &str = "password123";

// =============================================================================
// Health / Auth
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();

    let live = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(live.status, StatusCode::OK);

    let ready = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(ready.status, StatusCode::OK);
}

#[tokio::test]
async fn test_staples_require_login() {
    let app = TestApp::new();

    let res = app.request(Method::GET, "/staples", None, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "authentication required");
}

#[tokio::test]
async fn test_register_twice_conflicts() {
    let app = TestApp::new();
    app.sign_up(EMAIL, PASSWORD).await;

    let res = app
        .request(
            Method::POST,
            "/auth/register",
            Some(json!({ "email": EMAIL, "password": "other" })),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let app = TestApp::new();
    app.sign_up(EMAIL, PASSWORD).await;

    let res = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": EMAIL, "password": "wrong" })),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "invalid email or password");
}

#[tokio::test]
async fn test_register_sends_welcome() {
    let app = TestApp::new();
    app.sign_up(EMAIL, PASSWORD).await;

    let email = Email::parse(EMAIL).unwrap();
    assert!(
        app.notifier
            .last_payload(&email, NotificationEvent::Welcome)
            .is_some()
    );
}

// =============================================================================
// Staples
// =============================================================================

#[tokio::test]
async fn test_staple_lifecycle() {
    let app = TestApp::new();
    let cookie = app.sign_up(EMAIL, PASSWORD).await;

    for n in 0..2 {
        let res = app
            .request(
                Method::POST,
                "/staples",
                Some(json!({ "name": format!("article {n}"), "content": "text" })),
                Some(&cookie),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(res.body["staple"]["id"], n);
        assert_eq!(res.body["staple"]["archived"], false);
    }

    let listed = app.request(Method::GET, "/staples", None, Some(&cookie)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["staples"].as_array().unwrap().len(), 2);

    let next = app
        .request(Method::GET, "/staples/next", None, Some(&cookie))
        .await;
    assert_eq!(next.body["staple"]["id"], 0);

    let archived = app
        .request(Method::POST, "/staples/0/archive", None, Some(&cookie))
        .await;
    assert_eq!(archived.status, StatusCode::NO_CONTENT);

    let gone = app.request(Method::GET, "/staples/0", None, Some(&cookie)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let archive = app
        .request(Method::GET, "/staples/archive", None, Some(&cookie))
        .await;
    assert_eq!(archive.body["staples"][0]["id"], 0);

    let deleted = app
        .request(Method::DELETE, "/staples/1", None, Some(&cookie))
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let empty = app
        .request(Method::GET, "/staples/next", None, Some(&cookie))
        .await;
    assert_eq!(empty.status, StatusCode::OK);
    assert!(empty.body["staple"].is_null());

    let missing = app
        .request(Method::DELETE, "/staples/1", None, Some(&cookie))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_content_is_rejected() {
    let app = TestApp::new();
    let cookie = app.sign_up(EMAIL, PASSWORD).await;

    let res = app
        .request(
            Method::POST,
            "/staples",
            Some(json!({ "name": "blank", "content": "" })),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_quota_limits_creation() {
    let app = TestApp::new();
    let cookie = app.sign_up(EMAIL, PASSWORD).await;

    let set = app
        .request(
            Method::PUT,
            "/account/quota",
            Some(json!({ "max_staples": 1 })),
            Some(&cookie),
        )
        .await;
    assert_eq!(set.status, StatusCode::NO_CONTENT);

    let quota = app
        .request(Method::GET, "/account/quota", None, Some(&cookie))
        .await;
    assert_eq!(quota.body["max_staples"], 1);

    let staple = json!({ "content": "text" });
    let first = app
        .request(Method::POST, "/staples", Some(staple.clone()), Some(&cookie))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app
        .request(Method::POST, "/staples", Some(staple), Some(&cookie))
        .await;
    assert_eq!(second.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        second.body["message"],
        "cannot create more staples than 1; current count is: 1"
    );
}

#[tokio::test]
async fn test_quota_out_of_range() {
    let app = TestApp::new();
    let cookie = app.sign_up(EMAIL, PASSWORD).await;

    for n in [0, 101] {
        let res = app
            .request(
                Method::PUT,
                "/account/quota",
                Some(json!({ "max_staples": n })),
                Some(&cookie),
            )
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Recovery / Account
// =============================================================================

#[tokio::test]
async fn test_password_recovery_flow() {
    let app = TestApp::new();
    app.sign_up(EMAIL, PASSWORD).await;
    let email = Email::parse(EMAIL).unwrap();

    let sent = app
        .request(Method::POST, "/auth/reset", Some(json!({ "email": EMAIL })), None)
        .await;
    assert_eq!(sent.status, StatusCode::NO_CONTENT);
    let code = app
        .notifier
        .last_payload(&email, NotificationEvent::ConfirmCode)
        .unwrap();

    let wrong = app
        .request(
            Method::POST,
            "/auth/reset/verify",
            Some(json!({ "email": EMAIL, "code": "nope" })),
            None,
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);

    let verified = app
        .request(
            Method::POST,
            "/auth/reset/verify",
            Some(json!({ "email": EMAIL, "code": code })),
            None,
        )
        .await;
    assert_eq!(verified.status, StatusCode::NO_CONTENT);

    let new_password = app
        .notifier
        .last_payload(&email, NotificationEvent::PasswordReset)
        .unwrap();
    let login = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": EMAIL, "password": new_password })),
            None,
        )
        .await;
    assert_eq!(login.status, StatusCode::NO_CONTENT);

    let old = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": EMAIL, "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reset_for_unknown_email_looks_the_same() {
    let app = TestApp::new();

    let res = app
        .request(
            Method::POST,
            "/auth/reset",
            Some(json!({ "email": "ghost@example.com" })),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_reset_delivery_failure() {
    let app = TestApp::new();
    app.sign_up(EMAIL, PASSWORD).await;
    app.notifier.fail_with(Some("mailbox unavailable"));

    let res = app
        .request(Method::POST, "/auth/reset", Some(json!({ "email": EMAIL })), None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_change_password_and_delete_account() {
    let app = TestApp::new();
    let cookie = app.sign_up(EMAIL, PASSWORD).await;

    let changed = app
        .request(
            Method::POST,
            "/account/password",
            Some(json!({ "password": "changed" })),
            Some(&cookie),
        )
        .await;
    assert_eq!(changed.status, StatusCode::NO_CONTENT);

    let wrong = app
        .request(
            Method::DELETE,
            "/account",
            Some(json!({ "password": PASSWORD })),
            Some(&cookie),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let deleted = app
        .request(
            Method::DELETE,
            "/account",
            Some(json!({ "password": "changed" })),
            Some(&cookie),
        )
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let after = app.request(Method::GET, "/staples", None, Some(&cookie)).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    let cookie = app.sign_up(EMAIL, PASSWORD).await;

    let res = app
        .request(Method::POST, "/auth/logout", None, Some(&cookie))
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let after = app.request(Method::GET, "/staples", None, Some(&cookie)).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}
