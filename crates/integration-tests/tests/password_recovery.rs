//! Registration, password changes, and confirm-code recovery.

use staple_core::NotificationEvent;
use staple_integration_tests::TestContext;
use staple_server::db::CredentialStore;
use staple_server::services::UserError;

#[tokio::test]
async fn test_register_and_match() {
    let ctx = TestContext::new();
    let owner = ctx.register("reader@example.com", "password").await;

    assert!(ctx.users.password_match(&owner.email, "password").await.unwrap());
    assert!(!ctx.users.password_match(&owner.email, "Password").await.unwrap());
}

#[tokio::test]
async fn test_email_is_case_sensitive() {
    let ctx = TestContext::new();
    ctx.register("Reader@example.com", "password").await;

    let other = ctx.register("reader@example.com", "password").await;
    assert!(ctx.users.is_registered(&other.email).await.unwrap());
}

#[tokio::test]
async fn test_change_password() {
    let ctx = TestContext::new();
    let owner = ctx.register("reader@example.com", "password").await;

    ctx.users
        .change_password(&owner.email, "new password")
        .await
        .unwrap();

    assert!(!ctx.users.password_match(&owner.email, "password").await.unwrap());
    assert!(
        ctx.users
            .password_match(&owner.email, "new password")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_recovery_round_trip() {
    let ctx = TestContext::new();
    let owner = ctx.register("reader@example.com", "password").await;

    ctx.users.send_confirm_code(&owner.email).await.unwrap();
    let code = ctx.last_payload(&owner.email, NotificationEvent::ConfirmCode);
    assert!(
        has_pending_code(&ctx, &owner.email).await,
        "code is stored while recovery is pending"
    );

    assert!(
        ctx.users
            .verify_confirm_code(&owner.email, &code)
            .await
            .unwrap()
    );

    let new_password = ctx.last_payload(&owner.email, NotificationEvent::PasswordReset);
    assert_eq!(new_password.len(), 20);
    assert!(ctx.users.password_match(&owner.email, &new_password).await.unwrap());
    assert!(!ctx.users.password_match(&owner.email, "password").await.unwrap());

    // Single use
    let err = ctx
        .users
        .verify_confirm_code(&owner.email, &code)
        .await
        .unwrap_err();
    assert!(matches!(err, UserError::CodeMismatch));
}

#[tokio::test]
async fn test_new_code_replaces_old() {
    let ctx = TestContext::new();
    let owner = ctx.register("reader@example.com", "password").await;

    ctx.users.send_confirm_code(&owner.email).await.unwrap();
    let stale = ctx.last_payload(&owner.email, NotificationEvent::ConfirmCode);
    ctx.users.send_confirm_code(&owner.email).await.unwrap();
    let fresh = ctx.last_payload(&owner.email, NotificationEvent::ConfirmCode);
    assert_ne!(stale, fresh);

    let err = ctx
        .users
        .verify_confirm_code(&owner.email, &stale)
        .await
        .unwrap_err();
    assert!(matches!(err, UserError::CodeMismatch));
    assert!(ctx.users.verify_confirm_code(&owner.email, &fresh).await.unwrap());
}

#[tokio::test]
async fn test_verify_unknown_user() {
    let ctx = TestContext::new();
    let email = staple_core::Email::parse("ghost@example.com").unwrap();
    let err = ctx
        .users
        .verify_confirm_code(&email, "whatever")
        .await
        .unwrap_err();
    assert!(matches!(err, UserError::NotFound));
}

#[tokio::test]
async fn test_reset_notifies_with_template() {
    let ctx = TestContext::new();
    let owner = ctx.register("reader@example.com", "password").await;

    ctx.users.reset_password(&owner.email).await.unwrap();

    let sent = ctx.notifier.sent();
    let reset = sent
        .iter()
        .find(|n| n.event == NotificationEvent::PasswordReset)
        .unwrap();
    assert!(reset.rendered.body.starts_with("Dear reader@example.com"));
    assert!(reset.rendered.body.contains(&reset.payload));
}

#[tokio::test]
async fn test_delete_account() {
    let ctx = TestContext::new();
    let owner = ctx.register("reader@example.com", "password").await;

    let err = ctx.users.delete(&owner.email, "nope").await.unwrap_err();
    assert!(matches!(err, UserError::AuthMismatch));

    ctx.users.delete(&owner.email, "password").await.unwrap();
    assert!(!ctx.users.is_registered(&owner.email).await.unwrap());
}

async fn has_pending_code(ctx: &TestContext, email: &staple_core::Email) -> bool {
    ctx.credential_store
        .get(email)
        .await
        .unwrap()
        .is_some_and(|record| record.has_pending_recovery())
}
