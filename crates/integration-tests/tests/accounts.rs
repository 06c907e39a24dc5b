//! Account flows: registration, login, token lifecycle, password reset.

use zagros_core::Phone;
use zagros_integration_tests::TestBackend;
use zagros_server::services::{AccountError, VerificationError};

#[tokio::test]
async fn registration_promotes_the_staged_payload_into_a_user() {
    let backend = TestBackend::new();
    let phone = Phone::parse("09124000001").unwrap();

    backend
        .accounts
        .start_registration(
            "Sara".to_owned(),
            "Mohammadi".to_owned(),
            phone.clone(),
            "hunter22",
        )
        .await
        .unwrap();

    let code = backend.sms.last_code(&phone).await.unwrap();
    let tokens = backend
        .accounts
        .complete_registration(phone.clone(), &code)
        .await
        .unwrap();

    assert_eq!(tokens.user.name, "Sara");
    assert_eq!(tokens.user.phone, phone);
    assert!(tokens.user.phone_verified);

    // The issued access token authenticates as that user.
    let (user_id, _) = backend.jwt.verify_access(&tokens.access_token).unwrap();
    assert_eq!(user_id, tokens.user.id);

    // The staged record was consumed along the way.
    let result = backend
        .accounts
        .complete_registration(phone, &code)
        .await;
    assert!(matches!(
        result,
        Err(AccountError::Verification(VerificationError::NotFound))
    ));
}

#[tokio::test]
async fn a_verified_phone_cannot_be_registered_twice() {
    let backend = TestBackend::new();
    backend.register_user("09124000002").await;

    let result = backend
        .accounts
        .start_registration(
            "Dara".to_owned(),
            "Karimi".to_owned(),
            Phone::parse("09124000002").unwrap(),
            "hunter22",
        )
        .await;

    assert!(matches!(result, Err(AccountError::PhoneTaken)));
}

#[tokio::test]
async fn login_verifies_the_password() {
    let backend = TestBackend::new();
    let user = backend.register_user("09124000003").await;

    let tokens = backend
        .accounts
        .login(&user.phone, "hunter22")
        .await
        .unwrap();
    assert_eq!(tokens.user.id, user.id);

    let result = backend.accounts.login(&user.phone, "wrong-password").await;
    assert!(matches!(result, Err(AccountError::InvalidCredentials)));

    let unknown = Phone::parse("09124999999").unwrap();
    let result = backend.accounts.login(&unknown, "hunter22").await;
    assert!(matches!(result, Err(AccountError::InvalidCredentials)));
}

#[tokio::test]
async fn logout_revokes_exactly_the_presented_refresh_token() {
    let backend = TestBackend::new();
    let user = backend.register_user("09124000004").await;

    let first = backend
        .accounts
        .login(&user.phone, "hunter22")
        .await
        .unwrap();
    let second = backend
        .accounts
        .login(&user.phone, "hunter22")
        .await
        .unwrap();

    // Both sessions refresh fine.
    backend.accounts.refresh(&first.refresh_token).await.unwrap();
    backend.accounts.refresh(&second.refresh_token).await.unwrap();

    // Logging out the first session kills only its token.
    backend
        .accounts
        .logout(user.id, &first.refresh_token)
        .await
        .unwrap();

    let result = backend.accounts.refresh(&first.refresh_token).await;
    assert!(matches!(result, Err(AccountError::InvalidRefreshToken)));
    backend.accounts.refresh(&second.refresh_token).await.unwrap();
}

#[tokio::test]
async fn refresh_rejects_access_tokens_and_garbage() {
    let backend = TestBackend::new();
    let user = backend.register_user("09124000005").await;
    let tokens = backend
        .accounts
        .login(&user.phone, "hunter22")
        .await
        .unwrap();

    // An access token is not a refresh token.
    let result = backend.accounts.refresh(&tokens.access_token).await;
    assert!(matches!(result, Err(AccountError::InvalidRefreshToken)));

    let result = backend.accounts.refresh("not-a-jwt").await;
    assert!(matches!(result, Err(AccountError::InvalidRefreshToken)));
}

#[tokio::test]
async fn password_reset_flow_end_to_end() {
    let backend = TestBackend::new();
    let user = backend.register_user("09124000006").await;

    let requested = backend.accounts.forgot_password(&user.phone).await.unwrap();
    assert_eq!(requested.phone, "0912***0006");

    let code = backend.sms.last_code(&user.phone).await.unwrap();
    let reset_token = backend
        .accounts
        .verify_reset_code(&user.phone, &code)
        .await
        .unwrap();

    backend
        .accounts
        .reset_password(&reset_token, "new-password")
        .await
        .unwrap();

    // Old password is dead, new one works.
    let result = backend.accounts.login(&user.phone, "hunter22").await;
    assert!(matches!(result, Err(AccountError::InvalidCredentials)));
    backend
        .accounts
        .login(&user.phone, "new-password")
        .await
        .unwrap();
}

#[tokio::test]
async fn forgot_password_requires_a_known_phone() {
    let backend = TestBackend::new();
    let unknown = Phone::parse("09124999998").unwrap();

    let result = backend.accounts.forgot_password(&unknown).await;
    assert!(matches!(result, Err(AccountError::UserNotFound)));

    // No SMS goes out for unknown phones.
    assert_eq!(backend.sms.sent_count().await, 0);
}

#[tokio::test]
async fn reset_tokens_are_single_purpose() {
    let backend = TestBackend::new();
    let user = backend.register_user("09124000007").await;
    let tokens = backend
        .accounts
        .login(&user.phone, "hunter22")
        .await
        .unwrap();

    // An access token cannot authorize a password change.
    let result = backend
        .accounts
        .reset_password(&tokens.access_token, "new-password")
        .await;
    assert!(matches!(result, Err(AccountError::InvalidResetToken)));
}

#[tokio::test]
async fn weak_passwords_are_rejected_up_front() {
    let backend = TestBackend::new();
    let result = backend
        .accounts
        .start_registration(
            "Sara".to_owned(),
            "Mohammadi".to_owned(),
            Phone::parse("09124000008").unwrap(),
            "12345",
        )
        .await;
    assert!(matches!(result, Err(AccountError::WeakPassword)));

    // Nothing was staged and no SMS was sent.
    assert_eq!(backend.sms.sent_count().await, 0);
}
