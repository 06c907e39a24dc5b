//! Verification ledger semantics: reissue, attempts, expiry, and
//! consumption.

use chrono::{Duration, Utc};
use zagros_core::{Phone, VerificationPurpose};
use zagros_integration_tests::TestBackend;
use zagros_server::db::VerificationStore;
use zagros_server::models::PendingVerification;
use zagros_server::services::VerificationError;

fn phone() -> Phone {
    Phone::parse("09123334455").unwrap()
}

#[tokio::test]
async fn reissuing_a_code_invalidates_the_previous_one() {
    let backend = TestBackend::new();
    let phone = phone();

    backend
        .verification
        .issue_code(&phone, VerificationPurpose::PasswordReset, None)
        .await
        .unwrap();
    let first = backend.sms.last_code(&phone).await.unwrap();

    backend
        .verification
        .issue_code(&phone, VerificationPurpose::PasswordReset, None)
        .await
        .unwrap();
    let second = backend.sms.last_code(&phone).await.unwrap();
    assert_ne!(first, second, "fresh issuance must rotate the code");

    // The first code is stale now and must not verify.
    let result = backend
        .verification
        .verify_code(&phone, &first, VerificationPurpose::PasswordReset)
        .await;
    assert!(matches!(result, Err(VerificationError::CodeMismatch { .. })));

    // The replacement still works.
    backend
        .verification
        .verify_code(&phone, &second, VerificationPurpose::PasswordReset)
        .await
        .unwrap();
}

#[tokio::test]
async fn five_wrong_attempts_burn_the_record() {
    let backend = TestBackend::new();
    let phone = phone();

    backend
        .verification
        .issue_code(&phone, VerificationPurpose::PasswordReset, None)
        .await
        .unwrap();
    let correct = backend.sms.last_code(&phone).await.unwrap();
    let wrong = if correct == "000000" { "000001" } else { "000000" };

    for expected_remaining in (0..5u32).rev() {
        let result = backend
            .verification
            .verify_code(&phone, wrong, VerificationPurpose::PasswordReset)
            .await;
        match result {
            Err(VerificationError::CodeMismatch { remaining }) => {
                assert_eq!(remaining, expected_remaining);
            }
            other => panic!("expected CodeMismatch, got {other:?}"),
        }
    }

    // Even the correct code is refused on the sixth attempt.
    let result = backend
        .verification
        .verify_code(&phone, &correct, VerificationPurpose::PasswordReset)
        .await;
    assert!(matches!(result, Err(VerificationError::AttemptsExhausted)));

    // The record is gone afterwards.
    let result = backend
        .verification
        .verify_code(&phone, &correct, VerificationPurpose::PasswordReset)
        .await;
    assert!(matches!(result, Err(VerificationError::NotFound)));
}

#[tokio::test]
async fn expired_codes_are_rejected_and_deleted() {
    let backend = TestBackend::new();
    let phone = phone();

    // Plant a record whose expiry is already in the past.
    backend
        .store
        .upsert(PendingVerification {
            phone: phone.clone(),
            purpose: VerificationPurpose::PasswordReset,
            code: "123456".to_owned(),
            expires_at: Utc::now() - Duration::minutes(1),
            attempts: 0,
            payload: None,
            created_at: Utc::now() - Duration::minutes(11),
        })
        .await
        .unwrap();

    let result = backend
        .verification
        .verify_code(&phone, "123456", VerificationPurpose::PasswordReset)
        .await;
    assert!(matches!(result, Err(VerificationError::Expired)));

    // Lazy cleanup removed the record.
    let result = backend
        .verification
        .verify_code(&phone, "123456", VerificationPurpose::PasswordReset)
        .await;
    assert!(matches!(result, Err(VerificationError::NotFound)));
}

#[tokio::test]
async fn successful_verification_consumes_the_record() {
    let backend = TestBackend::new();
    let phone = phone();

    backend
        .verification
        .issue_code(&phone, VerificationPurpose::PasswordReset, None)
        .await
        .unwrap();
    let code = backend.sms.last_code(&phone).await.unwrap();

    backend
        .verification
        .verify_code(&phone, &code, VerificationPurpose::PasswordReset)
        .await
        .unwrap();

    // Replay of the same code is refused: the record was consumed.
    let result = backend
        .verification
        .verify_code(&phone, &code, VerificationPurpose::PasswordReset)
        .await;
    assert!(matches!(result, Err(VerificationError::NotFound)));
}

#[tokio::test]
async fn sms_failure_removes_the_pending_record() {
    let backend = TestBackend::new();
    let phone = phone();

    backend.sms.fail_next();
    let result = backend
        .verification
        .issue_code(&phone, VerificationPurpose::PasswordReset, None)
        .await;
    assert!(matches!(result, Err(VerificationError::Sms(_))));

    // No dangling record blocks a clean retry.
    assert!(
        backend
            .store
            .get(&phone, VerificationPurpose::PasswordReset)
            .await
            .unwrap()
            .is_none()
    );

    backend
        .verification
        .issue_code(&phone, VerificationPurpose::PasswordReset, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn resend_requires_an_existing_record() {
    let backend = TestBackend::new();
    let phone = phone();

    let result = backend
        .verification
        .resend_code(&phone, VerificationPurpose::Registration)
        .await;
    assert!(matches!(result, Err(VerificationError::NotFound)));
}

#[tokio::test]
async fn purposes_are_independent_ledger_keys() {
    let backend = TestBackend::new();
    let phone = phone();

    backend
        .verification
        .issue_code(&phone, VerificationPurpose::PasswordReset, None)
        .await
        .unwrap();
    let reset_code = backend.sms.last_code(&phone).await.unwrap();

    // A registration code for the same phone does not disturb the reset code.
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

    backend
        .verification
        .verify_code(&phone, &reset_code, VerificationPurpose::PasswordReset)
        .await
        .unwrap();
}
