//! Payment request and callback semantics: ownership, idempotency, and
//! amount-tampering defense.

use zagros_core::{OrderStatus, PaymentStatus};
use zagros_integration_tests::{TestBackend, VerifyScript, test_address};
use zagros_server::services::orders::OrderError;
use zagros_server::services::{CallbackStatus, CartItemInput, PaymentOutcome};

async fn checkout(backend: &TestBackend, phone: &str) -> (zagros_server::models::User, zagros_server::models::Order) {
    let user = backend.register_user(phone).await;
    let product = backend.seed_product("Tablet", 100_000, 5).await;
    let order = backend
        .orders
        .create_order(
            user.id,
            &[CartItemInput {
                product_id: product.id,
                quantity: 2,
                accessories: Vec::new(),
            }],
            test_address(),
            zagros_core::PaymentMethod::Online,
            None,
        )
        .await
        .unwrap();
    (user, order)
}

#[tokio::test]
async fn payment_request_requires_ownership() {
    let backend = TestBackend::new();
    let (_user, order) = checkout(&backend, "09122000001").await;
    let stranger = backend.register_user("09122000002").await;

    let result = backend
        .orders
        .create_payment_request(order.id, &backend.as_caller(&stranger))
        .await;

    assert!(matches!(result, Err(OrderError::Forbidden)));
}

#[tokio::test]
async fn successful_verification_settles_exactly_once() {
    let backend = TestBackend::new();
    let (user, order) = checkout(&backend, "09122000003").await;

    let started = backend
        .orders
        .create_payment_request(order.id, &backend.as_caller(&user))
        .await
        .unwrap();

    let outcome = backend
        .orders
        .verify_payment(&started.authority, CallbackStatus::Ok)
        .await
        .unwrap();
    let PaymentOutcome::Verified { ref_id, .. } = outcome else {
        panic!("expected Verified, got {outcome:?}");
    };

    let paid = backend
        .orders
        .get_order(order.id, &backend.as_caller(&user))
        .await
        .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.status, OrderStatus::Confirmed);
    assert_eq!(paid.payment_ref_id.as_deref(), Some(ref_id.as_str()));
    assert!(paid.paid_at.is_some());

    // A duplicate callback is a no-op reporting the original reference.
    let again = backend
        .orders
        .verify_payment(&started.authority, CallbackStatus::Ok)
        .await
        .unwrap();
    let PaymentOutcome::AlreadyVerified { ref_id: again_ref, .. } = again else {
        panic!("expected AlreadyVerified, got {again:?}");
    };
    assert_eq!(again_ref.as_deref(), Some(ref_id.as_str()));

    // The gateway was consulted exactly once.
    assert_eq!(backend.gateway.verify_calls().await.len(), 1);
}

#[tokio::test]
async fn verification_uses_the_stored_order_total() {
    let backend = TestBackend::new();
    let (user, order) = checkout(&backend, "09122000004").await;

    let started = backend
        .orders
        .create_payment_request(order.id, &backend.as_caller(&user))
        .await
        .unwrap();
    backend
        .orders
        .verify_payment(&started.authority, CallbackStatus::Ok)
        .await
        .unwrap();

    // The amount sent to the gateway is the order's own total; nothing
    // from the callback can influence it.
    let calls = backend.gateway.verify_calls().await;
    assert_eq!(calls, vec![(started.authority, order.total_amount.as_i64())]);
}

#[tokio::test]
async fn customer_cancellation_keeps_the_order_payable() {
    let backend = TestBackend::new();
    let (user, order) = checkout(&backend, "09122000005").await;

    let started = backend
        .orders
        .create_payment_request(order.id, &backend.as_caller(&user))
        .await
        .unwrap();

    let outcome = backend
        .orders
        .verify_payment(&started.authority, CallbackStatus::Cancelled)
        .await
        .unwrap();
    assert!(matches!(outcome, PaymentOutcome::CancelledByUser { .. }));

    // No gateway verify call was made and the order can still be paid.
    assert!(backend.gateway.verify_calls().await.is_empty());
    let fresh = backend
        .orders
        .get_order(order.id, &backend.as_caller(&user))
        .await
        .unwrap();
    assert_eq!(fresh.payment_status, PaymentStatus::Pending);

    assert!(
        backend
            .orders
            .create_payment_request(order.id, &backend.as_caller(&user))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn gateway_rejection_marks_payment_failed_but_not_the_order() {
    let backend = TestBackend::new();
    let (user, order) = checkout(&backend, "09122000006").await;

    let started = backend
        .orders
        .create_payment_request(order.id, &backend.as_caller(&user))
        .await
        .unwrap();

    backend.gateway.script_verify(VerifyScript::Reject(-9)).await;
    let outcome = backend
        .orders
        .verify_payment(&started.authority, CallbackStatus::Ok)
        .await
        .unwrap();
    assert!(matches!(outcome, PaymentOutcome::Failed { .. }));

    let fresh = backend
        .orders
        .get_order(order.id, &backend.as_caller(&user))
        .await
        .unwrap();
    assert_eq!(fresh.payment_status, PaymentStatus::Failed);
    assert_eq!(fresh.status, OrderStatus::Pending);
}

#[tokio::test]
async fn unknown_authority_is_rejected() {
    let backend = TestBackend::new();
    let result = backend
        .orders
        .verify_payment("A999999999999", CallbackStatus::Ok)
        .await;
    assert!(matches!(result, Err(OrderError::OrderNotFound)));
}

#[tokio::test]
async fn paid_and_cancelled_orders_refuse_new_payment_requests() {
    let backend = TestBackend::new();
    let (user, order) = checkout(&backend, "09122000007").await;
    let admin = backend.create_admin("09122000999").await;

    let started = backend
        .orders
        .create_payment_request(order.id, &backend.as_caller(&user))
        .await
        .unwrap();
    backend
        .orders
        .verify_payment(&started.authority, CallbackStatus::Ok)
        .await
        .unwrap();

    assert!(matches!(
        backend
            .orders
            .create_payment_request(order.id, &backend.as_caller(&user))
            .await,
        Err(OrderError::AlreadyPaid)
    ));

    // A separate, cancelled order refuses too.
    let (user2, order2) = checkout(&backend, "09122000008").await;
    backend
        .orders
        .update_status(order2.id, OrderStatus::Cancelled, &backend.as_caller(&admin))
        .await
        .unwrap();
    assert!(matches!(
        backend
            .orders
            .create_payment_request(order2.id, &backend.as_caller(&user2))
            .await,
        Err(OrderError::OrderCancelled)
    ));
}
