//! Checkout scenarios: cart validation, stock reservation, and the
//! restock-on-cancel compensation.

use zagros_core::{OrderStatus, PaymentStatus, Toman};
use zagros_integration_tests::{TestBackend, test_address};
use zagros_server::db::ProductStore;
use zagros_server::services::orders::OrderError;
use zagros_server::services::{AccessoryInput, CartItemInput};

fn line(product_id: zagros_core::ProductId, quantity: u32) -> CartItemInput {
    CartItemInput {
        product_id,
        quantity,
        accessories: Vec::new(),
    }
}

// =============================================================================
// Cart validation
// =============================================================================

#[tokio::test]
async fn validate_cart_prices_from_catalog_without_mutation() {
    let backend = TestBackend::new();
    let product = backend.seed_product("Tablet", 100_000, 5).await;

    let cart = backend
        .orders
        .validate_cart(&[line(product.id, 2)])
        .await
        .unwrap();

    assert!(cart.is_valid);
    assert_eq!(cart.total_price, Toman::new(200_000));
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].price, Toman::new(100_000));

    // Advisory only: stock is untouched, and repeating gives the same answer.
    let unchanged = backend.store.get(product.id).await.unwrap().unwrap();
    assert_eq!(unchanged.stock, 5);

    let again = backend
        .orders
        .validate_cart(&[line(product.id, 2)])
        .await
        .unwrap();
    assert_eq!(again.total_price, cart.total_price);
}

#[tokio::test]
async fn validate_cart_clamps_quantity_to_stock() {
    let backend = TestBackend::new();
    let product = backend.seed_product("Charger", 50_000, 3).await;

    let cart = backend
        .orders
        .validate_cart(&[line(product.id, 10)])
        .await
        .unwrap();

    assert_eq!(cart.items[0].quantity, 3);
    assert_eq!(cart.total_price, Toman::new(150_000));
}

#[tokio::test]
async fn validate_cart_rejects_unknown_product() {
    let backend = TestBackend::new();
    let result = backend
        .orders
        .validate_cart(&[line(zagros_core::ProductId::new(999), 1)])
        .await;

    assert!(matches!(result, Err(OrderError::ProductNotFound { .. })));
}

#[tokio::test]
async fn validate_cart_drops_unavailable_accessories() {
    let backend = TestBackend::new();
    let product = backend.seed_product("Tablet", 100_000, 5).await;
    let in_stock = backend.seed_accessory("Case", 10_000, 5).await;
    let out_of_stock = backend.seed_accessory("Pen", 20_000, 0).await;

    let cart = backend
        .orders
        .validate_cart(&[CartItemInput {
            product_id: product.id,
            quantity: 1,
            accessories: vec![
                AccessoryInput {
                    accessory_id: in_stock.id,
                    quantity: 1,
                },
                AccessoryInput {
                    accessory_id: out_of_stock.id,
                    quantity: 1,
                },
                AccessoryInput {
                    accessory_id: zagros_core::ProductId::new(12345),
                    quantity: 1,
                },
            ],
        }])
        .await
        .unwrap();

    // Only the available accessory survives; the cart itself is not failed.
    assert_eq!(cart.items[0].accessories.len(), 1);
    assert_eq!(cart.items[0].accessories[0].accessory_id, in_stock.id);
    assert_eq!(cart.total_price, Toman::new(110_000));
}

// =============================================================================
// Order creation
// =============================================================================

#[tokio::test]
async fn create_order_reserves_stock_and_snapshots_prices() {
    let backend = TestBackend::new();
    let user = backend.register_user("09121000001").await;
    let product = backend.seed_product("Tablet", 100_000, 5).await;

    let order = backend
        .orders
        .create_order(
            user.id,
            &[line(product.id, 2)],
            test_address(),
            zagros_core::PaymentMethod::Online,
            None,
        )
        .await
        .unwrap();

    assert_eq!(order.total_amount, Toman::new(200_000));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].price, Toman::new(100_000));

    let product = backend.store.get(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 3);
}

#[tokio::test]
async fn create_order_fails_without_partial_decrement() {
    let backend = TestBackend::new();
    let user = backend.register_user("09121000002").await;
    let product = backend.seed_product("Tablet", 100_000, 3).await;

    let result = backend
        .orders
        .create_order(
            user.id,
            &[line(product.id, 10)],
            test_address(),
            zagros_core::PaymentMethod::Online,
            None,
        )
        .await;

    assert!(matches!(result, Err(OrderError::InsufficientStock { .. })));
    let product = backend.store.get(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 3);
}

#[tokio::test]
async fn create_order_releases_earlier_lines_when_a_later_line_fails() {
    let backend = TestBackend::new();
    let user = backend.register_user("09121000003").await;
    let plenty = backend.seed_product("Charger", 50_000, 10).await;
    let scarce = backend.seed_product("Tablet", 100_000, 1).await;

    let result = backend
        .orders
        .create_order(
            user.id,
            &[line(plenty.id, 4), line(scarce.id, 2)],
            test_address(),
            zagros_core::PaymentMethod::Online,
            None,
        )
        .await;

    assert!(matches!(result, Err(OrderError::InsufficientStock { .. })));

    // The first line's reservation was compensated.
    let plenty = backend.store.get(plenty.id).await.unwrap().unwrap();
    assert_eq!(plenty.stock, 10);
    let scarce = backend.store.get(scarce.id).await.unwrap().unwrap();
    assert_eq!(scarce.stock, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_checkouts_never_oversell() {
    let backend = TestBackend::new();
    let user = backend.register_user("09121000004").await;
    let product = backend.seed_product("Tablet", 100_000, 10).await;

    let mut handles = Vec::new();
    for _ in 0..25 {
        let orders = backend.orders.clone();
        let user_id = user.id;
        let product_id = product.id;
        handles.push(tokio::spawn(async move {
            orders
                .create_order(
                    user_id,
                    &[line(product_id, 1)],
                    test_address(),
                    zagros_core::PaymentMethod::Online,
                    None,
                )
                .await
        }));
    }

    let mut succeeded = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(OrderError::InsufficientStock { .. }) => out_of_stock += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // Exactly the available stock is sold, never more.
    assert_eq!(succeeded, 10);
    assert_eq!(out_of_stock, 15);
    let product = backend.store.get(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 0);
}

// =============================================================================
// Cancellation and restock
// =============================================================================

#[tokio::test]
async fn cancelling_an_unpaid_order_restocks_exactly_once() {
    let backend = TestBackend::new();
    let user = backend.register_user("09121000005").await;
    let admin = backend.create_admin("09121000999").await;
    let product = backend.seed_product("Tablet", 100_000, 5).await;

    let order = backend
        .orders
        .create_order(
            user.id,
            &[line(product.id, 2)],
            test_address(),
            zagros_core::PaymentMethod::Online,
            None,
        )
        .await
        .unwrap();
    assert_eq!(
        backend.store.get(product.id).await.unwrap().unwrap().stock,
        3
    );

    let caller = backend.as_caller(&admin);
    backend
        .orders
        .update_status(order.id, OrderStatus::Cancelled, &caller)
        .await
        .unwrap();
    assert_eq!(
        backend.store.get(product.id).await.unwrap().unwrap().stock,
        5
    );

    // Cancelling again must not double the compensation.
    backend
        .orders
        .update_status(order.id, OrderStatus::Cancelled, &caller)
        .await
        .unwrap();
    assert_eq!(
        backend.store.get(product.id).await.unwrap().unwrap().stock,
        5
    );
}

#[tokio::test]
async fn cancelling_a_paid_order_keeps_stock_committed() {
    let backend = TestBackend::new();
    let user = backend.register_user("09121000006").await;
    let admin = backend.create_admin("09121000998").await;
    let product = backend.seed_product("Tablet", 100_000, 5).await;

    let order = backend
        .orders
        .create_order(
            user.id,
            &[line(product.id, 2)],
            test_address(),
            zagros_core::PaymentMethod::Online,
            None,
        )
        .await
        .unwrap();

    let started = backend
        .orders
        .create_payment_request(order.id, &backend.as_caller(&user))
        .await
        .unwrap();
    backend
        .orders
        .verify_payment(
            &started.authority,
            zagros_server::services::CallbackStatus::Ok,
        )
        .await
        .unwrap();

    backend
        .orders
        .update_status(order.id, OrderStatus::Cancelled, &backend.as_caller(&admin))
        .await
        .unwrap();

    // Paid orders are settled sales; cancellation is bookkeeping only.
    assert_eq!(
        backend.store.get(product.id).await.unwrap().unwrap().stock,
        3
    );
}

#[tokio::test]
async fn customers_see_only_their_own_orders() {
    let backend = TestBackend::new();
    let alice = backend.register_user("09121000007").await;
    let bob = backend.register_user("09121000008").await;
    let admin = backend.create_admin("09121000997").await;
    let product = backend.seed_product("Tablet", 100_000, 5).await;

    let order = backend
        .orders
        .create_order(
            alice.id,
            &[line(product.id, 1)],
            test_address(),
            zagros_core::PaymentMethod::Online,
            None,
        )
        .await
        .unwrap();

    // The owner and an admin can read it.
    assert!(
        backend
            .orders
            .get_order(order.id, &backend.as_caller(&alice))
            .await
            .is_ok()
    );
    assert!(
        backend
            .orders
            .get_order(order.id, &backend.as_caller(&admin))
            .await
            .is_ok()
    );

    // Another customer gets a not-found, not a forbidden, so existence
    // does not leak.
    assert!(matches!(
        backend
            .orders
            .get_order(order.id, &backend.as_caller(&bob))
            .await,
        Err(OrderError::OrderNotFound)
    ));
}
