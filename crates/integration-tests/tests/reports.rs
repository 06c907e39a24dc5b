//! Reporting over persisted orders.

use rust_decimal::Decimal;
use zagros_core::OrderStatus;
use zagros_integration_tests::{TestBackend, test_address};
use zagros_server::services::reports::{FinancialQuery, GroupBy, ReportPeriod};
use zagros_server::services::{CallbackStatus, CartItemInput};

async fn paid_order(backend: &TestBackend, phone: &str, quantity: u32) -> zagros_server::models::Order {
    let user = backend.register_user(phone).await;
    let product = backend.seed_product("Tablet", 100_000, 50).await;
    let order = backend
        .orders
        .create_order(
            user.id,
            &[CartItemInput {
                product_id: product.id,
                quantity,
                accessories: Vec::new(),
            }],
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
        .verify_payment(&started.authority, CallbackStatus::Ok)
        .await
        .unwrap();
    backend
        .orders
        .get_order(order.id, &backend.as_caller(&user))
        .await
        .unwrap()
}

#[tokio::test]
async fn sales_statistics_count_only_active_sales() {
    let backend = TestBackend::new();

    // One paid (confirmed) order and one that never got past pending.
    let paid = paid_order(&backend, "09125000001", 2).await;

    let pending_user = backend.register_user("09125000002").await;
    let product = backend.seed_product("Charger", 50_000, 10).await;
    backend
        .orders
        .create_order(
            pending_user.id,
            &[CartItemInput {
                product_id: product.id,
                quantity: 1,
                accessories: Vec::new(),
            }],
            test_address(),
            zagros_core::PaymentMethod::Online,
            None,
        )
        .await
        .unwrap();

    let stats = backend
        .reports
        .sales_statistics(ReportPeriod::Week)
        .await
        .unwrap();

    assert_eq!(stats.stats.total_orders, 1);
    assert_eq!(stats.stats.total_revenue, paid.total_amount.as_i64());
    assert_eq!(stats.top_products.len(), 1);
    assert_eq!(stats.top_products[0].quantity, 2);
    assert_eq!(stats.recent_orders.len(), 1);
    assert_eq!(stats.daily_chart.len(), 1);
    assert_eq!(stats.daily_chart[0].orders, 1);
}

#[tokio::test]
async fn financial_report_buckets_by_status_and_method() {
    let backend = TestBackend::new();
    let first = paid_order(&backend, "09125000003", 1).await;
    let second = paid_order(&backend, "09125000004", 3).await;

    let report = backend
        .reports
        .financial_report(&FinancialQuery {
            period: ReportPeriod::Week,
            start_date: None,
            end_date: None,
            group_by: GroupBy::Day,
        })
        .await
        .unwrap();

    let expected = first.total_amount.as_i64() + second.total_amount.as_i64();
    assert_eq!(report.totals.total_orders, 2);
    assert_eq!(report.totals.total_revenue, expected);

    let confirmed = report
        .revenue_by_status
        .get(&OrderStatus::Confirmed.to_string())
        .expect("confirmed bucket");
    assert_eq!(confirmed.count, 2);
    assert_eq!(confirmed.revenue, expected);

    let online = report
        .revenue_by_payment_method
        .get("online")
        .expect("online bucket");
    assert_eq!(online.count, 2);

    // Both orders were created moments ago, so one day bucket.
    assert_eq!(report.revenue_by_period.len(), 1);
    assert_eq!(report.revenue_by_period[0].revenue, expected);
}

#[tokio::test]
async fn average_order_value_is_fractional() {
    let backend = TestBackend::new();
    paid_order(&backend, "09125000005", 1).await; // 100_000
    paid_order(&backend, "09125000006", 2).await; // 200_000

    let stats = backend
        .reports
        .sales_statistics(ReportPeriod::Week)
        .await
        .unwrap();

    assert_eq!(stats.stats.total_revenue, 300_000);
    assert_eq!(stats.stats.average_order_value, Decimal::from(150_000));
}
