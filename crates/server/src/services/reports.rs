//! Admin reporting: sales statistics and financial breakdowns.
//!
//! Pure derived views over persisted orders. Aggregation happens in
//! application code over the period's orders; order volumes here are
//! nowhere near the point where that becomes a problem.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use zagros_core::{OrderId, PaymentStatus, ProductId, UserId};

use crate::db::{OrderStore, RepositoryError, UserStore};
use crate::models::Order;

/// Reporting period, anchored to the calendar like the admin UI expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportPeriod {
    /// Trailing seven days.
    #[default]
    Week,
    /// Since the first of the current month.
    Month,
    /// Since January 1st.
    Year,
}

impl ReportPeriod {
    /// Parse the `period` query parameter; unknown values fall back to
    /// a week.
    #[must_use]
    pub fn from_query(s: &str) -> Self {
        match s {
            "month" => Self::Month,
            "year" => Self::Year,
            _ => Self::Week,
        }
    }

    fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Week => now - Duration::days(7),
            Self::Month => now
                .date_naive()
                .with_day(1)
                .map_or(now - Duration::days(30), |d| {
                    d.and_hms_opt(0, 0, 0)
                        .map_or(now - Duration::days(30), |dt| dt.and_utc())
                }),
            Self::Year => now
                .date_naive()
                .with_ordinal(1)
                .map_or(now - Duration::days(365), |d| {
                    d.and_hms_opt(0, 0, 0)
                        .map_or(now - Duration::days(365), |dt| dt.and_utc())
                }),
        }
    }
}

/// Bucketing granularity for the financial report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBy {
    #[default]
    Day,
    Week,
    Month,
}

impl GroupBy {
    /// Parse the `groupBy` query parameter.
    #[must_use]
    pub fn from_query(s: &str) -> Self {
        match s {
            "week" => Self::Week,
            "month" => Self::Month,
            _ => Self::Day,
        }
    }

    fn bucket(self, at: DateTime<Utc>) -> String {
        match self {
            Self::Day => at.format("%Y-%m-%d").to_string(),
            Self::Week => {
                let week = at.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Self::Month => at.format("%Y-%m").to_string(),
        }
    }
}

/// Parameters for the financial report.
#[derive(Debug, Clone, Default)]
pub struct FinancialQuery {
    pub period: ReportPeriod,
    /// Explicit range overrides the period when both bounds are given.
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub group_by: GroupBy,
}

/// Headline totals.
#[derive(Debug, Clone, Serialize)]
pub struct SalesTotals {
    pub total_revenue: i64,
    pub total_orders: u64,
    pub average_order_value: Decimal,
}

/// Per-product sales aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSales {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u64,
    pub revenue: i64,
}

/// Per-customer sales aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerSales {
    pub user_id: UserId,
    pub name: String,
    pub orders: u64,
    pub total: i64,
}

/// One day of the sales chart.
#[derive(Debug, Clone, Serialize)]
pub struct DailySales {
    pub date: String,
    pub revenue: i64,
    pub orders: u64,
}

/// A recent order, trimmed for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct RecentOrder {
    pub id: OrderId,
    pub date: DateTime<Utc>,
    pub customer: String,
    pub total: i64,
    pub status: String,
}

/// Full sales statistics response.
#[derive(Debug, Clone, Serialize)]
pub struct SalesStatistics {
    pub stats: SalesTotals,
    pub top_products: Vec<ProductSales>,
    pub top_customers: Vec<CustomerSales>,
    pub daily_chart: Vec<DailySales>,
    pub recent_orders: Vec<RecentOrder>,
}

/// A count/revenue bucket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Bucket {
    pub count: u64,
    pub revenue: i64,
}

/// Full financial report response.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialReport {
    pub totals: SalesTotals,
    pub revenue_by_status: HashMap<String, Bucket>,
    pub revenue_by_payment_method: HashMap<String, Bucket>,
    pub revenue_by_period: Vec<PeriodBucket>,
}

/// One time bucket of the financial report.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodBucket {
    pub period: String,
    pub count: u64,
    pub revenue: i64,
}

/// The reporting service.
#[derive(Clone)]
pub struct ReportService {
    orders: Arc<dyn OrderStore>,
    users: Arc<dyn UserStore>,
}

impl ReportService {
    /// Create the service.
    #[must_use]
    pub fn new(orders: Arc<dyn OrderStore>, users: Arc<dyn UserStore>) -> Self {
        Self { orders, users }
    }

    /// Sales statistics over active sales (confirmed and beyond) in the
    /// period.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] on storage failure.
    #[instrument(skip(self))]
    pub async fn sales_statistics(
        &self,
        period: ReportPeriod,
    ) -> Result<SalesStatistics, RepositoryError> {
        let now = Utc::now();
        let orders: Vec<Order> = self
            .orders
            .created_between(period.start(now), now)
            .await?
            .into_iter()
            .filter(|o| o.status.is_active_sale())
            .collect();

        let totals = totals(&orders);

        // Top products by revenue.
        let mut by_product: HashMap<ProductId, ProductSales> = HashMap::new();
        for order in &orders {
            for item in &order.items {
                let line_revenue = item.price.as_i64() * i64::from(item.quantity);
                let entry = by_product
                    .entry(item.product_id)
                    .or_insert_with(|| ProductSales {
                        product_id: item.product_id,
                        name: item.name.clone(),
                        quantity: 0,
                        revenue: 0,
                    });
                entry.quantity += u64::from(item.quantity);
                entry.revenue += line_revenue;
            }
        }
        let mut top_products: Vec<ProductSales> = by_product.into_values().collect();
        top_products.sort_by(|a, b| b.revenue.cmp(&a.revenue));
        top_products.truncate(10);

        // Top customers by spend.
        let mut by_customer: HashMap<UserId, Bucket> = HashMap::new();
        for order in &orders {
            let entry = by_customer.entry(order.user_id).or_default();
            entry.count += 1;
            entry.revenue += order.total_amount.as_i64();
        }
        let mut spenders: Vec<(UserId, Bucket)> = by_customer.into_iter().collect();
        spenders.sort_by(|a, b| b.1.revenue.cmp(&a.1.revenue));
        spenders.truncate(10);

        let mut top_customers = Vec::with_capacity(spenders.len());
        for (user_id, bucket) in spenders {
            let name = self
                .users
                .get_by_id(user_id)
                .await?
                .map_or_else(|| "(deleted)".to_owned(), |u| format!("{} {}", u.name, u.last_name));
            top_customers.push(CustomerSales {
                user_id,
                name,
                orders: bucket.count,
                total: bucket.revenue,
            });
        }

        // Per-day chart; BTreeMap keeps the dates sorted.
        let mut by_day: BTreeMap<String, Bucket> = BTreeMap::new();
        for order in &orders {
            let entry = by_day
                .entry(order.created_at.format("%Y-%m-%d").to_string())
                .or_default();
            entry.count += 1;
            entry.revenue += order.total_amount.as_i64();
        }
        let daily_chart = by_day
            .into_iter()
            .map(|(date, bucket)| DailySales {
                date,
                revenue: bucket.revenue,
                orders: bucket.count,
            })
            .collect();

        // Most recent 20, newest first.
        let mut recent_orders = Vec::with_capacity(20);
        for order in orders.iter().rev().take(20) {
            let customer = self
                .users
                .get_by_id(order.user_id)
                .await?
                .map_or_else(|| "(deleted)".to_owned(), |u| format!("{} {}", u.name, u.last_name));
            recent_orders.push(RecentOrder {
                id: order.id,
                date: order.created_at,
                customer,
                total: order.total_amount.as_i64(),
                status: order.status.to_string(),
            });
        }

        Ok(SalesStatistics {
            stats: totals,
            top_products,
            top_customers,
            daily_chart,
            recent_orders,
        })
    }

    /// Financial breakdown over paid or active orders in the range.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] on storage failure.
    #[instrument(skip(self))]
    pub async fn financial_report(
        &self,
        query: &FinancialQuery,
    ) -> Result<FinancialReport, RepositoryError> {
        let now = Utc::now();
        let (start, end) = match (query.start_date, query.end_date) {
            (Some(start), Some(end)) => (start, end),
            _ => (query.period.start(now), now),
        };

        let orders: Vec<Order> = self
            .orders
            .created_between(start, end)
            .await?
            .into_iter()
            .filter(|o| o.payment_status == PaymentStatus::Paid || o.status.is_active_sale())
            .collect();

        let totals_all = totals(&orders);

        let mut revenue_by_status: HashMap<String, Bucket> = HashMap::new();
        let mut revenue_by_payment_method: HashMap<String, Bucket> = HashMap::new();
        let mut by_period: BTreeMap<String, Bucket> = BTreeMap::new();

        for order in &orders {
            let amount = order.total_amount.as_i64();

            let status_bucket = revenue_by_status.entry(order.status.to_string()).or_default();
            status_bucket.count += 1;
            status_bucket.revenue += amount;

            let method_bucket = revenue_by_payment_method
                .entry(order.payment_method.to_string())
                .or_default();
            method_bucket.count += 1;
            method_bucket.revenue += amount;

            let period_bucket = by_period
                .entry(query.group_by.bucket(order.created_at))
                .or_default();
            period_bucket.count += 1;
            period_bucket.revenue += amount;
        }

        let revenue_by_period = by_period
            .into_iter()
            .map(|(period, bucket)| PeriodBucket {
                period,
                count: bucket.count,
                revenue: bucket.revenue,
            })
            .collect();

        Ok(FinancialReport {
            totals: totals_all,
            revenue_by_status,
            revenue_by_payment_method,
            revenue_by_period,
        })
    }
}

fn totals(orders: &[Order]) -> SalesTotals {
    let total_revenue: i64 = orders.iter().map(|o| o.total_amount.as_i64()).sum();
    let total_orders = orders.len() as u64;
    let average_order_value = if total_orders == 0 {
        Decimal::ZERO
    } else {
        Decimal::from(total_revenue) / Decimal::from(total_orders)
    };
    SalesTotals {
        total_revenue,
        total_orders,
        average_order_value,
    }
}
