//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::JwtService;
use crate::config::AppConfig;
use crate::db::postgres::{
    PgActivityStore, PgOrderStore, PgProductStore, PgUserStore, PgVerificationStore,
};
use crate::db::{ActivityStore, OrderStore, ProductStore, UserStore, VerificationStore};
use crate::db::memory::MemoryStore;
use crate::gateways::{MelipayamakSms, PaymentGateway, SmsGateway, ZarinpalGateway};
use crate::services::{
    AccountService, ActivityLogger, OrderService, ReportService, VerificationService,
};

/// The set of store handles the services are built over.
///
/// Bundling them keeps [`AppState::new`] independent of which backend is
/// in use: production wires Postgres, tests wire the in-memory store.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub products: Arc<dyn ProductStore>,
    pub orders: Arc<dyn OrderStore>,
    pub verifications: Arc<dyn VerificationStore>,
    pub activity: Arc<dyn ActivityStore>,
}

impl Stores {
    /// Postgres-backed stores over a shared pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(pool.clone())),
            products: Arc::new(PgProductStore::new(pool.clone())),
            orders: Arc::new(PgOrderStore::new(pool.clone())),
            verifications: Arc::new(PgVerificationStore::new(pool.clone())),
            activity: Arc::new(PgActivityStore::new(pool.clone())),
        }
    }

    /// In-memory stores sharing one [`MemoryStore`].
    #[must_use]
    pub fn memory() -> Self {
        let store = MemoryStore::new();
        Self {
            users: Arc::new(store.clone()),
            products: Arc::new(store.clone()),
            orders: Arc::new(store.clone()),
            verifications: Arc::new(store.clone()),
            activity: Arc::new(store),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the services and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    users: Arc<dyn UserStore>,
    products: Arc<dyn ProductStore>,
    jwt: JwtService,
    accounts: AccountService,
    orders: OrderService,
    reports: ReportService,
    activity: ActivityLogger,
}

impl AppState {
    /// Assemble the state from config, stores, and gateways.
    #[must_use]
    pub fn new(
        config: AppConfig,
        stores: Stores,
        sms: Arc<dyn SmsGateway>,
        payment: Arc<dyn PaymentGateway>,
    ) -> Self {
        let jwt = JwtService::new(&config.jwt_secret);
        let verification = VerificationService::new(Arc::clone(&stores.verifications), sms);
        let accounts =
            AccountService::new(Arc::clone(&stores.users), verification, jwt.clone());
        let activity = ActivityLogger::new(Arc::clone(&stores.activity));
        let orders = OrderService::new(
            Arc::clone(&stores.products),
            Arc::clone(&stores.orders),
            payment,
            activity.clone(),
            config.public_base_url.clone(),
        );
        let reports = ReportService::new(Arc::clone(&stores.orders), Arc::clone(&stores.users));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                users: stores.users,
                products: stores.products,
                jwt,
                accounts,
                orders,
                reports,
                activity,
            }),
        }
    }

    /// Production wiring: Postgres stores plus the real SMS and payment
    /// gateway clients.
    #[must_use]
    pub fn with_postgres(config: AppConfig, pool: &PgPool) -> Self {
        let sms: Arc<dyn SmsGateway> = Arc::new(MelipayamakSms::new(
            config.sms.api_url.clone(),
            config.sms.register_body_id,
            config.sms.password_reset_body_id,
        ));
        let payment: Arc<dyn PaymentGateway> = if config.payment.sandbox {
            Arc::new(ZarinpalGateway::sandbox(config.payment.merchant_id.clone()))
        } else {
            Arc::new(ZarinpalGateway::new(config.payment.merchant_id.clone()))
        };
        Self::new(config, Stores::postgres(pool), sms, payment)
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the user store.
    #[must_use]
    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.inner.users
    }

    /// Get a reference to the product store.
    #[must_use]
    pub fn products(&self) -> &Arc<dyn ProductStore> {
        &self.inner.products
    }

    /// Get a reference to the JWT service.
    #[must_use]
    pub fn jwt(&self) -> &JwtService {
        &self.inner.jwt
    }

    /// Get a reference to the account service.
    #[must_use]
    pub fn accounts(&self) -> &AccountService {
        &self.inner.accounts
    }

    /// Get a reference to the order service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    /// Get a reference to the report service.
    #[must_use]
    pub fn reports(&self) -> &ReportService {
        &self.inner.reports
    }

    /// Get a reference to the activity logger.
    #[must_use]
    pub fn activity(&self) -> &ActivityLogger {
        &self.inner.activity
    }
}
