//! Test harness for service-level integration tests.
//!
//! Builds the full service stack over the in-memory store with scripted
//! gateways: the SMS gateway records every code it "sends" (and can be
//! told to fail), the payment gateway mints deterministic authorities
//! and can be scripted to verify, reject, or be unreachable.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used)] // test harness

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Mutex;

use zagros_core::{Phone, Toman, UserRole};
use zagros_server::auth::{CurrentUser, JwtService};
use zagros_server::db::memory::MemoryStore;
use zagros_server::db::{ProductStore, UserStore};
use zagros_server::gateways::{
    CreatedPayment, GatewayError, PaymentGateway, PaymentRequest, SmsGateway, SmsTemplate,
    VerifyOutcome,
};
use zagros_server::models::{NewProduct, NewUser, Product, ShippingAddress, User};
use zagros_server::services::{
    AccountService, ActivityLogger, OrderService, ReportService, VerificationService,
};

/// SMS gateway double that records every send.
pub struct RecordingSms {
    sent: Mutex<Vec<SentSms>>,
    fail_next: AtomicBool,
}

/// One recorded SMS.
#[derive(Debug, Clone)]
pub struct SentSms {
    pub phone: String,
    pub code: String,
    pub template: SmsTemplate,
}

impl RecordingSms {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        })
    }

    /// Make the next send fail with a gateway error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// The most recent code sent to `phone`.
    pub async fn last_code(&self, phone: &Phone) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|s| s.phone == phone.as_str())
            .map(|s| s.code.clone())
    }

    /// Number of messages sent so far.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl SmsGateway for RecordingSms {
    async fn send_code(
        &self,
        phone: &Phone,
        code: &str,
        template: SmsTemplate,
    ) -> Result<String, GatewayError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("scripted failure".to_owned()));
        }
        let mut sent = self.sent.lock().await;
        sent.push(SentSms {
            phone: phone.as_str().to_owned(),
            code: code.to_owned(),
            template,
        });
        Ok(format!("rec-{}", sent.len()))
    }
}

/// What the scripted payment gateway should answer on verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyScript {
    /// Confirm the payment.
    Succeed,
    /// Reject with the given gateway code.
    Reject(i32),
    /// Be unreachable.
    Unavailable,
}

/// Payment gateway double with deterministic authorities and a
/// scriptable verify answer.
pub struct ScriptedPaymentGateway {
    next_authority: AtomicU64,
    script: Mutex<VerifyScript>,
    verify_calls: Mutex<Vec<(String, i64)>>,
}

impl ScriptedPaymentGateway {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_authority: AtomicU64::new(1),
            script: Mutex::new(VerifyScript::Succeed),
            verify_calls: Mutex::new(Vec::new()),
        })
    }

    /// Set the verify behavior for subsequent calls.
    pub async fn script_verify(&self, script: VerifyScript) {
        *self.script.lock().await = script;
    }

    /// Every `(authority, amount)` pair verify was called with.
    pub async fn verify_calls(&self) -> Vec<(String, i64)> {
        self.verify_calls.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedPaymentGateway {
    async fn create_request(
        &self,
        request: &PaymentRequest,
    ) -> Result<CreatedPayment, GatewayError> {
        // The real gateway refuses non-positive amounts.
        debug_assert!(request.amount > Toman::ZERO);

        let n = self.next_authority.fetch_add(1, Ordering::SeqCst);
        let authority = format!("A{n:012}");
        Ok(CreatedPayment {
            redirect_url: format!("https://gateway.test/StartPay/{authority}"),
            authority,
        })
    }

    async fn verify(&self, authority: &str, amount: Toman) -> Result<VerifyOutcome, GatewayError> {
        self.verify_calls
            .lock()
            .await
            .push((authority.to_owned(), amount.as_i64()));

        match *self.script.lock().await {
            VerifyScript::Succeed => Ok(VerifyOutcome::Verified {
                ref_id: format!("REF-{authority}"),
            }),
            VerifyScript::Reject(code) => Ok(VerifyOutcome::Rejected {
                code,
                message: "scripted rejection".to_owned(),
            }),
            VerifyScript::Unavailable => {
                Err(GatewayError::Unavailable("scripted outage".to_owned()))
            }
        }
    }
}

/// The assembled backend under test.
pub struct TestBackend {
    pub store: MemoryStore,
    pub sms: Arc<RecordingSms>,
    pub gateway: Arc<ScriptedPaymentGateway>,
    pub jwt: JwtService,
    pub verification: VerificationService,
    pub accounts: AccountService,
    pub orders: OrderService,
    pub reports: ReportService,
    pub activity: ActivityLogger,
}

impl TestBackend {
    /// Build a fresh backend over an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let sms = RecordingSms::new();
        let gateway = ScriptedPaymentGateway::new();
        let jwt = JwtService::new(&SecretString::from("kT4mWx9ZqBv2eHs7RdYg1LnPc6FuJa3E8iVo5bN0hD".to_owned()));

        let users: Arc<dyn UserStore> = Arc::new(store.clone());
        let products: Arc<dyn ProductStore> = Arc::new(store.clone());
        let orders_store: Arc<dyn zagros_server::db::OrderStore> = Arc::new(store.clone());
        let verifications: Arc<dyn zagros_server::db::VerificationStore> =
            Arc::new(store.clone());
        let activity_store: Arc<dyn zagros_server::db::ActivityStore> = Arc::new(store.clone());

        let verification = VerificationService::new(
            Arc::clone(&verifications),
            Arc::clone(&sms) as Arc<dyn SmsGateway>,
        );
        let accounts = AccountService::new(Arc::clone(&users), verification.clone(), jwt.clone());
        let activity = ActivityLogger::new(activity_store);
        let orders = OrderService::new(
            Arc::clone(&products),
            Arc::clone(&orders_store),
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
            activity.clone(),
            "https://shop.test".to_owned(),
        );
        let reports = ReportService::new(orders_store, users);

        Self {
            store,
            sms,
            gateway,
            jwt,
            verification,
            accounts,
            orders,
            reports,
            activity,
        }
    }

    /// Seed an active product.
    pub async fn seed_product(&self, name: &str, price: i64, stock: u32) -> Product {
        ProductStore::create(
            &self.store,
            NewProduct {
                name: name.to_owned(),
                description: format!("{name} description"),
                price: Toman::new(price),
                stock,
                is_active: true,
                is_accessory: false,
            },
        )
        .await
        .unwrap()
    }

    /// Seed an accessory product.
    pub async fn seed_accessory(&self, name: &str, price: i64, stock: u32) -> Product {
        ProductStore::create(
            &self.store,
            NewProduct {
                name: name.to_owned(),
                description: format!("{name} description"),
                price: Toman::new(price),
                stock,
                is_active: true,
                is_accessory: true,
            },
        )
        .await
        .unwrap()
    }

    /// Register a user end-to-end through the SMS flow.
    pub async fn register_user(&self, phone: &str) -> User {
        let phone = Phone::parse(phone).unwrap();
        self.accounts
            .start_registration(
                "Sara".to_owned(),
                "Mohammadi".to_owned(),
                phone.clone(),
                "hunter22",
            )
            .await
            .unwrap();
        let code = self.sms.last_code(&phone).await.unwrap();
        let tokens = self
            .accounts
            .complete_registration(phone, &code)
            .await
            .unwrap();
        tokens.user
    }

    /// Create an admin account directly in the store.
    pub async fn create_admin(&self, phone: &str) -> User {
        UserStore::create(
            &self.store,
            NewUser {
                name: "Admin".to_owned(),
                last_name: "User".to_owned(),
                phone: Phone::parse(phone).unwrap(),
                password_hash: "unused".to_owned(),
                phone_verified: true,
                role: UserRole::Admin,
            },
        )
        .await
        .unwrap()
    }

    /// Authenticated-caller view of a user.
    #[must_use]
    pub fn as_caller(&self, user: &User) -> CurrentUser {
        CurrentUser {
            id: user.id,
            name: user.name.clone(),
            phone: user.phone.clone(),
            role: user.role,
        }
    }
}

impl Default for TestBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// A shipping address that passes validation.
#[must_use]
pub fn test_address() -> ShippingAddress {
    ShippingAddress {
        name: "Sara Mohammadi".to_owned(),
        phone: Phone::parse("09351112233").unwrap(),
        street: "12 Valiasr Street".to_owned(),
        city: "Tehran".to_owned(),
        state: "Tehran".to_owned(),
        postal_code: Some("1234567890".to_owned()),
    }
}
