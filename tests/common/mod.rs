#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_pharmacy_api::{
    config::AppConfig,
    db::{DbPool, create_orm_conn, create_pool},
    dto::{auth::RegisterRequest, users::UserDto},
    gateway::{BackUrls, GatewayError, PaymentGateway, PaymentPreference, PreferenceItem},
    notifier::{Notice, Notifier, NotifyError},
    services::auth_service,
    state::AppState,
};
use uuid::Uuid;

/// Gateway double: records each manifest it is handed, or fails every call.
pub struct RecordingGateway {
    fail: bool,
    pub manifests: Mutex<Vec<Vec<PreferenceItem>>>,
}

impl RecordingGateway {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            manifests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            manifests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_preference(
        &self,
        items: &[PreferenceItem],
        _back_urls: &BackUrls,
    ) -> Result<PaymentPreference, GatewayError> {
        if self.fail {
            return Err(GatewayError::Rejected {
                status: 500,
                body: "provider unavailable".into(),
            });
        }
        self.manifests.lock().unwrap().push(items.to_vec());
        Ok(PaymentPreference {
            id: "pref-1".into(),
            init_point: "https://pay.test/init/pref-1".into(),
        })
    }
}

pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _to_email: &str, _notice: Notice) -> Result<(), NotifyError> {
        Ok(())
    }
}

pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        gateway_base_url: "http://localhost:9".into(),
        gateway_access_token: "test-token".into(),
        gateway_timeout_secs: 1,
        currency: "ARS".into(),
        checkout_callback_base: "https://shop.test/cart".into(),
        smtp_host: "localhost".into(),
        smtp_port: 2525,
        smtp_username: String::new(),
        smtp_password: String::new(),
        smtp_from: "Pharmacy <no-reply@pharmacy.local>".into(),
    }
}

pub async fn setup_state(
    database_url: &str,
    gateway: Arc<dyn PaymentGateway>,
) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs.
    sqlx::query(
        "TRUNCATE TABLE order_items, orders, cart_items, favorite_items, audit_logs, \
         users, carts, favorites, products RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    Ok(AppState {
        pool,
        orm,
        config: test_config(database_url),
        gateway,
        notifier: Arc::new(NoopNotifier),
    })
}

pub async fn register(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<UserDto> {
    let response = auth_service::register_user(
        state,
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: None,
        },
    )
    .await?;
    response
        .data
        .ok_or_else(|| anyhow::anyhow!("registration returned no user"))
}

pub async fn insert_product(pool: &DbPool, name: &str, price: i64) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, name, price) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(name)
        .bind(price)
        .execute(pool)
        .await?;
    Ok(id)
}
