use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub gateway_base_url: String,
    pub gateway_access_token: String,
    pub gateway_timeout_secs: u64,
    pub currency: String,
    pub checkout_callback_base: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_from: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")?;
        let gateway_base_url =
            env::var("MP_BASE_URL").unwrap_or_else(|_| "https://api.mercadopago.com".to_string());
        let gateway_access_token = env::var("MP_ACCESS_TOKEN")?;
        let gateway_timeout_secs = env::var("MP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);
        let currency = env::var("CHECKOUT_CURRENCY").unwrap_or_else(|_| "ARS".to_string());
        let checkout_callback_base = env::var("CHECKOUT_CALLBACK_BASE")
            .unwrap_or_else(|_| "https://pharmacy-front.netlify.app/cart".to_string());
        let smtp_host = env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string());
        let smtp_port = env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(587);
        let smtp_username = env::var("SMTP_USERNAME").unwrap_or_default();
        let smtp_password = env::var("SMTP_PASSWORD").unwrap_or_default();
        let smtp_from = env::var("SMTP_FROM")
            .unwrap_or_else(|_| "Pharmacy <no-reply@pharmacy.local>".to_string());

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            gateway_base_url,
            gateway_access_token,
            gateway_timeout_secs,
            currency,
            checkout_callback_base,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            smtp_from,
        })
    }
}
