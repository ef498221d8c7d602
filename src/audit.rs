use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Every mutating storefront operation drops one row into `audit_logs`.
/// Callers treat failures as log-and-continue; the trail never blocks the
/// operation it describes.
#[derive(Debug, Clone, Copy)]
pub enum AuditAction {
    UserRegister,
    UserLogin,
    PasswordResetRequested,
    PasswordReset,
    UserLockToggle,
    UserDelete,
    ProductCreate,
    ProductUpdate,
    ProductDelete,
    CartAdd,
    CartRemove,
    FavoriteAdd,
    FavoriteRemove,
    Checkout,
}

impl AuditAction {
    fn as_str(self) -> &'static str {
        match self {
            AuditAction::UserRegister => "user_register",
            AuditAction::UserLogin => "user_login",
            AuditAction::PasswordResetRequested => "password_reset_requested",
            AuditAction::PasswordReset => "password_reset",
            AuditAction::UserLockToggle => "user_lock_toggle",
            AuditAction::UserDelete => "user_delete",
            AuditAction::ProductCreate => "product_create",
            AuditAction::ProductUpdate => "product_update",
            AuditAction::ProductDelete => "product_delete",
            AuditAction::CartAdd => "cart_add",
            AuditAction::CartRemove => "cart_remove",
            AuditAction::FavoriteAdd => "favorite_add",
            AuditAction::FavoriteRemove => "favorite_remove",
            AuditAction::Checkout => "checkout",
        }
    }
}

pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: AuditAction,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action.as_str())
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}
