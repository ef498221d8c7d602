use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    dto::users::{UserDto, UserList},
    entity::{
        carts::Entity as Carts,
        favorites::Entity as Favorites,
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Users::find().order_by_desc(UserCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(UserDto::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn get_user(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<UserDto>> {
    ensure_admin(user)?;
    let found = Users::find_by_id(id).one(&state.orm).await?;
    let found = match found {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success(
        "User",
        UserDto::from(found),
        Some(Meta::empty()),
    ))
}

/// Soft delete: flip the locked flag. A locked user keeps their rows but can
/// no longer log in; flipping again restores access.
pub async fn toggle_lock(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<UserDto>> {
    ensure_admin(user)?;

    let existing = Users::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let now_locked = !existing.locked;
    let mut active: UserActive = existing.into();
    active.locked = Set(now_locked);
    let updated = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::UserLockToggle,
        Some("users"),
        Some(serde_json::json!({ "user_id": id, "locked": now_locked })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let msg = if now_locked { "User locked" } else { "User unlocked" };
    Ok(ApiResponse::success(
        msg,
        UserDto::from(updated),
        Some(Meta::empty()),
    ))
}

/// Hard delete: physically remove the user together with the cart and
/// favorites rows it owns. Line items cascade with their collections; order
/// history stays.
pub async fn hard_delete(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    let existing = Users::find_by_id(id).one(&txn).await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    // The user row goes first so the cart and favorites rows are no longer
    // referenced when they are removed.
    Users::delete_by_id(existing.id).exec(&txn).await?;
    Carts::delete_by_id(existing.cart_id).exec(&txn).await?;
    Favorites::delete_by_id(existing.favorites_id)
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::UserDelete,
        Some("users"),
        Some(serde_json::json!({ "user_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
