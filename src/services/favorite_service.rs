use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    db::DbPool,
    dto::favorites::FavoriteProductList,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

async fn resolve_favorites_id(pool: &DbPool, user_id: Uuid) -> AppResult<Uuid> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT favorites_id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    row.map(|(favorites_id,)| favorites_id)
        .ok_or(AppError::NotFound)
}

pub async fn list_favorites(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<FavoriteProductList>> {
    let favorites_id = resolve_favorites_id(pool, user.user_id).await?;
    let (page, limit, offset) = pagination.normalize();

    let products = sqlx::query_as::<_, Product>(
        r#"
        SELECT p.*
        FROM favorite_items fi
        JOIN products p ON p.id = fi.product_id
        WHERE fi.favorites_id = $1
        ORDER BY fi.created_at ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(favorites_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM favorite_items WHERE favorites_id = $1")
            .bind(favorites_id)
            .fetch_one(pool)
            .await?;

    let meta = Meta::new(page, limit, total.0);
    let data = FavoriteProductList { items: products };
    Ok(ApiResponse::success("OK", data, Some(meta)))
}

/// Favorites are a set. The unique index decides membership, so a duplicate
/// add is detected without a separate read.
pub async fn add_favorite(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let favorites_id = resolve_favorites_id(pool, user.user_id).await?;

    let product_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(pool)
        .await?;
    if product_exists.is_none() {
        return Err(AppError::NotFound);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO favorite_items (id, favorites_id, product_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (favorites_id, product_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(favorites_id)
    .bind(product_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::AlreadyExists(
            "Product is already in favorites".into(),
        ));
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        AuditAction::FavoriteAdd,
        Some("favorite_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Added to favorites",
        serde_json::json!({ "product_id": product_id }),
        Some(Meta::empty()),
    ))
}

pub async fn remove_favorite(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let favorites_id = resolve_favorites_id(pool, user.user_id).await?;

    let result =
        sqlx::query("DELETE FROM favorite_items WHERE favorites_id = $1 AND product_id = $2")
            .bind(favorites_id)
            .bind(product_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        AuditAction::FavoriteRemove,
        Some("favorite_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from favorites",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
