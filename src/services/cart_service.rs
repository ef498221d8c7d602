use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    db::DbPool,
    dto::cart::{CartItemDto, CartList, CartMutation, CartStatus},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

/// Every cart access goes through the owning user row: user id resolves to
/// `users.cart_id` and nothing queries carts by owner directly.
async fn resolve_cart_id(pool: &DbPool, user_id: Uuid) -> AppResult<Uuid> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT cart_id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    row.map(|(cart_id,)| cart_id).ok_or(AppError::NotFound)
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    quantity: i32,
    product_id: Uuid,
    name: String,
    description: Option<String>,
    price: i64,
    image_url: Option<String>,
    active: bool,
    product_created_at: DateTime<Utc>,
}

impl From<CartRow> for CartItemDto {
    fn from(row: CartRow) -> Self {
        CartItemDto {
            id: row.id,
            quantity: row.quantity,
            product: Product {
                id: row.product_id,
                name: row.name,
                description: row.description,
                price: row.price,
                image_url: row.image_url,
                active: row.active,
                created_at: row.product_created_at,
            },
        }
    }
}

pub async fn list_cart(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let cart_id = resolve_cart_id(pool, user.user_id).await?;
    let (page, limit, offset) = pagination.normalize();

    let rows = sqlx::query_as::<_, CartRow>(
        r#"
        SELECT ci.id, ci.quantity,
               p.id AS product_id, p.name, p.description, p.price,
               p.image_url, p.active, p.created_at AS product_created_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(cart_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .fetch_one(pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    let data = CartList {
        items: rows.into_iter().map(CartItemDto::from).collect(),
    };
    Ok(ApiResponse::success("OK", data, Some(meta)))
}

/// First add creates the line item with quantity 1; adding the same product
/// again bumps the quantity by one. The upsert is a single statement so two
/// concurrent adds both land.
pub async fn add_to_cart(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartMutation>> {
    let cart_id = resolve_cart_id(pool, user.user_id).await?;

    let product_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(pool)
        .await?;
    if product_exists.is_none() {
        return Err(AppError::NotFound);
    }

    let (quantity,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity)
        VALUES ($1, $2, $3, 1)
        ON CONFLICT (cart_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + 1
        RETURNING quantity
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(cart_id)
    .bind(product_id)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        AuditAction::CartAdd,
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id, "quantity": quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let (status, msg) = if quantity == 1 {
        (CartStatus::Added, "Added to cart".to_string())
    } else {
        (
            CartStatus::Incremented,
            format!("Quantity incremented (now {quantity})"),
        )
    };

    Ok(ApiResponse::success(
        msg,
        CartMutation {
            status,
            product_id,
            quantity,
        },
        Some(Meta::empty()),
    ))
}

/// Quantity above one is decremented in place; a quantity-one line item is
/// deleted. A product that is not in the cart is a not-found, and the cart
/// is left untouched.
pub async fn remove_from_cart(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartMutation>> {
    let cart_id = resolve_cart_id(pool, user.user_id).await?;

    let decremented: Option<(i32,)> = sqlx::query_as(
        r#"
        UPDATE cart_items
        SET quantity = quantity - 1
        WHERE cart_id = $1 AND product_id = $2 AND quantity > 1
        RETURNING quantity
        "#,
    )
    .bind(cart_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    let (status, quantity, msg) = match decremented {
        Some((quantity,)) => (
            CartStatus::Decremented,
            quantity,
            format!("Quantity decremented (now {quantity})"),
        ),
        None => {
            let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
                .bind(cart_id)
                .bind(product_id)
                .execute(pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(AppError::NotFound);
            }
            (CartStatus::Removed, 0, "Removed from cart".to_string())
        }
    };

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        AuditAction::CartRemove,
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id, "quantity": quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        msg,
        CartMutation {
            status,
            product_id,
            quantity,
        },
        Some(Meta::empty()),
    ))
}
