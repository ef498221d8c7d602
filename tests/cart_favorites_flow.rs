mod common;

use axum_pharmacy_api::{
    dto::cart::CartStatus,
    error::AppError,
    middleware::auth::AuthUser,
    models::{CartItem, ROLE_STANDARD},
    routes::params::Pagination,
    services::{cart_service, favorite_service},
};
use uuid::Uuid;

// Integration flow: duplicate adds merge into one line item, removal steps
// the quantity back down, and favorites behave as a set.
#[tokio::test]
async fn cart_and_favorites_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = common::setup_state(&database_url, common::RecordingGateway::succeeding()).await?;

    let account = common::register(&state, "carrito_tester", "carrito@example.com", "super secret pw").await?;
    let auth = AuthUser {
        user_id: account.id,
        role: ROLE_STANDARD.into(),
    };

    let product_id = common::insert_product(&state.pool, "Ibuprofeno 400mg x10", 1500).await?;

    // First add creates the line item, the second merges into it.
    let first = cart_service::add_to_cart(&state.pool, &auth, product_id).await?;
    let first = first.data.unwrap();
    assert_eq!(first.status, CartStatus::Added);
    assert_eq!(first.quantity, 1);

    let second = cart_service::add_to_cart(&state.pool, &auth, product_id).await?;
    let second = second.data.unwrap();
    assert_eq!(second.status, CartStatus::Incremented);
    assert_eq!(second.quantity, 2);

    let rows: Vec<CartItem> = sqlx::query_as("SELECT * FROM cart_items WHERE cart_id = $1")
        .bind(account.cart_id)
        .fetch_all(&state.pool)
        .await?;
    assert_eq!(rows.len(), 1, "duplicate adds must merge into one line item");
    assert_eq!(rows[0].quantity, 2);
    assert_eq!(rows[0].product_id, product_id);

    let listed = cart_service::list_cart(&state.pool, &auth, Pagination::default()).await?;
    let items = listed.data.unwrap().items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product.id, product_id);
    assert_eq!(items[0].quantity, 2);

    // Removal decrements first, then drops the line item.
    let decremented = cart_service::remove_from_cart(&state.pool, &auth, product_id).await?;
    let decremented = decremented.data.unwrap();
    assert_eq!(decremented.status, CartStatus::Decremented);
    assert_eq!(decremented.quantity, 1);

    let removed = cart_service::remove_from_cart(&state.pool, &auth, product_id).await?;
    assert_eq!(removed.data.unwrap().status, CartStatus::Removed);

    // Removing a product that is no longer there fails and changes nothing.
    let gone = cart_service::remove_from_cart(&state.pool, &auth, product_id).await;
    assert!(matches!(gone, Err(AppError::NotFound)));

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE cart_id = $1")
        .bind(account.cart_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(count.0, 0);

    // Unknown products cannot be added.
    let missing = cart_service::add_to_cart(&state.pool, &auth, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound)));

    // Favorites: a duplicate add conflicts and leaves the set unchanged.
    favorite_service::add_favorite(&state.pool, &auth, product_id).await?;
    let duplicate = favorite_service::add_favorite(&state.pool, &auth, product_id).await;
    assert!(matches!(duplicate, Err(AppError::AlreadyExists(_))));

    let favorites = favorite_service::list_favorites(&state.pool, &auth, Pagination::default()).await?;
    let favorites = favorites.data.unwrap().items;
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].id, product_id);

    favorite_service::remove_favorite(&state.pool, &auth, product_id).await?;
    let absent = favorite_service::remove_favorite(&state.pool, &auth, product_id).await;
    assert!(matches!(absent, Err(AppError::NotFound)));

    Ok(())
}
