mod common;

use axum_pharmacy_api::{
    dto::products::{CreateProductRequest, UpdateProductRequest},
    error::AppError,
    middleware::auth::AuthUser,
    models::{ROLE_ADMIN, ROLE_STANDARD},
    routes::params::{Pagination, ProductQuery, ProductSortBy, SearchQuery, SortOrder},
    services::{cart_service, favorite_service, product_service},
};
use uuid::Uuid;

// Integration flow: admins manage the catalog, the listing hides inactive
// products while search still finds them, and a hard delete sweeps cart and
// favorites references away.
#[tokio::test]
async fn catalog_management_flow() -> anyhow::Result<()> {
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

    let customer = common::register(&state, "cliente_catalogo", "cliente@example.com", "clave cliente").await?;
    let manager = common::register(&state, "gerente_catalogo", "gerente@example.com", "clave gerente").await?;
    sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
        .bind(manager.id)
        .bind(ROLE_ADMIN)
        .execute(&state.pool)
        .await?;

    let auth_customer = AuthUser {
        user_id: customer.id,
        role: ROLE_STANDARD.into(),
    };
    let auth_admin = AuthUser {
        user_id: manager.id,
        role: ROLE_ADMIN.into(),
    };

    // Catalog writes are admin-only.
    let forbidden = product_service::create_product(
        &state,
        &auth_customer,
        CreateProductRequest {
            name: "Curitas Infantiles".into(),
            description: None,
            price: 700,
            image_url: None,
        },
    )
    .await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let invalid_price = product_service::create_product(
        &state,
        &auth_admin,
        CreateProductRequest {
            name: "Curitas Infantiles".into(),
            description: None,
            price: -1,
            image_url: None,
        },
    )
    .await;
    assert!(matches!(invalid_price, Err(AppError::BadRequest(_))));

    let ibuprofen = product_service::create_product(
        &state,
        &auth_admin,
        CreateProductRequest {
            name: "Ibuprofeno 400mg x10".into(),
            description: Some("Analgésico y antiinflamatorio".into()),
            price: 1500,
            image_url: None,
        },
    )
    .await?
    .data
    .unwrap();

    let thermometer = product_service::create_product(
        &state,
        &auth_admin,
        CreateProductRequest {
            name: "Termómetro Digital".into(),
            description: None,
            price: 3200,
            image_url: None,
        },
    )
    .await?
    .data
    .unwrap();

    // The listing supports filters and explicit ordering.
    let all = product_service::list_products(&state, price_sorted_query(None, None)).await?;
    let all = all.data.unwrap().items;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, ibuprofen.id);
    assert_eq!(all[1].id, thermometer.id);

    let expensive = product_service::list_products(&state, price_sorted_query(Some(2000), None)).await?;
    let expensive = expensive.data.unwrap().items;
    assert_eq!(expensive.len(), 1);
    assert_eq!(expensive[0].id, thermometer.id);

    let by_text = product_service::list_products(&state, text_query("ibupro")).await?;
    assert_eq!(by_text.data.unwrap().items.len(), 1);

    // Hiding a product removes it from the listing but not from direct
    // lookups or search.
    product_service::update_product(
        &state,
        &auth_admin,
        ibuprofen.id,
        UpdateProductRequest {
            name: None,
            description: None,
            price: None,
            image_url: None,
            active: Some(false),
        },
    )
    .await?;

    let visible = product_service::list_products(&state, price_sorted_query(None, None)).await?;
    let visible = visible.data.unwrap().items;
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, thermometer.id);

    let direct = product_service::get_product(&state, ibuprofen.id).await?;
    assert!(!direct.data.unwrap().active);

    let searched = product_service::search_products(
        &state,
        SearchQuery {
            pagination: Pagination::default(),
            q: Some("ibuprofeno".into()),
        },
    )
    .await?;
    assert_eq!(searched.data.unwrap().items.len(), 1);

    let no_term = product_service::search_products(
        &state,
        SearchQuery {
            pagination: Pagination::default(),
            q: Some("   ".into()),
        },
    )
    .await;
    assert!(matches!(no_term, Err(AppError::BadRequest(_))));

    // Updates reach the stored row.
    let repriced = product_service::update_product(
        &state,
        &auth_admin,
        thermometer.id,
        UpdateProductRequest {
            name: None,
            description: None,
            price: Some(2900),
            image_url: None,
            active: None,
        },
    )
    .await?;
    assert_eq!(repriced.data.unwrap().price, 2900);

    let missing = product_service::update_product(
        &state,
        &auth_admin,
        Uuid::new_v4(),
        UpdateProductRequest {
            name: None,
            description: None,
            price: Some(100),
            image_url: None,
            active: None,
        },
    )
    .await;
    assert!(matches!(missing, Err(AppError::NotFound)));

    // A deleted product disappears from carts and favorites with it.
    cart_service::add_to_cart(&state.pool, &auth_customer, thermometer.id).await?;
    favorite_service::add_favorite(&state.pool, &auth_customer, thermometer.id).await?;

    product_service::delete_product(&state, &auth_admin, thermometer.id).await?;

    let cart_refs: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE product_id = $1")
        .bind(thermometer.id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(cart_refs.0, 0, "cart references must cascade with the product");

    let favorite_refs: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM favorite_items WHERE product_id = $1")
            .bind(thermometer.id)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(favorite_refs.0, 0, "favorite references must cascade with the product");

    let gone = product_service::get_product(&state, thermometer.id).await;
    assert!(matches!(gone, Err(AppError::NotFound)));

    let already_gone = product_service::delete_product(&state, &auth_admin, thermometer.id).await;
    assert!(matches!(already_gone, Err(AppError::NotFound)));

    Ok(())
}

fn price_sorted_query(min_price: Option<i64>, max_price: Option<i64>) -> ProductQuery {
    ProductQuery {
        pagination: Pagination::default(),
        q: None,
        min_price,
        max_price,
        sort_by: Some(ProductSortBy::Price),
        sort_order: Some(SortOrder::Asc),
    }
}

fn text_query(q: &str) -> ProductQuery {
    ProductQuery {
        pagination: Pagination::default(),
        q: Some(q.into()),
        min_price: None,
        max_price: None,
        sort_by: None,
        sort_order: None,
    }
}
