use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    dto::orders::{CheckoutResponse, OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems, Model as CartItemModel},
        carts::Entity as Carts,
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProductCol, Entity as Products, Model as ProductModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    gateway::{BackUrls, PreferenceItem},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, PAYMENT_PENDING},
    notifier::{Notice, send_detached},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Orders::find()
        .filter(OrderCol::CustomerId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "OK",
        OrderList { items },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::CustomerId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Turn the live cart into an immutable order plus a payment request.
///
/// The whole pipeline runs inside one transaction with the cart row locked,
/// so two checkouts for the same user cannot interleave. The gateway call
/// precedes every write: on gateway failure the transaction rolls back with
/// the cart intact and no order row. Once the gateway has answered, the
/// order insert and the cart clear commit together.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    let txn = state.orm.begin().await?;

    let account = Users::find_by_id(user.user_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    // Per-user serialization point.
    Carts::find_by_id(account.cart_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = CartItems::find()
        .filter(CartItemCol::CartId.eq(account.cart_id))
        .order_by_asc(CartItemCol::CreatedAt)
        .all(&txn)
        .await?;

    if items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let product_ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
    let products = Products::find()
        .filter(ProductCol::Id.is_in(product_ids))
        .all(&txn)
        .await?;
    let mut by_id: HashMap<Uuid, ProductModel> =
        products.into_iter().map(|p| (p.id, p)).collect();

    let mut lines: Vec<(CartItemModel, ProductModel)> = Vec::with_capacity(items.len());
    for item in items {
        let product = by_id.remove(&item.product_id).ok_or(AppError::NotFound)?;
        lines.push((item, product));
    }

    let manifest = build_manifest(&lines, &state.config.currency);
    let back_urls = BackUrls::from_base(&state.config.checkout_callback_base);

    let preference = state
        .gateway
        .create_preference(&manifest, &back_urls)
        .await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        customer_id: Set(account.id),
        payment_link: Set(preference.init_point),
        payment_status: Set(PAYMENT_PENDING.to_string()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    // Order items copy name and price by value; later catalog edits do not
    // reach them.
    for (item, product) in &lines {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            name: Set(product.name.clone()),
            price: Set(product.price),
            quantity: Set(item.quantity),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
    }

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(account.cart_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::Checkout,
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    send_detached(
        state.notifier.clone(),
        account.email,
        Notice::OrderConfirmation {
            payment_link: order.payment_link.clone(),
        },
    );

    Ok(ApiResponse::success(
        "Payment preference created",
        CheckoutResponse {
            order_id: order.id,
            payment_link: order.payment_link,
        },
        Some(Meta::empty()),
    ))
}

/// One preference entry per line item. `unit_price` carries the line total
/// (price times quantity) while the quantity is also sent on its own;
/// reconciliation against the provider depends on this exact amount.
fn build_manifest(lines: &[(CartItemModel, ProductModel)], currency: &str) -> Vec<PreferenceItem> {
    lines
        .iter()
        .map(|(item, product)| PreferenceItem {
            title: product.name.clone(),
            quantity: item.quantity,
            unit_price: product.price * item.quantity as i64,
            currency_id: currency.to_string(),
        })
        .collect()
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        customer_id: model.customer_id,
        payment_link: model.payment_link,
        payment_status: model.payment_status,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        name: model.name,
        price: model.price,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
