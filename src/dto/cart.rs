use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

/// What a cart mutation did to the addressed line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    Added,
    Incremented,
    Decremented,
    Removed,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartMutation {
    pub status: CartStatus,
    pub product_id: Uuid,
    /// Quantity after the mutation; zero once the line item is gone.
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemDto {
    pub id: Uuid,
    pub product: Product,
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartItemDto>,
}
