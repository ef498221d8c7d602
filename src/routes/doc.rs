use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RecoverRequest, RegisterRequest, ResetPasswordRequest},
        cart::{CartItemDto, CartList, CartMutation, CartStatus},
        favorites::FavoriteProductList,
        orders::{CheckoutResponse, OrderList, OrderWithItems},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        users::{UserDto, UserList},
    },
    models::{CartItem, Order, OrderItem, Product},
    response::{ApiResponse, Meta},
    routes::{auth, cart, favorites, health, orders, params, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::recover,
        auth::reset,
        users::list_users,
        users::get_user,
        users::toggle_lock,
        users::hard_delete,
        products::list_products,
        products::search_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        favorites::list_favorites,
        favorites::add_favorite,
        favorites::remove_favorite,
        orders::list_orders,
        orders::get_order,
        orders::checkout
    ),
    components(
        schemas(
            Product,
            CartItem,
            Order,
            OrderItem,
            UserDto,
            UserList,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            RecoverRequest,
            ResetPasswordRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CartStatus,
            CartMutation,
            CartItemDto,
            CartList,
            FavoriteProductList,
            OrderList,
            OrderWithItems,
            CheckoutResponse,
            params::Pagination,
            params::ProductQuery,
            params::SearchQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<UserDto>,
            ApiResponse<CartList>,
            ApiResponse<CartMutation>,
            ApiResponse<FavoriteProductList>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<CheckoutResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login, and password recovery"),
        (name = "Users", description = "Admin user management"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Per-user cart endpoints"),
        (name = "Favorites", description = "Per-user favorites endpoints"),
        (name = "Orders", description = "Order history and checkout"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
