use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::User;

/// Public view of a user row. The password hash and reset token never leave
/// the service layer.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub locked: bool,
    pub cart_id: Uuid,
    pub favorites_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            locked: user.locked,
            cart_id: user.cart_id,
            favorites_id: user.favorites_id,
            created_at: user.created_at,
        }
    }
}

impl From<crate::entity::users::Model> for UserDto {
    fn from(model: crate::entity::users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: model.role,
            locked: model.locked,
            cart_id: model.cart_id,
            favorites_id: model.favorites_id,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub items: Vec<UserDto>,
}
