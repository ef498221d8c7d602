mod common;

use axum_pharmacy_api::{
    db::DbPool,
    dto::auth::{Claims, LoginRequest, RecoverRequest, RegisterRequest, ResetPasswordRequest},
    dto::users::UserDto,
    error::AppError,
    middleware::auth::AuthUser,
    models::{ROLE_ADMIN, ROLE_STANDARD},
    routes::params::Pagination,
    services::{auth_service, user_service},
};
use jsonwebtoken::{DecodingKey, Validation, decode};

// Integration flow: registration creates the user with its cart and
// favorites, login issues a token, recovery rotates the password, and admins
// can lock or remove accounts.
#[tokio::test]
async fn account_lifecycle_flow() -> anyhow::Result<()> {
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

    // Registration creates the user, cart and favorites rows together.
    let account = common::register(&state, "paciente_uno", "paciente@example.com", "primera clave").await?;
    assert_eq!(account.role, ROLE_STANDARD);
    assert!(!account.locked);
    assert_eq!(trio_counts(&state.pool, &account).await?, (1, 1, 1));

    // A rejected registration leaves no rows behind.
    let duplicate = auth_service::register_user(
        &state,
        RegisterRequest {
            username: "paciente_uno".into(),
            email: "otro@example.com".into(),
            password: "primera clave".into(),
            role: None,
        },
    )
    .await;
    assert!(matches!(duplicate, Err(AppError::AlreadyExists(_))));

    let with_role = auth_service::register_user(
        &state,
        RegisterRequest {
            username: "aspirante_admin".into(),
            email: "aspirante@example.com".into(),
            password: "primera clave".into(),
            role: Some("admin".into()),
        },
    )
    .await;
    assert!(matches!(with_role, Err(AppError::InvalidRole)));

    assert_eq!(table_count(&state.pool, "users").await?, 1);
    assert_eq!(table_count(&state.pool, "carts").await?, 1);
    assert_eq!(table_count(&state.pool, "favorites").await?, 1);

    // Login returns a signed token carrying identity, role and lock state.
    let login = auth_service::login_user(
        &state,
        LoginRequest {
            username: "paciente_uno".into(),
            password: "primera clave".into(),
        },
    )
    .await?;
    let token = login.data.unwrap().token;
    let claims = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?
    .claims;
    assert_eq!(claims.sub, account.id.to_string());
    assert_eq!(claims.role, ROLE_STANDARD);
    assert!(!claims.locked);

    let wrong_password = auth_service::login_user(
        &state,
        LoginRequest {
            username: "paciente_uno".into(),
            password: "clave equivocada".into(),
        },
    )
    .await;
    assert!(matches!(wrong_password, Err(AppError::InvalidCredentials)));

    let unknown_user = auth_service::login_user(
        &state,
        LoginRequest {
            username: "nadie_conocido".into(),
            password: "primera clave".into(),
        },
    )
    .await;
    assert!(matches!(unknown_user, Err(AppError::InvalidCredentials)));

    // Recovery answers identically whether or not the address exists.
    let unknown_recover = auth_service::request_password_reset(
        &state,
        RecoverRequest {
            email: "desconocido@example.com".into(),
        },
    )
    .await?;

    let stored: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE reset_token IS NOT NULL")
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(stored.0, 0, "unknown address must not store a token");

    let known_recover = auth_service::request_password_reset(
        &state,
        RecoverRequest {
            email: "paciente@example.com".into(),
        },
    )
    .await?;
    assert_eq!(unknown_recover.msg, known_recover.msg);

    let reset_token: (Option<String>,) =
        sqlx::query_as("SELECT reset_token FROM users WHERE id = $1")
            .bind(account.id)
            .fetch_one(&state.pool)
            .await?;
    let reset_token = reset_token.0.expect("reset token must be stored");

    // Reset requires the exact stored token, and consumes it.
    let garbage = auth_service::reset_password(
        &state,
        "garbage-token",
        ResetPasswordRequest {
            password: "segunda clave".into(),
        },
    )
    .await;
    assert!(matches!(garbage, Err(AppError::InvalidToken)));

    auth_service::reset_password(
        &state,
        &reset_token,
        ResetPasswordRequest {
            password: "segunda clave".into(),
        },
    )
    .await?;

    let old_password = auth_service::login_user(
        &state,
        LoginRequest {
            username: "paciente_uno".into(),
            password: "primera clave".into(),
        },
    )
    .await;
    assert!(matches!(old_password, Err(AppError::InvalidCredentials)));

    auth_service::login_user(
        &state,
        LoginRequest {
            username: "paciente_uno".into(),
            password: "segunda clave".into(),
        },
    )
    .await?;

    let reused = auth_service::reset_password(
        &state,
        &reset_token,
        ResetPasswordRequest {
            password: "tercera clave".into(),
        },
    )
    .await;
    assert!(matches!(reused, Err(AppError::InvalidToken)));

    // Admin management. Promotion happens out of band, never at registration.
    let manager = common::register(&state, "gerente_farmacia", "gerente@example.com", "clave gerencial").await?;
    sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
        .bind(manager.id)
        .bind(ROLE_ADMIN)
        .execute(&state.pool)
        .await?;

    let auth_standard = AuthUser {
        user_id: account.id,
        role: ROLE_STANDARD.into(),
    };
    let auth_admin = AuthUser {
        user_id: manager.id,
        role: ROLE_ADMIN.into(),
    };

    let forbidden = user_service::list_users(&state, &auth_standard, Pagination::default()).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let listed = user_service::list_users(&state, &auth_admin, Pagination::default()).await?;
    assert_eq!(listed.data.unwrap().items.len(), 2);

    // Locking is a reversible soft delete that blocks login.
    let locked = user_service::toggle_lock(&state, &auth_admin, account.id).await?;
    assert!(locked.data.unwrap().locked);

    let locked_login = auth_service::login_user(
        &state,
        LoginRequest {
            username: "paciente_uno".into(),
            password: "segunda clave".into(),
        },
    )
    .await;
    assert!(matches!(locked_login, Err(AppError::Unauthorized(_))));

    let unlocked = user_service::toggle_lock(&state, &auth_admin, account.id).await?;
    assert!(!unlocked.data.unwrap().locked);

    auth_service::login_user(
        &state,
        LoginRequest {
            username: "paciente_uno".into(),
            password: "segunda clave".into(),
        },
    )
    .await?;

    // Hard delete removes the user and both collections.
    user_service::hard_delete(&state, &auth_admin, account.id).await?;
    assert_eq!(trio_counts(&state.pool, &account).await?, (0, 0, 0));

    let already_gone = user_service::hard_delete(&state, &auth_admin, account.id).await;
    assert!(matches!(already_gone, Err(AppError::NotFound)));

    Ok(())
}

async fn trio_counts(pool: &DbPool, account: &UserDto) -> anyhow::Result<(i64, i64, i64)> {
    let users: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = $1")
        .bind(account.id)
        .fetch_one(pool)
        .await?;
    let carts: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM carts WHERE id = $1")
        .bind(account.cart_id)
        .fetch_one(pool)
        .await?;
    let favorites: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM favorites WHERE id = $1")
        .bind(account.favorites_id)
        .fetch_one(pool)
        .await?;
    Ok((users.0, carts.0, favorites.0))
}

async fn table_count(pool: &DbPool, table: &str) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
