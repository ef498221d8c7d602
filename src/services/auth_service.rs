use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    dto::auth::{
        Claims, LoginRequest, LoginResponse, RecoverRequest, RegisterRequest, ResetClaims,
        ResetPasswordRequest,
    },
    dto::users::UserDto,
    error::{AppError, AppResult},
    models::User,
    notifier::{Notice, send_detached},
    response::{ApiResponse, Meta},
    state::AppState,
};

const LOGIN_TOKEN_HOURS: i64 = 24;
const RESET_TOKEN_HOURS: i64 = 1;

/// Create the user together with its cart and favorites collection. The
/// three rows are inserted in one transaction so a failure leaves nothing
/// behind.
pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<UserDto>> {
    if payload.role.as_deref().is_some_and(|r| !r.is_empty()) {
        return Err(AppError::InvalidRole);
    }
    validate_registration(&payload)?;

    let username_taken: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE username = $1")
            .bind(payload.username.as_str())
            .fetch_optional(&state.pool)
            .await?;
    if username_taken.is_some() {
        return Err(AppError::AlreadyExists("Username is already taken".into()));
    }

    let email_taken: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(payload.email.as_str())
        .fetch_optional(&state.pool)
        .await?;
    if email_taken.is_some() {
        return Err(AppError::AlreadyExists("Email is already registered".into()));
    }

    let password_hash = hash_password(&payload.password)?;

    let user_id = Uuid::new_v4();
    let cart_id = Uuid::new_v4();
    let favorites_id = Uuid::new_v4();

    let mut tx = state.pool.begin().await?;

    sqlx::query("INSERT INTO carts (id) VALUES ($1)")
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO favorites (id) VALUES ($1)")
        .bind(favorites_id)
        .execute(&mut *tx)
        .await?;

    let inserted = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, username, email, password_hash, cart_id, favorites_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(payload.username.as_str())
    .bind(payload.email.as_str())
    .bind(password_hash)
    .bind(cart_id)
    .bind(favorites_id)
    .fetch_one(&mut *tx)
    .await;

    // A concurrent registration can slip past the pre-checks; the unique
    // index has the final word.
    let user = match inserted {
        Ok(user) => user,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(AppError::AlreadyExists(
                "Username or email is already taken".into(),
            ));
        }
        Err(err) => return Err(err.into()),
    };

    tx.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        AuditAction::UserRegister,
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    send_detached(state.notifier.clone(), user.email.clone(), Notice::Welcome);

    Ok(ApiResponse::success(
        "User created",
        UserDto::from(user),
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { username, password } = payload;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username.as_str())
        .fetch_optional(&state.pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::InvalidCredentials),
    };

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    if user.locked {
        return Err(AppError::Unauthorized("Account is locked".into()));
    }

    let token = sign_login_token(&state.config.jwt_secret, &user)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        AuditAction::UserLogin,
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse { token },
        Some(Meta::empty()),
    ))
}

/// Always answers with the same message so the endpoint cannot be used to
/// probe which addresses exist.
pub async fn request_password_reset(
    state: &AppState,
    payload: RecoverRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(payload.email.as_str())
        .fetch_optional(&state.pool)
        .await?;

    if let Some(user) = user {
        let token = sign_reset_token(&state.config.jwt_secret, user.id)?;

        sqlx::query("UPDATE users SET reset_token = $2 WHERE id = $1")
            .bind(user.id)
            .bind(token.as_str())
            .execute(&state.pool)
            .await?;

        if let Err(err) = log_audit(
            &state.pool,
            Some(user.id),
            AuditAction::PasswordResetRequested,
            Some("users"),
            None,
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }

        send_detached(
            state.notifier.clone(),
            user.email.clone(),
            Notice::PasswordReset { token },
        );
    }

    Ok(ApiResponse::success(
        "If the address exists, a recovery email is on its way",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// The token must both verify cryptographically and equal the copy stored at
/// request time; a second reset with the same token is rejected.
pub async fn reset_password(
    state: &AppState,
    token: &str,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    validate_password(&payload.password)?;

    let claims = decode_reset_token(&state.config.jwt_secret, token)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::InvalidToken),
    };

    if user.reset_token.as_deref() != Some(token) {
        return Err(AppError::InvalidToken);
    }

    let password_hash = hash_password(&payload.password)?;

    sqlx::query("UPDATE users SET password_hash = $2, reset_token = NULL WHERE id = $1")
        .bind(user.id)
        .bind(password_hash)
        .execute(&state.pool)
        .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        AuditAction::PasswordReset,
        Some("users"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Password updated",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn validate_registration(payload: &RegisterRequest) -> AppResult<()> {
    let username_len = payload.username.chars().count();
    if username_len < 5 || username_len > 40 {
        return Err(AppError::BadRequest(
            "username must be between 5 and 40 characters".into(),
        ));
    }
    let email_len = payload.email.chars().count();
    if !payload.email.contains('@') || email_len < 5 || email_len > 40 {
        return Err(AppError::BadRequest("email is not valid".into()));
    }
    validate_password(&payload.password)
}

fn validate_password(password: &str) -> AppResult<()> {
    let len = password.chars().count();
    if len < 8 || len > 50 {
        return Err(AppError::BadRequest(
            "password must be between 8 and 50 characters".into(),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("stored password hash is malformed")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn sign_login_token(secret: &str, user: &User) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(LOGIN_TOKEN_HOURS))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to compute expiry")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        locked: user.locked,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn sign_reset_token(secret: &str, user_id: Uuid) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(RESET_TOKEN_HOURS))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to compute expiry")))?;

    let claims = ResetClaims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn decode_reset_token(secret: &str, token: &str) -> AppResult<ResetClaims> {
    let data = decode::<ResetClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::InvalidToken)?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::auth::Claims;
    use crate::models::ROLE_STANDARD;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    fn sample_user(locked: bool) -> User {
        User {
            id: Uuid::new_v4(),
            username: "farmacia_fan".into(),
            email: "fan@example.com".into(),
            password_hash: String::new(),
            reset_token: None,
            role: ROLE_STANDARD.into(),
            locked,
            cart_id: Uuid::new_v4(),
            favorites_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn two_hashes_of_same_password_differ() {
        let first = hash_password("same password").unwrap();
        let second = hash_password("same password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn login_token_embeds_identity_role_and_lock() {
        let user = sample_user(false);
        let token = sign_login_token("test-secret", &user).unwrap();

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, user.id.to_string());
        assert_eq!(decoded.claims.role, ROLE_STANDARD);
        assert!(!decoded.claims.locked);
    }

    #[test]
    fn reset_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = sign_reset_token("test-secret", user_id).unwrap();
        let claims = decode_reset_token("test-secret", &token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
    }

    #[test]
    fn expired_reset_token_is_rejected() {
        let claims = ResetClaims {
            sub: Uuid::new_v4().to_string(),
            exp: (Utc::now() - Duration::hours(2)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(
            decode_reset_token("test-secret", &token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn reset_token_with_wrong_secret_is_rejected() {
        let token = sign_reset_token("test-secret", Uuid::new_v4()).unwrap();
        assert!(matches!(
            decode_reset_token("another-secret", &token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn registration_bounds_are_enforced() {
        let short_username = RegisterRequest {
            username: "ana".into(),
            email: "ana@example.com".into(),
            password: "long enough".into(),
            role: None,
        };
        assert!(matches!(
            validate_registration(&short_username),
            Err(AppError::BadRequest(_))
        ));

        let bad_email = RegisterRequest {
            username: "ana_maria".into(),
            email: "not-an-email".into(),
            password: "long enough".into(),
            role: None,
        };
        assert!(matches!(
            validate_registration(&bad_email),
            Err(AppError::BadRequest(_))
        ));

        let short_password = RegisterRequest {
            username: "ana_maria".into(),
            email: "ana@example.com".into(),
            password: "short".into(),
            role: None,
        };
        assert!(matches!(
            validate_registration(&short_password),
            Err(AppError::BadRequest(_))
        ));
    }
}
