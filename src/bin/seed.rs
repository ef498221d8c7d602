use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum_pharmacy_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id =
        ensure_user_with_role(&pool, "farmacia_admin", "admin@example.com", "admin12345", "admin")
            .await?;
    let user_id =
        ensure_user_with_role(&pool, "cliente_demo", "user@example.com", "user1234567", "standard")
            .await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

/// Users are always created together with their cart and favorites rows;
/// a user without the pair would break every cart lookup.
async fn ensure_user_with_role(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    if let Some((id,)) = existing {
        println!("User {username} already present");
        return Ok(id);
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let user_id = Uuid::new_v4();
    let cart_id = Uuid::new_v4();
    let favorites_id = Uuid::new_v4();

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO carts (id) VALUES ($1)")
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO favorites (id) VALUES ($1)")
        .bind(favorites_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, password_hash, role, cart_id, favorites_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(user_id)
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .bind(cart_id)
    .bind(favorites_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    println!("Ensured user {username} (role={role})");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        (
            "Ibuprofeno 400mg x10",
            "Analgésico y antiinflamatorio, blister de 10 comprimidos",
            150000_i64,
        ),
        (
            "Termómetro Digital",
            "Termómetro clínico digital con alarma de fiebre",
            320000,
        ),
        (
            "Alcohol en Gel 250ml",
            "Gel antiséptico para manos, 70% alcohol",
            98000,
        ),
        (
            "Barbijo Tricapa x50",
            "Caja de 50 barbijos descartables de tres capas",
            450000,
        ),
        (
            "Vitamina C 1g x30",
            "Suplemento de vitamina C, 30 comprimidos efervescentes",
            275000,
        ),
        (
            "Protector Solar FPS 50 200ml",
            "Protección solar de amplio espectro, resistente al agua",
            890000,
        ),
    ];

    for (name, desc, price) in products {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            continue;
        }

        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
