use async_trait::async_trait;
use farewatch_core::repository::{StoreResult, UserRepository};
use farewatch_shared::User;
use sqlx::PgPool;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    language: String,
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, language FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| User::new(r.id, r.language)))
    }

    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, language) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET language = EXCLUDED.language
            "#,
        )
        .bind(user.id)
        .bind(&user.language)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
