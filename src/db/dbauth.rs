use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Error as SqlxError, Row};
use std::time::Duration;
use tracing::{error, info};

use super::auth_store::{
    hash_password, personal_group_name, verify_password, AuthError, AuthStore, Group, User,
};

const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        first_name TEXT NOT NULL DEFAULT '',
        last_name TEXT NOT NULL DEFAULT '',
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        linkedin_federation_id TEXT NOT NULL DEFAULT '',
        google_federation_id TEXT NOT NULL DEFAULT '',
        facebook_federation_id TEXT NOT NULL DEFAULT '',
        date_joined TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        last_login TIMESTAMPTZ
    );
    CREATE TABLE IF NOT EXISTS profiles (
        user_id BIGINT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
        bio TEXT NOT NULL DEFAULT '',
        picture BYTEA,
        displayname TEXT NOT NULL DEFAULT '',
        theme TEXT NOT NULL DEFAULT '',
        address TEXT NOT NULL DEFAULT ''
    );
    CREATE TABLE IF NOT EXISTS groups (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS user_groups (
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        group_id BIGINT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, group_id)
    );
"#;

/// Postgres-backed authentication store
pub struct DbAuth {
    pool: PgPool,
}

impl DbAuth {
    /// Create a new database connection pool and make sure the tables exist
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    pub async fn new(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to authentication database...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await?;

        sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await?;
        info!("Authentication database ready");

        Ok(Self { pool })
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, SqlxError> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
    })
}

fn group_from_row(row: &sqlx::postgres::PgRow) -> Result<Group, SqlxError> {
    Ok(Group {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
    })
}

#[async_trait]
impl AuthStore for DbAuth {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>, AuthError> {
        let query_sql = r#"
            SELECT id, username, password, first_name, last_name
            FROM users
            WHERE username = $1 AND is_active = TRUE;
        "#;
        let Some(row) = sqlx::query(query_sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
        else {
            info!("Login attempt for unknown user '{}'", username);
            return Ok(None);
        };

        let stored_hash: String = row.try_get("password")?;
        if !verify_password(password, &stored_hash).await {
            info!("Login attempt with wrong password for '{}'", username);
            return Ok(None);
        }

        let user = user_from_row(&row)?;
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        Ok(Some(user))
    }

    async fn create_user(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let password_hash = hash_password(password).await?;
        let query_sql = r#"
            INSERT INTO users(username, password)
            VALUES ($1, $2)
            RETURNING id, username, first_name, last_name;
        "#;
        let row = match sqlx::query(query_sql)
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
        {
            Ok(row) => row,
            Err(SqlxError::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(AuthError::DuplicateUser(username.to_string()));
            }
            Err(e) => {
                error!("Failed to create user '{}': {}", username, e);
                return Err(e.into());
            }
        };

        let user = user_from_row(&row)?;
        info!("User created: {} ({})", user.username, user.id);
        Ok(user)
    }

    async fn create_profile(&self, user: &User, bio: &str) -> Result<(), AuthError> {
        let query_sql = r#"
            INSERT INTO profiles(user_id, bio)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET bio = EXCLUDED.bio;
        "#;
        sqlx::query(query_sql)
            .bind(user.id)
            .bind(bio)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_or_create_group(&self, name: &str) -> Result<Group, AuthError> {
        let query_sql = r#"
            INSERT INTO groups(name)
            VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name;
        "#;
        let row = sqlx::query(query_sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(group_from_row(&row)?)
    }

    async fn add_user_to_group(&self, user: &User, group: &Group) -> Result<(), AuthError> {
        let query_sql = r#"
            INSERT INTO user_groups(user_id, group_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING;
        "#;
        sqlx::query(query_sql)
            .bind(user.id)
            .bind(group.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn personal_group(&self, user: &User) -> Result<Option<Group>, AuthError> {
        let query_sql = r#"
            SELECT g.id, g.name
            FROM groups g
            JOIN user_groups ug ON ug.group_id = g.id
            WHERE ug.user_id = $1 AND g.name = $2;
        "#;
        let row = sqlx::query(query_sql)
            .bind(user.id)
            .bind(personal_group_name(user))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(group_from_row).transpose()?)
    }
}
