use async_trait::async_trait;
use sqlx::postgres::PgQueryResult;
use sqlx::{PgConnection, PgPool};

use crate::models::{Role, User};
use crate::repositories::{Change, DatastoreError, NewUser, UnitOfWork, UserDatastore, role};

/// PostgreSQL 版データストア
///
/// テーブル: `users`, `roles`, `roles_users`
#[derive(Clone)]
pub struct PgUserDatastore {
    pool: PgPool,
}

impl PgUserDatastore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn with_roles(&self, user: Option<User>) -> Result<Option<User>, DatastoreError> {
        match user {
            Some(mut user) => {
                user.roles = role::find_for_user(&self.pool, user.id).await?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// 新しいユーザーを作成
    ///
    /// # Errors
    /// - UNIQUE制約違反時: `DatastoreError::DuplicateEmail`
    async fn create_user(
        conn: &mut PgConnection,
        new_user: &NewUser,
    ) -> Result<User, DatastoreError> {
        let mut user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password, active)
            VALUES ($1, $2, $3)
            RETURNING id, email, password, active, confirmed_at
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password)
        .bind(new_user.active)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e
                && matches!(
                    db_err.constraint(),
                    Some("users_email_key" | "users_email_lower_idx")
                )
            {
                return DatastoreError::DuplicateEmail(new_user.email.clone());
            }
            DatastoreError::Database(e)
        })?;

        for name in &new_user.roles {
            role::attach(&mut *conn, user.id, name).await?;
        }
        user.roles = role::find_for_user(&mut *conn, user.id).await?;

        Ok(user)
    }

    /// UPDATE の対象行が無ければエラー
    fn ensure_updated(result: PgQueryResult, user_id: i64) -> Result<(), DatastoreError> {
        if result.rows_affected() == 0 {
            return Err(DatastoreError::UserNotFound(user_id));
        }
        Ok(())
    }

    async fn apply(
        conn: &mut PgConnection,
        change: &Change,
    ) -> Result<Option<User>, DatastoreError> {
        match change {
            Change::CreateUser(new_user) => Ok(Some(Self::create_user(conn, new_user).await?)),
            Change::CreateRole { name, description } => {
                role::create(conn, name, description.as_deref()).await?;
                Ok(None)
            }
            Change::SetPassword { user_id, password } => {
                // password はログに出力しないこと
                let result = sqlx::query("UPDATE users SET password = $2 WHERE id = $1")
                    .bind(user_id)
                    .bind(password)
                    .execute(conn)
                    .await?;
                Self::ensure_updated(result, *user_id)?;
                Ok(None)
            }
            Change::Confirm { user_id, at } => {
                let result = sqlx::query("UPDATE users SET confirmed_at = $2 WHERE id = $1")
                    .bind(user_id)
                    .bind(*at)
                    .execute(conn)
                    .await?;
                Self::ensure_updated(result, *user_id)?;
                Ok(None)
            }
            Change::SetActive { user_id, active } => {
                let result = sqlx::query("UPDATE users SET active = $2 WHERE id = $1")
                    .bind(user_id)
                    .bind(*active)
                    .execute(conn)
                    .await?;
                Self::ensure_updated(result, *user_id)?;
                Ok(None)
            }
            Change::AddRole { user_id, role } => {
                role::attach(conn, *user_id, role).await?;
                Ok(None)
            }
            Change::RemoveRole { user_id, role } => {
                role::detach(conn, *user_id, role).await?;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl UserDatastore for PgUserDatastore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatastoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, active, confirmed_at
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        self.with_roles(user).await
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, DatastoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, active, confirmed_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        self.with_roles(user).await
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, DatastoreError> {
        Ok(role::find_by_name(&self.pool, name).await?)
    }

    async fn commit(&self, work: UnitOfWork) -> Result<Vec<User>, DatastoreError> {
        if work.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::new();

        // 失敗時は tx の drop でロールバックされる
        for change in work.changes() {
            if let Some(user) = Self::apply(&mut *tx, change).await? {
                created.push(user);
            }
        }

        tx.commit().await?;

        tracing::debug!(changes = work.len(), "変更セットをコミット");

        Ok(created)
    }

    async fn ping(&self) -> Result<(), DatastoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
