use sqlx::{PgConnection, PgExecutor};

use crate::models::Role;
use crate::repositories::DatastoreError;

/// ロール名で検索
pub async fn find_by_name<'e>(
    executor: impl PgExecutor<'e>,
    name: &str,
) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        r#"
        SELECT id, name, description
        FROM roles
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(executor)
    .await
}

/// ユーザーに紐づくロール一覧
pub async fn find_for_user<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        r#"
        SELECT r.id, r.name, r.description
        FROM roles r
        JOIN roles_users ru ON ru.role_id = r.id
        WHERE ru.user_id = $1
        ORDER BY r.name
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// 新しいロールを作成
///
/// # Errors
/// - UNIQUE制約違反時: `DatastoreError::DuplicateRole`
pub async fn create(
    conn: &mut PgConnection,
    name: &str,
    description: Option<&str>,
) -> Result<Role, DatastoreError> {
    sqlx::query_as::<_, Role>(
        r#"
        INSERT INTO roles (name, description)
        VALUES ($1, $2)
        RETURNING id, name, description
        "#,
    )
    .bind(name)
    .bind(description)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.constraint() == Some("roles_name_key")
        {
            return DatastoreError::DuplicateRole(name.to_string());
        }
        DatastoreError::Database(e)
    })
}

/// ユーザーにロールを付与（付与済みなら何もしない）
pub async fn attach(
    conn: &mut PgConnection,
    user_id: i64,
    role_name: &str,
) -> Result<(), DatastoreError> {
    let role = find_by_name(&mut *conn, role_name)
        .await?
        .ok_or_else(|| DatastoreError::RoleNotFound(role_name.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO roles_users (user_id, role_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(role.id)
    .execute(conn)
    .await?;

    Ok(())
}

/// ユーザーからロールを外す
pub async fn detach(
    conn: &mut PgConnection,
    user_id: i64,
    role_name: &str,
) -> Result<(), DatastoreError> {
    sqlx::query(
        r#"
        DELETE FROM roles_users
        WHERE user_id = $1
          AND role_id = (SELECT id FROM roles WHERE name = $2)
        "#,
    )
    .bind(user_id)
    .bind(role_name)
    .execute(conn)
    .await?;

    Ok(())
}
