use serde::Serialize;
use sqlx::FromRow;

/// ロール（ユーザーと多対多）
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}
