pub mod memory;
pub mod role;
pub mod user;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::models::{Role, User};

pub use memory::MemoryUserDatastore;
pub use user::PgUserDatastore;

/// データストア層のエラー
#[derive(Debug, thiserror::Error)]
pub enum DatastoreError {
    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("メールアドレスが重複しています: {0}")]
    DuplicateEmail(String),

    #[error("ロール名が重複しています: {0}")]
    DuplicateRole(String),

    #[error("ユーザーが見つかりません: {0}")]
    UserNotFound(i64),

    #[error("ロールが見つかりません: {0}")]
    RoleNotFound(String),
}

/// 新規ユーザーの作成内容
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub active: bool,
    pub roles: Vec<String>,
}

/// 1リクエスト分の変更単位
#[derive(Debug, Clone)]
pub enum Change {
    CreateUser(NewUser),
    CreateRole {
        name: String,
        description: Option<String>,
    },
    SetPassword {
        user_id: i64,
        password: String,
    },
    Confirm {
        user_id: i64,
        at: OffsetDateTime,
    },
    SetActive {
        user_id: i64,
        active: bool,
    },
    AddRole {
        user_id: i64,
        role: String,
    },
    RemoveRole {
        user_id: i64,
        role: String,
    },
}

/// リクエスト中に積み上げ、最後にまとめてコミットする変更セット
///
/// 検証がすべて通った後にだけ `UserDatastore::commit` へ渡すこと。
/// 途中で失敗したリクエストの変更は破棄される。
#[derive(Debug, Default)]
pub struct UnitOfWork {
    changes: Vec<Change>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    pub fn create_role(&mut self, name: &str, description: Option<&str>) -> &mut Self {
        self.push(Change::CreateRole {
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }

    pub fn add_role_to_user(&mut self, user: &User, role: &str) -> &mut Self {
        self.push(Change::AddRole {
            user_id: user.id,
            role: role.to_string(),
        })
    }

    pub fn remove_role_from_user(&mut self, user: &User, role: &str) -> &mut Self {
        self.push(Change::RemoveRole {
            user_id: user.id,
            role: role.to_string(),
        })
    }

    pub fn activate_user(&mut self, user: &User) -> &mut Self {
        self.push(Change::SetActive {
            user_id: user.id,
            active: true,
        })
    }

    pub fn deactivate_user(&mut self, user: &User) -> &mut Self {
        self.push(Change::SetActive {
            user_id: user.id,
            active: false,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

/// ユーザー・ロールの永続化抽象
///
/// 本番は PostgreSQL、開発・テストはインメモリ実装を使う。
#[async_trait]
pub trait UserDatastore: Send + Sync {
    /// メールアドレスでユーザーを検索（大文字小文字は区別しない）
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatastoreError>;

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, DatastoreError>;

    async fn find_role(&self, name: &str) -> Result<Option<Role>, DatastoreError>;

    /// 変更セットを1トランザクションで適用する
    ///
    /// # Returns
    /// 作成されたユーザー（`Change::CreateUser` の順）
    async fn commit(&self, work: UnitOfWork) -> Result<Vec<User>, DatastoreError>;

    /// 疎通確認
    async fn ping(&self) -> Result<(), DatastoreError>;
}
