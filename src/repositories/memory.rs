use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{Role, User};
use crate::repositories::{Change, DatastoreError, UnitOfWork, UserDatastore};

#[derive(Debug, Default, Clone)]
struct Tables {
    users: BTreeMap<i64, User>,
    roles: BTreeMap<String, Role>,
    next_user_id: i64,
    next_role_id: i64,
}

impl Tables {
    fn user_mut(&mut self, user_id: i64) -> Result<&mut User, DatastoreError> {
        self.users
            .get_mut(&user_id)
            .ok_or(DatastoreError::UserNotFound(user_id))
    }

    fn role(&self, name: &str) -> Result<Role, DatastoreError> {
        self.roles
            .get(name)
            .cloned()
            .ok_or_else(|| DatastoreError::RoleNotFound(name.to_string()))
    }

    fn apply(&mut self, change: Change) -> Result<Option<User>, DatastoreError> {
        match change {
            Change::CreateUser(new_user) => {
                let taken = self
                    .users
                    .values()
                    .any(|u| u.email.eq_ignore_ascii_case(&new_user.email));
                if taken {
                    return Err(DatastoreError::DuplicateEmail(new_user.email));
                }

                let roles = new_user
                    .roles
                    .iter()
                    .map(|name| self.role(name))
                    .collect::<Result<Vec<_>, _>>()?;

                self.next_user_id += 1;
                let user = User {
                    id: self.next_user_id,
                    email: new_user.email,
                    password: Some(new_user.password),
                    active: new_user.active,
                    confirmed_at: None,
                    roles,
                };
                self.users.insert(user.id, user.clone());
                Ok(Some(user))
            }
            Change::CreateRole { name, description } => {
                if self.roles.contains_key(&name) {
                    return Err(DatastoreError::DuplicateRole(name));
                }
                self.next_role_id += 1;
                let role = Role {
                    id: self.next_role_id,
                    name: name.clone(),
                    description,
                };
                self.roles.insert(name, role);
                Ok(None)
            }
            Change::SetPassword { user_id, password } => {
                self.user_mut(user_id)?.password = Some(password);
                Ok(None)
            }
            Change::Confirm { user_id, at } => {
                self.user_mut(user_id)?.confirmed_at = Some(at);
                Ok(None)
            }
            Change::SetActive { user_id, active } => {
                self.user_mut(user_id)?.active = active;
                Ok(None)
            }
            Change::AddRole { user_id, role } => {
                let role = self.role(&role)?;
                let user = self.user_mut(user_id)?;
                if !user.has_role(&role.name) {
                    user.roles.push(role);
                }
                Ok(None)
            }
            Change::RemoveRole { user_id, role } => {
                self.user_mut(user_id)?.roles.retain(|r| r.name != role);
                Ok(None)
            }
        }
    }
}

/// インメモリ版データストア（開発・テスト用）
///
/// `commit` は作業用コピーに全変更を適用し、成功した場合のみ差し替える。
#[derive(Clone, Default)]
pub struct MemoryUserDatastore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryUserDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登録ユーザー数
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[async_trait]
impl UserDatastore for MemoryUserDatastore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatastoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, DatastoreError> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, DatastoreError> {
        Ok(self.tables.read().await.roles.get(name).cloned())
    }

    async fn commit(&self, work: UnitOfWork) -> Result<Vec<User>, DatastoreError> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        let mut created = Vec::new();

        for change in work.into_changes() {
            if let Some(user) = staged.apply(change)? {
                created.push(user);
            }
        }

        // ロール付与後の最新状態を返す
        let created = created
            .into_iter()
            .filter_map(|u| staged.users.get(&u.id).cloned())
            .collect();

        *tables = staged;
        Ok(created)
    }

    async fn ping(&self) -> Result<(), DatastoreError> {
        Ok(())
    }
}
